use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Currency, Money, Rate};
use crate::errors::{Result, SettlementError};
use crate::interest::CompoundingConvention;
use crate::pricing::PrematurePenalty;
use crate::types::{AccountId, AccountStatus, CustomerId, EntryId};

/// fixed-deposit account state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositAccount {
    // identification
    pub id: AccountId,
    pub customer_id: CustomerId,
    pub product_code: String,
    pub currency: Currency,

    // terms, frozen at opening unless upgraded
    pub principal: Money,
    pub interest_rate: Rate,
    pub compounding: CompoundingConvention,
    pub premature_penalty: PrematurePenalty,
    pub tenure_months: u32,

    // pricing applied at opening
    pub pricing_rule_id: Option<u64>,
    pub fee: Money,
    pub discount_percentage: Decimal,

    // dates
    pub opened_at: DateTime<Utc>,
    pub maturity_date: DateTime<Utc>,
    pub last_status_change: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,

    pub status: AccountStatus,
    pub redemption: Option<RedemptionRecord>,
}

/// what redemption processing recorded on the account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedemptionRecord {
    pub redeemed_at: DateTime<Utc>,
    pub matured: bool,
    pub accrued_interest: Money,
    pub penalty: Money,
    pub net_payable: Money,
    pub ledger_entry_id: Option<EntryId>,
}

/// opening + tenure months
pub fn maturity_date(opened_at: DateTime<Utc>, tenure_months: u32) -> Result<DateTime<Utc>> {
    opened_at
        .checked_add_months(Months::new(tenure_months))
        .ok_or_else(|| SettlementError::InvalidDate {
            message: format!("{} plus {} months is out of range", opened_at, tenure_months),
        })
}

impl DepositAccount {
    pub fn is_matured_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.maturity_date
    }

    pub fn is_redeemed(&self) -> bool {
        self.redemption.is_some()
    }

    /// status as seen at `now`: an active account past maturity reads as matured
    pub fn status_at(&self, now: DateTime<Utc>) -> AccountStatus {
        match self.status {
            AccountStatus::Active if self.is_matured_at(now) => AccountStatus::Matured,
            status => status,
        }
    }

    pub fn ensure_active(&self) -> Result<()> {
        if self.status != AccountStatus::Active {
            return Err(SettlementError::AccountNotActive {
                account_id: self.id,
                status: self.status,
            });
        }
        Ok(())
    }

    pub fn update_status(&mut self, new_status: AccountStatus, timestamp: DateTime<Utc>) {
        self.status = new_status;
        self.last_status_change = timestamp;
        if new_status == AccountStatus::Closed {
            self.closed_at = Some(timestamp);
        } else {
            self.closed_at = None;
        }
    }

    /// change term length; maturity is recomputed from the original opening
    pub fn set_tenure(&mut self, tenure_months: u32) -> Result<()> {
        self.maturity_date = maturity_date(self.opened_at, tenure_months)?;
        self.tenure_months = tenure_months;
        Ok(())
    }

    /// terminal transition recorded by redemption processing
    pub fn record_redemption(&mut self, record: RedemptionRecord) {
        let at = record.redeemed_at;
        self.redemption = Some(record);
        self.update_status(AccountStatus::Closed, at);
    }
}
