//! Redemption quotes and payout processing.

pub mod penalty;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use crate::clock::SystemClock;
use crate::config::{RedemptionConfig, SettlementConfig};
use crate::decimal::{Money, Rate};
use crate::deposit::{AccountRegistry, DepositAccount, RedemptionRecord};
use crate::errors::Result;
use crate::events::{Event, EventStore};
use crate::interest::{elapsed_days, AccrualCalculator};
use crate::ledger::{LedgerEngine, LedgerEntry};
use crate::types::{AccountId, AccountStatus, CustomerId};

pub use penalty::{PenaltyAssessment, PenaltyEngine};

const SECONDS_PER_DAY: i64 = 86_400;

/// days before maturity inside which quotes carry a reminder
const MATURITY_NOTICE_DAYS: i64 = 7;

/// what a redemption would pay at a given instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedemptionQuote {
    pub account_id: AccountId,
    pub customer_id: CustomerId,
    pub principal: Money,
    pub interest_rate: Rate,
    pub is_matured: bool,
    pub accrued_interest: Money,
    pub maturity_amount: Money,
    pub penalty: Money,
    pub penalty_rate: Rate,
    pub net_payable: Money,
    pub days_since_opening: i64,
    pub days_until_maturity: i64,
    pub maturity_date: DateTime<Utc>,
    pub warnings: Vec<String>,
    pub quoted_at: DateTime<Utc>,
}

/// result of processing a redemption
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedemptionReceipt {
    pub quote: RedemptionQuote,
    /// `None` when nothing was payable
    pub ledger_entry: Option<LedgerEntry>,
    pub account: DepositAccount,
}

pub struct RedemptionEngine {
    accounts: Arc<AccountRegistry>,
    ledger: Arc<LedgerEngine>,
    clock: Arc<SystemClock>,
    events: Arc<EventStore>,
    calculator: AccrualCalculator,
    config: RedemptionConfig,
}

impl RedemptionEngine {
    pub fn new(
        accounts: Arc<AccountRegistry>,
        ledger: Arc<LedgerEngine>,
        clock: Arc<SystemClock>,
        events: Arc<EventStore>,
        config: &SettlementConfig,
    ) -> Self {
        Self {
            accounts,
            ledger,
            clock,
            events,
            calculator: AccrualCalculator::new(config.scale()),
            config: config.redemption.clone(),
        }
    }

    /// quote for an account at the current clock reading; read-only
    pub fn enquire(&self, account: &DepositAccount) -> Result<RedemptionQuote> {
        self.quote(account, self.clock.now())
    }

    /// quote for a stored account
    pub fn enquire_by_id(&self, account_id: AccountId) -> Result<RedemptionQuote> {
        let account = self.accounts.get(account_id)?;
        self.enquire(&account)
    }

    /// pay out an active account through the ledger and close it
    ///
    /// The account lock is held throughout, so a concurrent second call sees
    /// the account closed. On any ledger error the account is left as it was.
    pub fn process(&self, account_id: AccountId) -> Result<RedemptionReceipt> {
        let handle = self.accounts.handle(account_id)?;
        let mut account = handle.lock();
        account.ensure_active()?;

        let quote = self.quote(&account, self.clock.now())?;
        let ledger_entry = if quote.net_payable.is_positive() {
            let reference = format!("{}:{}", self.config.reference_prefix, account.id);
            Some(
                self.ledger
                    .redeem(&account.customer_id, quote.net_payable, Some(&reference))?,
            )
        } else {
            None
        };

        account.record_redemption(RedemptionRecord {
            redeemed_at: quote.quoted_at,
            matured: quote.is_matured,
            accrued_interest: quote.accrued_interest,
            penalty: quote.penalty,
            net_payable: quote.net_payable,
            ledger_entry_id: ledger_entry.as_ref().map(|e| e.id),
        });

        info!(
            %account_id,
            customer = %account.customer_id,
            matured = quote.is_matured,
            accrued = %quote.accrued_interest,
            penalty = %quote.penalty,
            net_payable = %quote.net_payable,
            "redemption processed"
        );
        self.events.emit(Event::RedemptionProcessed {
            account_id,
            customer_id: account.customer_id.clone(),
            matured: quote.is_matured,
            accrued_interest: quote.accrued_interest,
            penalty: quote.penalty,
            net_payable: quote.net_payable,
            ledger_entry_id: ledger_entry.as_ref().map(|e| e.id),
            timestamp: quote.quoted_at,
        });

        Ok(RedemptionReceipt {
            quote,
            ledger_entry,
            account: account.clone(),
        })
    }

    fn quote(&self, account: &DepositAccount, now: DateTime<Utc>) -> Result<RedemptionQuote> {
        let is_matured = account.is_matured_at(now);
        let accrual_end = now.min(account.maturity_date);
        let accrued_interest = self.calculator.interest_earned(
            account.principal,
            account.interest_rate,
            account.compounding,
            account.opened_at,
            accrual_end,
        )?;
        let maturity_amount = account.principal + accrued_interest;

        let days_since_opening = elapsed_days(account.opened_at, now);
        let assessment = PenaltyEngine::new(account.premature_penalty, self.calculator.scale())
            .assess(account.principal, accrued_interest, days_since_opening, is_matured);
        let days_until_maturity = if is_matured {
            0
        } else {
            days_until(now, account.maturity_date)
        };

        let warnings = if self.config.include_warnings {
            warnings(account, &assessment, is_matured, days_until_maturity)
        } else {
            Vec::new()
        };

        let quote = RedemptionQuote {
            account_id: account.id,
            customer_id: account.customer_id.clone(),
            principal: account.principal,
            interest_rate: account.interest_rate,
            is_matured,
            accrued_interest,
            maturity_amount,
            penalty: assessment.penalty_amount,
            penalty_rate: assessment.rate,
            net_payable: maturity_amount - assessment.penalty_amount,
            days_since_opening,
            days_until_maturity,
            maturity_date: account.maturity_date,
            warnings,
            quoted_at: now,
        };
        debug!(
            account_id = %account.id,
            matured = is_matured,
            accrued = %quote.accrued_interest,
            penalty = %quote.penalty,
            net_payable = %quote.net_payable,
            "redemption quoted"
        );
        Ok(quote)
    }
}

/// whole days left, counting a started day as a full one
fn days_until(now: DateTime<Utc>, maturity: DateTime<Utc>) -> i64 {
    let seconds = (maturity - now).num_seconds().max(0);
    (seconds + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY
}

fn warnings(
    account: &DepositAccount,
    assessment: &PenaltyAssessment,
    is_matured: bool,
    days_until_maturity: i64,
) -> Vec<String> {
    let mut warnings = Vec::new();
    if account.status != AccountStatus::Active {
        warnings.push(format!(
            "account is {}; redemption cannot be processed",
            account.status
        ));
    }
    if !is_matured {
        if assessment.is_charged() {
            warnings.push(format!(
                "premature redemption: penalty of {} ({}) applies",
                assessment.penalty_amount, assessment.rate
            ));
        } else if assessment.grace_applied {
            warnings.push(format!(
                "premature redemption within the {}-day grace period: no penalty",
                account.premature_penalty.grace_period_days
            ));
        }
        if assessment.capped {
            warnings.push("penalty limited to principal plus accrued interest".to_string());
        }
        if days_until_maturity <= MATURITY_NOTICE_DAYS {
            warnings.push(format!(
                "account matures in {} day(s); waiting avoids any penalty",
                days_until_maturity
            ));
        }
    }
    warnings
}
