use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::clock::SystemClock;
use crate::decimal::{Money, Rate};
use crate::deposit::account::{maturity_date, DepositAccount};
use crate::errors::{Result, SettlementError};
use crate::events::{Event, EventStore};
use crate::pricing::{PricingRuleResolver, ProductCatalog};
use crate::types::{AccountId, AccountStatus, CustomerId};

/// requested changes to an active account's terms
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountUpgrade {
    #[serde(default)]
    pub interest_rate: Option<Rate>,
    #[serde(default)]
    pub tenure_months: Option<u32>,
    #[serde(default)]
    pub product_code: Option<String>,
}

impl AccountUpgrade {
    pub fn is_empty(&self) -> bool {
        self.interest_rate.is_none() && self.tenure_months.is_none() && self.product_code.is_none()
    }
}

/// deposit accounts, each behind its own lock
pub struct AccountRegistry {
    accounts: RwLock<HashMap<AccountId, Arc<Mutex<DepositAccount>>>>,
    catalog: Arc<dyn ProductCatalog>,
    resolver: PricingRuleResolver,
    clock: Arc<SystemClock>,
    events: Arc<EventStore>,
}

impl AccountRegistry {
    pub fn new(
        catalog: Arc<dyn ProductCatalog>,
        clock: Arc<SystemClock>,
        events: Arc<EventStore>,
    ) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            catalog,
            resolver: PricingRuleResolver::new(),
            clock,
            events,
        }
    }

    pub fn catalog(&self) -> &Arc<dyn ProductCatalog> {
        &self.catalog
    }

    /// open an account, fixing its rate and term from the product
    pub fn open_account(
        &self,
        customer_id: &CustomerId,
        product_code: &str,
        principal: Money,
        tenure_months: u32,
    ) -> Result<DepositAccount> {
        if !principal.is_positive() {
            return Err(SettlementError::InvalidAmount {
                amount: principal,
                reason: "principal must be positive".to_string(),
            });
        }
        let product = self.catalog.product(product_code)?;
        product.ensure_principal(principal)?;
        product.ensure_tenure(tenure_months)?;
        let pricing = self.resolver.resolve(&product, principal)?;

        let now = self.clock.now();
        let account = DepositAccount {
            id: Uuid::new_v4(),
            customer_id: customer_id.clone(),
            product_code: product.code.clone(),
            currency: product.currency.clone(),
            principal,
            interest_rate: pricing.rate,
            compounding: product.compounding,
            premature_penalty: product.premature_penalty,
            tenure_months,
            pricing_rule_id: pricing.rule_id,
            fee: pricing.fee,
            discount_percentage: pricing.discount_percentage,
            opened_at: now,
            maturity_date: maturity_date(now, tenure_months)?,
            last_status_change: now,
            closed_at: None,
            status: AccountStatus::Active,
            redemption: None,
        };

        self.accounts
            .write()
            .insert(account.id, Arc::new(Mutex::new(account.clone())));

        info!(
            account_id = %account.id,
            customer = %customer_id,
            product = %product.code,
            %principal,
            rate = %account.interest_rate,
            maturity = %account.maturity_date,
            "deposit account opened"
        );
        self.events.emit(Event::AccountOpened {
            account_id: account.id,
            customer_id: customer_id.clone(),
            principal,
            interest_rate: account.interest_rate,
            maturity_date: account.maturity_date,
            timestamp: now,
        });
        Ok(account)
    }

    /// shared handle to the account's lock
    pub(crate) fn handle(&self, account_id: AccountId) -> Result<Arc<Mutex<DepositAccount>>> {
        self.accounts
            .read()
            .get(&account_id)
            .cloned()
            .ok_or(SettlementError::AccountNotFound { account_id })
    }

    /// snapshot of an account
    pub fn get(&self, account_id: AccountId) -> Result<DepositAccount> {
        Ok(self.handle(account_id)?.lock().clone())
    }

    /// a customer's accounts, oldest first
    pub fn list_for_customer(&self, customer_id: &CustomerId) -> Vec<DepositAccount> {
        let handles: Vec<_> = self.accounts.read().values().cloned().collect();
        let mut accounts: Vec<DepositAccount> = handles
            .iter()
            .map(|handle| handle.lock().clone())
            .filter(|account| &account.customer_id == customer_id)
            .collect();
        accounts.sort_by(|a, b| a.opened_at.cmp(&b.opened_at).then(a.id.cmp(&b.id)));
        accounts
    }

    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }

    /// change rate, tenure or product of an active account
    ///
    /// Maturity is recomputed from the opening date. Moving to another
    /// product re-runs pricing unless an explicit rate is given.
    pub fn upgrade(&self, account_id: AccountId, upgrade: AccountUpgrade) -> Result<DepositAccount> {
        let handle = self.handle(account_id)?;
        let mut account = handle.lock();
        account.ensure_active()?;
        if upgrade.is_empty() {
            return Ok(account.clone());
        }

        let product_code = upgrade
            .product_code
            .clone()
            .unwrap_or_else(|| account.product_code.clone());
        let product = self.catalog.product(&product_code)?;
        let changes_product = product.code != account.product_code;
        let tenure_months = upgrade.tenure_months.unwrap_or(account.tenure_months);
        product.ensure_tenure(tenure_months)?;

        let mut pricing = None;
        if changes_product {
            product.ensure_principal(account.principal)?;
            pricing = Some(self.resolver.resolve(&product, account.principal)?);
        }

        let interest_rate = match (upgrade.interest_rate, &pricing) {
            (Some(rate), _) => {
                if rate < product.min_interest_rate || rate > product.max_interest_rate {
                    return Err(SettlementError::InvalidInterestRate { rate });
                }
                rate
            }
            (None, Some(pricing)) => pricing.rate,
            (None, None) => account.interest_rate,
        };
        let old_rate = account.interest_rate;
        let old_maturity = account.maturity_date;
        account.set_tenure(tenure_months)?;
        account.interest_rate = interest_rate;
        let new_maturity = account.maturity_date;
        if let Some(pricing) = pricing {
            account.product_code = product.code.clone();
            account.currency = product.currency.clone();
            account.compounding = product.compounding;
            account.premature_penalty = product.premature_penalty;
            account.pricing_rule_id = pricing.rule_id;
            account.fee = pricing.fee;
            account.discount_percentage = pricing.discount_percentage;
        }

        let now = self.clock.now();
        info!(
            %account_id,
            product = %account.product_code,
            %old_rate,
            new_rate = %interest_rate,
            %new_maturity,
            "deposit account upgraded"
        );
        self.events.emit(Event::AccountUpgraded {
            account_id,
            old_rate,
            new_rate: interest_rate,
            old_maturity,
            new_maturity,
            timestamp: now,
        });
        Ok(account.clone())
    }

    /// administrative close without payout
    pub fn close(&self, account_id: AccountId, reason: &str) -> Result<DepositAccount> {
        self.transition(account_id, AccountStatus::Closed, reason, |account| {
            if account.status == AccountStatus::Closed {
                return Err(invalid_transition(account, "ACTIVE, MATURED or SUSPENDED"));
            }
            Ok(())
        })
    }

    /// bring a suspended or administratively closed account back to active
    pub fn reopen(&self, account_id: AccountId, reason: &str) -> Result<DepositAccount> {
        self.transition(account_id, AccountStatus::Active, reason, |account| {
            let reopenable = match account.status {
                AccountStatus::Suspended => true,
                AccountStatus::Closed => !account.is_redeemed(),
                AccountStatus::Active | AccountStatus::Matured => false,
            };
            if !reopenable {
                return Err(invalid_transition(account, "SUSPENDED or CLOSED without redemption"));
            }
            Ok(())
        })
    }

    pub fn suspend(&self, account_id: AccountId, reason: &str) -> Result<DepositAccount> {
        self.transition(account_id, AccountStatus::Suspended, reason, DepositAccount::ensure_active)
    }

    fn transition(
        &self,
        account_id: AccountId,
        new_status: AccountStatus,
        reason: &str,
        check: impl FnOnce(&DepositAccount) -> Result<()>,
    ) -> Result<DepositAccount> {
        let handle = self.handle(account_id)?;
        let mut account = handle.lock();
        check(&account)?;

        let now = self.clock.now();
        let old_status = account.status;
        account.update_status(new_status, now);

        info!(%account_id, %old_status, %new_status, reason, "account status changed");
        self.events.emit(Event::StatusChanged {
            account_id,
            old_status,
            new_status,
            reason: reason.to_string(),
            timestamp: now,
        });
        Ok(account.clone())
    }

    /// total principal held in active accounts
    pub fn active_principal(&self) -> Money {
        let handles: Vec<_> = self.accounts.read().values().cloned().collect();
        handles
            .iter()
            .map(|handle| handle.lock())
            .filter(|account| account.status == AccountStatus::Active)
            .map(|account| account.principal)
            .sum()
    }
}

fn invalid_transition(account: &DepositAccount, expected: &str) -> SettlementError {
    SettlementError::InvalidState {
        current: account.status.to_string(),
        expected: expected.to_string(),
    }
}
