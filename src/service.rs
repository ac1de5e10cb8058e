//! Application-facing operations with caller checks and chain submission.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, warn};

use crate::calculator::{FdCalculation, FdCalculator};
use crate::clock::{ClockState, SystemClock};
use crate::config::SettlementConfig;
use crate::decimal::Money;
use crate::deposit::{AccountRegistry, AccountUpgrade, DepositAccount};
use crate::errors::{Result, SettlementError};
use crate::events::{Event, EventStore};
use crate::ledger::{ChainSubmission, LedgerEngine, LedgerEntry, TransferEntries};
use crate::pricing::ProductCatalog;
use crate::reconciliation::{ReconciliationReporter, ReconciliationSummary, SupplySource};
use crate::redemption::{RedemptionEngine, RedemptionQuote, RedemptionReceipt};
use crate::types::{AccountId, Caller, CustomerId, EntryId, Page};

/// blockchain collaborator: move `change` units for a customer on chain
pub trait ChainClient: Send + Sync {
    /// transaction hash on success
    fn submit(&self, customer_id: &CustomerId, change: Money) -> Result<String>;
}

/// settlement core wired together behind caller checks
pub struct SettlementService {
    config: SettlementConfig,
    clock: Arc<SystemClock>,
    events: Arc<EventStore>,
    ledger: Arc<LedgerEngine>,
    accounts: Arc<AccountRegistry>,
    redemption: RedemptionEngine,
    reconciliation: ReconciliationReporter,
    calculator: FdCalculator,
    chain: Option<Arc<dyn ChainClient>>,
    in_flight: Mutex<HashSet<EntryId>>,
}

impl SettlementService {
    pub fn new(
        config: SettlementConfig,
        catalog: Arc<dyn ProductCatalog>,
        supply: Arc<dyn SupplySource>,
        clock: Arc<SystemClock>,
    ) -> Result<Self> {
        config.validate()?;
        let events = Arc::new(EventStore::with_capacity(config.events.capacity));
        let ledger = Arc::new(LedgerEngine::new(
            clock.clone(),
            events.clone(),
            config.paging.clone(),
        ));
        let accounts = Arc::new(AccountRegistry::new(
            catalog.clone(),
            clock.clone(),
            events.clone(),
        ));
        let redemption = RedemptionEngine::new(
            accounts.clone(),
            ledger.clone(),
            clock.clone(),
            events.clone(),
            &config,
        );
        let reconciliation = ReconciliationReporter::new(
            ledger.clone(),
            supply,
            clock.clone(),
            events.clone(),
            config.reconciliation.clone(),
        );
        let calculator = FdCalculator::new(catalog, clock.clone(), config.scale());

        Ok(Self {
            config,
            clock,
            events,
            ledger,
            accounts,
            redemption,
            reconciliation,
            calculator,
            chain: None,
            in_flight: Mutex::new(HashSet::new()),
        })
    }

    pub fn with_chain_client(mut self, chain: Arc<dyn ChainClient>) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<SystemClock> {
        &self.clock
    }

    pub fn events(&self) -> &Arc<EventStore> {
        &self.events
    }

    pub fn ledger(&self) -> &Arc<LedgerEngine> {
        &self.ledger
    }

    pub fn accounts(&self) -> &Arc<AccountRegistry> {
        &self.accounts
    }

    // balances

    pub fn balance(&self, caller: &Caller, customer_id: &CustomerId) -> Result<Money> {
        require_access(caller, customer_id, "read balance")?;
        Ok(self.ledger.balance(customer_id))
    }

    pub fn history(
        &self,
        caller: &Caller,
        customer_id: &CustomerId,
        page: u32,
        size: Option<u32>,
    ) -> Result<Page<LedgerEntry>> {
        require_access(caller, customer_id, "read history")?;
        self.ledger.history(customer_id, page, size)
    }

    pub fn all_history(&self, caller: &Caller, page: u32, size: Option<u32>) -> Result<Page<LedgerEntry>> {
        require_admin(caller, "read all history")?;
        self.ledger.all_history(page, size)
    }

    pub fn summary(&self, caller: &Caller) -> Result<ReconciliationSummary> {
        require_admin(caller, "read reconciliation summary")?;
        self.reconciliation.summary()
    }

    // token movements

    pub fn issue(
        &self,
        caller: &Caller,
        customer_id: &CustomerId,
        amount: Money,
        reference: Option<&str>,
    ) -> Result<LedgerEntry> {
        require_admin(caller, "issue tokens")?;
        let entry = self.ledger.issue(customer_id, amount, reference)?;
        Ok(self.submit(entry))
    }

    pub fn redeem(
        &self,
        caller: &Caller,
        customer_id: &CustomerId,
        amount: Money,
        reference: Option<&str>,
    ) -> Result<LedgerEntry> {
        require_admin(caller, "redeem tokens")?;
        let entry = self.ledger.redeem(customer_id, amount, reference)?;
        Ok(self.submit(entry))
    }

    pub fn transfer(
        &self,
        caller: &Caller,
        from: &CustomerId,
        to: &CustomerId,
        amount: Money,
        reference: Option<&str>,
    ) -> Result<TransferEntries> {
        require_admin(caller, "transfer tokens")?;
        let entries = self.ledger.transfer(from, to, amount, reference)?;
        Ok(TransferEntries {
            debit: self.submit(entries.debit),
            credit: self.submit(entries.credit),
        })
    }

    // redemption

    pub fn enquire_redemption(&self, caller: &Caller, account_id: AccountId) -> Result<RedemptionQuote> {
        let account = self.accounts.get(account_id)?;
        require_access(caller, &account.customer_id, "enquire redemption")?;
        self.redemption.enquire(&account)
    }

    pub fn process_redemption(&self, caller: &Caller, account_id: AccountId) -> Result<RedemptionReceipt> {
        let owner = self.accounts.get(account_id)?.customer_id;
        require_access(caller, &owner, "process redemption")?;
        let mut receipt = self.redemption.process(account_id)?;
        receipt.ledger_entry = receipt.ledger_entry.map(|entry| self.submit(entry));
        Ok(receipt)
    }

    // calculation

    pub fn calculate_fd(&self, product_code: &str, principal: Money, tenure_months: u32) -> Result<FdCalculation> {
        self.calculator.calculate_fd(product_code, principal, tenure_months)
    }

    // accounts

    pub fn open_account(
        &self,
        caller: &Caller,
        customer_id: &CustomerId,
        product_code: &str,
        principal: Money,
        tenure_months: u32,
    ) -> Result<DepositAccount> {
        require_access(caller, customer_id, "open account")?;
        self.accounts
            .open_account(customer_id, product_code, principal, tenure_months)
    }

    pub fn account(&self, caller: &Caller, account_id: AccountId) -> Result<DepositAccount> {
        let account = self.accounts.get(account_id)?;
        require_access(caller, &account.customer_id, "read account")?;
        Ok(account)
    }

    pub fn accounts_for(&self, caller: &Caller, customer_id: &CustomerId) -> Result<Vec<DepositAccount>> {
        require_access(caller, customer_id, "list accounts")?;
        Ok(self.accounts.list_for_customer(customer_id))
    }

    pub fn upgrade_account(
        &self,
        caller: &Caller,
        account_id: AccountId,
        upgrade: AccountUpgrade,
    ) -> Result<DepositAccount> {
        require_admin(caller, "upgrade account")?;
        self.accounts.upgrade(account_id, upgrade)
    }

    pub fn close_account(&self, caller: &Caller, account_id: AccountId, reason: &str) -> Result<DepositAccount> {
        require_admin(caller, "close account")?;
        self.accounts.close(account_id, reason)
    }

    pub fn suspend_account(&self, caller: &Caller, account_id: AccountId, reason: &str) -> Result<DepositAccount> {
        require_admin(caller, "suspend account")?;
        self.accounts.suspend(account_id, reason)
    }

    pub fn reopen_account(&self, caller: &Caller, account_id: AccountId, reason: &str) -> Result<DepositAccount> {
        require_admin(caller, "reopen account")?;
        self.accounts.reopen(account_id, reason)
    }

    // events

    /// hand every buffered event to the host and empty the buffer
    pub fn drain_events(&self, caller: &Caller) -> Result<Vec<Event>> {
        require_admin(caller, "drain events")?;
        Ok(self.events.take_events())
    }

    // clock control

    pub fn clock_state(&self, caller: &Caller) -> Result<ClockState> {
        require_admin(caller, "read clock")?;
        Ok(self.clock.state())
    }

    pub fn set_time(&self, caller: &Caller, instant: DateTime<Utc>) -> Result<ClockState> {
        require_admin(caller, "set clock")?;
        self.clock.set_absolute(instant);
        Ok(self.clock.state())
    }

    pub fn advance_time(&self, caller: &Caller, seconds: i64) -> Result<ClockState> {
        require_admin(caller, "advance clock")?;
        self.clock.advance(seconds)?;
        Ok(self.clock.state())
    }

    pub fn reset_time(&self, caller: &Caller) -> Result<ClockState> {
        require_admin(caller, "reset clock")?;
        self.clock.reset();
        Ok(self.clock.state())
    }

    // chain submission

    /// submit one entry again; an already-submitted entry is returned as is
    pub fn retry_submission(&self, caller: &Caller, entry_id: EntryId) -> Result<ChainSubmission> {
        require_admin(caller, "retry chain submission")?;
        let entry = self.ledger.entry(entry_id)?;
        if let Some(existing) = self.ledger.submission(entry_id).filter(ChainSubmission::is_submitted) {
            return Ok(existing);
        }
        if self.chain.is_none() {
            return Err(SettlementError::ChainSubmissionFailed {
                message: "no chain client configured".to_string(),
            });
        }
        self.try_submit(&entry)?
            .ok_or_else(|| SettlementError::ChainSubmissionFailed {
                message: format!("entry {} is already being submitted", entry_id),
            })
    }

    /// retry every entry without a successful submission
    pub fn retry_pending(&self, caller: &Caller) -> Result<Vec<ChainSubmission>> {
        require_admin(caller, "retry chain submissions")?;
        let mut results = Vec::new();
        for entry_id in self.ledger.unsubmitted() {
            let entry = self.ledger.entry(entry_id)?;
            if let Some(submission) = self.try_submit(&entry)? {
                results.push(submission);
            }
        }
        Ok(results)
    }

    /// submit outside the ledger locks; a failure stays recorded for retry
    fn submit(&self, mut entry: LedgerEntry) -> LedgerEntry {
        if entry.tx_hash.is_some() {
            return entry;
        }
        match self.try_submit(&entry) {
            Ok(Some(submission)) => {
                entry.tx_hash = submission.tx_hash().map(str::to_string);
            }
            Ok(None) => {}
            Err(e) => {
                error!(entry_id = entry.id, error = %e, "could not record chain submission");
            }
        }
        entry
    }

    /// `None` without a chain client or while another submission of the entry runs
    fn try_submit(&self, entry: &LedgerEntry) -> Result<Option<ChainSubmission>> {
        let Some(chain) = &self.chain else {
            return Ok(None);
        };
        if !self.in_flight.lock().insert(entry.id) {
            return Ok(None);
        }

        let outcome = chain
            .submit(&entry.customer_id, entry.change)
            .map_err(|e| e.to_string());
        let recorded = self.ledger.record_submission(entry.id, outcome);
        self.in_flight.lock().remove(&entry.id);
        recorded.map(Some)
    }
}

fn require_admin(caller: &Caller, action: &str) -> Result<()> {
    if !caller.is_admin() {
        warn!(?caller, action, "admin operation refused");
        return Err(SettlementError::Unauthorized {
            action: action.to_string(),
        });
    }
    Ok(())
}

fn require_access(caller: &Caller, customer_id: &CustomerId, action: &str) -> Result<()> {
    if !caller.can_act_for(customer_id) {
        warn!(?caller, customer = %customer_id, action, "operation refused");
        return Err(SettlementError::Unauthorized {
            action: action.to_string(),
        });
    }
    Ok(())
}
