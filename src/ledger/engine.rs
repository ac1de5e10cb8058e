use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::clock::SystemClock;
use crate::config::PagingConfig;
use crate::decimal::{Money, STORAGE_SCALE};
use crate::errors::{Result, SettlementError};
use crate::events::{Event, EventStore};
use crate::ledger::entry::{ChainSubmission, LedgerEntry, SubmissionStatus, TransferEntries};
use crate::types::{CustomerId, EntryId, LedgerOperation, Page};

/// append-only token ledger
///
/// Mutations for one customer are serialized by that customer's lock; a
/// transfer takes both locks in customer-id order. The journal itself sits
/// behind an `RwLock` so readers always see whole appends, including both
/// halves of a transfer.
pub struct LedgerEngine {
    journal: RwLock<Journal>,
    customer_locks: Mutex<HashMap<CustomerId, Arc<Mutex<()>>>>,
    submissions: RwLock<HashMap<EntryId, ChainSubmission>>,
    clock: Arc<SystemClock>,
    events: Arc<EventStore>,
    paging: PagingConfig,
}

/// ledger-wide figures read under one journal guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerTotals {
    pub total: Money,
    pub customer_count: usize,
    pub entry_count: usize,
}

#[derive(Debug, Default)]
struct Journal {
    entries: Vec<LedgerEntry>,
    by_customer: HashMap<CustomerId, Vec<usize>>,
    references: HashMap<(CustomerId, String), EntryId>,
    /// sum of all balances, kept in step with every append
    supply: Money,
}

impl Journal {
    fn balance(&self, customer_id: &CustomerId) -> Money {
        self.by_customer
            .get(customer_id)
            .and_then(|indices| indices.last())
            .map(|&i| self.entries[i].balance_after)
            .unwrap_or(Money::ZERO)
    }

    /// ids are dense and start at 1
    fn entry(&self, id: EntryId) -> Option<&LedgerEntry> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        self.entries.get(index)
    }

    fn next_id(&self) -> Result<EntryId> {
        EntryId::try_from(self.entries.len())
            .ok()
            .and_then(|n| n.checked_add(1))
            .ok_or_else(|| SettlementError::CalculationError {
                message: "ledger entry ids exhausted".to_string(),
            })
    }

    fn by_reference(&self, customer_id: &CustomerId, reference: &str) -> Option<&LedgerEntry> {
        let id = self
            .references
            .get(&(customer_id.clone(), reference.to_string()))?;
        self.entry(*id)
    }

    fn push(&mut self, entry: LedgerEntry) {
        let index = self.entries.len();
        self.by_customer
            .entry(entry.customer_id.clone())
            .or_default()
            .push(index);
        if let Some(reference) = &entry.reference {
            self.references
                .insert((entry.customer_id.clone(), reference.clone()), entry.id);
        }
        self.entries.push(entry);
    }
}

impl LedgerEngine {
    pub fn new(clock: Arc<SystemClock>, events: Arc<EventStore>, paging: PagingConfig) -> Self {
        Self {
            journal: RwLock::new(Journal::default()),
            customer_locks: Mutex::new(HashMap::new()),
            submissions: RwLock::new(HashMap::new()),
            clock,
            events,
            paging,
        }
    }

    /// credit newly issued units; the amount must be a positive whole number
    pub fn issue(
        &self,
        customer_id: &CustomerId,
        amount: Money,
        reference: Option<&str>,
    ) -> Result<LedgerEntry> {
        ensure_positive(amount, "issue")?;
        if !amount.is_whole() {
            return Err(SettlementError::InvalidAmount {
                amount,
                reason: "issue amount must be a whole number of units".to_string(),
            });
        }
        self.post(customer_id, amount, LedgerOperation::Issue, reference)
    }

    /// debit units paid out of the ledger
    pub fn redeem(
        &self,
        customer_id: &CustomerId,
        amount: Money,
        reference: Option<&str>,
    ) -> Result<LedgerEntry> {
        ensure_positive(amount, "redeem")?;
        self.post(customer_id, -amount, LedgerOperation::Redeem, reference)
    }

    /// move units between two customers as one atomic pair of entries
    pub fn transfer(
        &self,
        from: &CustomerId,
        to: &CustomerId,
        amount: Money,
        reference: Option<&str>,
    ) -> Result<TransferEntries> {
        if from == to {
            return Err(SettlementError::SameAccount {
                customer_id: from.clone(),
            });
        }
        ensure_positive(amount, "transfer")?;

        let (first, second) = if from < to { (from, to) } else { (to, from) };
        let first_lock = self.customer_lock(first);
        let second_lock = self.customer_lock(second);
        let _first = first_lock.lock();
        let _second = second_lock.lock();

        let mut journal = self.journal.write();

        if let Some(reference) = reference {
            if let Some(replayed) = replay_transfer(&journal, from, to, reference)? {
                drop(journal);
                self.replayed(&replayed.debit, reference);
                return Ok(TransferEntries {
                    debit: self.with_tx_hash(replayed.debit),
                    credit: self.with_tx_hash(replayed.credit),
                });
            }
        }

        let available = journal.balance(from);
        if available < amount {
            warn!(customer = %from, %available, requested = %amount, "transfer rejected: insufficient balance");
            return Err(SettlementError::InsufficientBalance {
                customer_id: from.clone(),
                available,
                requested: amount,
            });
        }

        let now = self.clock.now();
        let debit_id = journal.next_id()?;
        let credit_id = debit_id
            .checked_add(1)
            .ok_or_else(|| SettlementError::CalculationError {
                message: "ledger entry ids exhausted".to_string(),
            })?;
        let debit = LedgerEntry {
            id: debit_id,
            customer_id: from.clone(),
            change: -amount,
            balance_after: checked_balance(from, available, -amount)?,
            operation: LedgerOperation::TransferOut,
            tx_hash: None,
            reference: reference.map(str::to_string),
            counterpart_entry_id: Some(credit_id),
            created_at: now,
        };
        let credit = LedgerEntry {
            id: credit_id,
            customer_id: to.clone(),
            change: amount,
            balance_after: checked_balance(to, journal.balance(to), amount)?,
            operation: LedgerOperation::TransferIn,
            tx_hash: None,
            reference: reference.map(str::to_string),
            counterpart_entry_id: Some(debit_id),
            created_at: now,
        };
        journal.push(debit.clone());
        journal.push(credit.clone());
        drop(journal);

        self.appended(&debit);
        self.appended(&credit);
        Ok(TransferEntries { debit, credit })
    }

    fn post(
        &self,
        customer_id: &CustomerId,
        change: Money,
        operation: LedgerOperation,
        reference: Option<&str>,
    ) -> Result<LedgerEntry> {
        let lock = self.customer_lock(customer_id);
        let _guard = lock.lock();

        let mut journal = self.journal.write();

        if let Some(reference) = reference {
            if let Some(existing) = journal.by_reference(customer_id, reference) {
                if existing.operation != operation {
                    return Err(SettlementError::DuplicateReference {
                        reference: reference.to_string(),
                        existing: existing.operation,
                    });
                }
                let existing = existing.clone();
                drop(journal);
                self.replayed(&existing, reference);
                return Ok(self.with_tx_hash(existing));
            }
        }

        let available = journal.balance(customer_id);
        if change.is_negative() && available < change.abs() {
            warn!(customer = %customer_id, %available, requested = %change.abs(), %operation, "debit rejected: insufficient balance");
            return Err(SettlementError::InsufficientBalance {
                customer_id: customer_id.clone(),
                available,
                requested: change.abs(),
            });
        }

        let supply = journal
            .supply
            .checked_add(change)
            .ok_or_else(|| SettlementError::InvalidAmount {
                amount: change.abs(),
                reason: "would overflow the ledger supply".to_string(),
            })?;

        let entry = LedgerEntry {
            id: journal.next_id()?,
            customer_id: customer_id.clone(),
            change,
            balance_after: checked_balance(customer_id, available, change)?,
            operation,
            tx_hash: None,
            reference: reference.map(str::to_string),
            counterpart_entry_id: None,
            created_at: self.clock.now(),
        };
        journal.push(entry.clone());
        journal.supply = supply;
        drop(journal);

        self.appended(&entry);
        Ok(entry)
    }

    fn customer_lock(&self, customer_id: &CustomerId) -> Arc<Mutex<()>> {
        self.customer_locks
            .lock()
            .entry(customer_id.clone())
            .or_default()
            .clone()
    }

    fn appended(&self, entry: &LedgerEntry) {
        info!(
            entry_id = entry.id,
            customer = %entry.customer_id,
            operation = %entry.operation,
            change = %entry.change,
            balance_after = %entry.balance_after,
            "ledger entry appended"
        );
        self.events.emit(Event::LedgerEntryAppended {
            entry_id: entry.id,
            customer_id: entry.customer_id.clone(),
            operation: entry.operation,
            change: entry.change,
            balance_after: entry.balance_after,
            timestamp: entry.created_at,
        });
    }

    fn replayed(&self, entry: &LedgerEntry, reference: &str) {
        debug!(entry_id = entry.id, customer = %entry.customer_id, reference, "idempotent replay");
        self.events.emit(Event::IdempotentReplay {
            entry_id: entry.id,
            customer_id: entry.customer_id.clone(),
            reference: reference.to_string(),
            timestamp: self.clock.now(),
        });
    }

    fn with_tx_hash(&self, mut entry: LedgerEntry) -> LedgerEntry {
        entry.tx_hash = self
            .submissions
            .read()
            .get(&entry.id)
            .and_then(|s| s.tx_hash().map(str::to_string));
        entry
    }

    fn with_tx_hashes(&self, entries: Vec<LedgerEntry>) -> Vec<LedgerEntry> {
        let submissions = self.submissions.read();
        entries
            .into_iter()
            .map(|mut entry| {
                entry.tx_hash = submissions
                    .get(&entry.id)
                    .and_then(|s| s.tx_hash().map(str::to_string));
                entry
            })
            .collect()
    }

    pub fn balance(&self, customer_id: &CustomerId) -> Money {
        self.journal.read().balance(customer_id)
    }

    /// one customer's entries, newest first
    pub fn history(
        &self,
        customer_id: &CustomerId,
        page: u32,
        size: Option<u32>,
    ) -> Result<Page<LedgerEntry>> {
        let size = self.page_size(page, size)?;
        let journal = self.journal.read();
        let indices = journal
            .by_customer
            .get(customer_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let items = indices
            .iter()
            .rev()
            .skip(page as usize * size as usize)
            .take(size as usize)
            .map(|&i| journal.entries[i].clone())
            .collect();
        let total = indices.len();
        drop(journal);

        Ok(make_page(self.with_tx_hashes(items), page, size, total))
    }

    /// every entry across customers, newest first
    pub fn all_history(&self, page: u32, size: Option<u32>) -> Result<Page<LedgerEntry>> {
        let size = self.page_size(page, size)?;
        let journal = self.journal.read();
        let items = journal
            .entries
            .iter()
            .rev()
            .skip(page as usize * size as usize)
            .take(size as usize)
            .cloned()
            .collect();
        let total = journal.entries.len();
        drop(journal);

        Ok(make_page(self.with_tx_hashes(items), page, size, total))
    }

    fn page_size(&self, page: u32, size: Option<u32>) -> Result<u32> {
        match size {
            Some(0) => Err(SettlementError::InvalidPageRequest { page, size: 0 }),
            Some(size) => Ok(size.min(self.paging.max_page_size)),
            None => Ok(self.paging.default_page_size),
        }
    }

    pub fn entry(&self, entry_id: EntryId) -> Result<LedgerEntry> {
        let entry = self
            .journal
            .read()
            .entry(entry_id)
            .cloned()
            .ok_or(SettlementError::EntryNotFound { entry_id })?;
        Ok(self.with_tx_hash(entry))
    }

    /// sum of every customer's latest balance
    pub fn total(&self) -> Money {
        self.journal.read().supply
    }

    /// total, customer count and entry count from one snapshot
    pub fn totals(&self) -> LedgerTotals {
        let journal = self.journal.read();
        LedgerTotals {
            total: journal.supply,
            customer_count: journal.by_customer.len(),
            entry_count: journal.entries.len(),
        }
    }

    pub fn customer_balances(&self) -> BTreeMap<CustomerId, Money> {
        let journal = self.journal.read();
        journal
            .by_customer
            .keys()
            .map(|customer_id| (customer_id.clone(), journal.balance(customer_id)))
            .collect()
    }

    /// customers with at least one entry
    pub fn customer_count(&self) -> usize {
        self.journal.read().by_customer.len()
    }

    pub fn entry_count(&self) -> usize {
        self.journal.read().entries.len()
    }

    /// walk a customer's entries checking the running-balance chain
    pub fn verify_chain(&self, customer_id: &CustomerId) -> Result<()> {
        let journal = self.journal.read();
        let Some(indices) = journal.by_customer.get(customer_id) else {
            return Ok(());
        };

        let mut previous = Money::ZERO;
        let mut last_id = 0;
        for &i in indices {
            let entry = &journal.entries[i];
            let violation = if entry.id <= last_id {
                Some(format!("entry {} out of order after {}", entry.id, last_id))
            } else if previous.checked_add(entry.change) != Some(entry.balance_after) {
                Some(format!(
                    "entry {} balance {} does not follow {} + {}",
                    entry.id, entry.balance_after, previous, entry.change
                ))
            } else if entry.balance_after.is_negative() {
                Some(format!("entry {} leaves a negative balance", entry.id))
            } else {
                None
            };
            if let Some(message) = violation {
                error!(customer = %customer_id, %message, "ledger chain broken");
                return Err(SettlementError::InvariantViolation {
                    customer_id: customer_id.clone(),
                    message,
                });
            }
            previous = entry.balance_after;
            last_id = entry.id;
        }
        Ok(())
    }

    /// verify every customer's chain
    pub fn verify_all(&self) -> Result<()> {
        let customers: Vec<CustomerId> = self.journal.read().by_customer.keys().cloned().collect();
        for customer_id in &customers {
            self.verify_chain(customer_id)?;
        }
        Ok(())
    }

    /// record the outcome of submitting an entry on chain
    ///
    /// A successful submission is final; later outcomes for the same entry
    /// return the recorded one unchanged.
    pub fn record_submission(
        &self,
        entry_id: EntryId,
        outcome: std::result::Result<String, String>,
    ) -> Result<ChainSubmission> {
        if self.journal.read().entry(entry_id).is_none() {
            return Err(SettlementError::EntryNotFound { entry_id });
        }

        let now = self.clock.now();
        let mut submissions = self.submissions.write();
        if let Some(existing) = submissions.get(&entry_id) {
            if existing.is_submitted() {
                return Ok(existing.clone());
            }
        }

        let attempts = submissions.get(&entry_id).map(|s| s.attempts).unwrap_or(0) + 1;
        let status = match outcome {
            Ok(tx_hash) => {
                info!(entry_id, %tx_hash, attempts, "chain submission recorded");
                SubmissionStatus::Submitted { tx_hash }
            }
            Err(error) => {
                warn!(entry_id, %error, attempts, "chain submission failed");
                SubmissionStatus::Failed { error }
            }
        };
        let submission = ChainSubmission {
            entry_id,
            status,
            attempts,
            last_attempt_at: now,
        };
        submissions.insert(entry_id, submission.clone());
        drop(submissions);

        let (tx_hash, error) = match &submission.status {
            SubmissionStatus::Submitted { tx_hash } => (Some(tx_hash.clone()), None),
            SubmissionStatus::Failed { error } => (None, Some(error.clone())),
        };
        self.events.emit(Event::ChainSubmissionRecorded {
            entry_id,
            tx_hash,
            error,
            timestamp: now,
        });
        Ok(submission)
    }

    pub fn submission(&self, entry_id: EntryId) -> Option<ChainSubmission> {
        self.submissions.read().get(&entry_id).cloned()
    }

    /// ids of entries without a successful chain submission, oldest first
    pub fn unsubmitted(&self) -> Vec<EntryId> {
        let ids: Vec<EntryId> = self.journal.read().entries.iter().map(|e| e.id).collect();
        let submissions = self.submissions.read();
        ids.into_iter()
            .filter(|id| !submissions.get(id).map(|s| s.is_submitted()).unwrap_or(false))
            .collect()
    }
}

fn ensure_positive(amount: Money, operation: &str) -> Result<()> {
    if !amount.is_positive() {
        return Err(SettlementError::InvalidAmount {
            amount,
            reason: format!("{} amount must be positive", operation),
        });
    }
    if !amount.fits_storage() {
        return Err(SettlementError::InvalidAmount {
            amount,
            reason: format!("{} amount has more than {} decimal places", operation, STORAGE_SCALE),
        });
    }
    Ok(())
}

/// next balance in the chain; a negative result means the locking is broken
fn checked_balance(customer_id: &CustomerId, previous: Money, change: Money) -> Result<Money> {
    let balance_after = previous
        .checked_add(change)
        .ok_or_else(|| SettlementError::InvalidAmount {
            amount: change.abs(),
            reason: format!("balance {} of {} would overflow", previous, customer_id),
        })?;
    if balance_after.is_negative() {
        error!(customer = %customer_id, %previous, %change, "append would leave a negative balance");
        return Err(SettlementError::InvariantViolation {
            customer_id: customer_id.clone(),
            message: format!("{} + {} is negative", previous, change),
        });
    }
    Ok(balance_after)
}

/// an already-recorded transfer under `reference`, or an error if the
/// reference belongs to something else
fn replay_transfer(
    journal: &Journal,
    from: &CustomerId,
    to: &CustomerId,
    reference: &str,
) -> Result<Option<TransferEntries>> {
    let debit = journal.by_reference(from, reference);
    let credit = journal.by_reference(to, reference);
    match (debit, credit) {
        (None, None) => Ok(None),
        (Some(debit), Some(credit))
            if debit.operation == LedgerOperation::TransferOut
                && credit.operation == LedgerOperation::TransferIn
                && debit.counterpart_entry_id == Some(credit.id) =>
        {
            Ok(Some(TransferEntries {
                debit: debit.clone(),
                credit: credit.clone(),
            }))
        }
        (Some(existing), _) | (None, Some(existing)) => Err(SettlementError::DuplicateReference {
            reference: reference.to_string(),
            existing: existing.operation,
        }),
    }
}

fn make_page(items: Vec<LedgerEntry>, page: u32, size: u32, total: usize) -> Page<LedgerEntry> {
    let total_items = total as u64;
    let total_pages = total_items.div_ceil(u64::from(size)) as u32;
    Page {
        items,
        page,
        size,
        total_items,
        total_pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use std::thread;

    fn ledger() -> LedgerEngine {
        let clock = SystemClock::frozen_at(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap());
        LedgerEngine::new(Arc::new(clock), Arc::new(EventStore::new()), PagingConfig::default())
    }

    fn alice() -> CustomerId {
        CustomerId::new("alice")
    }

    fn bob() -> CustomerId {
        CustomerId::new("bob")
    }

    #[test]
    fn test_issue_and_balance() {
        let ledger = ledger();
        let entry = ledger.issue(&alice(), Money::from_major(100), None).unwrap();
        assert_eq!(entry.id, 1);
        assert_eq!(entry.operation, LedgerOperation::Issue);
        assert_eq!(entry.balance_after, Money::from_major(100));

        ledger.issue(&alice(), Money::from_major(50), None).unwrap();
        assert_eq!(ledger.balance(&alice()), Money::from_major(150));
        assert_eq!(ledger.balance(&bob()), Money::ZERO);
    }

    #[test]
    fn test_issue_rejects_fractional_and_non_positive() {
        let ledger = ledger();
        let fractional = Money::from_str_exact("10.5").unwrap();
        assert!(matches!(
            ledger.issue(&alice(), fractional, None),
            Err(SettlementError::InvalidAmount { .. })
        ));
        assert!(matches!(
            ledger.issue(&alice(), Money::ZERO, None),
            Err(SettlementError::InvalidAmount { .. })
        ));
        assert_eq!(ledger.entry_count(), 0);
    }

    #[test]
    fn test_amounts_beyond_storage_precision_rejected() {
        let ledger = ledger();
        // deserialized amounts are not rounded, so the fraction survives to the check
        let tiny: Money = serde_json::from_str("\"10.000000001\"").unwrap();
        assert!(matches!(
            ledger.issue(&alice(), tiny, None),
            Err(SettlementError::InvalidAmount { .. })
        ));

        ledger.issue(&alice(), Money::from_major(20), None).unwrap();
        assert!(matches!(
            ledger.redeem(&alice(), tiny, None),
            Err(SettlementError::InvalidAmount { .. })
        ));
        assert!(matches!(
            ledger.transfer(&alice(), &bob(), tiny, None),
            Err(SettlementError::InvalidAmount { .. })
        ));
        assert_eq!(ledger.balance(&alice()), Money::from_major(20));
        assert_eq!(ledger.entry_count(), 1);
    }

    #[test]
    fn test_supply_overflow_is_an_error() {
        let ledger = ledger();
        let huge = Money::from_decimal(Decimal::MAX);
        ledger.issue(&alice(), huge, None).unwrap();

        assert!(matches!(
            ledger.issue(&alice(), huge, None),
            Err(SettlementError::InvalidAmount { .. })
        ));
        assert!(matches!(
            ledger.issue(&bob(), Money::ONE, None),
            Err(SettlementError::InvalidAmount { .. })
        ));
        assert_eq!(ledger.total(), huge);
        assert_eq!(ledger.entry_count(), 1);

        // the lock is still usable after the rejection
        ledger.redeem(&alice(), Money::ONE, None).unwrap();
        ledger.issue(&bob(), Money::ONE, None).unwrap();
        assert_eq!(ledger.total(), huge);
        assert!(ledger.verify_all().is_ok());
    }

    #[test]
    fn test_totals_snapshot() {
        let ledger = ledger();
        ledger.issue(&alice(), Money::from_major(70), None).unwrap();
        ledger.transfer(&alice(), &bob(), Money::from_major(30), None).unwrap();
        ledger.redeem(&bob(), Money::from_major(5), None).unwrap();

        assert_eq!(
            ledger.totals(),
            LedgerTotals {
                total: Money::from_major(65),
                customer_count: 2,
                entry_count: 4,
            }
        );
        assert_eq!(ledger.entry(4).unwrap().id, 4);
    }

    #[test]
    fn test_redeem_insufficient_balance() {
        let ledger = ledger();
        ledger.issue(&alice(), Money::from_major(100), None).unwrap();

        let err = ledger.redeem(&alice(), Money::from_major(150), None).unwrap_err();
        assert_eq!(
            err,
            SettlementError::InsufficientBalance {
                customer_id: alice(),
                available: Money::from_major(100),
                requested: Money::from_major(150),
            }
        );
        assert_eq!(ledger.balance(&alice()), Money::from_major(100));
        assert_eq!(ledger.entry_count(), 1);

        let entry = ledger
            .redeem(&alice(), Money::from_str_exact("99.99").unwrap(), None)
            .unwrap();
        assert_eq!(entry.change, Money::from_str_exact("-99.99").unwrap());
        assert_eq!(entry.balance_after, Money::from_str_exact("0.01").unwrap());
    }

    #[test]
    fn test_idempotent_reference() {
        let ledger = ledger();
        let first = ledger.issue(&alice(), Money::from_major(100), Some("mint-1")).unwrap();
        let second = ledger.issue(&alice(), Money::from_major(100), Some("mint-1")).unwrap();

        assert_eq!(first, second);
        assert_eq!(ledger.entry_count(), 1);
        assert_eq!(ledger.balance(&alice()), Money::from_major(100));
        assert!(ledger
            .events
            .events()
            .iter()
            .any(|e| matches!(e, Event::IdempotentReplay { entry_id: 1, .. })));

        // same reference under another customer is independent
        ledger.issue(&bob(), Money::from_major(5), Some("mint-1")).unwrap();
        assert_eq!(ledger.entry_count(), 2);
    }

    #[test]
    fn test_reference_reused_for_other_operation() {
        let ledger = ledger();
        ledger.issue(&alice(), Money::from_major(100), Some("r-1")).unwrap();
        let err = ledger.redeem(&alice(), Money::from_major(10), Some("r-1")).unwrap_err();
        assert_eq!(
            err,
            SettlementError::DuplicateReference {
                reference: "r-1".to_string(),
                existing: LedgerOperation::Issue,
            }
        );
    }

    #[test]
    fn test_transfer() {
        let ledger = ledger();
        ledger.issue(&alice(), Money::from_major(100), None).unwrap();

        let transfer = ledger
            .transfer(&alice(), &bob(), Money::from_major(40), Some("t-1"))
            .unwrap();
        assert_eq!(transfer.debit.operation, LedgerOperation::TransferOut);
        assert_eq!(transfer.credit.operation, LedgerOperation::TransferIn);
        assert_eq!(transfer.debit.counterpart_entry_id, Some(transfer.credit.id));
        assert_eq!(transfer.credit.counterpart_entry_id, Some(transfer.debit.id));
        assert_eq!(ledger.balance(&alice()), Money::from_major(60));
        assert_eq!(ledger.balance(&bob()), Money::from_major(40));
        assert_eq!(ledger.total(), Money::from_major(100));

        let replay = ledger
            .transfer(&alice(), &bob(), Money::from_major(40), Some("t-1"))
            .unwrap();
        assert_eq!(replay, transfer);
        assert_eq!(ledger.entry_count(), 3);
    }

    #[test]
    fn test_transfer_rejections() {
        let ledger = ledger();
        ledger.issue(&alice(), Money::from_major(10), None).unwrap();

        assert_eq!(
            ledger.transfer(&alice(), &alice(), Money::from_major(1), None).unwrap_err(),
            SettlementError::SameAccount { customer_id: alice() }
        );
        assert!(matches!(
            ledger.transfer(&alice(), &bob(), Money::from_major(11), None),
            Err(SettlementError::InsufficientBalance { .. })
        ));
        assert!(matches!(
            ledger.transfer(&alice(), &bob(), Money::from_major(-1), None),
            Err(SettlementError::InvalidAmount { .. })
        ));
        assert_eq!(ledger.entry_count(), 1);
    }

    #[test]
    fn test_history_pages_newest_first() {
        let ledger = ledger();
        for _ in 0..5 {
            ledger.issue(&alice(), Money::from_major(1), None).unwrap();
        }
        ledger.issue(&bob(), Money::from_major(1), None).unwrap();

        let page = ledger.history(&alice(), 0, Some(2)).unwrap();
        assert_eq!(page.items.iter().map(|e| e.id).collect::<Vec<_>>(), vec![5, 4]);
        assert_eq!(page.total_items, 5);
        assert_eq!(page.total_pages, 3);
        assert!(!page.is_last());

        let last = ledger.history(&alice(), 2, Some(2)).unwrap();
        assert_eq!(last.items.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1]);
        assert!(last.is_last());

        assert!(ledger.history(&alice(), 9, Some(2)).unwrap().items.is_empty());
        assert!(matches!(
            ledger.history(&alice(), 0, Some(0)),
            Err(SettlementError::InvalidPageRequest { .. })
        ));
        assert_eq!(ledger.history(&alice(), 0, Some(10_000)).unwrap().size, 200);
        assert_eq!(ledger.history(&alice(), 0, None).unwrap().size, 20);

        let all = ledger.all_history(0, Some(3)).unwrap();
        assert_eq!(all.items.iter().map(|e| e.id).collect::<Vec<_>>(), vec![6, 5, 4]);
        assert_eq!(all.total_items, 6);
    }

    #[test]
    fn test_record_submission() {
        let ledger = ledger();
        let entry = ledger.issue(&alice(), Money::from_major(100), None).unwrap();

        let failed = ledger
            .record_submission(entry.id, Err("node unreachable".to_string()))
            .unwrap();
        assert_eq!(failed.attempts, 1);
        assert_eq!(ledger.unsubmitted(), vec![entry.id]);

        let submitted = ledger
            .record_submission(entry.id, Ok("0xfeed".to_string()))
            .unwrap();
        assert_eq!(submitted.attempts, 2);
        assert!(ledger.unsubmitted().is_empty());

        // final once submitted
        let again = ledger.record_submission(entry.id, Err("late".to_string())).unwrap();
        assert_eq!(again, submitted);

        let stored = ledger.entry(entry.id).unwrap();
        assert_eq!(stored.tx_hash.as_deref(), Some("0xfeed"));
        assert_eq!(stored.change, entry.change);
        assert_eq!(
            ledger.history(&alice(), 0, None).unwrap().items[0].tx_hash.as_deref(),
            Some("0xfeed")
        );

        assert_eq!(
            ledger.record_submission(99, Ok("0x0".to_string())).unwrap_err(),
            SettlementError::EntryNotFound { entry_id: 99 }
        );
    }

    #[test]
    fn test_customer_balances() {
        let ledger = ledger();
        ledger.issue(&bob(), Money::from_major(7), None).unwrap();
        ledger.issue(&alice(), Money::from_major(3), None).unwrap();

        let balances = ledger.customer_balances();
        assert_eq!(balances.keys().cloned().collect::<Vec<_>>(), vec![alice(), bob()]);
        assert_eq!(ledger.customer_count(), 2);
        assert_eq!(ledger.total(), Money::from_major(10));
    }

    #[test]
    fn test_concurrent_redeems_never_overdraw() {
        let ledger = Arc::new(ledger());
        ledger.issue(&alice(), Money::from_major(50), None).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || ledger.redeem(&alice(), Money::from_major(10), None).is_ok())
            })
            .collect();
        let succeeded = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(succeeded, 5);
        assert_eq!(ledger.balance(&alice()), Money::ZERO);
        ledger.verify_chain(&alice()).unwrap();
    }

    #[test]
    fn test_opposing_transfers_do_not_deadlock() {
        let ledger = Arc::new(ledger());
        ledger.issue(&alice(), Money::from_major(1_000), None).unwrap();
        ledger.issue(&bob(), Money::from_major(1_000), None).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || {
                    let (from, to) = if i % 2 == 0 { (alice(), bob()) } else { (bob(), alice()) };
                    for _ in 0..50 {
                        ledger.transfer(&from, &to, Money::from_major(3), None).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ledger.total(), Money::from_major(2_000));
        ledger.verify_all().unwrap();
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Issue(usize, i64),
        Redeem(usize, i64),
        Transfer(usize, usize, i64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..3, 1i64..500).prop_map(|(c, a)| Op::Issue(c, a)),
            (0usize..3, 1i64..500).prop_map(|(c, a)| Op::Redeem(c, a)),
            (0usize..3, 0usize..3, 1i64..500).prop_map(|(f, t, a)| Op::Transfer(f, t, a)),
        ]
    }

    proptest! {
        #[test]
        fn chain_holds_and_supply_is_conserved(ops in prop::collection::vec(op(), 1..60)) {
            let clock = SystemClock::frozen_at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
            let ledger = LedgerEngine::new(Arc::new(clock), Arc::new(EventStore::new()), PagingConfig::default());
            let customers = [CustomerId::new("a"), CustomerId::new("b"), CustomerId::new("c")];
            let mut net = Money::ZERO;

            for op in ops {
                match op {
                    Op::Issue(c, a) => {
                        ledger.issue(&customers[c], Money::from_major(a), None).unwrap();
                        net += Money::from_major(a);
                    }
                    Op::Redeem(c, a) => {
                        if ledger.redeem(&customers[c], Money::from_major(a), None).is_ok() {
                            net -= Money::from_major(a);
                        }
                    }
                    Op::Transfer(f, t, a) => {
                        let before = ledger.total();
                        let _ = ledger.transfer(&customers[f], &customers[t], Money::from_major(a), None);
                        prop_assert_eq!(ledger.total(), before);
                    }
                }
            }

            prop_assert_eq!(ledger.total(), net);
            for customer in &customers {
                prop_assert!(ledger.verify_chain(customer).is_ok());
                prop_assert!(!ledger.balance(customer).is_negative());
            }
        }
    }
}
