use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::warn;

use crate::decimal::{Money, Rate};
use crate::types::{AccountId, AccountStatus, CustomerId, EntryId, LedgerOperation};

/// all events that can be emitted by the settlement core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    // ledger events
    LedgerEntryAppended {
        entry_id: EntryId,
        customer_id: CustomerId,
        operation: LedgerOperation,
        change: Money,
        balance_after: Money,
        timestamp: DateTime<Utc>,
    },
    IdempotentReplay {
        entry_id: EntryId,
        customer_id: CustomerId,
        reference: String,
        timestamp: DateTime<Utc>,
    },
    ChainSubmissionRecorded {
        entry_id: EntryId,
        tx_hash: Option<String>,
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },

    // account lifecycle events
    AccountOpened {
        account_id: AccountId,
        customer_id: CustomerId,
        principal: Money,
        interest_rate: Rate,
        maturity_date: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
    AccountUpgraded {
        account_id: AccountId,
        old_rate: Rate,
        new_rate: Rate,
        old_maturity: DateTime<Utc>,
        new_maturity: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
    StatusChanged {
        account_id: AccountId,
        old_status: AccountStatus,
        new_status: AccountStatus,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    // redemption events
    RedemptionProcessed {
        account_id: AccountId,
        customer_id: CustomerId,
        matured: bool,
        accrued_interest: Money,
        penalty: Money,
        net_payable: Money,
        ledger_entry_id: Option<EntryId>,
        timestamp: DateTime<Utc>,
    },

    // reconciliation events
    ReconciliationVariance {
        ledger_total: Money,
        on_chain_supply: Money,
        variance: Money,
        timestamp: DateTime<Utc>,
    },
}

/// events kept when no capacity is configured
pub const DEFAULT_EVENT_CAPACITY: usize = 10_000;

/// thread-safe event store collecting events across engines
///
/// Bounded: once `capacity` events are held, each new event evicts the
/// oldest one. Hosts drain with [`EventStore::take_events`].
#[derive(Debug)]
pub struct EventStore {
    events: Mutex<EventBuffer>,
}

#[derive(Debug)]
struct EventBuffer {
    queue: VecDeque<Event>,
    capacity: usize,
    evicted: u64,
}

impl EventStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// store holding at most `capacity` events (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: Mutex::new(EventBuffer {
                queue: VecDeque::with_capacity(capacity.min(1_024)),
                capacity,
                evicted: 0,
            }),
        }
    }

    pub fn emit(&self, event: Event) {
        let mut buffer = self.events.lock();
        if buffer.queue.len() >= buffer.capacity {
            buffer.queue.pop_front();
            buffer.evicted += 1;
            if buffer.evicted == 1 {
                warn!(capacity = buffer.capacity, "event store full, dropping oldest events");
            }
        }
        buffer.queue.push_back(event);
    }

    /// remove and return every held event, oldest first
    pub fn take_events(&self) -> Vec<Event> {
        self.events.lock().queue.drain(..).collect()
    }

    /// snapshot of the collected events
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().queue.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.events.lock().capacity
    }

    /// events dropped to stay within capacity since creation
    pub fn evicted(&self) -> u64 {
        self.events.lock().evicted
    }

    pub fn clear(&self) {
        self.events.lock().queue.clear();
    }
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new()
    }
}
