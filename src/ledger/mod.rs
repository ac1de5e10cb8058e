//! Append-only customer token ledger.

pub mod engine;
pub mod entry;

pub use engine::{LedgerEngine, LedgerTotals};
pub use entry::{ChainSubmission, LedgerEntry, SubmissionStatus, TransferEntries};
