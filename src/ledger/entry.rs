use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{CustomerId, EntryId, LedgerOperation};

/// one immutable journal line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub customer_id: CustomerId,
    /// signed: credits positive, debits negative
    pub change: Money,
    pub balance_after: Money,
    pub operation: LedgerOperation,
    /// filled from the submission record when read, never stored on the journal
    pub tx_hash: Option<String>,
    pub reference: Option<String>,
    /// the other half of a transfer
    pub counterpart_entry_id: Option<EntryId>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// unsigned amount moved by this entry
    pub fn amount(&self) -> Money {
        self.change.abs()
    }

    /// balance before this entry was applied
    pub fn balance_before(&self) -> Money {
        self.balance_after - self.change
    }
}

/// chain submission state of an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionStatus {
    Submitted { tx_hash: String },
    Failed { error: String },
}

/// side-table record of chain submission attempts for one entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSubmission {
    pub entry_id: EntryId,
    pub status: SubmissionStatus,
    pub attempts: u32,
    pub last_attempt_at: DateTime<Utc>,
}

impl ChainSubmission {
    pub fn tx_hash(&self) -> Option<&str> {
        match &self.status {
            SubmissionStatus::Submitted { tx_hash } => Some(tx_hash),
            SubmissionStatus::Failed { .. } => None,
        }
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self.status, SubmissionStatus::Submitted { .. })
    }
}

/// both halves of a transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferEntries {
    pub debit: LedgerEntry,
    pub credit: LedgerEntry,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_amount_and_balance_before() {
        let entry = LedgerEntry {
            id: 4,
            customer_id: CustomerId::new("a"),
            change: Money::from_major(-30),
            balance_after: Money::from_major(70),
            operation: LedgerOperation::Redeem,
            tx_hash: None,
            reference: None,
            counterpart_entry_id: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };
        assert_eq!(entry.amount(), Money::from_major(30));
        assert_eq!(entry.balance_before(), Money::from_major(100));
    }

    #[test]
    fn test_submission_status_json() {
        let submission = ChainSubmission {
            entry_id: 1,
            status: SubmissionStatus::Submitted {
                tx_hash: "0xabc".to_string(),
            },
            attempts: 2,
            last_attempt_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        };
        assert_eq!(submission.tx_hash(), Some("0xabc"));

        let json = serde_json::to_value(&submission).unwrap();
        assert_eq!(json["status"]["status"], "submitted");
        assert_eq!(json["status"]["tx_hash"], "0xabc");
    }
}
