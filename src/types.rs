use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// unique identifier for a fixed-deposit account
pub type AccountId = Uuid;

/// monotonically increasing ledger entry id
pub type EntryId = u64;

/// customer identifier supplied by the identity collaborator
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(String);

impl CustomerId {
    pub fn new(id: impl Into<String>) -> Self {
        CustomerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CustomerId {
    fn from(s: &str) -> Self {
        CustomerId::new(s)
    }
}

impl From<String> for CustomerId {
    fn from(s: String) -> Self {
        CustomerId(s)
    }
}

/// fixed-deposit account status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountStatus {
    /// accruing, redeemable
    Active,
    /// past maturity, awaiting redemption
    Matured,
    /// redeemed or administratively closed
    Closed,
    /// frozen by an operator
    Suspended,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Matured => "MATURED",
            AccountStatus::Closed => "CLOSED",
            AccountStatus::Suspended => "SUSPENDED",
        };
        f.write_str(s)
    }
}

/// ledger operation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerOperation {
    Issue,
    TransferIn,
    TransferOut,
    Redeem,
}

impl LedgerOperation {
    /// true for operations that increase the customer's balance
    pub fn is_credit(&self) -> bool {
        matches!(self, LedgerOperation::Issue | LedgerOperation::TransferIn)
    }
}

impl fmt::Display for LedgerOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LedgerOperation::Issue => "ISSUE",
            LedgerOperation::TransferIn => "TRANSFER_IN",
            LedgerOperation::TransferOut => "TRANSFER_OUT",
            LedgerOperation::Redeem => "REDEEM",
        };
        f.write_str(s)
    }
}

/// caller identity supplied by the session collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    Admin,
    Customer(CustomerId),
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        matches!(self, Caller::Admin)
    }

    /// admins may act for anyone, customers only for themselves
    pub fn can_act_for(&self, customer_id: &CustomerId) -> bool {
        match self {
            Caller::Admin => true,
            Caller::Customer(id) => id == customer_id,
        }
    }
}

/// a page of results, newest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn is_last(&self) -> bool {
        self.page + 1 >= self.total_pages
    }
}
