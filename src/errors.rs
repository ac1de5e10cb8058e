use thiserror::Error;

use crate::decimal::{Money, Rate};
use crate::types::{AccountId, AccountStatus, CustomerId, EntryId, LedgerOperation};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettlementError {
    #[error("insufficient balance for {customer_id}: available {available}, requested {requested}")]
    InsufficientBalance {
        customer_id: CustomerId,
        available: Money,
        requested: Money,
    },

    #[error("cannot transfer to the same customer: {customer_id}")]
    SameAccount {
        customer_id: CustomerId,
    },

    #[error("account {account_id} not active: current status is {status}")]
    AccountNotActive {
        account_id: AccountId,
        status: AccountStatus,
    },

    #[error("no applicable rate for product {product_code}: {reason}")]
    NoApplicableRate {
        product_code: String,
        reason: String,
    },

    #[error("ledger invariant violated for {customer_id}: {message}")]
    InvariantViolation {
        customer_id: CustomerId,
        message: String,
    },

    #[error("invalid amount {amount}: {reason}")]
    InvalidAmount {
        amount: Money,
        reason: String,
    },

    #[error("reference {reference} already used by a {existing} entry")]
    DuplicateReference {
        reference: String,
        existing: LedgerOperation,
    },

    #[error("account not found: {account_id}")]
    AccountNotFound {
        account_id: AccountId,
    },

    #[error("product not found: {code}")]
    ProductNotFound {
        code: String,
    },

    #[error("ledger entry not found: {entry_id}")]
    EntryNotFound {
        entry_id: EntryId,
    },

    #[error("principal {principal} outside product range [{min}, {max}]")]
    PrincipalOutOfRange {
        principal: Money,
        min: Money,
        max: Money,
    },

    #[error("tenure of {months} months outside product range [{min}, {max}]")]
    TenureOutOfRange {
        months: u32,
        min: u32,
        max: u32,
    },

    #[error("invalid interest rate: {rate}")]
    InvalidInterestRate {
        rate: Rate,
    },

    #[error("invalid page request: page {page}, size {size}")]
    InvalidPageRequest {
        page: u32,
        size: u32,
    },

    #[error("invalid state: current {current}, expected {expected}")]
    InvalidState {
        current: String,
        expected: String,
    },

    #[error("caller not authorized to {action}")]
    Unauthorized {
        action: String,
    },

    #[error("store unavailable: {message}")]
    StoreUnavailable {
        message: String,
    },

    #[error("chain submission failed: {message}")]
    ChainSubmissionFailed {
        message: String,
    },

    #[error("malformed payload: {message}")]
    MalformedPayload {
        message: String,
    },

    #[error("invalid date: {message}")]
    InvalidDate {
        message: String,
    },

    #[error("calculation error: {message}")]
    CalculationError {
        message: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },
}

impl SettlementError {
    /// read-path failures a caller may retry as-is
    pub fn is_transient(&self) -> bool {
        matches!(self, SettlementError::StoreUnavailable { .. })
    }

    /// failures that indicate a locking or data-integrity bug
    pub fn is_fatal(&self) -> bool {
        matches!(self, SettlementError::InvariantViolation { .. })
    }
}

pub type Result<T> = std::result::Result<T, SettlementError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = SettlementError::InsufficientBalance {
            customer_id: CustomerId::new("c-1"),
            available: Money::from_major(30),
            requested: Money::from_major(50),
        };
        assert_eq!(
            err.to_string(),
            "insufficient balance for c-1: available 30, requested 50"
        );
    }

    #[test]
    fn test_classification() {
        assert!(SettlementError::StoreUnavailable { message: "timeout".into() }.is_transient());
        assert!(!SettlementError::SameAccount { customer_id: CustomerId::new("a") }.is_transient());
        assert!(SettlementError::InvariantViolation {
            customer_id: CustomerId::new("a"),
            message: "negative".into(),
        }
        .is_fatal());
    }
}
