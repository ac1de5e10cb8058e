pub mod boundary;
pub mod calculator;
pub mod clock;
pub mod config;
pub mod decimal;
pub mod deposit;
pub mod errors;
pub mod events;
pub mod interest;
pub mod ledger;
pub mod pricing;
pub mod reconciliation;
pub mod redemption;
pub mod service;
pub mod types;

// re-export key types
pub use boundary::{
    AdvanceTimeRequest, CalculateFdRequest, IssueRequest, RedeemRequest, SetTimeRequest,
    TransferRequest,
};
pub use calculator::{FdCalculation, FdCalculator};
pub use clock::{ClockMode, ClockState, SystemClock};
pub use config::SettlementConfig;
pub use decimal::{Currency, Money, Rate};
pub use deposit::{AccountRegistry, AccountUpgrade, DepositAccount, RedemptionRecord};
pub use errors::{Result, SettlementError};
pub use events::{Event, EventStore};
pub use interest::{AccrualCalculator, CompoundingConvention, InterestCalculation};
pub use ledger::{
    ChainSubmission, LedgerEngine, LedgerEntry, LedgerTotals, SubmissionStatus, TransferEntries,
};
pub use pricing::{
    InMemoryProductCatalog, PrematurePenalty, PricingResolution, PricingRule, PricingRuleResolver,
    Product, ProductCatalog,
};
pub use reconciliation::{ManualSupply, ReconciliationReporter, ReconciliationSummary, SupplySource};
pub use redemption::{PenaltyAssessment, PenaltyEngine, RedemptionEngine, RedemptionQuote, RedemptionReceipt};
pub use service::{ChainClient, SettlementService};
pub use types::{AccountId, AccountStatus, Caller, CustomerId, EntryId, LedgerOperation, Page};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
