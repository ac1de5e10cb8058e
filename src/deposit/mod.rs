//! Fixed-deposit accounts and their lifecycle.

pub mod account;
pub mod registry;

pub use account::{maturity_date, DepositAccount, RedemptionRecord};
pub use registry::{AccountRegistry, AccountUpgrade};
