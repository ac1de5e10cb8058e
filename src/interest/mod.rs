pub mod accrual;
pub mod compound;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};

pub use accrual::{effective_rate, elapsed_days, year_fraction, AccrualCalculator};
pub use compound::{growth_factor, CompoundingConvention};

/// interest calculation result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestCalculation {
    pub principal: Money,
    pub interest_amount: Money,
    pub nominal_rate: Rate,
    /// annualized yield in percent
    pub effective_rate: Decimal,
    pub days: i64,
    pub years: Decimal,
    pub convention: CompoundingConvention,
    pub calculation_method: String,
}

impl InterestCalculation {
    pub fn maturity_amount(&self) -> Money {
        self.principal + self.interest_amount
    }
}
