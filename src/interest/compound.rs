use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{Result, SettlementError};

/// upper bound on series terms; convergence normally takes far fewer
const MAX_SERIES_TERMS: u32 = 200;

/// compounding convention of a deposit product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompoundingConvention {
    /// no capitalization
    Simple,
    Daily,
    Monthly,
    Quarterly,
    SemiAnnual,
    Annual,
}

impl CompoundingConvention {
    /// all conventions, from least to most frequent capitalization
    pub const ALL: [CompoundingConvention; 6] = [
        CompoundingConvention::Simple,
        CompoundingConvention::Annual,
        CompoundingConvention::SemiAnnual,
        CompoundingConvention::Quarterly,
        CompoundingConvention::Monthly,
        CompoundingConvention::Daily,
    ];

    /// number of compounding periods per year, `None` for simple interest
    pub fn periods_per_year(&self) -> Option<u32> {
        match self {
            CompoundingConvention::Simple => None,
            CompoundingConvention::Daily => Some(365),
            CompoundingConvention::Monthly => Some(12),
            CompoundingConvention::Quarterly => Some(4),
            CompoundingConvention::SemiAnnual => Some(2),
            CompoundingConvention::Annual => Some(1),
        }
    }
}

impl fmt::Display for CompoundingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompoundingConvention::Simple => "SIMPLE",
            CompoundingConvention::Daily => "DAILY",
            CompoundingConvention::Monthly => "MONTHLY",
            CompoundingConvention::Quarterly => "QUARTERLY",
            CompoundingConvention::SemiAnnual => "SEMI_ANNUAL",
            CompoundingConvention::Annual => "ANNUAL",
        };
        f.write_str(s)
    }
}

/// growth factor `(1 + r/n)^(n * years)` for periodic compounding
///
/// The whole periods are raised exactly by repeated squaring; a trailing
/// partial period goes through `exp(f * ln(base))`.
pub fn growth_factor(annual_rate: Decimal, periods_per_year: u32, years: Decimal) -> Result<Decimal> {
    if periods_per_year == 0 {
        return Err(SettlementError::CalculationError {
            message: "compounding periods per year must be positive".to_string(),
        });
    }
    let n = Decimal::from(periods_per_year);
    let base = Decimal::ONE + annual_rate / n;
    if base <= Decimal::ZERO {
        return Err(SettlementError::CalculationError {
            message: format!("non-positive compounding base {}", base),
        });
    }

    let exponent = n * years;
    let whole = exponent.trunc();
    let partial = exponent - whole;

    let whole_periods = whole.to_u64().ok_or_else(|| SettlementError::CalculationError {
        message: format!("compounding exponent out of range: {}", exponent),
    })?;

    let mut factor = pow_whole(base, whole_periods)?;
    if !partial.is_zero() {
        let partial_factor = exp_series(partial * ln_series(base)?)?;
        factor = factor.checked_mul(partial_factor).ok_or_else(overflow)?;
    }
    Ok(factor)
}

/// `base^k` by repeated squaring
fn pow_whole(base: Decimal, mut k: u64) -> Result<Decimal> {
    let mut result = Decimal::ONE;
    let mut square = base;
    while k > 0 {
        if k & 1 == 1 {
            result = result.checked_mul(square).ok_or_else(overflow)?;
        }
        k >>= 1;
        if k > 0 {
            square = square.checked_mul(square).ok_or_else(overflow)?;
        }
    }
    Ok(result)
}

/// natural log via `ln(v) = 2 * atanh((v - 1) / (v + 1))`
fn ln_series(value: Decimal) -> Result<Decimal> {
    if value <= Decimal::ZERO {
        return Err(SettlementError::CalculationError {
            message: format!("logarithm of non-positive value {}", value),
        });
    }
    let y = (value - Decimal::ONE) / (value + Decimal::ONE);
    let y_squared = y * y;
    let mut power = y;
    let mut sum = Decimal::ZERO;
    for k in 0..MAX_SERIES_TERMS {
        let term = power / Decimal::from(2 * k + 1);
        if term.is_zero() {
            break;
        }
        sum += term;
        power *= y_squared;
    }
    Ok(sum * Decimal::TWO)
}

/// `e^x` by taylor series, run until terms vanish at decimal precision
fn exp_series(x: Decimal) -> Result<Decimal> {
    let mut sum = Decimal::ONE;
    let mut term = Decimal::ONE;
    for i in 1..MAX_SERIES_TERMS {
        term = term.checked_mul(x).ok_or_else(overflow)? / Decimal::from(i);
        if term.is_zero() {
            break;
        }
        sum += term;
    }
    Ok(sum)
}

fn overflow() -> SettlementError {
    SettlementError::CalculationError {
        message: "decimal overflow in compounding".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_periods_per_year() {
        assert_eq!(CompoundingConvention::Simple.periods_per_year(), None);
        assert_eq!(CompoundingConvention::Daily.periods_per_year(), Some(365));
        assert_eq!(CompoundingConvention::SemiAnnual.periods_per_year(), Some(2));
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_string(&CompoundingConvention::SemiAnnual).unwrap();
        assert_eq!(json, "\"SEMI_ANNUAL\"");
        assert_eq!(CompoundingConvention::Quarterly.to_string(), "QUARTERLY");
    }

    #[test]
    fn test_whole_periods_exact() {
        let factor = growth_factor(dec!(0.07), 1, dec!(2)).unwrap();
        assert_eq!(factor, dec!(1.1449));

        let factor = growth_factor(dec!(0.12), 12, Decimal::ONE).unwrap();
        assert_eq!(factor.round_dp(8), dec!(1.12682503));
    }

    #[test]
    fn test_partial_period_matches_square_root() {
        // half a year at 21% annual compounding is sqrt(1.21)
        let factor = growth_factor(dec!(0.21), 1, dec!(0.5)).unwrap();
        assert_eq!(factor.round_dp(12), dec!(1.1));
    }

    #[test]
    fn test_series_helpers() {
        assert_eq!(exp_series(Decimal::ZERO).unwrap(), Decimal::ONE);
        assert_eq!(exp_series(Decimal::ONE).unwrap().round_dp(10), dec!(2.7182818285));
        assert_eq!(ln_series(Decimal::ONE).unwrap(), Decimal::ZERO);
        assert_eq!(ln_series(dec!(2)).unwrap().round_dp(10), dec!(0.6931471806));
        assert!(ln_series(Decimal::ZERO).is_err());
    }

    #[test]
    fn test_zero_years_is_identity() {
        for convention in CompoundingConvention::ALL {
            if let Some(n) = convention.periods_per_year() {
                assert_eq!(growth_factor(dec!(0.09), n, Decimal::ZERO).unwrap(), Decimal::ONE);
            }
        }
    }
}
