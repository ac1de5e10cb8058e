use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use crate::decimal::{Money, Rate};
use crate::errors::{Result, SettlementError};
use crate::interest::compound::{growth_factor, CompoundingConvention};
use crate::interest::InterestCalculation;

pub const SECONDS_PER_DAY: i64 = 86_400;
pub const DAYS_PER_YEAR: i64 = 365;

/// decimal places kept on reported effective rates
const EFFECTIVE_RATE_SCALE: u32 = 4;

/// elapsed time in years on an actual/365 basis, zero when `to <= from`
pub fn year_fraction(from: DateTime<Utc>, to: DateTime<Utc>) -> Decimal {
    if to <= from {
        return Decimal::ZERO;
    }
    let seconds = (to - from).num_seconds();
    Decimal::from(seconds) / Decimal::from(SECONDS_PER_DAY * DAYS_PER_YEAR)
}

/// whole days elapsed, zero when `to <= from`
pub fn elapsed_days(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    if to <= from {
        return 0;
    }
    (to - from).num_days()
}

/// interest accrual under a compounding convention
///
/// Intermediate values are never rounded; the reported interest is rounded
/// half-up to `scale` decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccrualCalculator {
    scale: u32,
}

impl AccrualCalculator {
    pub fn new(scale: u32) -> Self {
        Self { scale }
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// unrounded interest for `years` of accrual
    pub fn raw_interest(
        &self,
        principal: Money,
        annual_rate: Rate,
        convention: CompoundingConvention,
        years: Decimal,
    ) -> Result<Decimal> {
        if principal.is_negative() {
            return Err(SettlementError::InvalidAmount {
                amount: principal,
                reason: "principal must not be negative".to_string(),
            });
        }
        if annual_rate.is_negative() {
            return Err(SettlementError::InvalidInterestRate { rate: annual_rate });
        }
        if years <= Decimal::ZERO || principal.is_zero() {
            return Ok(Decimal::ZERO);
        }

        let p = principal.as_decimal();
        let r = annual_rate.as_decimal();
        let interest = match convention.periods_per_year() {
            None => p * r * years,
            Some(n) => p * (growth_factor(r, n, years)? - Decimal::ONE),
        };
        Ok(interest.max(Decimal::ZERO))
    }

    /// interest earned between two instants, rounded for reporting
    pub fn interest_earned(
        &self,
        principal: Money,
        annual_rate: Rate,
        convention: CompoundingConvention,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Money> {
        let years = year_fraction(from, to);
        let raw = self.raw_interest(principal, annual_rate, convention, years)?;
        Ok(self.round(raw))
    }

    /// full calculation record for reporting
    pub fn calculate(
        &self,
        principal: Money,
        annual_rate: Rate,
        convention: CompoundingConvention,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<InterestCalculation> {
        let years = year_fraction(from, to);
        let interest = self.round(self.raw_interest(principal, annual_rate, convention, years)?);
        let effective_rate = effective_rate(interest, principal, years, annual_rate);

        debug!(
            %principal,
            rate = %annual_rate,
            %convention,
            %years,
            %interest,
            "interest calculated"
        );

        Ok(InterestCalculation {
            principal,
            interest_amount: interest,
            nominal_rate: annual_rate,
            effective_rate,
            days: elapsed_days(from, to),
            years,
            convention,
            calculation_method: format!("{} compounding, actual/365", convention),
        })
    }

    fn round(&self, raw: Decimal) -> Money {
        Money::from_decimal(raw.round_dp_with_strategy(self.scale, RoundingStrategy::MidpointAwayFromZero))
    }
}

impl Default for AccrualCalculator {
    fn default() -> Self {
        Self::new(2)
    }
}

/// annualized yield in percent: `interest / principal / years * 100`,
/// falling back to the nominal rate when no time has elapsed
pub fn effective_rate(interest: Money, principal: Money, years: Decimal, nominal: Rate) -> Decimal {
    if years <= Decimal::ZERO || principal.is_zero() {
        return nominal.as_percentage();
    }
    (interest.as_decimal() / principal.as_decimal() / years * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(EFFECTIVE_RATE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    fn convention_strategy() -> impl Strategy<Value = CompoundingConvention> {
        prop::sample::select(CompoundingConvention::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_accrual_is_monotonic_in_time(
            principal in 1_000i64..10_000_000,
            rate_bps in 0u32..2_500,
            convention in convention_strategy(),
            t1 in 0i64..(3_650 * 86_400),
            extra in 0i64..(3_650 * 86_400),
        ) {
            let calc = AccrualCalculator::default();
            let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            let rate = Rate::from_bps(rate_bps);
            let principal = Money::from_major(principal);

            let earlier = calc
                .interest_earned(principal, rate, convention, start, start + Duration::seconds(t1))
                .unwrap();
            let later = calc
                .interest_earned(principal, rate, convention, start, start + Duration::seconds(t1 + extra))
                .unwrap();

            prop_assert!(earlier >= Money::ZERO);
            prop_assert!(earlier <= later);
        }

        #[test]
        fn prop_periodic_ordering_any_horizon(
            principal in 1_000i64..10_000_000,
            rate_bps in 1u32..2_500,
            days in 1i64..3_650,
        ) {
            let calc = AccrualCalculator::default();
            let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
            let to = start + Duration::days(days);
            let rate = Rate::from_bps(rate_bps);
            let principal = Money::from_major(principal);

            let earned: Vec<Money> = CompoundingConvention::ALL[1..]
                .iter()
                .map(|c| calc.interest_earned(principal, rate, *c, start, to).unwrap())
                .collect();
            for pair in earned.windows(2) {
                prop_assert!(pair[0] <= pair[1]);
            }
        }
    }
}
