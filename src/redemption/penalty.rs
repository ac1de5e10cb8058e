use rust_decimal::RoundingStrategy;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};
use crate::pricing::PrematurePenalty;

/// engine for assessing premature-redemption penalties
#[derive(Debug, Clone, Copy)]
pub struct PenaltyEngine {
    pub terms: PrematurePenalty,
    scale: u32,
}

impl PenaltyEngine {
    pub fn new(terms: PrematurePenalty, scale: u32) -> Self {
        Self { terms, scale }
    }

    /// penalty for redeeming after `days_since_opening` whole days
    ///
    /// Nothing is charged at or after maturity or within the grace period;
    /// otherwise `principal * rate`, never more than `principal + accrued`.
    pub fn assess(
        &self,
        principal: Money,
        accrued_interest: Money,
        days_since_opening: i64,
        matured: bool,
    ) -> PenaltyAssessment {
        if matured {
            return PenaltyAssessment::waived(self.terms.rate, days_since_opening, false);
        }
        if days_since_opening <= i64::from(self.terms.grace_period_days) {
            return PenaltyAssessment::waived(self.terms.rate, days_since_opening, true);
        }

        let raw = principal.as_decimal() * self.terms.rate.as_decimal();
        let charged = Money::from_decimal(
            raw.round_dp_with_strategy(self.scale, RoundingStrategy::MidpointAwayFromZero),
        );
        let ceiling = principal + accrued_interest;
        let capped = charged > ceiling;

        PenaltyAssessment {
            penalty_amount: if capped { ceiling } else { charged },
            rate: self.terms.rate,
            days_since_opening,
            grace_applied: false,
            capped,
        }
    }
}

/// penalty assessment result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyAssessment {
    pub penalty_amount: Money,
    pub rate: Rate,
    pub days_since_opening: i64,
    pub grace_applied: bool,
    /// penalty limited to principal plus accrued interest
    pub capped: bool,
}

impl PenaltyAssessment {
    fn waived(rate: Rate, days_since_opening: i64, grace_applied: bool) -> Self {
        Self {
            penalty_amount: Money::ZERO,
            rate,
            days_since_opening,
            grace_applied,
            capped: false,
        }
    }

    pub fn is_charged(&self) -> bool {
        self.penalty_amount.is_positive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn engine() -> PenaltyEngine {
        PenaltyEngine::new(
            PrematurePenalty {
                rate: Rate::from_decimal(dec!(0.02)),
                grace_period_days: 30,
            },
            2,
        )
    }

    #[test]
    fn test_grace_period() {
        let principal = Money::from_major(100_000);
        let accrued = Money::from_str_exact("185.54").unwrap();

        let inside = engine().assess(principal, accrued, 10, false);
        assert_eq!(inside.penalty_amount, Money::ZERO);
        assert!(inside.grace_applied);

        // the last grace day is still free
        assert!(!engine().assess(principal, accrued, 30, false).is_charged());
        assert!(engine().assess(principal, accrued, 31, false).is_charged());
    }

    #[test]
    fn test_basic_penalty() {
        let result = engine().assess(
            Money::from_major(100_000),
            Money::from_str_exact("3776.90").unwrap(),
            200,
            false,
        );
        assert_eq!(result.penalty_amount, Money::from_major(2_000));
        assert!(!result.grace_applied);
        assert!(!result.capped);
    }

    #[test]
    fn test_no_penalty_at_maturity() {
        let result = engine().assess(Money::from_major(100_000), Money::from_major(7_000), 365, true);
        assert_eq!(result.penalty_amount, Money::ZERO);
        assert!(!result.grace_applied);
    }

    #[test]
    fn test_penalty_rounds_half_up() {
        let result = engine().assess(Money::from_str_exact("1000.25").unwrap(), Money::ZERO, 90, false);
        // 1000.25 * 0.02 = 20.005
        assert_eq!(result.penalty_amount, Money::from_str_exact("20.01").unwrap());
    }

    #[test]
    fn test_penalty_capped() {
        let engine = PenaltyEngine::new(
            PrematurePenalty {
                rate: Rate::from_decimal(dec!(1.5)),
                grace_period_days: 0,
            },
            2,
        );
        let result = engine.assess(Money::from_major(1_000), Money::from_major(10), 40, false);
        assert_eq!(result.penalty_amount, Money::from_major(1_010));
        assert!(result.capped);
    }
}
