//! Pre-sale fixed-deposit quote: pricing plus accrual, no state change.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::clock::SystemClock;
use crate::decimal::Money;
use crate::deposit::maturity_date;
use crate::errors::{Result, SettlementError};
use crate::interest::{AccrualCalculator, CompoundingConvention};
use crate::pricing::{PricingRuleResolver, ProductCatalog};

/// FD calculation response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FdCalculation {
    pub product_code: String,
    pub principal_amount: Money,
    /// annual rate in percent
    pub interest_rate: Decimal,
    pub tenure_months: u32,
    pub interest_earned: Money,
    pub maturity_amount: Money,
    /// annualized yield in percent
    pub effective_rate: Decimal,
    pub compounding_frequency: CompoundingConvention,
    pub fee: Money,
    pub discount_percentage: Decimal,
    pub rule_id: Option<u64>,
    pub calculation_date: DateTime<Utc>,
    pub maturity_date: DateTime<Utc>,
}

pub struct FdCalculator {
    catalog: Arc<dyn ProductCatalog>,
    resolver: PricingRuleResolver,
    accrual: AccrualCalculator,
    clock: Arc<SystemClock>,
}

impl FdCalculator {
    pub fn new(catalog: Arc<dyn ProductCatalog>, clock: Arc<SystemClock>, scale: u32) -> Self {
        Self {
            catalog,
            resolver: PricingRuleResolver::new(),
            accrual: AccrualCalculator::new(scale),
            clock,
        }
    }

    /// projected interest for a deposit opened now and held to maturity
    pub fn calculate_fd(
        &self,
        product_code: &str,
        principal: Money,
        tenure_months: u32,
    ) -> Result<FdCalculation> {
        let product = self.catalog.product(product_code)?;
        if !product.active {
            return Err(SettlementError::NoApplicableRate {
                product_code: product.code.clone(),
                reason: "product is inactive".to_string(),
            });
        }
        product.ensure_principal(principal)?;
        product.ensure_tenure(tenure_months)?;
        let pricing = self.resolver.resolve(&product, principal)?;

        let now = self.clock.now();
        let maturity = maturity_date(now, tenure_months)?;
        let calculation =
            self.accrual
                .calculate(principal, pricing.rate, product.compounding, now, maturity)?;

        debug!(
            product = %product.code,
            %principal,
            tenure_months,
            interest = %calculation.interest_amount,
            "fd calculation"
        );

        Ok(FdCalculation {
            product_code: product.code,
            principal_amount: principal,
            interest_rate: pricing.rate.as_percentage(),
            tenure_months,
            interest_earned: calculation.interest_amount,
            maturity_amount: calculation.maturity_amount(),
            effective_rate: calculation.effective_rate,
            compounding_frequency: product.compounding,
            fee: pricing.fee,
            discount_percentage: pricing.discount_percentage,
            rule_id: pricing.rule_id,
            calculation_date: now,
            maturity_date: maturity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::fixtures::{rule, standard_product};
    use crate::pricing::InMemoryProductCatalog;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn calculator(products: Vec<crate::pricing::Product>) -> FdCalculator {
        let catalog = InMemoryProductCatalog::with_products(products).unwrap();
        let clock = SystemClock::frozen_at(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        FdCalculator::new(Arc::new(catalog), Arc::new(clock), 2)
    }

    #[test]
    fn test_two_year_annual() {
        let calc = calculator(vec![standard_product()]);
        let result = calc.calculate_fd("FD-STD", Money::from_major(100_000), 24).unwrap();

        assert_eq!(result.interest_earned, Money::from_str_exact("14490.00").unwrap());
        assert_eq!(result.maturity_amount, Money::from_str_exact("114490.00").unwrap());
        assert_eq!(result.interest_rate, dec!(7));
        assert_eq!(result.effective_rate, dec!(7.245));
        assert_eq!(result.compounding_frequency, CompoundingConvention::Annual);
        assert_eq!(result.maturity_date, Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_rule_applied() {
        let mut product = standard_product();
        product.pricing_rules = vec![rule(3, 50_000, 200_000, dec!(7.5), 1)];
        let calc = calculator(vec![product]);

        let result = calc.calculate_fd("FD-STD", Money::from_major(100_000), 12).unwrap();
        assert_eq!(result.rule_id, Some(3));
        assert_eq!(result.interest_rate, dec!(7.5));
        assert_eq!(result.interest_earned, Money::from_major(7_500));
    }

    #[test]
    fn test_validation() {
        let mut inactive = standard_product();
        inactive.code = "FD-OFF".to_string();
        inactive.active = false;
        let calc = calculator(vec![standard_product(), inactive]);

        assert!(matches!(
            calc.calculate_fd("FD-OFF", Money::from_major(5_000), 12),
            Err(SettlementError::NoApplicableRate { .. })
        ));
        assert!(matches!(
            calc.calculate_fd("FD-STD", Money::from_major(5), 12),
            Err(SettlementError::PrincipalOutOfRange { .. })
        ));
        assert!(matches!(
            calc.calculate_fd("FD-STD", Money::from_major(5_000), 120),
            Err(SettlementError::TenureOutOfRange { .. })
        ));
        assert!(matches!(
            calc.calculate_fd("FD-X", Money::from_major(5_000), 12),
            Err(SettlementError::ProductNotFound { .. })
        ));
    }

    #[test]
    fn test_wire_names() {
        let calc = calculator(vec![standard_product()]);
        let result = calc.calculate_fd("FD-STD", Money::from_major(10_000), 12).unwrap();
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["principalAmount"], "10000");
        assert_eq!(json["compoundingFrequency"], "ANNUAL");
        assert!(json.get("maturityAmount").is_some());
        assert!(json.get("effectiveRate").is_some());
    }
}
