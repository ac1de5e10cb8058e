//! Deposit products, their pricing rules, and rate resolution.

pub mod catalog;
pub mod resolver;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::{Currency, Money, Rate};
use crate::errors::{Result, SettlementError};
use crate::interest::CompoundingConvention;

pub use catalog::{InMemoryProductCatalog, ProductCatalog};
pub use resolver::{PricingResolution, PricingRuleResolver};

/// premature-redemption terms of a product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrematurePenalty {
    /// fraction of principal charged, in [0, 1]
    pub rate: Rate,
    /// days after opening during which no penalty applies
    pub grace_period_days: u32,
}

impl PrematurePenalty {
    pub fn none() -> Self {
        Self {
            rate: Rate::ZERO,
            grace_period_days: 0,
        }
    }
}

/// a deposit offering; owned by product administration, read-only here
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub code: String,
    pub name: String,
    pub currency: Currency,
    pub min_principal: Money,
    pub max_principal: Money,
    pub min_term_months: u32,
    pub max_term_months: u32,
    pub min_interest_rate: Rate,
    pub max_interest_rate: Rate,
    /// rate used when no pricing rule matches; defaults to the minimum rate
    #[serde(default)]
    pub base_interest_rate: Option<Rate>,
    pub compounding: CompoundingConvention,
    pub premature_penalty: PrematurePenalty,
    pub active: bool,
    #[serde(default)]
    pub pricing_rules: Vec<PricingRule>,
}

impl Product {
    /// rate applied when no pricing rule governs
    pub fn default_rate(&self) -> Rate {
        self.base_interest_rate.unwrap_or(self.min_interest_rate)
    }

    pub fn accepts_principal(&self, principal: Money) -> bool {
        principal >= self.min_principal && principal <= self.max_principal
    }

    pub fn accepts_tenure(&self, months: u32) -> bool {
        months >= self.min_term_months && months <= self.max_term_months
    }

    pub fn ensure_principal(&self, principal: Money) -> Result<()> {
        if !self.accepts_principal(principal) {
            return Err(SettlementError::PrincipalOutOfRange {
                principal,
                min: self.min_principal,
                max: self.max_principal,
            });
        }
        Ok(())
    }

    pub fn ensure_tenure(&self, months: u32) -> Result<()> {
        if !self.accepts_tenure(months) {
            return Err(SettlementError::TenureOutOfRange {
                months,
                min: self.min_term_months,
                max: self.max_term_months,
            });
        }
        Ok(())
    }

    /// structural checks on product data handed to the core
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(SettlementError::InvalidConfiguration { message });

        if self.code.trim().is_empty() {
            return invalid("product code is empty".to_string());
        }
        if self.min_principal.is_negative() || self.min_principal > self.max_principal {
            return invalid(format!("product {}: invalid principal range", self.code));
        }
        if self.min_term_months == 0 || self.min_term_months > self.max_term_months {
            return invalid(format!("product {}: invalid term range", self.code));
        }
        if self.min_interest_rate.is_negative() || self.min_interest_rate > self.max_interest_rate {
            return invalid(format!("product {}: invalid interest rate range", self.code));
        }
        if !self.premature_penalty.rate.is_unit_fraction() {
            return invalid(format!(
                "product {}: penalty rate {} outside [0, 1]",
                self.code, self.premature_penalty.rate
            ));
        }
        for rule in &self.pricing_rules {
            rule.validate(&self.code)?;
        }
        Ok(())
    }
}

/// threshold-based override of rate, fee and discount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingRule {
    pub id: u64,
    /// inclusive lower bound on principal
    pub min_threshold: Money,
    /// exclusive upper bound on principal
    pub max_threshold: Money,
    #[serde(default)]
    pub interest_rate: Option<Rate>,
    #[serde(default)]
    pub fee_amount: Money,
    /// percentage, e.g. 0.5 for half a percent
    #[serde(default)]
    pub discount_percentage: Decimal,
    /// lower sorts first
    pub priority_order: i32,
    pub active: bool,
}

impl PricingRule {
    /// `min <= principal < max`
    pub fn matches(&self, principal: Money) -> bool {
        self.active && principal >= self.min_threshold && principal < self.max_threshold
    }

    fn validate(&self, product_code: &str) -> Result<()> {
        if self.min_threshold >= self.max_threshold {
            return Err(SettlementError::InvalidConfiguration {
                message: format!("product {}: rule {} has an empty threshold range", product_code, self.id),
            });
        }
        if self.interest_rate.map(|r| r.is_negative()).unwrap_or(false)
            || self.fee_amount.is_negative()
            || self.discount_percentage < Decimal::ZERO
        {
            return Err(SettlementError::InvalidConfiguration {
                message: format!("product {}: rule {} has negative pricing", product_code, self.id),
            });
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ranges() {
        let product = standard_product();
        assert!(product.accepts_principal(Money::from_major(1_000)));
        assert!(product.accepts_principal(Money::from_major(10_000_000)));
        assert!(!product.accepts_principal(Money::from_major(999)));
        assert!(product.accepts_tenure(12));
        assert!(!product.accepts_tenure(61));

        let err = product.ensure_tenure(3).unwrap_err();
        assert_eq!(err, SettlementError::TenureOutOfRange { months: 3, min: 6, max: 60 });
    }

    #[test]
    fn test_default_rate() {
        let mut product = standard_product();
        assert_eq!(product.default_rate(), Rate::from_percentage(7));
        product.base_interest_rate = None;
        assert_eq!(product.default_rate(), Rate::from_percentage(6));
    }

    #[test]
    fn test_rule_threshold_is_half_open() {
        let rule = rule(1, 1_000, 5_000, dec!(7.5), 1);
        assert!(rule.matches(Money::from_major(1_000)));
        assert!(rule.matches(Money::from_str_exact("4999.99").unwrap()));
        assert!(!rule.matches(Money::from_major(5_000)));
    }

    #[test]
    fn test_validation() {
        assert!(standard_product().validate().is_ok());

        let mut bad = standard_product();
        bad.premature_penalty.rate = Rate::from_decimal(dec!(1.2));
        assert!(bad.validate().is_err());

        let mut bad = standard_product();
        bad.pricing_rules.push(rule(9, 5_000, 5_000, dec!(7), 1));
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_product_from_json() {
        let json = r#"{
            "code": "FD-1Y",
            "name": "One Year",
            "currency": "INR",
            "min_principal": "5000",
            "max_principal": "1000000",
            "min_term_months": 12,
            "max_term_months": 12,
            "min_interest_rate": "0.065",
            "max_interest_rate": "0.07",
            "compounding": "QUARTERLY",
            "premature_penalty": { "rate": "0.01", "grace_period_days": 7 },
            "active": true
        }"#;
        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.compounding, CompoundingConvention::Quarterly);
        assert!(product.pricing_rules.is_empty());
        assert_eq!(product.default_rate(), Rate::from_decimal(dec!(0.065)));
        assert!(product.validate().is_ok());
    }
}
