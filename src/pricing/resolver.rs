use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decimal::{Money, Rate};
use crate::errors::{Result, SettlementError};
use crate::pricing::{PricingRule, Product};

/// outcome of rate resolution for one principal amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingResolution {
    pub rate: Rate,
    pub fee: Money,
    pub discount_percentage: Decimal,
    /// governing rule, `None` when the product default applied
    pub rule_id: Option<u64>,
}

/// selects the governing pricing rule for a principal
#[derive(Debug, Clone, Copy, Default)]
pub struct PricingRuleResolver;

impl PricingRuleResolver {
    pub fn new() -> Self {
        Self
    }

    /// lowest-priority active matching rule wins, ties go to the lowest id;
    /// without a match the product default rate applies with no fee or discount
    pub fn resolve(&self, product: &Product, principal: Money) -> Result<PricingResolution> {
        if !product.active {
            return Err(SettlementError::NoApplicableRate {
                product_code: product.code.clone(),
                reason: "product is inactive".to_string(),
            });
        }
        if !product.accepts_principal(principal) {
            return Err(SettlementError::NoApplicableRate {
                product_code: product.code.clone(),
                reason: format!(
                    "principal {} outside [{}, {}]",
                    principal, product.min_principal, product.max_principal
                ),
            });
        }

        let resolution = match governing_rule(&product.pricing_rules, principal) {
            Some(rule) => PricingResolution {
                rate: rule.interest_rate.unwrap_or_else(|| product.default_rate()),
                fee: rule.fee_amount,
                discount_percentage: rule.discount_percentage,
                rule_id: Some(rule.id),
            },
            None => PricingResolution {
                rate: product.default_rate(),
                fee: Money::ZERO,
                discount_percentage: Decimal::ZERO,
                rule_id: None,
            },
        };

        debug!(
            product = %product.code,
            %principal,
            rate = %resolution.rate,
            rule_id = ?resolution.rule_id,
            "pricing resolved"
        );
        Ok(resolution)
    }
}

fn governing_rule(rules: &[PricingRule], principal: Money) -> Option<&PricingRule> {
    rules
        .iter()
        .filter(|rule| rule.matches(principal))
        .min_by_key(|rule| (rule.priority_order, rule.id))
}
