use serde::{Deserialize, Serialize};

use crate::decimal::{Currency, Money};
use crate::errors::{Result, SettlementError};
use crate::events::DEFAULT_EVENT_CAPACITY;

/// settlement core configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// currency of ledger balances and deposits
    pub currency: Currency,
    /// decimal places for reported amounts; defaults to the currency scale
    pub reporting_scale: Option<u32>,
    pub paging: PagingConfig,
    pub redemption: RedemptionConfig,
    pub reconciliation: ReconciliationConfig,
    pub events: EventConfig,
}

/// history paging limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagingConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
}

/// redemption settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedemptionConfig {
    /// prefix of the ledger reference written by redemption processing
    pub reference_prefix: String,
    /// emit advisory warnings on quotes
    pub include_warnings: bool,
}

/// reconciliation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// absolute variance below which the ledger counts as balanced
    pub variance_tolerance: Money,
}

/// in-memory event buffer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// events held before the oldest are dropped
    pub capacity: usize,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            currency: Currency::default(),
            reporting_scale: None,
            paging: PagingConfig::default(),
            redemption: RedemptionConfig::default(),
            reconciliation: ReconciliationConfig::default(),
            events: EventConfig::default(),
        }
    }
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 200,
        }
    }
}

impl Default for RedemptionConfig {
    fn default() -> Self {
        Self {
            reference_prefix: "fd-redemption".to_string(),
            include_warnings: true,
        }
    }
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            variance_tolerance: Money::ZERO,
        }
    }
}

impl SettlementConfig {
    /// configuration for a given currency with default limits
    pub fn for_currency(code: &str) -> Self {
        Self {
            currency: Currency::new(code),
            ..Self::default()
        }
    }

    /// parse and validate a JSON configuration document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SettlementConfig =
            serde_json::from_str(json).map_err(|e| SettlementError::InvalidConfiguration {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.currency.code().is_empty() {
            return Err(SettlementError::InvalidConfiguration {
                message: "currency code is empty".to_string(),
            });
        }
        if self.paging.max_page_size == 0 || self.paging.default_page_size == 0 {
            return Err(SettlementError::InvalidConfiguration {
                message: "page sizes must be positive".to_string(),
            });
        }
        if self.paging.default_page_size > self.paging.max_page_size {
            return Err(SettlementError::InvalidConfiguration {
                message: format!(
                    "default page size {} exceeds maximum {}",
                    self.paging.default_page_size, self.paging.max_page_size
                ),
            });
        }
        if self.redemption.reference_prefix.trim().is_empty() {
            return Err(SettlementError::InvalidConfiguration {
                message: "redemption reference prefix is empty".to_string(),
            });
        }
        if self.events.capacity == 0 {
            return Err(SettlementError::InvalidConfiguration {
                message: "event capacity must be positive".to_string(),
            });
        }
        if self.reconciliation.variance_tolerance.is_negative() {
            return Err(SettlementError::InvalidConfiguration {
                message: "variance tolerance must not be negative".to_string(),
            });
        }
        Ok(())
    }

    /// decimal places used for reported amounts
    pub fn scale(&self) -> u32 {
        self.reporting_scale.unwrap_or_else(|| self.currency.scale())
    }
}
