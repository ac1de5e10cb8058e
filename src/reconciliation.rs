//! Ledger total versus on-chain token supply.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::clock::SystemClock;
use crate::config::ReconciliationConfig;
use crate::decimal::Money;
use crate::errors::{Result, SettlementError};
use crate::events::{Event, EventStore};
use crate::ledger::{LedgerEngine, LedgerTotals};

/// source of the total supply reported by the chain
pub trait SupplySource: Send + Sync {
    fn on_chain_supply(&self) -> Result<Money>;
}

/// supply figure set by hand, for tests and offline runs
#[derive(Debug, Default)]
pub struct ManualSupply {
    supply: RwLock<Money>,
}

impl ManualSupply {
    pub fn new(supply: Money) -> Self {
        Self {
            supply: RwLock::new(supply),
        }
    }

    pub fn set(&self, supply: Money) {
        *self.supply.write() = supply;
    }
}

impl SupplySource for ManualSupply {
    fn on_chain_supply(&self) -> Result<Money> {
        Ok(*self.supply.read())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub ledger_total: Money,
    pub on_chain_supply: Money,
    /// `on_chain_supply - ledger_total`
    pub variance: Money,
    pub customer_count: usize,
    pub balanced: bool,
    pub as_of: DateTime<Utc>,
}

/// reports drift between ledger and chain; never corrects it
pub struct ReconciliationReporter {
    ledger: Arc<LedgerEngine>,
    supply: Arc<dyn SupplySource>,
    clock: Arc<SystemClock>,
    events: Arc<EventStore>,
    config: ReconciliationConfig,
}

impl ReconciliationReporter {
    pub fn new(
        ledger: Arc<LedgerEngine>,
        supply: Arc<dyn SupplySource>,
        clock: Arc<SystemClock>,
        events: Arc<EventStore>,
        config: ReconciliationConfig,
    ) -> Self {
        Self {
            ledger,
            supply,
            clock,
            events,
            config,
        }
    }

    pub fn summary(&self) -> Result<ReconciliationSummary> {
        let on_chain_supply = self.supply.on_chain_supply()?;
        let LedgerTotals {
            total: ledger_total,
            customer_count,
            ..
        } = self.ledger.totals();
        let variance = on_chain_supply
            .checked_sub(ledger_total)
            .ok_or_else(|| SettlementError::CalculationError {
                message: format!("variance of {} against {} overflows", on_chain_supply, ledger_total),
            })?;
        let balanced = variance.abs() <= self.config.variance_tolerance;
        let as_of = self.clock.now();

        if variance.is_zero() {
            info!(%ledger_total, customer_count, "ledger reconciled with chain supply");
        } else {
            warn!(
                %ledger_total,
                %on_chain_supply,
                %variance,
                balanced,
                "ledger and chain supply differ"
            );
            self.events.emit(Event::ReconciliationVariance {
                ledger_total,
                on_chain_supply,
                variance,
                timestamp: as_of,
            });
        }

        Ok(ReconciliationSummary {
            ledger_total,
            on_chain_supply,
            variance,
            customer_count,
            balanced,
            as_of,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PagingConfig;
    use crate::types::CustomerId;
    use chrono::TimeZone;

    struct Unreachable;

    impl SupplySource for Unreachable {
        fn on_chain_supply(&self) -> Result<Money> {
            Err(SettlementError::StoreUnavailable {
                message: "rpc timeout".to_string(),
            })
        }
    }

    fn setup(supply: Arc<dyn SupplySource>, tolerance: Money) -> (Arc<LedgerEngine>, Arc<EventStore>, ReconciliationReporter) {
        let clock = Arc::new(SystemClock::frozen_at(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()));
        let events = Arc::new(EventStore::new());
        let ledger = Arc::new(LedgerEngine::new(clock.clone(), events.clone(), PagingConfig::default()));
        let reporter = ReconciliationReporter::new(
            ledger.clone(),
            supply,
            clock,
            events.clone(),
            ReconciliationConfig {
                variance_tolerance: tolerance,
            },
        );
        (ledger, events, reporter)
    }

    #[test]
    fn test_balanced() {
        let supply = Arc::new(ManualSupply::new(Money::from_major(300)));
        let (ledger, events, reporter) = setup(supply, Money::ZERO);
        ledger.issue(&CustomerId::new("a"), Money::from_major(100), None).unwrap();
        ledger.issue(&CustomerId::new("b"), Money::from_major(200), None).unwrap();
        events.clear();

        let summary = reporter.summary().unwrap();
        assert_eq!(summary.ledger_total, Money::from_major(300));
        assert_eq!(summary.variance, Money::ZERO);
        assert_eq!(summary.customer_count, 2);
        assert!(summary.balanced);
        assert!(events.is_empty());
    }

    #[test]
    fn test_variance_reported_not_corrected() {
        let supply = Arc::new(ManualSupply::new(Money::from_major(90)));
        let (ledger, events, reporter) = setup(supply.clone(), Money::ZERO);
        ledger.issue(&CustomerId::new("a"), Money::from_major(100), None).unwrap();
        events.clear();

        let summary = reporter.summary().unwrap();
        assert_eq!(summary.variance, Money::from_major(-10));
        assert!(!summary.balanced);
        assert_eq!(ledger.total(), Money::from_major(100));
        assert!(matches!(events.events()[0], Event::ReconciliationVariance { .. }));

        supply.set(Money::from_major(100));
        assert!(reporter.summary().unwrap().balanced);
    }

    #[test]
    fn test_tolerance() {
        let supply = Arc::new(ManualSupply::new(Money::from_str_exact("100.004").unwrap()));
        let (ledger, _, reporter) = setup(supply, Money::from_str_exact("0.01").unwrap());
        ledger.issue(&CustomerId::new("a"), Money::from_major(100), None).unwrap();

        let summary = reporter.summary().unwrap();
        assert!(summary.balanced);
        assert!(!summary.variance.is_zero());
    }

    #[test]
    fn test_variance_overflow_is_an_error() {
        let supply = Arc::new(ManualSupply::new(Money::from_decimal(rust_decimal::Decimal::MIN)));
        let (ledger, _, reporter) = setup(supply, Money::ZERO);
        ledger.issue(&CustomerId::new("a"), Money::from_major(1), None).unwrap();

        assert!(matches!(
            reporter.summary(),
            Err(SettlementError::CalculationError { .. })
        ));
    }

    #[test]
    fn test_supply_unavailable_is_transient() {
        let (_, _, reporter) = setup(Arc::new(Unreachable), Money::ZERO);
        let err = reporter.summary().unwrap_err();
        assert!(err.is_transient());
    }
}
