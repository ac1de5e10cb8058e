//! Process-wide settlement clock.
//!
//! Every accrual and maturity comparison reads [`SystemClock::now`]. The base
//! reading comes from an hourglass-rs [`SafeTimeProvider`] (system time in
//! production, a controllable test source in tests); on top of it the clock
//! holds either an offset in seconds or a frozen absolute instant, replaced
//! atomically by the four admin operations.

use chrono::{DateTime, Duration, Utc};
use hourglass_rs::{SafeTimeProvider, TimeSource};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::errors::{Result, SettlementError};

/// adjustment applied over the base time source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ClockMode {
    /// base time shifted by `offset_seconds`
    Offset { offset_seconds: i64 },
    /// pinned to an absolute instant
    Frozen { instant: DateTime<Utc> },
}

impl Default for ClockMode {
    fn default() -> Self {
        ClockMode::Offset { offset_seconds: 0 }
    }
}

/// snapshot returned by the admin `GET time` view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockState {
    pub now: DateTime<Utc>,
    pub mode: ClockMode,
    pub simulated: bool,
}

pub struct SystemClock {
    base: SafeTimeProvider,
    mode: RwLock<ClockMode>,
}

impl SystemClock {
    /// clock on real wall-clock time
    pub fn new() -> Self {
        Self::with_source(TimeSource::System)
    }

    /// clock on an explicit hourglass time source
    pub fn with_source(source: TimeSource) -> Self {
        Self {
            base: SafeTimeProvider::new(source),
            mode: RwLock::new(ClockMode::default()),
        }
    }

    /// clock frozen at `instant` from construction
    pub fn frozen_at(instant: DateTime<Utc>) -> Self {
        let clock = Self::with_source(TimeSource::Test(instant));
        clock.set_absolute(instant);
        clock
    }

    /// the underlying time provider, for test control
    pub fn provider(&self) -> &SafeTimeProvider {
        &self.base
    }

    pub fn now(&self) -> DateTime<Utc> {
        match *self.mode.read() {
            ClockMode::Frozen { instant } => instant,
            ClockMode::Offset { offset_seconds } => {
                let base = self.base.now();
                Duration::try_seconds(offset_seconds)
                    .and_then(|offset| base.checked_add_signed(offset))
                    .unwrap_or(if offset_seconds < 0 {
                        DateTime::<Utc>::MIN_UTC
                    } else {
                        DateTime::<Utc>::MAX_UTC
                    })
            }
        }
    }

    /// pin the clock; the offset is ignored until [`reset`](Self::reset)
    pub fn set_absolute(&self, instant: DateTime<Utc>) {
        *self.mode.write() = ClockMode::Frozen { instant };
        info!(%instant, "settlement clock pinned");
    }

    /// move the clock by `seconds` (negative moves backward)
    ///
    /// A move that would leave the representable date range fails with
    /// `InvalidDate` and leaves the clock as it was.
    pub fn advance(&self, seconds: i64) -> Result<()> {
        let out_of_range = || SettlementError::InvalidDate {
            message: format!("advancing the clock by {} seconds leaves the supported range", seconds),
        };
        let delta = Duration::try_seconds(seconds).ok_or_else(out_of_range)?;

        let mut mode = self.mode.write();
        let next = match *mode {
            ClockMode::Frozen { instant } => ClockMode::Frozen {
                instant: instant.checked_add_signed(delta).ok_or_else(out_of_range)?,
            },
            ClockMode::Offset { offset_seconds } => {
                let offset_seconds = offset_seconds.checked_add(seconds).ok_or_else(out_of_range)?;
                Duration::try_seconds(offset_seconds)
                    .and_then(|offset| self.base.now().checked_add_signed(offset))
                    .ok_or_else(out_of_range)?;
                ClockMode::Offset { offset_seconds }
            }
        };
        *mode = next;
        info!(seconds, mode = ?next, "settlement clock advanced");
        Ok(())
    }

    /// return to base time with no offset
    pub fn reset(&self) {
        *self.mode.write() = ClockMode::default();
        info!("settlement clock reset");
    }

    pub fn mode(&self) -> ClockMode {
        *self.mode.read()
    }

    /// true when the clock deviates from its base source
    pub fn is_simulated(&self) -> bool {
        self.mode() != ClockMode::default()
    }

    pub fn state(&self) -> ClockState {
        let mode = self.mode();
        ClockState {
            now: self.now(),
            mode,
            simulated: mode != ClockMode::default(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SystemClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemClock")
            .field("mode", &self.mode())
            .finish()
    }
}
