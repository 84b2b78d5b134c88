//! Conversion from native seconds to ledger ticks, plus the two clocks.
//!
//! The ledger never sees native seconds: every entry point converts through
//! [`to_scaled`] once, so all accounting runs on the same scaled unit.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ArithmeticError;
use crate::traits::Clock;
use crate::types::Timestamp;

/// Scale native seconds into ledger ticks.
pub fn to_scaled(native_secs: u64, scale: u64) -> Result<Timestamp, ArithmeticError> {
    native_secs
        .checked_mul(scale)
        .ok_or(ArithmeticError::Overflow)
}

/// Wall-clock time via chrono. Pre-epoch clocks read as zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
    }
}

/// Manually driven clock for tests and simulations.
#[derive(Debug, Default)]
pub struct ManualClock {
    secs: AtomicU64,
}

impl ManualClock {
    pub fn new(secs: u64) -> Self {
        Self {
            secs: AtomicU64::new(secs),
        }
    }

    pub fn set(&self, secs: u64) {
        self.secs.store(secs, Ordering::SeqCst);
    }

    /// Move the clock forward by `secs`, saturating at `u64::MAX`.
    pub fn advance(&self, secs: u64) {
        let now = self.secs.load(Ordering::SeqCst);
        self.secs.store(now.saturating_add(secs), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> u64 {
        self.secs.load(Ordering::SeqCst)
    }
}
