//! Constant curve: every position sits exactly at its pool mean.

use ripen_core::traits::CurveOracle;
use serde::{Deserialize, Serialize};

/// Neutral curve; the emission modifier never boosts or cuts under it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatCurve(pub u128);

impl Default for FlatCurve {
    fn default() -> Self {
        Self(1)
    }
}

impl CurveOracle for FlatCurve {
    fn evaluate(&self, _maturity: u64) -> u128 {
        self.0
    }
}
