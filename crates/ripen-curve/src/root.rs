//! Square-root maturity curve: rewards early maturity steeply, then flattens.

use ripen_core::traits::CurveOracle;
use serde::{Deserialize, Serialize};

/// Integer square root, rounded down (Newton's method).
pub fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    let mut x = 1u128 << ((128 - n.leading_zeros()).div_ceil(2));
    loop {
        let y = (x + n / x) / 2;
        if y >= x {
            return x;
        }
        x = y;
    }
}

/// `floor + sqrt(maturity * scale)`.
///
/// `floor` keeps a freshly reset pool (maturity zero) at a non-zero mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootCurve {
    pub floor: u128,
    pub scale: u128,
}

impl RootCurve {
    pub fn new(floor: u128, scale: u128) -> Self {
        Self { floor, scale }
    }
}

impl Default for RootCurve {
    fn default() -> Self {
        Self::new(1_000, 1_000_000)
    }
}

impl CurveOracle for RootCurve {
    fn evaluate(&self, maturity: u64) -> u128 {
        let radicand = (maturity as u128).saturating_mul(self.scale);
        self.floor.saturating_add(isqrt(radicand))
    }
}
