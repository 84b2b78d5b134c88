//! S-shaped maturity curve backed by a fixed-point logistic lookup table.
//!
//! Young positions sit on the flat lower tail, mature ones on the flat upper
//! tail, and the steep middle section is centred on a configurable maturity.
//! The logistic is tabulated for `x = 0.0, 0.5, ..., 8.0`; the negative half
//! is mirrored through `sigmoid(-x) = 1 - sigmoid(x)`, so the curve never
//! returns zero.

use ripen_core::traits::CurveOracle;
use serde::{Deserialize, Serialize};

/// Output scale of the curve (parts-per-billion of the upper asymptote).
pub const SIGMOID_PRECISION: u64 = 1_000_000_000;

/// Fixed-point scale of the logistic argument.
pub const ARG_PRECISION: u128 = 1_000_000_000;

const TABLE_STEP: u128 = ARG_PRECISION / 2;

/// `logistic(x) * SIGMOID_PRECISION` for `x = 0.0, 0.5, ..., 8.0`.
const LOGISTIC_TABLE: [u64; 17] = [
    500_000_000,
    622_459_331,
    731_058_579,
    817_574_476,
    880_797_078,
    924_141_820,
    952_574_127,
    970_687_769,
    982_013_790,
    989_013_057,
    993_307_149,
    995_929_862,
    997_527_377,
    998_498_883,
    999_088_949,
    999_447_221,
    999_664_650,
];

/// Logistic function of a non-negative argument scaled by [`ARG_PRECISION`],
/// linearly interpolated between table entries and saturating past `x = 8`.
pub fn logistic_positive(x_scaled: u128) -> u64 {
    let last = LOGISTIC_TABLE.len() - 1;
    let step = x_scaled / TABLE_STEP;
    if step >= last as u128 {
        return LOGISTIC_TABLE[last];
    }
    let index = step as usize;

    let lo = LOGISTIC_TABLE[index];
    let hi = LOGISTIC_TABLE[index + 1];
    let frac = x_scaled % TABLE_STEP;
    lo + ((hi - lo) as u128 * frac / TABLE_STEP) as u64
}

/// Logistic curve over maturity.
///
/// `midpoint` is the maturity (in ticks) where the curve crosses half its
/// height; `span` is how many ticks one unit of the logistic argument covers,
/// so the curve is effectively flat beyond `midpoint ± 8 * span`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigmoidCurve {
    pub midpoint: u64,
    pub span: u64,
}

impl SigmoidCurve {
    pub fn new(midpoint: u64, span: u64) -> Self {
        Self {
            midpoint,
            span: span.max(1),
        }
    }

    fn argument(&self, distance: u64) -> u128 {
        distance as u128 * ARG_PRECISION / self.span.max(1) as u128
    }
}

impl CurveOracle for SigmoidCurve {
    fn evaluate(&self, maturity: u64) -> u128 {
        let value = if maturity >= self.midpoint {
            logistic_positive(self.argument(maturity - self.midpoint))
        } else {
            SIGMOID_PRECISION - logistic_positive(self.argument(self.midpoint - maturity))
        };
        value as u128
    }
}
