//! Emission modifier: scales a payout by how far a position's curve value
//! sits from its pool's mean curve value.
//!
//! `distance_bp = |value - mean| * BPS_PRECISION / mean`. Positions above the
//! mean are boosted by `distance_bp`, positions below are cut by it, never
//! below zero.

use ripen_core::constants::BPS_PRECISION;
use ripen_core::error::ArithmeticError;
use ripen_core::traits::CurveOracle;
use ripen_core::types::Timestamp;

use crate::maturity::maturity;

/// Curve readings for one position against its pool, taken at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurveSnapshot {
    pub position_value: u128,
    pub mean_value: u128,
}

impl CurveSnapshot {
    /// Read the curve for a position entered at `entry` in a pool whose
    /// average entry is `average`.
    pub fn take(
        curve: &dyn CurveOracle,
        entry: Timestamp,
        average: Timestamp,
        now: Timestamp,
    ) -> Self {
        Self {
            position_value: curve.evaluate(maturity(entry, now)),
            mean_value: curve.evaluate(maturity(average, now)),
        }
    }

    pub fn distance_bps(&self) -> Result<u128, ArithmeticError> {
        distance_bps(self.position_value, self.mean_value)
    }
}

/// Relative distance of `value` from `mean`, in basis points of `mean`.
pub fn distance_bps(value: u128, mean: u128) -> Result<u128, ArithmeticError> {
    if mean == 0 {
        return Err(ArithmeticError::ZeroMeanCurveValue);
    }
    Ok(value
        .abs_diff(mean)
        .checked_mul(BPS_PRECISION)
        .ok_or(ArithmeticError::Overflow)?
        / mean)
}

/// Apply the modifier to `amount`.
///
/// A zero amount is returned as-is without reading the snapshot.
pub fn modify(amount: u128, snapshot: &CurveSnapshot) -> Result<u128, ArithmeticError> {
    if amount == 0 {
        return Ok(0);
    }
    let distance = snapshot.distance_bps()?;
    let factor = if snapshot.position_value >= snapshot.mean_value {
        BPS_PRECISION
            .checked_add(distance)
            .ok_or(ArithmeticError::Overflow)?
    } else {
        BPS_PRECISION.saturating_sub(distance)
    };
    Ok(amount
        .checked_mul(factor)
        .ok_or(ArithmeticError::Overflow)?
        / BPS_PRECISION)
}
