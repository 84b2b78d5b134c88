//! Maturity tracking: the pool's weighted-average entry time and each
//! position's weighted entry time.
//!
//! The two updates are deliberately not the same formula:
//! - pool level branches on direction (`+=` on deposit, `-=` on withdraw) and
//!   weights by `MATURITY_WEIGHT_PRECISION`;
//! - position level always moves forward and weights by basis points.
//!
//! Both read balances from before the operation is applied, and neither
//! ever places an entry time after `now`.

use ripen_core::constants::{BPS_PRECISION, MATURITY_WEIGHT_PRECISION};
use ripen_core::error::ArithmeticError;
use ripen_core::types::{Direction, Timestamp};

/// Elapsed ticks since `entry`, zero if `entry` is not in the past.
pub fn maturity(entry: Timestamp, now: Timestamp) -> u64 {
    now.saturating_sub(entry)
}

/// New pool average entry time after `amount` moves in `direction`.
///
/// `balance` is the pool's deposited balance before the move. An empty pool
/// starts a new epoch at `now`.
pub fn update_pool_average(
    average: Timestamp,
    balance: u128,
    amount: u128,
    direction: Direction,
    now: Timestamp,
) -> Result<Timestamp, ArithmeticError> {
    if balance == 0 {
        return Ok(now);
    }

    let weight = amount
        .checked_mul(MATURITY_WEIGHT_PRECISION)
        .ok_or(ArithmeticError::Overflow)?
        / balance;
    let age = maturity(average, now) as u128;

    match direction {
        Direction::Deposit => {
            if weight >= MATURITY_WEIGHT_PRECISION {
                return Ok(now);
            }
            let shift = age * weight / MATURITY_WEIGHT_PRECISION;
            Ok(average.saturating_add(shift as u64).min(now))
        }
        Direction::Withdraw => {
            let shift = age
                .checked_mul(weight)
                .ok_or(ArithmeticError::Overflow)?
                / MATURITY_WEIGHT_PRECISION;
            let shift = u64::try_from(shift).map_err(|_| ArithmeticError::Underflow)?;
            average.checked_sub(shift).ok_or(ArithmeticError::Underflow)
        }
    }
}

/// New position entry time after `amount` is added or removed.
///
/// `position_amount` is the amount before the change. The same forward shift
/// applies in both directions.
pub fn update_position_entry(
    entry: Timestamp,
    position_amount: u128,
    amount: u128,
    now: Timestamp,
) -> Result<Timestamp, ArithmeticError> {
    if position_amount == 0 {
        return Ok(now);
    }

    let weight = amount
        .checked_mul(BPS_PRECISION)
        .ok_or(ArithmeticError::Overflow)?
        / position_amount;
    if weight >= BPS_PRECISION {
        return Ok(now.max(entry));
    }

    let age = maturity(entry, now) as u128;
    let shift = age * weight / BPS_PRECISION;
    Ok(entry.saturating_add(shift as u64).min(now.max(entry)))
}
