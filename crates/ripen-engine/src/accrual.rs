//! Reward accrual: advances a pool's per-share accumulator to "now".
//!
//! `reward = elapsed * emission_rate * weight / total_weight`, truncated.
//! When nothing is deposited the interval's reward is forfeited but the
//! settlement clock still advances.

use ripen_core::constants::ACC_REWARD_PRECISION;
use ripen_core::error::{ArithmeticError, ConfigError, FarmError};
use ripen_core::types::{PoolId, Timestamp};
use tracing::debug;

use crate::pool::Pool;

/// Everything settlement reads from outside the pool itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccrualContext {
    pub now: Timestamp,
    /// Pool balance held by the vault before the current operation.
    pub deposited_balance: u128,
    pub emission_rate: u128,
    pub total_allocation_weight: u64,
}

/// Outcome of a settlement that advanced the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub pool_id: PoolId,
    pub timestamp: Timestamp,
    pub deposited_balance: u128,
    pub acc_reward_per_share: u128,
    /// Reward minted into the accumulator; zero when forfeited.
    pub minted: u128,
}

/// Projected accumulator state at `ctx.now`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Projection {
    pub acc_reward_per_share: u128,
    pub total_accrued: u128,
}

/// Reward emitted to one pool over `elapsed` ticks.
pub fn pool_reward(
    elapsed: u64,
    emission_rate: u128,
    allocation_weight: u64,
    total_allocation_weight: u64,
) -> Result<u128, FarmError> {
    if total_allocation_weight == 0 {
        return Err(ConfigError::ZeroTotalAllocation.into());
    }
    let reward = (elapsed as u128)
        .checked_mul(emission_rate)
        .and_then(|r| r.checked_mul(allocation_weight as u128))
        .ok_or(ArithmeticError::Overflow)?
        / total_allocation_weight as u128;
    Ok(reward)
}

/// What [`settle`] would produce, without touching the pool.
pub fn project(pool: &Pool, ctx: &AccrualContext) -> Result<Projection, FarmError> {
    let current = Projection {
        acc_reward_per_share: pool.acc_reward_per_share,
        total_accrued: pool.total_accrued,
    };
    if ctx.now <= pool.last_settlement_time || ctx.deposited_balance == 0 {
        return Ok(current);
    }

    let elapsed = ctx.now - pool.last_settlement_time;
    let reward = pool_reward(
        elapsed,
        ctx.emission_rate,
        pool.allocation_weight,
        ctx.total_allocation_weight,
    )?;
    let increment = reward
        .checked_mul(ACC_REWARD_PRECISION)
        .ok_or(ArithmeticError::Overflow)?
        / ctx.deposited_balance;

    Ok(Projection {
        acc_reward_per_share: current
            .acc_reward_per_share
            .checked_add(increment)
            .ok_or(ArithmeticError::Overflow)?,
        total_accrued: current
            .total_accrued
            .checked_add(reward)
            .ok_or(ArithmeticError::Overflow)?,
    })
}

/// Settle `pool` at `ctx.now`. Returns `None` when already settled at this instant.
///
/// # Errors
///
/// - [`ConfigError::ZeroTotalAllocation`] if no pool carries weight
/// - [`ArithmeticError::Overflow`] if the accumulator would overflow
///
/// On error the pool is left untouched.
pub fn settle(pool: &mut Pool, ctx: &AccrualContext) -> Result<Option<Settlement>, FarmError> {
    if ctx.total_allocation_weight == 0 {
        return Err(ConfigError::ZeroTotalAllocation.into());
    }
    if ctx.now <= pool.last_settlement_time {
        return Ok(None);
    }

    let projection = project(pool, ctx)?;
    let minted = projection.total_accrued - pool.total_accrued;

    pool.acc_reward_per_share = projection.acc_reward_per_share;
    pool.total_accrued = projection.total_accrued;
    pool.last_settlement_time = ctx.now;

    debug!(
        pool = %pool.id,
        timestamp = ctx.now,
        deposited = ctx.deposited_balance,
        acc = pool.acc_reward_per_share,
        minted,
        "settled pool"
    );

    Ok(Some(Settlement {
        pool_id: pool.id,
        timestamp: ctx.now,
        deposited_balance: ctx.deposited_balance,
        acc_reward_per_share: pool.acc_reward_per_share,
        minted,
    }))
}
