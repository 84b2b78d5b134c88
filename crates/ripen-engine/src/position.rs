//! Position ledger and the reward-debt arithmetic.
//!
//! `pending = amount * acc_reward_per_share / ACC_REWARD_PRECISION - reward_debt`.
//! Right after a position is settled its pending reward is zero.

use std::collections::HashMap;

use ripen_core::constants::ACC_REWARD_PRECISION;
use ripen_core::error::ArithmeticError;
use ripen_core::types::{PoolId, PositionId, Timestamp};
use serde::{Deserialize, Serialize};

/// One deposit lineage inside a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub pool_id: PoolId,
    pub amount: u128,
    pub reward_debt: i128,
    /// Effective age origin; moved by every deposit and withdrawal.
    pub entry_time: Timestamp,
}

impl Position {
    /// Empty lineage in `pool_id`, ready for its first deposit.
    pub fn empty(pool_id: PoolId) -> Self {
        Self {
            pool_id,
            amount: 0,
            reward_debt: 0,
            entry_time: 0,
        }
    }

    /// Reward owed at `acc_reward_per_share`, before the emission modifier.
    pub fn pending(&self, acc_reward_per_share: u128) -> Result<i128, ArithmeticError> {
        accumulated(self.amount, acc_reward_per_share)?
            .checked_sub(self.reward_debt)
            .ok_or(ArithmeticError::Underflow)
    }

    /// Non-negative pending reward; a negative balance is an accounting fault.
    pub fn payable(&self, acc_reward_per_share: u128) -> Result<u128, ArithmeticError> {
        let pending = self.pending(acc_reward_per_share)?;
        u128::try_from(pending).map_err(|_| ArithmeticError::NegativePending(pending))
    }

    /// Take `amount` out of the position, leaving its pending reward unchanged.
    ///
    /// The debt drops by the difference of the two truncated products, not
    /// by `accumulated(amount)`, so rounding cannot push pending below zero.
    pub fn reduce(&mut self, amount: u128, acc_reward_per_share: u128) -> Result<(), ArithmeticError> {
        let remaining = self
            .amount
            .checked_sub(amount)
            .ok_or(ArithmeticError::Underflow)?;
        let released = accumulated(self.amount, acc_reward_per_share)?
            - accumulated(remaining, acc_reward_per_share)?;
        self.reward_debt = self
            .reward_debt
            .checked_sub(released)
            .ok_or(ArithmeticError::Underflow)?;
        self.amount = remaining;
        Ok(())
    }
}

/// `amount * acc / ACC_REWARD_PRECISION` as a signed debt quantity.
pub fn accumulated(amount: u128, acc_reward_per_share: u128) -> Result<i128, ArithmeticError> {
    let value = amount
        .checked_mul(acc_reward_per_share)
        .ok_or(ArithmeticError::Overflow)?
        / ACC_REWARD_PRECISION;
    i128::try_from(value).map_err(|_| ArithmeticError::Overflow)
}

/// Live positions keyed by id. Closed positions are absent, not zeroed.
#[derive(Debug, Clone, Default)]
pub struct PositionLedger {
    positions: HashMap<PositionId, Position>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: PositionId) -> Option<&Position> {
        self.positions.get(&id)
    }

    /// Store a staged position, erasing it when its amount reached zero.
    pub(crate) fn commit(&mut self, id: PositionId, position: Position) {
        if position.amount == 0 {
            self.positions.remove(&id);
        } else {
            self.positions.insert(id, position);
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Every live position in `pool_id`, in no particular order.
    pub fn in_pool(&self, pool_id: PoolId) -> impl Iterator<Item = (PositionId, &Position)> + '_ {
        self.positions
            .iter()
            .filter(move |(_, p)| p.pool_id == pool_id)
            .map(|(id, p)| (*id, p))
    }
}
