//! Ledger events. Buffered by the farm and only recorded for operations
//! that completed.

use ripen_core::types::{AccountId, AssetId, PoolId, PositionId, Timestamp};
use serde::Serialize;

use crate::accrual::Settlement;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FarmEvent {
    PoolAdded {
        pool: PoolId,
        asset: AssetId,
        allocation_weight: u64,
        total_allocation_weight: u64,
    },
    PoolUpdated {
        pool: PoolId,
        allocation_weight: u64,
        total_allocation_weight: u64,
        curve_replaced: bool,
        hook_replaced: bool,
    },
    PoolSettled {
        pool: PoolId,
        timestamp: Timestamp,
        deposited_balance: u128,
        acc_reward_per_share: u128,
    },
    Deposit {
        position: PositionId,
        pool: PoolId,
        from: AccountId,
        amount: u128,
    },
    Withdraw {
        position: PositionId,
        pool: PoolId,
        to: AccountId,
        amount: u128,
    },
    Harvest {
        position: PositionId,
        pool: PoolId,
        to: AccountId,
        pending: u128,
        paid: u128,
    },
    EmergencyWithdraw {
        position: PositionId,
        pool: PoolId,
        to: AccountId,
        amount: u128,
    },
}

impl From<Settlement> for FarmEvent {
    fn from(s: Settlement) -> Self {
        Self::PoolSettled {
            pool: s.pool_id,
            timestamp: s.timestamp,
            deposited_balance: s.deposited_balance,
            acc_reward_per_share: s.acc_reward_per_share,
        }
    }
}
