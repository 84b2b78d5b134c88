//! Pool ledger: one entry per accepted deposit asset, stored in an arena
//! indexed by [`PoolId`].
//!
//! The ledger keeps `total_allocation_weight` equal to the sum of every
//! pool's weight; [`PoolLedger::register`] and [`PoolLedger::set_weight`]
//! are the only paths that change a weight.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ripen_core::error::ConfigError;
use ripen_core::traits::{CurveOracle, RewardHook};
use ripen_core::types::{AssetId, PoolId, Timestamp};
use serde::{Deserialize, Serialize};

/// Reward-emitting bucket for one deposit asset.
#[derive(Clone)]
pub struct Pool {
    pub id: PoolId,
    pub deposit_asset: AssetId,
    pub allocation_weight: u64,
    /// Reward per deposited unit, scaled by `ACC_REWARD_PRECISION`. Never decreases.
    pub acc_reward_per_share: u128,
    pub last_settlement_time: Timestamp,
    /// Weighted-average entry time of everything deposited. Never after "now".
    pub average_entry_time: Timestamp,
    /// Reward minted into the accumulator since creation.
    pub total_accrued: u128,
    /// Reward paid out of this pool since creation.
    pub total_distributed: u128,
    pub curve: Arc<dyn CurveOracle>,
    pub hook: Option<Arc<dyn RewardHook>>,
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("id", &self.id)
            .field("deposit_asset", &self.deposit_asset)
            .field("allocation_weight", &self.allocation_weight)
            .field("acc_reward_per_share", &self.acc_reward_per_share)
            .field("last_settlement_time", &self.last_settlement_time)
            .field("average_entry_time", &self.average_entry_time)
            .field("total_accrued", &self.total_accrued)
            .field("total_distributed", &self.total_distributed)
            .field("has_hook", &self.hook.is_some())
            .finish()
    }
}

impl Pool {
    /// Reward accrued but not yet paid out.
    pub fn undistributed(&self) -> u128 {
        self.total_accrued.saturating_sub(self.total_distributed)
    }

    pub fn info(&self, deposited_balance: u128) -> PoolInfo {
        PoolInfo {
            id: self.id,
            deposit_asset: self.deposit_asset,
            allocation_weight: self.allocation_weight,
            acc_reward_per_share: self.acc_reward_per_share,
            last_settlement_time: self.last_settlement_time,
            average_entry_time: self.average_entry_time,
            total_accrued: self.total_accrued,
            total_distributed: self.total_distributed,
            deposited_balance,
        }
    }
}

/// Plain snapshot of a pool for queries and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolInfo {
    pub id: PoolId,
    pub deposit_asset: AssetId,
    pub allocation_weight: u64,
    pub acc_reward_per_share: u128,
    pub last_settlement_time: Timestamp,
    pub average_entry_time: Timestamp,
    pub total_accrued: u128,
    pub total_distributed: u128,
    pub deposited_balance: u128,
}

/// Arena of pools plus the weight total and the asset index.
#[derive(Debug, Clone, Default)]
pub struct PoolLedger {
    pools: Vec<Pool>,
    by_asset: HashMap<AssetId, PoolId>,
    total_allocation_weight: u64,
}

impl PoolLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pool for `asset`, starting its clocks at `now`.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::DuplicateAsset`] if `asset` already backs a pool
    pub fn register(
        &mut self,
        asset: AssetId,
        allocation_weight: u64,
        curve: Arc<dyn CurveOracle>,
        hook: Option<Arc<dyn RewardHook>>,
        now: Timestamp,
    ) -> Result<PoolId, ConfigError> {
        if let Some(&existing) = self.by_asset.get(&asset) {
            return Err(ConfigError::DuplicateAsset { asset, existing });
        }
        let total = self
            .total_allocation_weight
            .checked_add(allocation_weight)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "allocation_weight".into(),
                value: allocation_weight.to_string(),
            })?;

        let id = PoolId(self.pools.len() as u32);
        self.pools.push(Pool {
            id,
            deposit_asset: asset,
            allocation_weight,
            acc_reward_per_share: 0,
            last_settlement_time: now,
            average_entry_time: now,
            total_accrued: 0,
            total_distributed: 0,
            curve,
            hook,
        });
        self.by_asset.insert(asset, id);
        self.total_allocation_weight = total;
        Ok(id)
    }

    /// Change a pool's weight, adjusting the total in the same step.
    pub fn set_weight(&mut self, id: PoolId, allocation_weight: u64) -> Result<(), ConfigError> {
        let current = self.get(id)?.allocation_weight;
        let total = (self.total_allocation_weight - current)
            .checked_add(allocation_weight)
            .ok_or_else(|| ConfigError::InvalidValue {
                key: "allocation_weight".into(),
                value: allocation_weight.to_string(),
            })?;
        self.pools[id.index()].allocation_weight = allocation_weight;
        self.total_allocation_weight = total;
        Ok(())
    }

    pub fn get(&self, id: PoolId) -> Result<&Pool, ConfigError> {
        self.pools.get(id.index()).ok_or(ConfigError::UnknownPool(id))
    }

    pub fn get_mut(&mut self, id: PoolId) -> Result<&mut Pool, ConfigError> {
        self.pools
            .get_mut(id.index())
            .ok_or(ConfigError::UnknownPool(id))
    }

    /// Overwrite the stored pool with a staged copy. Weights are not touched.
    pub(crate) fn commit(&mut self, staged: Pool) {
        let index = staged.id.index();
        debug_assert_eq!(self.pools[index].allocation_weight, staged.allocation_weight);
        self.pools[index] = staged;
    }

    pub fn pool_for_asset(&self, asset: AssetId) -> Option<PoolId> {
        self.by_asset.get(&asset).copied()
    }

    pub fn total_allocation_weight(&self) -> u64 {
        self.total_allocation_weight
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = PoolId> + '_ {
        self.pools.iter().map(|p| p.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Unit;

    impl CurveOracle for Unit {
        fn evaluate(&self, _maturity: u64) -> u128 {
            1
        }
    }

    fn curve() -> Arc<dyn CurveOracle> {
        Arc::new(Unit)
    }

    #[test]
    fn register_assigns_sequential_ids() {
        let mut ledger = PoolLedger::new();
        let a = ledger.register(AssetId(10), 3, curve(), None, 5).unwrap();
        let b = ledger.register(AssetId(11), 7, curve(), None, 6).unwrap();
        assert_eq!(a, PoolId(0));
        assert_eq!(b, PoolId(1));
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.total_allocation_weight(), 10);
        assert_eq!(ledger.pool_for_asset(AssetId(11)), Some(b));

        let pool = ledger.get(b).unwrap();
        assert_eq!(pool.last_settlement_time, 6);
        assert_eq!(pool.average_entry_time, 6);
        assert_eq!(pool.acc_reward_per_share, 0);
    }

    #[test]
    fn duplicate_asset_rejected_without_change() {
        let mut ledger = PoolLedger::new();
        ledger.register(AssetId(10), 3, curve(), None, 0).unwrap();
        let err = ledger.register(AssetId(10), 9, curve(), None, 0).unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateAsset {
                asset: AssetId(10),
                existing: PoolId(0)
            }
        );
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.total_allocation_weight(), 3);
    }

    #[test]
    fn set_weight_keeps_total_in_sync() {
        let mut ledger = PoolLedger::new();
        let a = ledger.register(AssetId(1), 3, curve(), None, 0).unwrap();
        let b = ledger.register(AssetId(2), 7, curve(), None, 0).unwrap();
        ledger.set_weight(a, 10).unwrap();
        assert_eq!(ledger.total_allocation_weight(), 17);
        ledger.set_weight(b, 0).unwrap();
        assert_eq!(ledger.total_allocation_weight(), 10);
        let sum: u64 = ledger
            .ids()
            .map(|id| ledger.get(id).unwrap().allocation_weight)
            .sum();
        assert_eq!(sum, ledger.total_allocation_weight());
    }

    #[test]
    fn weight_overflow_rejected() {
        let mut ledger = PoolLedger::new();
        ledger.register(AssetId(1), u64::MAX, curve(), None, 0).unwrap();
        assert!(ledger.register(AssetId(2), 1, curve(), None, 0).is_err());
        assert_eq!(ledger.total_allocation_weight(), u64::MAX);
    }

    #[test]
    fn unknown_pool() {
        let mut ledger = PoolLedger::new();
        assert_eq!(ledger.get(PoolId(0)).unwrap_err(), ConfigError::UnknownPool(PoolId(0)));
        assert!(ledger.set_weight(PoolId(4), 1).is_err());
    }

    #[test]
    fn commit_replaces_only_the_staged_pool() {
        let mut ledger = PoolLedger::new();
        let a = ledger.register(AssetId(1), 2, curve(), None, 0).unwrap();
        let b = ledger.register(AssetId(2), 5, curve(), None, 0).unwrap();
        let mut staged = ledger.get(b).unwrap().clone();
        staged.acc_reward_per_share = 42;
        staged.last_settlement_time = 9;
        ledger.commit(staged);

        let pool = ledger.get(b).unwrap();
        assert_eq!(pool.acc_reward_per_share, 42);
        assert_eq!(pool.last_settlement_time, 9);
        assert_eq!(ledger.get(a).unwrap().acc_reward_per_share, 0);
        assert_eq!(ledger.total_allocation_weight(), 7);
    }

    #[test]
    fn undistributed_saturates() {
        let mut ledger = PoolLedger::new();
        let id = ledger.register(AssetId(1), 1, curve(), None, 0).unwrap();
        let pool = ledger.get_mut(id).unwrap();
        pool.total_accrued = 10;
        pool.total_distributed = 4;
        assert_eq!(pool.undistributed(), 6);
        pool.total_distributed = 12;
        assert_eq!(pool.undistributed(), 0);
    }
}
