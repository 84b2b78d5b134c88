//! Thread-safe handle around a [`Farm`].
//!
//! Every mutating call takes the write lock, so operations are serialized
//! exactly as the single-threaded ledger expects. Queries take the read lock
//! and run concurrently with each other, never with a mutation.

use std::sync::Arc;

use parking_lot::RwLock;
use ripen_core::error::FarmError;
use ripen_core::traits::{CurveOracle, RewardHook};
use ripen_core::types::{AccountId, AssetId, PoolId, PositionId};

use crate::events::FarmEvent;
use crate::farm::{Farm, PendingReward, PoolUpdate};
use crate::pool::PoolInfo;
use crate::position::Position;

/// Cloneable, `Send + Sync` handle to one farm.
#[derive(Clone)]
pub struct SharedFarm {
    inner: Arc<RwLock<Farm>>,
}

impl SharedFarm {
    pub fn new(farm: Farm) -> Self {
        Self {
            inner: Arc::new(RwLock::new(farm)),
        }
    }

    pub fn add_pool(
        &self,
        asset: AssetId,
        allocation_weight: u64,
        curve: Arc<dyn CurveOracle>,
        hook: Option<Arc<dyn RewardHook>>,
    ) -> Result<PoolId, FarmError> {
        self.inner.write().add_pool(asset, allocation_weight, curve, hook)
    }

    pub fn set_pool(&self, id: PoolId, update: PoolUpdate) -> Result<(), FarmError> {
        self.inner.write().set_pool(id, update)
    }

    pub fn settle_pool(&self, id: PoolId) -> Result<PoolInfo, FarmError> {
        self.inner.write().settle_pool(id)
    }

    pub fn settle_all(&self) -> Result<(), FarmError> {
        self.inner.write().settle_all()
    }

    pub fn deposit(
        &self,
        pool: PoolId,
        position: PositionId,
        amount: u128,
        from: AccountId,
    ) -> Result<(), FarmError> {
        self.inner.write().deposit(pool, position, amount, from)
    }

    pub fn withdraw(&self, position: PositionId, amount: u128, caller: AccountId) -> Result<(), FarmError> {
        self.inner.write().withdraw(position, amount, caller)
    }

    pub fn harvest(&self, position: PositionId, caller: AccountId) -> Result<u128, FarmError> {
        self.inner.write().harvest(position, caller)
    }

    pub fn withdraw_and_harvest(
        &self,
        position: PositionId,
        amount: u128,
        caller: AccountId,
    ) -> Result<u128, FarmError> {
        self.inner.write().withdraw_and_harvest(position, amount, caller)
    }

    pub fn emergency_withdraw(&self, position: PositionId, caller: AccountId) -> Result<u128, FarmError> {
        self.inner.write().emergency_withdraw(position, caller)
    }

    pub fn pool_info(&self, id: PoolId) -> Result<PoolInfo, FarmError> {
        self.inner.read().pool_info(id)
    }

    pub fn position(&self, id: PositionId) -> Option<Position> {
        self.inner.read().position(id)
    }

    pub fn pending_reward(&self, id: PositionId) -> Result<PendingReward, FarmError> {
        self.inner.read().pending_reward(id)
    }

    pub fn take_events(&self) -> Vec<FarmEvent> {
        self.inner.write().take_events()
    }

    /// Run `f` against the farm under the read lock.
    pub fn read<T>(&self, f: impl FnOnce(&Farm) -> T) -> T {
        f(&self.inner.read())
    }
}
