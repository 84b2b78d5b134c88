//! In-memory collaborators for tests and simulation.
//!
//! No persistence, unbounded growth. The production integration supplies
//! its own [`TokenLedger`], [`PositionIdentity`], and [`RewardHook`].

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use ripen_core::error::{HookError, TransferError};
use ripen_core::traits::{PositionIdentity, RewardHook, TokenLedger};
use ripen_core::types::{AccountId, AssetId, PoolId, PositionId};

/// Balance map with mint and failure injection.
#[derive(Debug, Default)]
pub struct MemoryTokenLedger {
    balances: Mutex<HashMap<(AssetId, AccountId), u128>>,
    frozen: RwLock<HashSet<AccountId>>,
}

impl MemoryTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `amount` of `asset` to `account` out of thin air.
    pub fn mint(&self, asset: AssetId, account: AccountId, amount: u128) {
        let mut balances = self.balances.lock();
        let entry = balances.entry((asset, account)).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Reject every transfer out of `account` until [`thaw`](Self::thaw).
    pub fn freeze(&self, account: AccountId) {
        self.frozen.write().insert(account);
    }

    pub fn thaw(&self, account: AccountId) {
        self.frozen.write().remove(&account);
    }
}

impl TokenLedger for MemoryTokenLedger {
    fn balance_of(&self, asset: AssetId, account: AccountId) -> u128 {
        self.balances
            .lock()
            .get(&(asset, account))
            .copied()
            .unwrap_or(0)
    }

    fn transfer(
        &self,
        asset: AssetId,
        from: AccountId,
        to: AccountId,
        amount: u128,
    ) -> Result<(), TransferError> {
        if self.frozen.read().contains(&from) {
            return Err(TransferError::Rejected(format!("{from} is frozen")));
        }

        let mut balances = self.balances.lock();
        let have = balances.get(&(asset, from)).copied().unwrap_or(0);
        if have < amount {
            return Err(TransferError::InsufficientBalance {
                asset,
                account: from,
                have,
                need: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        let received = balances
            .get(&(asset, to))
            .copied()
            .unwrap_or(0)
            .checked_add(amount)
            .ok_or_else(|| TransferError::Rejected(format!("{to} balance overflow")))?;
        balances.insert((asset, from), have - amount);
        balances.insert((asset, to), received);
        Ok(())
    }
}

/// Position ownership registry, minting sequential ids.
#[derive(Debug)]
pub struct MemoryIdentity {
    owners: RwLock<HashMap<PositionId, AccountId>>,
    next_id: AtomicU64,
}

impl Default for MemoryIdentity {
    fn default() -> Self {
        Self {
            owners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl MemoryIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh position id controlled by `owner`.
    pub fn mint(&self, owner: AccountId) -> PositionId {
        let id = PositionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.owners.write().insert(id, owner);
        id
    }

    /// Hand control of `position` to `to`. Returns false for unknown ids.
    pub fn transfer(&self, position: PositionId, to: AccountId) -> bool {
        match self.owners.write().get_mut(&position) {
            Some(owner) => {
                *owner = to;
                true
            }
            None => false,
        }
    }

    pub fn burn(&self, position: PositionId) {
        self.owners.write().remove(&position);
    }
}

impl PositionIdentity for MemoryIdentity {
    fn owner_of(&self, position: PositionId) -> Option<AccountId> {
        self.owners.read().get(&position).copied()
    }
}

/// One observed [`RewardHook::on_reward`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HookCall {
    pub pool: PoolId,
    pub trigger: AccountId,
    pub beneficiary: AccountId,
    pub reward_delta: u128,
    pub new_amount: u128,
}

/// Hook that records every call and can be told to reject.
#[derive(Debug, Default)]
pub struct RecordingHook {
    calls: Mutex<Vec<HookCall>>,
    reject: RwLock<Option<String>>,
}

impl RecordingHook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<HookCall> {
        self.calls.lock().clone()
    }

    /// Make every following call fail with `reason`; `None` accepts again.
    pub fn set_reject(&self, reason: Option<&str>) {
        *self.reject.write() = reason.map(str::to_string);
    }
}

impl RewardHook for RecordingHook {
    fn on_reward(
        &self,
        pool: PoolId,
        trigger: AccountId,
        beneficiary: AccountId,
        reward_delta: u128,
        new_amount: u128,
    ) -> Result<(), HookError> {
        if let Some(reason) = self.reject.read().clone() {
            return Err(HookError::Rejected { pool, reason });
        }
        self.calls.lock().push(HookCall {
            pool,
            trigger,
            beneficiary,
            reward_delta,
            new_amount,
        });
        Ok(())
    }
}
