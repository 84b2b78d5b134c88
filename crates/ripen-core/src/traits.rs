//! Trait interfaces for the collaborators the engine consumes.
//!
//! - [`CurveOracle`]: maturity curve, one per pool (ripen-curve implements)
//! - [`TokenLedger`]: balances and transfers of deposit and reward assets
//! - [`RewardHook`]: optional per-pool notification on every position change
//! - [`PositionIdentity`]: who currently controls a position id
//! - [`Clock`]: native time source, scaled at the boundary

use crate::error::{HookError, TransferError};
use crate::types::{AccountId, AssetId, PoolId, PositionId};

/// Monotonic maturity curve.
///
/// Values are only ever compared against each other, never used as an
/// absolute rate, so the unit is whatever the implementation chooses.
pub trait CurveOracle: Send + Sync {
    /// Curve value for a position or pool that has matured for `maturity` scaled ticks.
    fn evaluate(&self, maturity: u64) -> u128;
}

/// Balances and movement of fungible assets.
///
/// Each `transfer` call must be atomic: it either moves the full amount or
/// leaves both balances untouched.
pub trait TokenLedger: Send + Sync {
    /// Current balance of `asset` held by `account`.
    fn balance_of(&self, asset: AssetId, account: AccountId) -> u128;

    /// Move `amount` of `asset` from `from` to `to`.
    fn transfer(
        &self,
        asset: AssetId,
        from: AccountId,
        to: AccountId,
        amount: u128,
    ) -> Result<(), TransferError>;
}

/// Side-channel notified after a position's ledger entry changes.
pub trait RewardHook: Send + Sync {
    /// `reward_delta` is the payout of this call (zero for pure balance changes)
    /// and `new_amount` the position amount after the call.
    fn on_reward(
        &self,
        pool: PoolId,
        trigger: AccountId,
        beneficiary: AccountId,
        reward_delta: u128,
        new_amount: u128,
    ) -> Result<(), HookError>;
}

/// Resolves the account currently controlling a position id.
///
/// Authoritative on every call; the engine never caches the answer.
pub trait PositionIdentity: Send + Sync {
    fn owner_of(&self, position: PositionId) -> Option<AccountId>;
}

/// Native time source in whole seconds.
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> u64;
}
