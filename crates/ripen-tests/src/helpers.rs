//! Shared test helpers for integration and property tests.

use std::sync::Arc;

use ripen_core::time::ManualClock;
use ripen_core::traits::{CurveOracle, TokenLedger};
use ripen_core::types::{AccountId, AssetId, PoolId, PositionId};
use ripen_engine::memory::{MemoryIdentity, MemoryTokenLedger};
use ripen_engine::{EngineConfig, Farm};

/// Native seconds the test clock starts at.
pub const GENESIS_SECS: u64 = 1_700_000_000;

/// Treasury funding large enough that no test runs it dry.
pub const TREASURY_FUNDING: u128 = u128::MAX / 4;

/// Test account for seed `n`. Seeds start well clear of vault and treasury.
pub fn account(n: u64) -> AccountId {
    AccountId(1_000 + n)
}

/// Deposit asset for seed `n`. Never collides with the reward asset.
pub fn lp(n: u32) -> AssetId {
    AssetId(100 + n)
}

/// A farm wired to in-memory collaborators and a manual clock.
pub struct Harness {
    pub farm: Farm,
    pub tokens: Arc<MemoryTokenLedger>,
    pub identity: Arc<MemoryIdentity>,
    pub clock: Arc<ManualClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let tokens = Arc::new(MemoryTokenLedger::new());
        let identity = Arc::new(MemoryIdentity::new());
        let clock = Arc::new(ManualClock::new(GENESIS_SECS));
        tokens.mint(config.reward_asset, config.treasury, TREASURY_FUNDING);
        let farm = Farm::new(config, tokens.clone(), identity.clone(), clock.clone())
            .expect("valid config");
        Self {
            farm,
            tokens,
            identity,
            clock,
        }
    }

    /// Register a pool for `asset`.
    pub fn pool(&mut self, asset: AssetId, weight: u64, curve: Arc<dyn CurveOracle>) -> PoolId {
        self.farm
            .add_pool(asset, weight, curve, None)
            .expect("pool registers")
    }

    /// Mint `amount` of `asset` to `owner` plus a fresh position id for them.
    pub fn fund(&self, owner: AccountId, asset: AssetId, amount: u128) -> PositionId {
        self.tokens.mint(asset, owner, amount);
        self.identity.mint(owner)
    }

    /// Fund `owner` and deposit everything into `pool` in one go.
    pub fn open(&mut self, pool: PoolId, owner: AccountId, amount: u128) -> PositionId {
        let asset = self.farm.pool_info(pool).expect("pool exists").deposit_asset;
        let id = self.fund(owner, asset, amount);
        self.farm
            .deposit(pool, id, amount, owner)
            .expect("deposit succeeds");
        id
    }

    pub fn advance(&self, secs: u64) {
        self.clock.advance(secs);
    }

    pub fn balance(&self, asset: AssetId, account: AccountId) -> u128 {
        self.tokens.balance_of(asset, account)
    }

    pub fn reward_balance(&self, account: AccountId) -> u128 {
        self.balance(self.farm.config().reward_asset, account)
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
