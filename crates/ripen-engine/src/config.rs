//! Engine configuration.
//!
//! Provides [`EngineConfig`] with defaults for the emission rate, the native
//! to ledger time scale, and the two custody accounts. Values can be set
//! programmatically or overridden from the environment.

use ripen_core::constants::{DEFAULT_EMISSION_RATE, TIME_SCALE};
use ripen_core::error::ConfigError;
use ripen_core::types::{AccountId, AssetId};
use serde::{Deserialize, Serialize};

/// Account that custodies deposited assets by default.
pub const DEFAULT_VAULT: AccountId = AccountId(0);

/// Account that funds reward payouts by default.
pub const DEFAULT_TREASURY: AccountId = AccountId(1);

/// Asset paid out as reward by default.
pub const DEFAULT_REWARD_ASSET: AssetId = AssetId(0);

/// Configuration for a [`Farm`](crate::farm::Farm).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Reward base units emitted per scaled tick, shared across all pools.
    pub emission_rate: u128,
    /// Native seconds are multiplied by this before entering the ledger.
    pub time_scale: u64,
    /// Holder of every pool's deposited asset; its balance is the pool balance.
    pub vault: AccountId,
    /// Source of reward payouts.
    pub treasury: AccountId,
    /// Asset paid out on harvest.
    pub reward_asset: AssetId,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            emission_rate: DEFAULT_EMISSION_RATE,
            time_scale: TIME_SCALE,
            vault: DEFAULT_VAULT,
            treasury: DEFAULT_TREASURY,
            reward_asset: DEFAULT_REWARD_ASSET,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `RIPEN_EMISSION_RATE` and `RIPEN_TIME_SCALE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup("RIPEN_EMISSION_RATE") {
            config.emission_rate = parse_var("RIPEN_EMISSION_RATE", &raw)?;
        }
        if let Some(raw) = lookup("RIPEN_TIME_SCALE") {
            config.time_scale = parse_var("RIPEN_TIME_SCALE", &raw)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the ledger cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.time_scale == 0 {
            return Err(ConfigError::ZeroTimeScale);
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
    })
}
