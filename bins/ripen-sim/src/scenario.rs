//! Scenario files and the runner that replays them.
//!
//! A scenario lists the pools to register and a sequence of steps. Positions
//! are referred to by name; the first deposit under a new name mints a
//! position owned by the depositing account. Deposits mint the deposited
//! amount to the account first, so scenarios never need separate funding.
//!
//! ```json
//! {
//!   "pools": [{ "asset": 7, "weight": 1, "curve": { "kind": "root", "floor": 1000, "scale": 1000000 } }],
//!   "steps": [
//!     { "deposit": { "position": "alice", "account": 100, "pool": 0, "amount": 1000 } },
//!     { "advance": { "secs": 3600 } },
//!     { "harvest": { "position": "alice" } }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use ripen_core::error::PositionError;
use ripen_core::time::ManualClock;
use ripen_core::traits::{Clock, PositionIdentity, TokenLedger};
use ripen_core::types::{AccountId, AssetId, PoolId, PositionId};
use ripen_curve::CurveSpec;
use ripen_engine::memory::{MemoryIdentity, MemoryTokenLedger};
use ripen_engine::{EngineConfig, Farm, FarmEvent, PendingReward, PoolInfo, PoolUpdate, Position};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

fn default_start_secs() -> u64 {
    1_700_000_000
}

fn default_treasury_funding() -> u128 {
    u128::MAX / 4
}

fn default_weight() -> u64 {
    1
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Native seconds the clock starts at.
    #[serde(default = "default_start_secs")]
    pub start_secs: u64,
    pub emission_rate: Option<u128>,
    pub time_scale: Option<u64>,
    #[serde(default = "default_treasury_funding")]
    pub treasury_funding: u128,
    pub pools: Vec<PoolSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolSpec {
    pub asset: u32,
    #[serde(default = "default_weight")]
    pub weight: u64,
    pub curve: CurveSpec,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Deposit {
        position: String,
        account: u64,
        pool: u32,
        amount: u128,
    },
    Withdraw { position: String, amount: u128 },
    Harvest { position: String },
    WithdrawAndHarvest { position: String, amount: u128 },
    EmergencyWithdraw { position: String },
    /// Hand the position to another account.
    Transfer { position: String, to: u64 },
    Advance { secs: u64 },
    SetWeight { pool: u32, weight: u64 },
    SettleAll,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub config: EngineConfig,
    pub final_secs: u64,
    pub pools: Vec<PoolInfo>,
    pub positions: Vec<PositionReport>,
    pub rewards: Vec<AccountReward>,
    pub failures: Vec<Failure>,
    pub events: Vec<FarmEvent>,
}

#[derive(Debug, Serialize)]
pub struct PositionReport {
    pub name: String,
    pub id: PositionId,
    pub owner: Option<AccountId>,
    pub position: Position,
    pub pending: Option<PendingReward>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccountReward {
    pub account: AccountId,
    pub reward: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub step: usize,
    pub error: String,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing scenario {}", path.display()))
    }

    /// Scenario values override `base`.
    pub fn engine_config(&self, base: EngineConfig) -> EngineConfig {
        EngineConfig {
            emission_rate: self.emission_rate.unwrap_or(base.emission_rate),
            time_scale: self.time_scale.unwrap_or(base.time_scale),
            ..base
        }
    }

    /// Replay the scenario against a fresh in-memory farm.
    ///
    /// Rejected steps are recorded in the report and skipped, unless
    /// `strict` is set, in which case the first one aborts the run.
    pub fn run(&self, config: EngineConfig, strict: bool) -> Result<Report> {
        let mut sim = Simulation::new(config, self.start_secs, self.treasury_funding)?;
        for (i, pool) in self.pools.iter().enumerate() {
            let asset = AssetId(pool.asset);
            if asset == sim.farm.config().reward_asset {
                bail!("pool {i} uses the reward asset {asset} as its deposit asset");
            }
            let id = sim
                .farm
                .add_pool(asset, pool.weight, pool.curve.build(), None)
                .with_context(|| format!("registering pool {i}"))?;
            debug!(pool = %id, curve = ?pool.curve, "registered scenario pool");
        }

        let mut failures = Vec::new();
        for (i, step) in self.steps.iter().enumerate() {
            if let Err(e) = sim.apply(step) {
                if strict {
                    return Err(e).with_context(|| format!("step {i} ({step:?})"));
                }
                warn!(step = i, error = %e, "step rejected");
                failures.push(Failure {
                    step: i,
                    error: e.to_string(),
                });
            }
        }

        info!(
            steps = self.steps.len(),
            failures = failures.len(),
            "scenario complete"
        );
        Ok(sim.report(failures))
    }
}

/// A farm plus the in-memory world it runs in.
struct Simulation {
    farm: Farm,
    tokens: Arc<MemoryTokenLedger>,
    identity: Arc<MemoryIdentity>,
    clock: Arc<ManualClock>,
    positions: BTreeMap<String, PositionId>,
    accounts: Vec<AccountId>,
}

impl Simulation {
    fn new(config: EngineConfig, start_secs: u64, treasury_funding: u128) -> Result<Self> {
        let tokens = Arc::new(MemoryTokenLedger::new());
        let identity = Arc::new(MemoryIdentity::new());
        let clock = Arc::new(ManualClock::new(start_secs));
        tokens.mint(config.reward_asset, config.treasury, treasury_funding);
        let farm = Farm::new(config, tokens.clone(), identity.clone(), clock.clone())
            .context("invalid engine config")?;
        Ok(Self {
            farm,
            tokens,
            identity,
            clock,
            positions: BTreeMap::new(),
            accounts: Vec::new(),
        })
    }

    fn apply(&mut self, step: &Step) -> Result<()> {
        match step {
            Step::Deposit {
                position,
                account,
                pool,
                amount,
            } => {
                let account = AccountId(*account);
                let pool = PoolId(*pool);
                let asset = self.farm.pool_info(pool)?.deposit_asset;
                let id = match self.positions.get(position) {
                    Some(&id) => id,
                    None => {
                        let id = self.identity.mint(account);
                        self.positions.insert(position.clone(), id);
                        id
                    }
                };
                if !self.accounts.contains(&account) {
                    self.accounts.push(account);
                }
                self.tokens.mint(asset, account, *amount);
                self.farm.deposit(pool, id, *amount, account)?;
            }
            Step::Withdraw { position, amount } => {
                let (id, owner) = self.lookup(position)?;
                self.farm.withdraw(id, *amount, owner)?;
            }
            Step::Harvest { position } => {
                let (id, owner) = self.lookup(position)?;
                self.farm.harvest(id, owner)?;
            }
            Step::WithdrawAndHarvest { position, amount } => {
                let (id, owner) = self.lookup(position)?;
                self.farm.withdraw_and_harvest(id, *amount, owner)?;
            }
            Step::EmergencyWithdraw { position } => {
                let (id, owner) = self.lookup(position)?;
                self.farm.emergency_withdraw(id, owner)?;
            }
            Step::Transfer { position, to } => {
                let (id, _) = self.lookup(position)?;
                let to = AccountId(*to);
                self.identity.transfer(id, to);
                if !self.accounts.contains(&to) {
                    self.accounts.push(to);
                }
            }
            Step::Advance { secs } => self.clock.advance(*secs),
            Step::SetWeight { pool, weight } => {
                self.farm.set_pool(
                    PoolId(*pool),
                    PoolUpdate {
                        allocation_weight: Some(*weight),
                        ..PoolUpdate::default()
                    },
                )?;
            }
            Step::SettleAll => self.farm.settle_all()?,
        }
        Ok(())
    }

    /// Position id and current owner for a scenario name.
    fn lookup(&self, name: &str) -> Result<(PositionId, AccountId)> {
        let Some(&id) = self.positions.get(name) else {
            bail!("no position named {name:?}");
        };
        let owner = self
            .identity
            .owner_of(id)
            .ok_or(PositionError::NoOwner(id))?;
        Ok((id, owner))
    }

    fn report(mut self, failures: Vec<Failure>) -> Report {
        let pools = (0..self.farm.pool_count() as u32)
            .filter_map(|i| self.farm.pool_info(PoolId(i)).ok())
            .collect();
        let positions = self
            .positions
            .iter()
            .filter_map(|(name, &id)| {
                let position = self.farm.position(id)?;
                Some(PositionReport {
                    name: name.clone(),
                    id,
                    owner: self.identity.owner_of(id),
                    position,
                    pending: self.farm.pending_reward(id).ok(),
                })
            })
            .collect();
        let reward_asset = self.farm.config().reward_asset;
        let rewards = self
            .accounts
            .iter()
            .map(|&account| AccountReward {
                account,
                reward: self.tokens.balance_of(reward_asset, account),
            })
            .collect();

        Report {
            config: self.farm.config().clone(),
            final_secs: self.clock.now_secs(),
            pools,
            positions,
            rewards,
            failures,
            events: self.farm.take_events(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const ONE: u128 = 1_000_000_000_000_000_000;

    fn write_scenario(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn replays_a_year_for_a_sole_depositor() {
        let file = write_scenario(
            r#"{
                "pools": [{ "asset": 7, "curve": { "kind": "flat", "value": 1 } }],
                "steps": [
                    { "deposit": { "position": "alice", "account": 100, "pool": 0, "amount": 1000000000000000000 } },
                    { "advance": { "secs": 31557602 } },
                    { "harvest": { "position": "alice" } }
                ]
            }"#,
        );
        let scenario = Scenario::load(file.path()).unwrap();
        let report = scenario.run(EngineConfig::default(), true).unwrap();

        assert!(report.failures.is_empty());
        assert_eq!(
            report.rewards,
            vec![AccountReward {
                account: AccountId(100),
                reward: 3_155_760_200 * 1_000_000_000,
            }]
        );
        assert_eq!(report.positions.len(), 1);
        assert_eq!(report.positions[0].position.amount, ONE);
        assert_eq!(report.final_secs, 1_700_000_000 + 31_557_602);
        assert!(report
            .events
            .iter()
            .any(|e| matches!(e, FarmEvent::Harvest { .. })));
    }

    #[test]
    fn rejected_steps_are_recorded() {
        let file = write_scenario(
            r#"{
                "pools": [{ "asset": 7, "weight": 2, "curve": { "kind": "root", "floor": 1000, "scale": 1000000 } }],
                "steps": [
                    { "harvest": { "position": "ghost" } },
                    { "deposit": { "position": "bob", "account": 101, "pool": 0, "amount": 50 } },
                    { "withdraw": { "position": "bob", "amount": 51 } },
                    { "advance": { "secs": 10 } },
                    "settle_all",
                    { "withdraw_and_harvest": { "position": "bob", "amount": 50 } }
                ]
            }"#,
        );
        let scenario = Scenario::load(file.path()).unwrap();
        let report = scenario.run(EngineConfig::default(), false).unwrap();

        let failed: Vec<_> = report.failures.iter().map(|f| f.step).collect();
        assert_eq!(failed, vec![0, 2]);
        assert!(report.positions.is_empty());
        assert_eq!(report.pools[0].deposited_balance, 0);
        assert!(report.rewards[0].reward > 0);
    }

    #[test]
    fn strict_mode_stops_at_first_rejection() {
        let file = write_scenario(
            r#"{
                "pools": [{ "asset": 7, "curve": { "kind": "flat", "value": 1 } }],
                "steps": [{ "emergency_withdraw": { "position": "nobody" } }]
            }"#,
        );
        let scenario = Scenario::load(file.path()).unwrap();
        assert!(scenario.run(EngineConfig::default(), true).is_err());
    }

    #[test]
    fn reward_asset_cannot_back_a_pool() {
        let file = write_scenario(
            r#"{ "pools": [{ "asset": 0, "curve": { "kind": "flat", "value": 1 } }] }"#,
        );
        let scenario = Scenario::load(file.path()).unwrap();
        assert!(scenario.run(EngineConfig::default(), false).is_err());
    }

    #[test]
    fn scenario_overrides_engine_defaults() {
        let file = write_scenario(
            r#"{ "emission_rate": 5, "time_scale": 1, "pools": [] }"#,
        );
        let scenario = Scenario::load(file.path()).unwrap();
        let config = scenario.engine_config(EngineConfig::default());
        assert_eq!(config.emission_rate, 5);
        assert_eq!(config.time_scale, 1);
        assert_eq!(config.vault, EngineConfig::default().vault);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let file = write_scenario(r#"{ "pools": [], "bogus": 1 }"#);
        assert!(Scenario::load(file.path()).is_err());
    }
}
