//! The operation protocol.
//!
//! Every mutating call runs the same fixed sequence on staged copies of the
//! pool and position:
//!
//! 1. validate the request
//! 2. settle the pool ([`accrual::settle`])
//! 3. track maturity with pre-operation balances ([`maturity`])
//! 4. mutate the position's amount and reward debt
//! 5. compute the modified payout ([`modifier`])
//! 6. run external effects (transfers, then the pool hook)
//!
//! Staged state is committed only after step 6 succeeded, so a rejected call
//! leaves the ledger and the event log exactly as they were. Transfers that
//! already went through are reversed when a later effect fails.

use std::sync::Arc;

use ripen_core::error::{ArithmeticError, ConfigError, FarmError, PositionError};
use ripen_core::time::to_scaled;
use ripen_core::traits::{Clock, CurveOracle, PositionIdentity, RewardHook, TokenLedger};
use ripen_core::types::{AccountId, AssetId, Direction, PoolId, PositionId, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::accrual::{self, AccrualContext, Settlement};
use crate::config::EngineConfig;
use crate::events::FarmEvent;
use crate::maturity;
use crate::modifier::{self, CurveSnapshot};
use crate::pool::{Pool, PoolInfo, PoolLedger};
use crate::position::{accumulated, Position, PositionLedger};

/// Administrative change to a registered pool. `None` leaves a field as is.
#[derive(Clone, Default)]
pub struct PoolUpdate {
    pub allocation_weight: Option<u64>,
    pub curve: Option<Arc<dyn CurveOracle>>,
    /// `Some(None)` removes the hook.
    pub hook: Option<Option<Arc<dyn RewardHook>>>,
}

/// What a harvest would pay right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReward {
    /// Share of the accumulator owed to the position.
    pub pending: u128,
    /// `pending` after the emission modifier and the pool's undistributed cap.
    pub payout: u128,
}

#[derive(Debug, Clone, Copy)]
struct Transfer {
    asset: AssetId,
    from: AccountId,
    to: AccountId,
    amount: u128,
}

#[derive(Debug, Clone, Copy)]
struct HookCall {
    trigger: AccountId,
    beneficiary: AccountId,
    reward_delta: u128,
    new_amount: u128,
}

/// A pool settled at `now` on a staged copy.
struct StagedPool {
    pool: Pool,
    balance: u128,
    settlement: Option<Settlement>,
}

/// Pool and position ledgers plus the collaborators they consume.
///
/// Not thread-safe on its own; wrap in [`SharedFarm`](crate::shared::SharedFarm)
/// to serialize concurrent callers.
pub struct Farm {
    config: EngineConfig,
    pools: PoolLedger,
    positions: PositionLedger,
    tokens: Arc<dyn TokenLedger>,
    identity: Arc<dyn PositionIdentity>,
    clock: Arc<dyn Clock>,
    events: Vec<FarmEvent>,
}

impl Farm {
    pub fn new(
        config: EngineConfig,
        tokens: Arc<dyn TokenLedger>,
        identity: Arc<dyn PositionIdentity>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            pools: PoolLedger::new(),
            positions: PositionLedger::new(),
            tokens,
            identity,
            clock,
            events: Vec::new(),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    /// Register a pool for `asset`.
    ///
    /// Other pools are not settled first; call [`settle_all`](Self::settle_all)
    /// beforehand to close their intervals at the old total weight.
    pub fn add_pool(
        &mut self,
        asset: AssetId,
        allocation_weight: u64,
        curve: Arc<dyn CurveOracle>,
        hook: Option<Arc<dyn RewardHook>>,
    ) -> Result<PoolId, FarmError> {
        let now = self.now()?;
        let id = self
            .pools
            .register(asset, allocation_weight, curve, hook, now)?;
        let total = self.pools.total_allocation_weight();
        info!(pool = %id, %asset, allocation_weight, total, "added pool");
        self.events.push(FarmEvent::PoolAdded {
            pool: id,
            asset,
            allocation_weight,
            total_allocation_weight: total,
        });
        Ok(id)
    }

    /// Change a pool's weight, curve, or hook. Nothing is re-settled.
    pub fn set_pool(&mut self, id: PoolId, update: PoolUpdate) -> Result<(), FarmError> {
        self.pools.get(id)?;
        if let Some(weight) = update.allocation_weight {
            self.pools.set_weight(id, weight)?;
        }
        let curve_replaced = update.curve.is_some();
        let hook_replaced = update.hook.is_some();

        let pool = self.pools.get_mut(id)?;
        if let Some(curve) = update.curve {
            pool.curve = curve;
        }
        if let Some(hook) = update.hook {
            pool.hook = hook;
        }
        let allocation_weight = pool.allocation_weight;
        let total = self.pools.total_allocation_weight();

        info!(pool = %id, allocation_weight, total, curve_replaced, hook_replaced, "updated pool");
        self.events.push(FarmEvent::PoolUpdated {
            pool: id,
            allocation_weight,
            total_allocation_weight: total,
            curve_replaced,
            hook_replaced,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Settlement
    // ------------------------------------------------------------------

    /// Settle one pool at the current time.
    pub fn settle_pool(&mut self, id: PoolId) -> Result<PoolInfo, FarmError> {
        let now = self.now()?;
        let staged = self.stage_pool(id, now)?;
        let info = staged.pool.info(staged.balance);
        self.commit_pool(staged);
        Ok(info)
    }

    /// Settle every pool in id order; none is committed if any fails.
    pub fn settle_all(&mut self) -> Result<(), FarmError> {
        let now = self.now()?;
        let staged = self
            .pools
            .ids()
            .map(|id| self.stage_pool(id, now))
            .collect::<Result<Vec<_>, _>>()?;
        for pool in staged {
            self.commit_pool(pool);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Position operations
    // ------------------------------------------------------------------

    /// Deposit `amount` from `from` into `position`, creating it if absent.
    ///
    /// # Errors
    ///
    /// - [`PositionError::ZeroAmount`] for a zero deposit
    /// - [`PositionError::PoolMismatch`] if the position lives in another pool
    /// - [`ConfigError`] for an unknown pool or zero total weight
    /// - [`FarmError::Transfer`] / [`FarmError::Hook`] from external effects
    pub fn deposit(
        &mut self,
        pool_id: PoolId,
        position_id: PositionId,
        amount: u128,
        from: AccountId,
    ) -> Result<(), FarmError> {
        if amount == 0 {
            return Err(PositionError::ZeroAmount.into());
        }
        let existing = self.positions.get(position_id).copied();
        if let Some(p) = existing.filter(|p| p.pool_id != pool_id) {
            return Err(PositionError::PoolMismatch {
                position: position_id,
                expected: p.pool_id,
                got: pool_id,
            }
            .into());
        }

        let now = self.now()?;
        let mut staged = self.stage_pool(pool_id, now)?;
        let pool = &mut staged.pool;

        pool.average_entry_time = maturity::update_pool_average(
            pool.average_entry_time,
            staged.balance,
            amount,
            Direction::Deposit,
            now,
        )?;
        let mut position = existing.unwrap_or_else(|| Position::empty(pool_id));
        position.entry_time =
            maturity::update_position_entry(position.entry_time, position.amount, amount, now)?;
        position.amount = position
            .amount
            .checked_add(amount)
            .ok_or(ArithmeticError::Overflow)?;
        position.reward_debt = position
            .reward_debt
            .checked_add(accumulated(amount, pool.acc_reward_per_share)?)
            .ok_or(ArithmeticError::Overflow)?;

        let beneficiary = self.identity.owner_of(position_id).unwrap_or(from);
        self.run_effects(
            pool,
            &[Transfer {
                asset: pool.deposit_asset,
                from,
                to: self.config.vault,
                amount,
            }],
            HookCall {
                trigger: from,
                beneficiary,
                reward_delta: 0,
                new_amount: position.amount,
            },
        )?;

        debug!(position = %position_id, pool = %pool_id, amount, total = position.amount, "deposit");
        self.commit(
            staged,
            position_id,
            position,
            vec![FarmEvent::Deposit {
                position: position_id,
                pool: pool_id,
                from,
                amount,
            }],
        );
        Ok(())
    }

    /// Withdraw `amount` to the position's owner without harvesting.
    ///
    /// Withdrawing the full amount closes the position; reward still pending
    /// at that point is forfeited with it.
    pub fn withdraw(
        &mut self,
        position_id: PositionId,
        amount: u128,
        caller: AccountId,
    ) -> Result<(), FarmError> {
        let mut position = self.withdrawable(position_id, amount)?;
        let owner = self.owner(position_id)?;
        let now = self.now()?;
        let mut staged = self.stage_pool(position.pool_id, now)?;
        let pool = &mut staged.pool;

        track_withdrawal(pool, &mut position, staged.balance, amount, now)?;
        position.reduce(amount, pool.acc_reward_per_share)?;

        self.run_effects(
            pool,
            &[Transfer {
                asset: pool.deposit_asset,
                from: self.config.vault,
                to: owner,
                amount,
            }],
            HookCall {
                trigger: caller,
                beneficiary: owner,
                reward_delta: 0,
                new_amount: position.amount,
            },
        )?;

        debug!(position = %position_id, amount, remaining = position.amount, "withdraw");
        let pool_id = position.pool_id;
        self.commit(
            staged,
            position_id,
            position,
            vec![FarmEvent::Withdraw {
                position: position_id,
                pool: pool_id,
                to: owner,
                amount,
            }],
        );
        Ok(())
    }

    /// Pay out the position's modified pending reward to its owner.
    ///
    /// Returns the amount paid.
    pub fn harvest(&mut self, position_id: PositionId, caller: AccountId) -> Result<u128, FarmError> {
        let mut position = self.live_position(position_id)?;
        let owner = self.owner(position_id)?;
        let now = self.now()?;
        let mut staged = self.stage_pool(position.pool_id, now)?;
        let pool = &mut staged.pool;

        let (pending, paid) = pay_out(pool, &position, now)?;
        position.reward_debt = accumulated(position.amount, pool.acc_reward_per_share)?;

        self.run_effects(
            pool,
            &[Transfer {
                asset: self.config.reward_asset,
                from: self.config.treasury,
                to: owner,
                amount: paid,
            }],
            HookCall {
                trigger: caller,
                beneficiary: owner,
                reward_delta: paid,
                new_amount: position.amount,
            },
        )?;

        info!(position = %position_id, pending, paid, "harvest");
        let pool_id = position.pool_id;
        self.commit(
            staged,
            position_id,
            position,
            vec![FarmEvent::Harvest {
                position: position_id,
                pool: pool_id,
                to: owner,
                pending,
                paid,
            }],
        );
        Ok(paid)
    }

    /// Withdraw `amount` and harvest in one step. Returns the reward paid.
    ///
    /// The payout is computed before maturity tracking and the amount
    /// change, so this matches a harvest followed by a withdraw at the same
    /// instant.
    pub fn withdraw_and_harvest(
        &mut self,
        position_id: PositionId,
        amount: u128,
        caller: AccountId,
    ) -> Result<u128, FarmError> {
        let mut position = self.withdrawable(position_id, amount)?;
        let owner = self.owner(position_id)?;
        let now = self.now()?;
        let mut staged = self.stage_pool(position.pool_id, now)?;
        let pool = &mut staged.pool;

        let (pending, paid) = pay_out(pool, &position, now)?;
        position.reward_debt = accumulated(position.amount, pool.acc_reward_per_share)?;

        track_withdrawal(pool, &mut position, staged.balance, amount, now)?;
        position.reduce(amount, pool.acc_reward_per_share)?;

        self.run_effects(
            pool,
            &[
                Transfer {
                    asset: self.config.reward_asset,
                    from: self.config.treasury,
                    to: owner,
                    amount: paid,
                },
                Transfer {
                    asset: pool.deposit_asset,
                    from: self.config.vault,
                    to: owner,
                    amount,
                },
            ],
            HookCall {
                trigger: caller,
                beneficiary: owner,
                reward_delta: paid,
                new_amount: position.amount,
            },
        )?;

        info!(position = %position_id, amount, pending, paid, "withdraw and harvest");
        let pool_id = position.pool_id;
        self.commit(
            staged,
            position_id,
            position,
            vec![
                FarmEvent::Harvest {
                    position: position_id,
                    pool: pool_id,
                    to: owner,
                    pending,
                    paid,
                },
                FarmEvent::Withdraw {
                    position: position_id,
                    pool: pool_id,
                    to: owner,
                    amount,
                },
            ],
        );
        Ok(paid)
    }

    /// Return the full deposit to the owner and forfeit all reward.
    ///
    /// Returns the amount withdrawn.
    pub fn emergency_withdraw(
        &mut self,
        position_id: PositionId,
        caller: AccountId,
    ) -> Result<u128, FarmError> {
        let mut position = self.live_position(position_id)?;
        let owner = self.owner(position_id)?;
        let amount = position.amount;
        let now = self.now()?;
        let mut staged = self.stage_pool(position.pool_id, now)?;
        let pool = &mut staged.pool;

        track_withdrawal(pool, &mut position, staged.balance, amount, now)?;
        position.amount = 0;
        position.reward_debt = 0;

        self.run_effects(
            pool,
            &[Transfer {
                asset: pool.deposit_asset,
                from: self.config.vault,
                to: owner,
                amount,
            }],
            HookCall {
                trigger: caller,
                beneficiary: owner,
                reward_delta: 0,
                new_amount: 0,
            },
        )?;

        warn!(position = %position_id, amount, "emergency withdraw, reward forfeited");
        let pool_id = position.pool_id;
        self.commit(
            staged,
            position_id,
            position,
            vec![FarmEvent::EmergencyWithdraw {
                position: position_id,
                pool: pool_id,
                to: owner,
                amount,
            }],
        );
        Ok(amount)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn pool_info(&self, id: PoolId) -> Result<PoolInfo, FarmError> {
        let pool = self.pools.get(id)?;
        Ok(pool.info(self.balance_of(pool)))
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    pub fn pool_for_asset(&self, asset: AssetId) -> Option<PoolId> {
        self.pools.pool_for_asset(asset)
    }

    pub fn total_allocation_weight(&self) -> u64 {
        self.pools.total_allocation_weight()
    }

    /// `None` for ids that never existed or have been closed.
    pub fn position(&self, id: PositionId) -> Option<Position> {
        self.positions.get(id).copied()
    }

    pub fn positions_in_pool(&self, pool_id: PoolId) -> Vec<(PositionId, Position)> {
        let mut positions: Vec<_> = self
            .positions
            .in_pool(pool_id)
            .map(|(id, p)| (id, *p))
            .collect();
        positions.sort_by_key(|(id, _)| *id);
        positions
    }

    /// What [`harvest`](Self::harvest) would pay now, computed without
    /// settling anything.
    pub fn pending_reward(&self, id: PositionId) -> Result<PendingReward, FarmError> {
        let position = self.live_position(id)?;
        let now = self.now()?;
        let mut pool = self.pools.get(position.pool_id)?.clone();
        let ctx = self.accrual_context(&pool, now);
        if ctx.total_allocation_weight > 0 {
            let projection = accrual::project(&pool, &ctx)?;
            pool.acc_reward_per_share = projection.acc_reward_per_share;
            pool.total_accrued = projection.total_accrued;
        }
        let (pending, payout) = pay_out(&mut pool, &position, now)?;
        Ok(PendingReward { pending, payout })
    }

    /// Curve value at the position's current maturity.
    pub fn curve_value(&self, id: PositionId) -> Result<u128, FarmError> {
        let position = self.live_position(id)?;
        let pool = self.pools.get(position.pool_id)?;
        let now = self.now()?;
        Ok(pool
            .curve
            .evaluate(maturity::maturity(position.entry_time, now)))
    }

    /// Curve value at the pool's average maturity.
    pub fn mean_curve_value(&self, id: PoolId) -> Result<u128, FarmError> {
        let pool = self.pools.get(id)?;
        let now = self.now()?;
        Ok(pool
            .curve
            .evaluate(maturity::maturity(pool.average_entry_time, now)))
    }

    pub fn events(&self) -> &[FarmEvent] {
        &self.events
    }

    /// Drain buffered events.
    pub fn take_events(&mut self) -> Vec<FarmEvent> {
        std::mem::take(&mut self.events)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn now(&self) -> Result<Timestamp, FarmError> {
        Ok(to_scaled(self.clock.now_secs(), self.config.time_scale)?)
    }

    fn balance_of(&self, pool: &Pool) -> u128 {
        self.tokens.balance_of(pool.deposit_asset, self.config.vault)
    }

    fn accrual_context(&self, pool: &Pool, now: Timestamp) -> AccrualContext {
        AccrualContext {
            now,
            deposited_balance: self.balance_of(pool),
            emission_rate: self.config.emission_rate,
            total_allocation_weight: self.pools.total_allocation_weight(),
        }
    }

    fn stage_pool(&self, id: PoolId, now: Timestamp) -> Result<StagedPool, FarmError> {
        let mut pool = self.pools.get(id)?.clone();
        let ctx = self.accrual_context(&pool, now);
        let settlement = accrual::settle(&mut pool, &ctx)?;
        Ok(StagedPool {
            pool,
            balance: ctx.deposited_balance,
            settlement,
        })
    }

    fn live_position(&self, id: PositionId) -> Result<Position, FarmError> {
        match self.positions.get(id) {
            Some(p) if p.amount > 0 => Ok(*p),
            _ => Err(PositionError::UnknownPosition(id).into()),
        }
    }

    fn withdrawable(&self, id: PositionId, amount: u128) -> Result<Position, FarmError> {
        if amount == 0 {
            return Err(PositionError::ZeroAmount.into());
        }
        let position = self.live_position(id)?;
        if amount > position.amount {
            return Err(PositionError::InsufficientAmount {
                have: position.amount,
                need: amount,
            }
            .into());
        }
        Ok(position)
    }

    fn owner(&self, id: PositionId) -> Result<AccountId, FarmError> {
        self.identity
            .owner_of(id)
            .ok_or_else(|| PositionError::NoOwner(id).into())
    }

    /// Execute transfers in order, then the pool hook. On any failure the
    /// transfers already made are reversed and the error is returned.
    fn run_effects(&self, pool: &Pool, transfers: &[Transfer], call: HookCall) -> Result<(), FarmError> {
        let mut done: Vec<Transfer> = Vec::with_capacity(transfers.len());
        let result = transfers
            .iter()
            .filter(|t| t.amount > 0)
            .try_for_each(|t| {
                self.tokens.transfer(t.asset, t.from, t.to, t.amount)?;
                done.push(*t);
                Ok::<(), FarmError>(())
            })
            .and_then(|()| match &pool.hook {
                Some(hook) => hook
                    .on_reward(
                        pool.id,
                        call.trigger,
                        call.beneficiary,
                        call.reward_delta,
                        call.new_amount,
                    )
                    .map_err(FarmError::from),
                None => Ok(()),
            });

        if let Err(e) = &result {
            warn!(pool = %pool.id, error = %e, reverted = done.len(), "external effect failed");
            for t in done.iter().rev() {
                if let Err(revert) = self.tokens.transfer(t.asset, t.to, t.from, t.amount) {
                    error!(asset = %t.asset, from = %t.to, to = %t.from, amount = t.amount, error = %revert, "failed to reverse transfer");
                }
            }
        }
        result
    }

    fn commit_pool(&mut self, staged: StagedPool) {
        if let Some(s) = staged.settlement {
            self.events.push(s.into());
        }
        self.pools.commit(staged.pool);
    }

    fn commit(
        &mut self,
        staged: StagedPool,
        position_id: PositionId,
        position: Position,
        events: Vec<FarmEvent>,
    ) {
        self.commit_pool(staged);
        self.positions.commit(position_id, position);
        self.events.extend(events);
    }
}

/// Pool- and position-level maturity updates for a withdrawal of `amount`,
/// against the balances before it is applied.
fn track_withdrawal(
    pool: &mut Pool,
    position: &mut Position,
    balance: u128,
    amount: u128,
    now: Timestamp,
) -> Result<(), ArithmeticError> {
    pool.average_entry_time = maturity::update_pool_average(
        pool.average_entry_time,
        balance,
        amount,
        Direction::Withdraw,
        now,
    )?;
    position.entry_time =
        maturity::update_position_entry(position.entry_time, position.amount, amount, now)?;
    Ok(())
}

/// Raw pending and capped, modified payout for `position`; books the payout
/// against the pool's distributed total.
fn pay_out(pool: &mut Pool, position: &Position, now: Timestamp) -> Result<(u128, u128), FarmError> {
    let pending = position.payable(pool.acc_reward_per_share)?;
    let snapshot = CurveSnapshot::take(
        pool.curve.as_ref(),
        position.entry_time,
        pool.average_entry_time,
        now,
    );
    let modified = modifier::modify(pending, &snapshot)?;
    let paid = modified.min(pool.undistributed());
    pool.total_distributed = pool
        .total_distributed
        .checked_add(paid)
        .ok_or(ArithmeticError::Overflow)?;
    Ok((pending, paid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryIdentity, MemoryTokenLedger, RecordingHook};
    use ripen_core::constants::{ACC_REWARD_PRECISION, DEFAULT_EMISSION_RATE, TIME_SCALE};
    use ripen_core::error::{HookError, TransferError};
    use ripen_core::time::ManualClock;
    use ripen_curve::RootCurve;

    const START: u64 = 1_700_000_000;
    const LP: AssetId = AssetId(7);
    const OTHER_LP: AssetId = AssetId(8);
    const ALICE: AccountId = AccountId(100);
    const BOB: AccountId = AccountId(101);

    struct Fixture {
        farm: Farm,
        tokens: Arc<MemoryTokenLedger>,
        identity: Arc<MemoryIdentity>,
        clock: Arc<ManualClock>,
    }

    impl Fixture {
        fn new() -> Self {
            let tokens = Arc::new(MemoryTokenLedger::new());
            let identity = Arc::new(MemoryIdentity::new());
            let clock = Arc::new(ManualClock::new(START));
            let config = EngineConfig::default();
            tokens.mint(config.reward_asset, config.treasury, u128::MAX / 2);
            tokens.mint(LP, ALICE, 1_000_000);
            tokens.mint(LP, BOB, 1_000_000);
            let farm = Farm::new(config, tokens.clone(), identity.clone(), clock.clone()).unwrap();
            Self {
                farm,
                tokens,
                identity,
                clock,
            }
        }

        fn pool(&mut self) -> PoolId {
            self.farm
                .add_pool(LP, 1, Arc::new(RootCurve::default()), None)
                .unwrap()
        }

        fn vault(&self) -> u128 {
            self.tokens.balance_of(LP, self.farm.config().vault)
        }

        fn reward_of(&self, account: AccountId) -> u128 {
            self.tokens
                .balance_of(self.farm.config().reward_asset, account)
        }
    }

    #[test]
    fn rejects_zero_time_scale() {
        let config = EngineConfig {
            time_scale: 0,
            ..EngineConfig::default()
        };
        let err = Farm::new(
            config,
            Arc::new(MemoryTokenLedger::new()),
            Arc::new(MemoryIdentity::new()),
            Arc::new(ManualClock::new(0)),
        )
        .err();
        assert_eq!(err, Some(ConfigError::ZeroTimeScale));
    }

    #[test]
    fn deposit_creates_position() {
        let mut fx = Fixture::new();
        let pool = fx.pool();
        let id = fx.identity.mint(ALICE);
        fx.farm.deposit(pool, id, 500, ALICE).unwrap();

        let position = fx.farm.position(id).unwrap();
        assert_eq!(position.amount, 500);
        assert_eq!(position.reward_debt, 0);
        assert_eq!(position.entry_time, START * TIME_SCALE);
        assert_eq!(position.pool_id, pool);
        assert_eq!(fx.vault(), 500);
        assert_eq!(fx.tokens.balance_of(LP, ALICE), 999_500);

        let info = fx.farm.pool_info(pool).unwrap();
        assert_eq!(info.average_entry_time, START * TIME_SCALE);
        assert_eq!(info.deposited_balance, 500);
    }

    #[test]
    fn zero_amounts_rejected() {
        let mut fx = Fixture::new();
        let pool = fx.pool();
        let id = fx.identity.mint(ALICE);
        assert_eq!(
            fx.farm.deposit(pool, id, 0, ALICE),
            Err(PositionError::ZeroAmount.into())
        );
        fx.farm.deposit(pool, id, 10, ALICE).unwrap();
        assert_eq!(
            fx.farm.withdraw(id, 0, ALICE),
            Err(PositionError::ZeroAmount.into())
        );
    }

    #[test]
    fn unknown_pool_rejected() {
        let mut fx = Fixture::new();
        fx.pool();
        let id = fx.identity.mint(ALICE);
        assert_eq!(
            fx.farm.deposit(PoolId(9), id, 10, ALICE),
            Err(ConfigError::UnknownPool(PoolId(9)).into())
        );
    }

    #[test]
    fn position_cannot_change_pool() {
        let mut fx = Fixture::new();
        let first = fx.pool();
        let second = fx
            .farm
            .add_pool(OTHER_LP, 1, Arc::new(RootCurve::default()), None)
            .unwrap();
        fx.tokens.mint(OTHER_LP, ALICE, 100);
        let id = fx.identity.mint(ALICE);
        fx.farm.deposit(first, id, 10, ALICE).unwrap();

        let err = fx.farm.deposit(second, id, 10, ALICE).unwrap_err();
        assert_eq!(
            err,
            PositionError::PoolMismatch {
                position: id,
                expected: first,
                got: second
            }
            .into()
        );
    }

    #[test]
    fn duplicate_asset_rejected() {
        let mut fx = Fixture::new();
        let pool = fx.pool();
        let err = fx
            .farm
            .add_pool(LP, 5, Arc::new(RootCurve::default()), None)
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateAsset {
                asset: LP,
                existing: pool
            }
            .into()
        );
        assert_eq!(fx.farm.total_allocation_weight(), 1);
    }

    #[test]
    fn zero_total_weight_blocks_operations() {
        let mut fx = Fixture::new();
        let pool = fx
            .farm
            .add_pool(LP, 0, Arc::new(RootCurve::default()), None)
            .unwrap();
        let id = fx.identity.mint(ALICE);
        assert_eq!(
            fx.farm.deposit(pool, id, 10, ALICE),
            Err(ConfigError::ZeroTotalAllocation.into())
        );
        assert!(fx.farm.position(id).is_none());
        assert_eq!(fx.vault(), 0);
    }

    #[test]
    fn single_position_earns_full_emission() {
        let mut fx = Fixture::new();
        let pool = fx.pool();
        let id = fx.identity.mint(ALICE);
        fx.farm.deposit(pool, id, 1_000, ALICE).unwrap();

        fx.clock.advance(100);
        let expected = 100 * TIME_SCALE as u128 * DEFAULT_EMISSION_RATE;
        let view = fx.farm.pending_reward(id).unwrap();
        assert_eq!(view.pending, expected);
        assert_eq!(view.payout, expected);

        let paid = fx.farm.harvest(id, ALICE).unwrap();
        assert_eq!(paid, expected);
        assert_eq!(fx.reward_of(ALICE), expected);
        assert_eq!(fx.farm.pending_reward(id).unwrap().pending, 0);

        let info = fx.farm.pool_info(pool).unwrap();
        assert_eq!(info.acc_reward_per_share, expected * ACC_REWARD_PRECISION / 1_000);
        assert_eq!(info.total_distributed, expected);
    }

    #[test]
    fn pending_reward_is_a_pure_projection() {
        let mut fx = Fixture::new();
        let pool = fx.pool();
        let id = fx.identity.mint(ALICE);
        fx.farm.deposit(pool, id, 1_000, ALICE).unwrap();
        fx.clock.advance(50);

        let before = fx.farm.pool_info(pool).unwrap();
        let events = fx.farm.events().len();
        fx.farm.pending_reward(id).unwrap();
        assert_eq!(fx.farm.pool_info(pool).unwrap(), before);
        assert_eq!(fx.farm.events().len(), events);
    }

    #[test]
    fn full_withdraw_closes_position() {
        let mut fx = Fixture::new();
        let pool = fx.pool();
        let id = fx.identity.mint(ALICE);
        fx.farm.deposit(pool, id, 1_000, ALICE).unwrap();
        fx.clock.advance(10);
        fx.farm.withdraw(id, 1_000, ALICE).unwrap();

        assert!(fx.farm.position(id).is_none());
        assert_eq!(
            fx.farm.pending_reward(id),
            Err(PositionError::UnknownPosition(id).into())
        );
        assert_eq!(
            fx.farm.harvest(id, ALICE),
            Err(PositionError::UnknownPosition(id).into())
        );
        assert_eq!(fx.tokens.balance_of(LP, ALICE), 1_000_000);

        fx.clock.advance(10);
        fx.farm.deposit(pool, id, 300, ALICE).unwrap();
        let reopened = fx.farm.position(id).unwrap();
        assert_eq!(reopened.entry_time, (START + 20) * TIME_SCALE);
        assert_eq!(reopened.amount, 300);
        assert_eq!(
            fx.farm.pool_info(pool).unwrap().average_entry_time,
            (START + 20) * TIME_SCALE
        );
    }

    #[test]
    fn withdraw_more_than_held_rejected() {
        let mut fx = Fixture::new();
        let pool = fx.pool();
        let id = fx.identity.mint(ALICE);
        fx.farm.deposit(pool, id, 100, ALICE).unwrap();
        assert_eq!(
            fx.farm.withdraw(id, 101, ALICE),
            Err(PositionError::InsufficientAmount { have: 100, need: 101 }.into())
        );
        assert_eq!(fx.farm.position(id).unwrap().amount, 100);
    }

    /// Two units against three in the pool leave a fractional share of the
    /// accumulator, so the debt arithmetic has to truncate.
    fn uneven_split(fx: &mut Fixture) -> PositionId {
        let pool = fx.pool();
        let alice = fx.identity.mint(ALICE);
        let bob = fx.identity.mint(BOB);
        fx.farm.deposit(pool, alice, 2, ALICE).unwrap();
        fx.farm.deposit(pool, bob, 1, BOB).unwrap();
        fx.clock.advance(2);
        alice
    }

    #[test]
    fn partial_withdraw_and_harvest_leaves_nothing_pending() {
        let mut fx = Fixture::new();
        let id = uneven_split(&mut fx);
        assert_eq!(fx.farm.withdraw_and_harvest(id, 1, ALICE).unwrap(), 133_333_333_333);

        let position = fx.farm.position(id).unwrap();
        let acc = fx.farm.pool_info(position.pool_id).unwrap().acc_reward_per_share;
        assert_eq!(position.reward_debt, accumulated(1, acc).unwrap());
        assert_eq!(fx.farm.pending_reward(id).unwrap().pending, 0);
        assert_eq!(fx.farm.harvest(id, ALICE).unwrap(), 0);
        assert_eq!(fx.farm.withdraw_and_harvest(id, 1, ALICE).unwrap(), 0);
        assert!(fx.farm.position(id).is_none());
    }

    #[test]
    fn partial_withdraw_keeps_pending_exact() {
        let mut fx = Fixture::new();
        let id = uneven_split(&mut fx);
        let before = fx.farm.pending_reward(id).unwrap().pending;
        assert_eq!(before, 133_333_333_333);

        fx.farm.withdraw(id, 1, ALICE).unwrap();
        assert_eq!(fx.farm.pending_reward(id).unwrap().pending, before);
        // The withdrawal made the position younger than the pool, so the
        // payout is cut, but the raw pending is intact.
        let paid = fx.farm.harvest(id, ALICE).unwrap();
        assert!(paid <= before);
        assert_eq!(fx.farm.pending_reward(id).unwrap().pending, 0);
    }

    #[test]
    fn ownerless_position_cannot_withdraw() {
        let mut fx = Fixture::new();
        let pool = fx.pool();
        let id = fx.identity.mint(ALICE);
        fx.farm.deposit(pool, id, 100, ALICE).unwrap();
        fx.identity.burn(id);
        assert_eq!(
            fx.farm.withdraw(id, 10, ALICE),
            Err(PositionError::NoOwner(id).into())
        );
    }

    #[test]
    fn proceeds_follow_current_owner() {
        let mut fx = Fixture::new();
        let pool = fx.pool();
        let id = fx.identity.mint(ALICE);
        fx.farm.deposit(pool, id, 100, ALICE).unwrap();
        fx.clock.advance(5);
        fx.identity.transfer(id, BOB);
        let paid = fx.farm.withdraw_and_harvest(id, 100, ALICE).unwrap();
        assert!(paid > 0);
        assert_eq!(fx.reward_of(BOB), paid);
        assert_eq!(fx.reward_of(ALICE), 0);
        assert_eq!(fx.tokens.balance_of(LP, BOB), 1_000_100);
    }

    #[test]
    fn failed_transfer_leaves_ledger_untouched() {
        let mut fx = Fixture::new();
        let pool = fx.pool();
        let id = fx.identity.mint(ALICE);
        fx.farm.deposit(pool, id, 100, ALICE).unwrap();
        fx.clock.advance(30);
        fx.farm.take_events();

        let position = fx.farm.position(id).unwrap();
        let pool_before = fx.farm.pool_info(pool).unwrap();
        fx.tokens.freeze(fx.farm.config().vault);

        let err = fx.farm.withdraw_and_harvest(id, 40, ALICE).unwrap_err();
        assert!(matches!(err, FarmError::Transfer(TransferError::Rejected(_))));
        assert_eq!(fx.farm.position(id), Some(position));
        assert_eq!(fx.farm.pool_info(pool).unwrap(), pool_before);
        assert!(fx.farm.events().is_empty());
        // The reward leg went out first and was reversed.
        assert_eq!(fx.reward_of(ALICE), 0);
    }

    #[test]
    fn hook_failure_reverses_transfers() {
        let mut fx = Fixture::new();
        let hook = Arc::new(RecordingHook::new());
        let pool = fx
            .farm
            .add_pool(LP, 1, Arc::new(RootCurve::default()), Some(hook.clone()))
            .unwrap();
        let id = fx.identity.mint(ALICE);
        hook.set_reject(Some("paused"));

        let err = fx.farm.deposit(pool, id, 100, ALICE).unwrap_err();
        assert_eq!(
            err,
            FarmError::Hook(HookError::Rejected {
                pool,
                reason: "paused".into()
            })
        );
        assert!(fx.farm.position(id).is_none());
        assert_eq!(fx.tokens.balance_of(LP, ALICE), 1_000_000);
        assert_eq!(fx.vault(), 0);

        hook.set_reject(None);
        fx.farm.deposit(pool, id, 100, ALICE).unwrap();
        let calls = hook.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].new_amount, 100);
        assert_eq!(calls[0].reward_delta, 0);
    }

    #[test]
    fn hook_sees_harvest_payout() {
        let mut fx = Fixture::new();
        let hook = Arc::new(RecordingHook::new());
        let pool = fx
            .farm
            .add_pool(LP, 1, Arc::new(RootCurve::default()), Some(hook.clone()))
            .unwrap();
        let id = fx.identity.mint(ALICE);
        fx.farm.deposit(pool, id, 100, ALICE).unwrap();
        fx.clock.advance(3);
        let paid = fx.farm.harvest(id, BOB).unwrap();

        let last = *hook.calls().last().unwrap();
        assert_eq!(last.trigger, BOB);
        assert_eq!(last.beneficiary, ALICE);
        assert_eq!(last.reward_delta, paid);
        assert_eq!(last.new_amount, 100);
    }

    #[test]
    fn emergency_withdraw_forfeits_reward() {
        let mut fx = Fixture::new();
        let pool = fx.pool();
        let id = fx.identity.mint(ALICE);
        fx.farm.deposit(pool, id, 400, ALICE).unwrap();
        fx.clock.advance(60);

        let returned = fx.farm.emergency_withdraw(id, ALICE).unwrap();
        assert_eq!(returned, 400);
        assert!(fx.farm.position(id).is_none());
        assert_eq!(fx.reward_of(ALICE), 0);
        assert_eq!(fx.tokens.balance_of(LP, ALICE), 1_000_000);
        assert_eq!(fx.farm.pool_info(pool).unwrap().total_distributed, 0);
        assert!(matches!(
            fx.farm.events().last(),
            Some(FarmEvent::EmergencyWithdraw { amount: 400, .. })
        ));
    }

    #[test]
    fn events_record_settlement_then_operation() {
        let mut fx = Fixture::new();
        let pool = fx.pool();
        let id = fx.identity.mint(ALICE);
        fx.farm.deposit(pool, id, 100, ALICE).unwrap();
        fx.clock.advance(1);
        fx.farm.deposit(pool, id, 100, ALICE).unwrap();

        let events = fx.farm.take_events();
        assert!(matches!(events[0], FarmEvent::PoolAdded { .. }));
        assert!(matches!(events[1], FarmEvent::Deposit { amount: 100, .. }));
        assert!(matches!(
            events[2],
            FarmEvent::PoolSettled { deposited_balance: 100, .. }
        ));
        assert!(matches!(events[3], FarmEvent::Deposit { .. }));
        assert_eq!(events.len(), 4);
        assert!(fx.farm.events().is_empty());
    }

    #[test]
    fn set_pool_updates_weight_and_hook() {
        let mut fx = Fixture::new();
        let hook = Arc::new(RecordingHook::new());
        let pool = fx
            .farm
            .add_pool(LP, 2, Arc::new(RootCurve::default()), Some(hook.clone()))
            .unwrap();
        fx.farm
            .add_pool(OTHER_LP, 3, Arc::new(RootCurve::default()), None)
            .unwrap();

        fx.farm
            .set_pool(
                pool,
                PoolUpdate {
                    allocation_weight: Some(7),
                    hook: Some(None),
                    ..PoolUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(fx.farm.total_allocation_weight(), 10);
        assert_eq!(fx.farm.pool_info(pool).unwrap().allocation_weight, 7);

        let id = fx.identity.mint(ALICE);
        fx.farm.deposit(pool, id, 10, ALICE).unwrap();
        assert!(hook.calls().is_empty());

        assert_eq!(
            fx.farm.set_pool(PoolId(5), PoolUpdate::default()),
            Err(ConfigError::UnknownPool(PoolId(5)).into())
        );
    }

    #[test]
    fn settle_all_advances_every_pool() {
        let mut fx = Fixture::new();
        let a = fx.pool();
        let b = fx
            .farm
            .add_pool(OTHER_LP, 1, Arc::new(RootCurve::default()), None)
            .unwrap();
        fx.clock.advance(9);
        fx.farm.settle_all().unwrap();
        for id in [a, b] {
            assert_eq!(
                fx.farm.pool_info(id).unwrap().last_settlement_time,
                (START + 9) * TIME_SCALE
            );
        }
    }
}
