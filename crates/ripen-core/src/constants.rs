//! Protocol constants. Amounts are integer base units of their asset; times are
//! scaled ticks (native seconds multiplied by [`TIME_SCALE`]).

/// Basis points denominator: 10_000 = 100%.
pub const BPS_PRECISION: u128 = 10_000;

/// Fixed-point scale of `acc_reward_per_share`.
pub const ACC_REWARD_PRECISION: u128 = 1_000_000_000_000;

/// Fixed-point scale of the pool-level maturity weight.
///
/// Shares the accumulator precision so that a deposit equal to the pool balance
/// carries a weight of exactly `MATURITY_WEIGHT_PRECISION`.
pub const MATURITY_WEIGHT_PRECISION: u128 = ACC_REWARD_PRECISION;

/// Native seconds are multiplied by this factor before entering the ledger,
/// giving millisecond resolution to every accounting formula.
pub const TIME_SCALE: u64 = 1_000;

/// One whole reward token (18 decimals).
pub const REWARD_UNIT: u128 = 1_000_000_000_000_000_000;

/// Default emission of reward base units per scaled tick across all pools.
///
/// 10^8 per millisecond is 10^11 base units per second, roughly 3.16 whole
/// tokens per year.
pub const DEFAULT_EMISSION_RATE: u128 = 100_000_000;

/// Seconds in a Julian year (365.25 days).
pub const SECONDS_PER_YEAR: u64 = 31_557_600;
