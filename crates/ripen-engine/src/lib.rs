//! # ripen-engine
//! Maturity-curved reward ledger.
//!
//! All accounting is integer fixed-point with u128 intermediates.
//!
//! - [`accrual`]: settles a pool's per-share accumulator against elapsed time
//! - [`maturity`]: weighted-average entry times for pools and positions
//! - [`modifier`]: boosts or cuts payouts by curve distance to the pool mean
//! - [`farm::Farm`]: the operation protocol tying them together
//! - [`shared::SharedFarm`]: lock-serialized handle for concurrent callers
//! - [`memory`]: in-memory token ledger, identity registry, and hook

pub mod accrual;
pub mod config;
pub mod events;
pub mod farm;
pub mod maturity;
pub mod memory;
pub mod modifier;
pub mod pool;
pub mod position;
pub mod shared;

pub use config::EngineConfig;
pub use events::FarmEvent;
pub use farm::{Farm, PendingReward, PoolUpdate};
pub use pool::PoolInfo;
pub use position::Position;
pub use shared::SharedFarm;
