//! Error types for the Ripen engine.
use thiserror::Error;

use crate::types::{AccountId, AssetId, PoolId, PositionId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("total allocation weight is zero")] ZeroTotalAllocation,
    #[error("unknown pool: {0}")] UnknownPool(PoolId),
    #[error("{asset} already registered to {existing}")] DuplicateAsset { asset: AssetId, existing: PoolId },
    #[error("time scale must be non-zero")] ZeroTimeScale,
    #[error("invalid value for {key}: {value}")] InvalidValue { key: String, value: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PositionError {
    #[error("amount must be non-zero")] ZeroAmount,
    #[error("{0} does not exist")] UnknownPosition(PositionId),
    #[error("insufficient amount: have {have}, need {need}")] InsufficientAmount { have: u128, need: u128 },
    #[error("{position} belongs to {expected}, not {got}")] PoolMismatch { position: PositionId, expected: PoolId, got: PoolId },
    #[error("{0} has no owner")] NoOwner(PositionId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArithmeticError {
    #[error("arithmetic overflow")] Overflow,
    #[error("arithmetic underflow")] Underflow,
    #[error("pool mean curve value is zero")] ZeroMeanCurveValue,
    #[error("negative pending reward: {0}")] NegativePending(i128),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("insufficient {asset} balance in {account}: have {have}, need {need}")] InsufficientBalance { asset: AssetId, account: AccountId, have: u128, need: u128 },
    #[error("transfer rejected: {0}")] Rejected(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HookError {
    #[error("hook rejected {pool}: {reason}")] Rejected { pool: PoolId, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FarmError {
    #[error(transparent)] Config(#[from] ConfigError),
    #[error(transparent)] Position(#[from] PositionError),
    #[error(transparent)] Arithmetic(#[from] ArithmeticError),
    #[error("token transfer failed: {0}")] Transfer(#[from] TransferError),
    #[error("reward hook failed: {0}")] Hook(#[from] HookError),
}
