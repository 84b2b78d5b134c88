//! # ripen-core
//! Foundation types, constants, and collaborator traits for the Ripen reward engine.

pub mod constants;
pub mod error;
pub mod time;
pub mod traits;
pub mod types;
