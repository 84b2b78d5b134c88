//! Integration and invariant test suite for Ripen.
//!
//! Tests drive a [`Farm`](ripen_engine::Farm) end to end through the
//! in-memory collaborators and check the accounting invariants that must
//! hold across any sequence of operations.

pub mod helpers;
