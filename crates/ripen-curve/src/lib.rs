//! # ripen-curve
//! Reference maturity curves.
//!
//! Pools take any [`CurveOracle`](ripen_core::traits::CurveOracle); these are
//! the ones shipped with Ripen:
//! - [`RootCurve`]: `floor + sqrt(maturity * scale)`
//! - [`SigmoidCurve`]: logistic lookup table centred on a midpoint maturity
//! - [`FlatCurve`]: constant, neutral to the emission modifier
//!
//! All evaluation is integer-only and deterministic.

pub mod flat;
pub mod root;
pub mod sigmoid;

pub use flat::FlatCurve;
pub use root::{isqrt, RootCurve};
pub use sigmoid::{SigmoidCurve, SIGMOID_PRECISION};

use std::sync::Arc;

use ripen_core::traits::CurveOracle;
use serde::{Deserialize, Serialize};

/// Serializable description of a curve, used by scenario files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CurveSpec {
    Flat { value: u64 },
    Root { floor: u64, scale: u64 },
    Sigmoid { midpoint: u64, span: u64 },
}

impl CurveSpec {
    /// Instantiate the described curve.
    pub fn build(&self) -> Arc<dyn CurveOracle> {
        match *self {
            Self::Flat { value } => Arc::new(FlatCurve(value as u128)),
            Self::Root { floor, scale } => Arc::new(RootCurve::new(floor as u128, scale as u128)),
            Self::Sigmoid { midpoint, span } => Arc::new(SigmoidCurve::new(midpoint, span)),
        }
    }
}
