//! Curve fitting orchestration.
//!
//! Responsibilities:
//!
//! - generate multi-start seeds for each model's potency parameters
//! - fit one model to one compound (bounded Levenberg–Marquardt)
//! - compute goodness-of-fit metrics
//! - select the best model per compound with a parsimony tie-break

pub mod fitter;
pub mod metrics;
pub mod selection;
pub mod start_grid;

pub use fitter::*;
pub use metrics::*;
pub use selection::*;
pub use start_grid::*;
