//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - input rows and their per-compound grouping (`Measurement`, `CompoundGroup`, `Dataset`)
//! - the closed set of model forms (`ModelKind`) and selection metrics
//! - fit outputs (`FitResult`, `SelectionResult`, `PredictionCurve`) and warnings

pub mod types;

pub use types::*;
