//! Dose-response model library.
//!
//! Models are implemented as small, pure functions over a closed `ModelKind`
//! set so that fitting/selection code can stay generic. `library` derives
//! starting values and bounds from observed data.

pub mod library;
pub mod model;

pub use library::*;
pub use model::*;
