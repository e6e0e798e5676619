//! Numerical building blocks: damped least squares, bounded Levenberg–Marquardt
//! and log-spaced grids.

pub mod grid;
pub mod lm;
pub mod ols;

pub use grid::*;
pub use lm::*;
pub use ols::*;
