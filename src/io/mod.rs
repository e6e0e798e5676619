//! Input/output helpers.
//!
//! - delimited table ingest + validation (`ingest`)
//! - tab-delimited table exports (`export`)
//! - plot spec JSON read/write (`plot_spec`)

pub mod export;
pub mod ingest;
pub mod plot_spec;

pub use export::*;
pub use ingest::*;
pub use plot_spec::*;
