//! Plot handoff and renderers.
//!
//! - prediction curves (`curve`)
//! - shared-axis overlay composition (`overlay`)
//! - the serializable plot specification (`spec`)
//! - renderers: terminal (`ascii`) and SVG (`svg`)

pub mod ascii;
pub mod curve;
pub mod overlay;
pub mod spec;
pub mod svg;

pub use ascii::*;
pub use curve::*;
pub use overlay::*;
pub use spec::*;
pub use svg::*;
