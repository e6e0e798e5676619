//! `dose-curves` library crate.
//!
//! Dose-response curve fitting with automatic model selection. The binary
//! (`dr`) is a thin wrapper; everything here is usable and testable without
//! spawning processes.
//!
//! Flow: `io` ingest -> `app::pipeline` (parallel `fit` per compound x model,
//! then selection) -> `report` tables -> `plot` spec and renderers.

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
