//! # Ziwei Core
//!
//! Shared, WASM-safe logic for ziwei-context: the chart data model, the
//! palace relationship rules, the hierarchical document index, and the
//! parsing of oracle selections.
//!
//! This crate contains no tokio, HTTP client, filesystem I/O, or other
//! native-only dependencies. Everything here is synchronous and pure; the
//! `ziwei-context` application crate supplies the oracle and the runtime.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`chart`] | Palaces and stars as produced by the external chart engine |
//! | [`rules`] | Three-parties-four-areas and stem transformations |
//! | [`index`] | Load-once document index, table of contents, id lookup |
//! | [`select`] | Selection prompt and tolerant parsing of oracle output |

pub mod chart;
pub mod error;
pub mod index;
pub mod rules;
pub mod select;

pub use error::{CoreError, Result};
