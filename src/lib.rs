//! Consolidation and reporting for field-visit exports.
//!
//! Several delimited files, each with its own column naming, are mapped onto
//! one canonical schema, joined to an area → cluster reference table and
//! aggregated into worklist, result and field-rider reports.

pub mod classify;
pub mod config;
pub mod consolidate;
pub mod error;
pub mod image;
pub mod loader;
pub mod logging;
pub mod lookup;
pub mod mapping;
pub mod output;
pub mod reports;
pub mod session;
pub mod types;
pub mod util;

pub use config::Config;
pub use error::{ReportError, Result};
pub use session::{RecomputeTrigger, Session};
