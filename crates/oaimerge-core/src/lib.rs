//! oaimerge Core - Common infrastructure for harvest merge pipelines
//!
//! This crate provides the source-agnostic pieces of the merge pipeline:
//! input discovery, the single-writer output document, the diagnostics
//! writer thread, progress reporting and logging setup.

pub mod diagnostics;
pub mod discover;
pub mod error;
pub mod logging;
pub mod progress;
pub mod sink;

// Re-exports for convenience
pub use diagnostics::{DiagnosticsHandle, DiagnosticsWriter, spawn_diagnostics_writer};
pub use discover::discover_inputs;
pub use error::FileError;
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{ProgressContext, SharedProgress};
pub use sink::{DocumentSink, cleanup_tmp_file};
