//! Extractor seam: file path in, fragments and diagnostics out

use std::path::Path;

use oaimerge_core::FileError;

use crate::diagnostic::DiagnosticEvent;

/// What one input file contributed.
#[derive(Debug, Default)]
pub struct Extraction {
    /// Serialized, namespace-normalized records that passed the filter
    pub fragments: Vec<Vec<u8>>,
    /// Anomalies, grouped per record in document order
    pub diagnostics: Vec<DiagnosticEvent>,
    /// Catalog records found, kept or not
    pub records_seen: usize,
}

/// Turns one harvest file into output fragments.
///
/// Implementations are shared by all workers, so they must not hold
/// per-file state.
pub trait Extractor: Send + Sync {
    /// Short name for logs and the summary table.
    fn name(&self) -> &'static str;

    /// Process one file. `Err` fails only this file.
    fn extract(&self, path: &Path) -> Result<Extraction, FileError>;
}
