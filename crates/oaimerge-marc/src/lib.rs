//! oaimerge MARC - OAI-PMH harvest to MARCXML collection pipeline
//!
//! Extracts the MARC records embedded in a directory of OAI-PMH responses,
//! keeps those whose publication dates fall before the cutoff year, and
//! merges them into one MARCXML `collection` document.
//!
//! # Features
//!
//! - Streaming XML parsing with quick-xml
//! - Parallel per-file processing with rayon
//! - Diagnostic log written by a dedicated thread
//! - Optional external XSLT engine instead of the built-in filter
//!
//! # Example
//!
//! ```ignore
//! use oaimerge_marc::{Config, run};
//! use oaimerge_core::{ProgressContext, discover_inputs};
//!
//! let inputs = discover_inputs("harvest".as_ref())?;
//! let summary = run(&Config::default(), &inputs, &ProgressContext::new())?;
//! println!("Kept {} records", summary.records_kept);
//! ```

pub mod config;
pub mod diagnostic;
pub mod eligibility;
pub mod extract;
pub mod parser;
pub mod record;
pub mod runner;
pub mod worker;
pub mod xslt;

// Re-exports
pub use config::{Config, ExtractorKind};
pub use diagnostic::{Category, DiagnosticEvent};
pub use eligibility::{EligibilityDecision, cutoff_year, evaluate};
pub use extract::{Extraction, Extractor};
pub use parser::NativeExtractor;
pub use record::CatalogRecord;
pub use runner::{Summary, run};
pub use xslt::{XsltConfig, XsltExtractor};
