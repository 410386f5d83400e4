//! Merge pipeline configuration

use std::path::PathBuf;

use anyhow::Result;

use crate::extract::Extractor;
use crate::parser::NativeExtractor;
use crate::xslt::{XsltConfig, XsltExtractor};

/// Which extractor turns input files into fragments
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ExtractorKind {
    /// quick-xml parse with the built-in eligibility filter
    #[default]
    Native,
    /// External XSLT engine; the stylesheet does the filtering
    Xslt(XsltConfig),
}

impl ExtractorKind {
    /// Build the extractor. For XSLT this checks the engine is installed.
    pub fn build(&self) -> Result<Box<dyn Extractor>> {
        Ok(match self {
            Self::Native => Box::new(NativeExtractor),
            Self::Xslt(config) => Box::new(XsltExtractor::locate(config)?),
        })
    }
}

/// Runtime configuration for the merge pipeline
#[derive(Debug, Clone)]
pub struct Config {
    /// Merged MARCXML collection
    pub output_path: PathBuf,
    /// Line-oriented diagnostic log
    pub diagnostics_path: PathBuf,
    /// Files processed concurrently
    pub workers: usize,
    pub extractor: ExtractorKind,
}

/// Worker count when none is configured
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("output.xml"),
            diagnostics_path: PathBuf::from("diagnostics.log"),
            workers: default_workers(),
            extractor: ExtractorKind::Native,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.output_path, PathBuf::from("output.xml"));
        assert_eq!(config.diagnostics_path, PathBuf::from("diagnostics.log"));
        assert!(config.workers >= 1);
        assert_eq!(config.extractor, ExtractorKind::Native);
    }

    #[test]
    fn native_builds_without_external_tools() {
        let extractor = ExtractorKind::Native.build().unwrap();
        assert_eq!(extractor.name(), "native");
    }

    #[test]
    fn xslt_build_fails_without_engine() {
        let kind = ExtractorKind::Xslt(XsltConfig {
            candidates: vec![PathBuf::from("/nonexistent/saxon.jar")],
            ..Default::default()
        });
        assert!(kind.build().is_err());
    }
}
