//! Alternate extractor: external Saxon XSLT transform via subprocess

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use oaimerge_core::FileError;

use crate::extract::{Extraction, Extractor};
use crate::parser::normalize_records;

/// Where to look for the Saxon jar when none is configured
pub const SAXON_CANDIDATES: &[&str] = &[
    "/opt/saxon/saxon9he.jar",
    "/opt/saxon/saxon9pe.jar",
    "/usr/local/saxon/saxon9he.jar",
];

/// Transform engine settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XsltConfig {
    /// Java executable
    pub java: String,
    /// Explicit Saxon jar; overrides `candidates`
    pub jar: Option<PathBuf>,
    /// Jar locations probed in order when `jar` is unset
    pub candidates: Vec<PathBuf>,
    /// Stylesheet selecting and filtering the records
    pub stylesheet: PathBuf,
    /// Standalone transform executable (Saxon's `Transform` on Windows).
    /// When set, `java` and the jar are not used.
    pub launcher: Option<String>,
}

impl Default for XsltConfig {
    fn default() -> Self {
        Self {
            java: "java".to_string(),
            jar: None,
            candidates: SAXON_CANDIDATES.iter().map(PathBuf::from).collect(),
            stylesheet: PathBuf::from("read_records.xsl"),
            launcher: cfg!(windows).then(|| "Transform".to_string()),
        }
    }
}

/// Runs `<java> -jar <saxon> -s:<input> -xsl:<stylesheet>` per file, or
/// `<launcher> -s:<input> -xsl:<stylesheet>` with a standalone launcher.
///
/// Record selection is up to the stylesheet. Its output is re-serialized
/// through the same namespace normalization as the native path.
#[derive(Debug, Clone)]
pub struct XsltExtractor {
    program: String,
    jar: Option<PathBuf>,
    stylesheet: PathBuf,
}

impl XsltExtractor {
    /// Resolve jar and stylesheet once, before any file is dispatched.
    pub fn locate(config: &XsltConfig) -> Result<Self> {
        let (program, jar) = match &config.launcher {
            Some(launcher) => (launcher.clone(), None),
            None => (config.java.clone(), Some(resolve_jar(config)?)),
        };

        if !config.stylesheet.is_file() {
            bail!("Stylesheet not found: {}", config.stylesheet.display());
        }
        let stylesheet = std::fs::canonicalize(&config.stylesheet).with_context(|| {
            format!("Cannot resolve stylesheet {}", config.stylesheet.display())
        })?;

        match &jar {
            Some(jar) => log::info!("Using Saxon at {}", jar.display()),
            None => log::info!("Using transform launcher {program}"),
        }
        Ok(Self {
            program,
            jar,
            stylesheet,
        })
    }

    fn command(&self, input: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(jar) = &self.jar {
            cmd.arg("-jar").arg(jar);
        }
        cmd.arg(format!("-s:{}", input.display()))
            .arg(format!("-xsl:{}", self.stylesheet.display()));
        cmd
    }
}

/// Configured jar, else the first candidate that exists.
fn resolve_jar(config: &XsltConfig) -> Result<PathBuf> {
    match &config.jar {
        Some(jar) if jar.is_file() => Ok(jar.clone()),
        Some(jar) => bail!("Saxon jar not found: {}", jar.display()),
        None => config
            .candidates
            .iter()
            .find(|p| p.is_file())
            .cloned()
            .with_context(|| {
                format!(
                    "Saxon is not installed or cannot be found (looked in: {})",
                    config
                        .candidates
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            }),
    }
}

impl Extractor for XsltExtractor {
    fn name(&self) -> &'static str {
        "xslt"
    }

    fn extract(&self, path: &Path) -> Result<Extraction, FileError> {
        let output = self.command(path).output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FileError::Transform(format!(
                "{}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
            log::warn!("{}: {line}", path.display());
        }

        let fragments = normalize_records(&output.stdout[..])?;
        Ok(Extraction {
            records_seen: fragments.len(),
            fragments,
            diagnostics: Vec::new(),
        })
    }
}
