//! Configuration loading from TOML files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use oaimerge_marc::XsltConfig;
use serde::Deserialize;

/// Global configuration for oaimerge
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    pub workers: WorkersConfig,
    pub xslt: XsltSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub path: PathBuf,
    pub diagnostics: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        let marc = oaimerge_marc::Config::default();
        Self {
            path: marc.output_path,
            diagnostics: marc.diagnostics_path,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub default: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            default: oaimerge_marc::config::default_workers(),
        }
    }
}

/// `[xslt]` table, only consulted with `merge --xslt`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct XsltSection {
    pub java: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub jar: Option<String>,
    pub candidates: Vec<PathBuf>,
    pub stylesheet: PathBuf,
    /// Standalone transform executable used instead of `java -jar`
    pub launcher: Option<String>,
}

impl Default for XsltSection {
    fn default() -> Self {
        let xslt = XsltConfig::default();
        Self {
            java: xslt.java,
            jar: std::env::var("SAXON_JAR").ok(),
            candidates: xslt.candidates,
            stylesheet: xslt.stylesheet,
            launcher: xslt.launcher,
        }
    }
}

impl XsltSection {
    pub fn to_xslt_config(&self) -> XsltConfig {
        XsltConfig {
            java: self.java.clone(),
            jar: self.jar.as_ref().map(PathBuf::from),
            candidates: self.candidates.clone(),
            stylesheet: self.stylesheet.clone(),
            launcher: self.launcher.clone(),
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok()
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./oaimerge.toml (current directory)
    /// 2. ~/.config/oaimerge/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("oaimerge.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "oaimerge") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }
}
