//! Merge subcommand - combine a harvest directory into one MARCXML collection

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use oaimerge_core::progress::fmt_num;
use oaimerge_core::{SharedProgress, discover_inputs};
use oaimerge_marc::ExtractorKind;

use super::print_table;
use crate::config::Config;

/// Exit status for configuration failures (no input directory, no input files)
pub const EXIT_NO_INPUT: u8 = 2;

#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Directory holding the OAI-PMH harvest files (*.xml)
    pub input_dir: PathBuf,

    /// Merged collection path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Diagnostic log path
    #[arg(long)]
    pub diagnostics: Option<PathBuf>,

    /// Number of files processed in parallel
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Filter through the external XSLT engine instead of the built-in rules
    #[arg(long)]
    pub xslt: bool,

    /// Stylesheet for --xslt
    #[arg(long, requires = "xslt")]
    pub stylesheet: Option<PathBuf>,

    /// Saxon jar for --xslt (default: probe the usual install locations)
    #[arg(long, requires = "xslt")]
    pub saxon_jar: Option<PathBuf>,

    /// Standalone transform executable for --xslt, run without `java -jar`
    #[arg(long, requires = "xslt")]
    pub launcher: Option<String>,
}

pub fn run(args: MergeArgs, config: &Config, progress: &SharedProgress) -> Result<ExitCode> {
    let Some(inputs) = find_inputs(&args.input_dir, progress) else {
        return Ok(ExitCode::from(EXIT_NO_INPUT));
    };

    let marc_config = build_config(&args, config);
    log::info!("Merging {}", args.input_dir.display());
    log::info!("  Output: {}", marc_config.output_path.display());
    log::info!("  Diagnostics: {}", marc_config.diagnostics_path.display());

    let summary = oaimerge_marc::run(&marc_config, &inputs, progress)?;

    print_table(
        "Merge",
        &[
            (
                "Files",
                format!(
                    "{}/{} ({} failed)",
                    summary.completed_files, summary.total_files, summary.failed_files
                ),
            ),
            (
                "Records",
                format!(
                    "{} kept of {}",
                    fmt_num(summary.records_kept),
                    fmt_num(summary.records_seen)
                ),
            ),
            ("Diagnostics", summary.diagnostics.to_string()),
            ("Output", marc_config.output_path.display().to_string()),
            ("Time", format!("{:.1}s", summary.elapsed.as_secs_f64())),
        ],
    );

    // Unreadable files are skipped, not fatal
    for (path, error) in &summary.failures {
        log::warn!("Skipped {}: {error}", path.display());
    }

    Ok(ExitCode::SUCCESS)
}

/// Harvest files in `dir`, or `None` after telling the user why there are none.
fn find_inputs(dir: &Path, progress: &SharedProgress) -> Option<Vec<PathBuf>> {
    match discover_inputs(dir) {
        Ok(inputs) if inputs.is_empty() => {
            progress.println(format!("No .xml files found in {}", dir.display()));
            None
        }
        Ok(inputs) => Some(inputs),
        Err(e) => {
            progress.println(format!("Cannot read input directory {}: {e}", dir.display()));
            None
        }
    }
}

/// Flags override the config file, which overrides built-in defaults.
fn build_config(args: &MergeArgs, config: &Config) -> oaimerge_marc::Config {
    let extractor = if args.xslt {
        let mut xslt = config.xslt.to_xslt_config();
        if let Some(stylesheet) = &args.stylesheet {
            xslt.stylesheet = stylesheet.clone();
        }
        if let Some(jar) = &args.saxon_jar {
            xslt.jar = Some(jar.clone());
        }
        if let Some(launcher) = &args.launcher {
            xslt.launcher = Some(launcher.clone());
        }
        ExtractorKind::Xslt(xslt)
    } else {
        ExtractorKind::Native
    };

    oaimerge_marc::Config {
        output_path: args
            .output
            .clone()
            .unwrap_or_else(|| config.output.path.clone()),
        diagnostics_path: args
            .diagnostics
            .clone()
            .unwrap_or_else(|| config.output.diagnostics.clone()),
        workers: args.workers.unwrap_or(config.workers.default).max(1),
        extractor,
    }
}
