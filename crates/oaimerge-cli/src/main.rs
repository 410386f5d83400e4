//! oaimerge - Merge OAI-PMH MARC harvests into one MARCXML collection
//!
//! Reads a directory of harvest responses, keeps records published before
//! the cutoff year, and writes them as a single `collection` document plus
//! a diagnostic log of malformed records.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "oaimerge")]
#[command(about = "Merge OAI-PMH MARC harvests into one MARCXML collection")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./oaimerge.toml or ~/.config/oaimerge/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Merge a harvest directory into one collection
    Merge(cmd::merge::MergeArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let progress = Arc::new(oaimerge_core::ProgressContext::new());

    // TTY: quiet unless --debug, the bar shows activity.
    // non-TTY: info, logs are the only progress indicator.
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = if is_tty { !cli.debug } else { false };
    oaimerge_core::init_logging(quiet, cli.debug, multi);

    let config = if let Some(path) = cli.config {
        Config::from_file(&path)?
    } else {
        Config::load()?
    };

    match cli.command {
        Command::Merge(args) => cmd::merge::run(args, &config, &progress),
        Command::Config => {
            cmd::print_table(
                "Setting",
                &[
                    ("Output", config.output.path.display().to_string()),
                    ("Diagnostics", config.output.diagnostics.display().to_string()),
                    ("Workers", config.workers.default.to_string()),
                    (
                        "Launcher",
                        config
                            .xslt
                            .launcher
                            .clone()
                            .unwrap_or_else(|| format!("{} -jar", config.xslt.java)),
                    ),
                    (
                        "Saxon jar",
                        config.xslt.jar.clone().unwrap_or_else(|| {
                            format!("probe {} locations", config.xslt.candidates.len())
                        }),
                    ),
                    ("Stylesheet", config.xslt.stylesheet.display().to_string()),
                ],
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}
