//! Main runner: dispatch files to the worker pool, assemble the collection

use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use oaimerge_core::progress::{fmt_num, is_log_step};
use oaimerge_core::{DocumentSink, ProgressContext, spawn_diagnostics_writer};
use rayon::prelude::*;

use crate::config::Config;
use crate::diagnostic::DiagnosticEvent;
use crate::worker::{self, FileOutcome};

/// Root element opening the merged document
pub const COLLECTION_HEADER: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
    "<collection xmlns=\"http://www.loc.gov/MARC21/slim\" ",
    "xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\" ",
    "xsi:schemaLocation=\"http://www.loc.gov/MARC21/slim ",
    "http://www.loc.gov/standards/marcxml/schema/MARC21slim.xsd\">\n",
);
/// Closes [`COLLECTION_HEADER`]
pub const COLLECTION_FOOTER: &str = "</collection>\n";

/// Pipeline execution summary
#[derive(Debug)]
pub struct Summary {
    pub total_files: usize,
    pub completed_files: usize,
    pub failed_files: usize,
    pub records_seen: usize,
    pub records_kept: usize,
    pub diagnostics: u64,
    pub failures: Vec<(PathBuf, String)>,
    pub elapsed: Duration,
}

/// Run the merge over `inputs`.
///
/// Files are handed to a pool of `config.workers` threads; each finished
/// file's fragments are appended to the output in completion order by this
/// thread, which is the only writer of the document. Diagnostics travel on a
/// separate channel to their own writer thread, drained before returning.
pub fn run(config: &Config, inputs: &[PathBuf], progress: &ProgressContext) -> Result<Summary> {
    let start = Instant::now();

    if inputs.is_empty() {
        bail!("No input files to merge");
    }
    let total_files = inputs.len();

    // Checked before any job is dispatched or any output is created
    let extractor = config.extractor.build()?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.workers.max(1))
        .thread_name(|i| format!("oaimerge-worker-{i}"))
        .build()
        .context("Failed to create thread pool")?;

    log::info!(
        "Merging {} files with {} workers ({} extractor)",
        total_files,
        pool.current_num_threads(),
        extractor.name()
    );

    let diagnostics = spawn_diagnostics_writer::<DiagnosticEvent>(&config.diagnostics_path)
        .with_context(|| {
            format!(
                "Failed to create diagnostics log {}",
                config.diagnostics_path.display()
            )
        })?;
    let mut sink = DocumentSink::create(&config.output_path, COLLECTION_HEADER, COLLECTION_FOOTER)
        .with_context(|| format!("Failed to create {}", config.output_path.display()))?;

    let pb = progress.files_bar(total_files);
    let (tx, rx) = mpsc::channel::<FileOutcome>();
    let diag_tx = diagnostics.sender();

    let mut completed_files = 0;
    let mut failures = Vec::new();
    let mut records_seen = 0;

    let assembled: std::io::Result<()> = std::thread::scope(|s| {
        let extractor = extractor.as_ref();
        s.spawn(move || {
            pool.install(|| {
                inputs
                    .par_iter()
                    .for_each_with((tx, diag_tx), |(tx, diag_tx), path| {
                        let outcome = worker::process_file(extractor, path, diag_tx);
                        // receiver only goes away after an output error
                        let _ = tx.send(outcome);
                    });
            });
        });

        for outcome in rx {
            match outcome.result {
                Ok(output) => {
                    for fragment in &output.fragments {
                        sink.write_fragment(fragment)?;
                    }
                    completed_files += 1;
                    records_seen += output.records_seen;
                    log::debug!(
                        "{}: {} records in {:.1}s",
                        outcome.path.display(),
                        output.fragments.len(),
                        outcome.elapsed.as_secs_f64()
                    );
                }
                Err(e) => {
                    log::error!("{}: {e}", outcome.path.display());
                    failures.push((outcome.path, e.to_string()));
                }
            }

            pb.inc(1);
            let done = completed_files + failures.len();
            if !progress.is_tty() && is_log_step(done, total_files) {
                log::info!("Progress: {done}/{total_files} files");
            }
        }
        Ok(())
    });
    pb.finish_and_clear();

    // Drain the log queue even when the output failed
    let diagnostics_written = diagnostics.finish();
    assembled.with_context(|| format!("Failed writing {}", config.output_path.display()))?;
    let diagnostics_written = diagnostics_written.with_context(|| {
        format!(
            "Failed writing diagnostics to {}",
            config.diagnostics_path.display()
        )
    })?;

    let records_kept = sink
        .finish()
        .with_context(|| format!("Failed to finalize {}", config.output_path.display()))?;

    let summary = Summary {
        total_files,
        completed_files,
        failed_files: failures.len(),
        records_seen,
        records_kept,
        diagnostics: diagnostics_written,
        failures,
        elapsed: start.elapsed(),
    };

    log::info!("=== Merge Summary ===");
    log::info!(
        "Files: {}/{} completed ({} failed)",
        summary.completed_files,
        summary.total_files,
        summary.failed_files
    );
    log::info!(
        "Records: {} kept of {}",
        fmt_num(summary.records_kept),
        fmt_num(summary.records_seen)
    );
    log::info!("Diagnostics: {}", summary.diagnostics);
    log::info!("Time: {:.1}s", summary.elapsed.as_secs_f64());

    Ok(summary)
}
