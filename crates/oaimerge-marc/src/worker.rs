//! Worker: one input file through the extractor

use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::time::{Duration, Instant};

use oaimerge_core::FileError;

use crate::diagnostic::DiagnosticEvent;
use crate::extract::Extractor;

/// Fragments of one successfully processed file
#[derive(Debug, Default)]
pub struct FileOutput {
    pub fragments: Vec<Vec<u8>>,
    pub records_seen: usize,
    pub diagnostics: usize,
}

/// Result for one input, sent back to the dispatcher on completion
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<FileOutput, FileError>,
    pub elapsed: Duration,
}

/// Process a single harvest file.
///
/// Diagnostics go straight to the diagnostics writer as one batch, so the
/// events of a file (and therefore of each record) stay together. A failed
/// file contributes a single `file failed` event.
pub fn process_file(
    extractor: &dyn Extractor,
    path: &Path,
    diagnostics: &Sender<Vec<DiagnosticEvent>>,
) -> FileOutcome {
    let start = Instant::now();

    let result = match extractor.extract(path) {
        Ok(extraction) => {
            let count = extraction.diagnostics.len();
            if count > 0 && diagnostics.send(extraction.diagnostics).is_err() {
                log::warn!("{}: diagnostics writer gone, {count} events lost", path.display());
            }
            log::debug!(
                "{}: {}/{} records kept",
                path.display(),
                extraction.fragments.len(),
                extraction.records_seen
            );
            Ok(FileOutput {
                fragments: extraction.fragments,
                records_seen: extraction.records_seen,
                diagnostics: count,
            })
        }
        Err(e) => {
            let _ = diagnostics.send(vec![DiagnosticEvent::file_failed(path, &e)]);
            Err(e)
        }
    };

    FileOutcome {
        path: path.to_path_buf(),
        result,
        elapsed: start.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Category;
    use crate::parser::NativeExtractor;
    use crate::parser::tests::{NEW_BOOK, OLD_BOOK, oai_document};
    use std::sync::mpsc;
    use tempfile::TempDir;

    #[test]
    fn success_sends_record_diagnostics() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("h.xml");
        let bad = r#"<record xmlns="http://www.loc.gov/MARC21/slim"><leader>x</leader></record>"#;
        std::fs::write(&path, oai_document(&[OLD_BOOK, NEW_BOOK, bad])).unwrap();

        let (tx, rx) = mpsc::channel();
        let outcome = process_file(&NativeExtractor, &path, &tx);
        drop(tx);

        let output = outcome.result.unwrap();
        assert_eq!(output.fragments.len(), 1);
        assert_eq!(output.records_seen, 3);
        assert_eq!(output.diagnostics, 2);

        let batches: Vec<Vec<DiagnosticEvent>> = rx.iter().collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0].category, Category::LeaderMalformed);
        assert_eq!(batches[0][1].category, Category::FixedFieldMissing);
    }

    #[test]
    fn clean_file_sends_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("h.xml");
        std::fs::write(&path, oai_document(&[OLD_BOOK])).unwrap();

        let (tx, rx) = mpsc::channel();
        let outcome = process_file(&NativeExtractor, &path, &tx);
        drop(tx);

        assert!(outcome.result.is_ok());
        assert!(rx.iter().next().is_none());
    }

    #[test]
    fn failure_sends_file_failed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.xml");
        std::fs::write(&path, "<OAI-PMH><ListRecords><record>").unwrap();

        let (tx, rx) = mpsc::channel();
        let outcome = process_file(&NativeExtractor, &path, &tx);
        drop(tx);

        assert!(matches!(outcome.result, Err(FileError::Parse(_))));
        assert_eq!(outcome.path, path);
        let batches: Vec<Vec<DiagnosticEvent>> = rx.iter().collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0].category, Category::FileFailed);
        assert!(batches[0][0].to_string().starts_with("file failed;"));
    }

    #[test]
    fn closed_diagnostics_channel_does_not_fail_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("h.xml");
        let bad = r#"<record xmlns="http://www.loc.gov/MARC21/slim"/>"#;
        std::fs::write(&path, oai_document(&[bad])).unwrap();

        let (tx, rx) = mpsc::channel();
        drop(rx);
        assert!(process_file(&NativeExtractor, &path, &tx).result.is_ok());
    }
}
