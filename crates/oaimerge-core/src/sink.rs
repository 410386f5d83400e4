//! Output document sink with atomic tmp→rename finalization

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Single-writer document: header once, fragments in delivery order, footer once.
///
/// Bytes go to `<final>.tmp`; [`finish`](DocumentSink::finish) writes the footer
/// and renames onto the final path, so the final file only ever exists complete.
pub struct DocumentSink {
    writer: BufWriter<File>,
    footer: &'static str,
    tmp_path: PathBuf,
    final_path: PathBuf,
    fragment_count: usize,
}

impl std::fmt::Debug for DocumentSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSink")
            .field("final_path", &self.final_path)
            .field("fragment_count", &self.fragment_count)
            .finish_non_exhaustive()
    }
}

/// `<path>.tmp` next to the final output
fn tmp_path_for(final_path: &Path) -> PathBuf {
    let mut name = final_path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

impl DocumentSink {
    /// Create the temporary file and write `header`.
    pub fn create(final_path: &Path, header: &str, footer: &'static str) -> io::Result<Self> {
        if let Some(parent) = final_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = tmp_path_for(final_path);
        cleanup_tmp_file(final_path)?;

        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        writer.write_all(header.as_bytes())?;

        Ok(Self {
            writer,
            footer,
            tmp_path,
            final_path: final_path.to_path_buf(),
            fragment_count: 0,
        })
    }

    /// Append one fragment verbatim, newline-terminated.
    pub fn write_fragment(&mut self, fragment: &[u8]) -> io::Result<()> {
        self.writer.write_all(fragment)?;
        self.writer.write_all(b"\n")?;
        self.fragment_count += 1;
        Ok(())
    }

    pub fn fragment_count(&self) -> usize {
        self.fragment_count
    }

    /// Write footer, flush, and atomically rename tmp → final.
    pub fn finish(mut self) -> io::Result<usize> {
        self.writer.write_all(self.footer.as_bytes())?;
        let file = self.writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&self.tmp_path, &self.final_path)?;
        Ok(self.fragment_count)
    }
}

/// Remove a stale `.tmp` left next to `final_path` by an interrupted run.
pub fn cleanup_tmp_file(final_path: &Path) -> io::Result<()> {
    let tmp_path = tmp_path_for(final_path);
    if tmp_path.exists() {
        log::warn!("Removing stale tmp file: {}", tmp_path.display());
        fs::remove_file(&tmp_path)?;
    }
    Ok(())
}
