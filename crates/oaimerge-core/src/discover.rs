//! Input discovery: harvest files in a directory

use std::io;
use std::path::{Path, PathBuf};

use glob::MatchOptions;

/// Prefix of resource-fork artifacts copied over from macOS volumes
const RESOURCE_FORK_PREFIX: &str = "._";

/// List `*.xml` files (any case) directly inside `dir`, sorted by path.
///
/// Skips directories and names starting with `._`. An empty result is not an
/// error here; the caller decides what an empty batch means.
pub fn discover_inputs(dir: &Path) -> io::Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("input directory not found: {}", dir.display()),
        ));
    }

    let dir_str = dir.to_str().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("input directory is not valid UTF-8: {}", dir.display()),
        )
    })?;
    let pattern = format!("{}/*.xml", glob::Pattern::escape(dir_str));

    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    let mut files: Vec<PathBuf> = glob::glob_with(&pattern, options)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!("Skipping unreadable entry: {e}");
                None
            }
        })
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| !n.starts_with(RESOURCE_FORK_PREFIX))
        })
        .collect();

    files.sort();
    log::debug!("{} input files in {}", files.len(), dir.display());
    Ok(files)
}
