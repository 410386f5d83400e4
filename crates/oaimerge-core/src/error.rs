//! Common error type for per-file processing

/// Error from processing a single input file.
///
/// A `FileError` fails only the file it came from; the rest of the batch
/// keeps going and the failure is recorded in the diagnostic log.
#[derive(Debug)]
pub enum FileError {
    /// Input could not be opened or read.
    Io(std::io::Error),
    /// Input is not well-formed XML (truncated, bad syntax, unclosed elements).
    Parse(String),
    /// External transform engine failed or produced unusable output.
    Transform(String),
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO: {e}"),
            Self::Parse(msg) => write!(f, "XML: {msg}"),
            Self::Transform(msg) => write!(f, "transform: {msg}"),
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(_) | Self::Transform(_) => None,
        }
    }
}

impl From<std::io::Error> for FileError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl FileError {
    /// Single-line form used in `;`-delimited diagnostic log lines.
    pub fn log_value(&self) -> String {
        self.to_string().replace(['\n', '\r', ';'], " ")
    }
}
