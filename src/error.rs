use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by pipeline stages.
///
/// `Classification` and `Write` are per-item: they are recorded and the stage
/// moves on to the next item. The others abort the stage they occur in.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("source file not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("read source file {}: {source}", path.display())]
    SourceRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("classify line {line_number} ({text:?}): {reason}")]
    Classification {
        line_number: usize,
        text: String,
        reason: String,
    },

    #[error("create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StageError {
    pub fn is_per_item(&self) -> bool {
        matches!(self, Self::Classification { .. } | Self::Write { .. })
    }
}
