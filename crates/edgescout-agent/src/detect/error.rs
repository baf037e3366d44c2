use std::path::PathBuf;
use thiserror::Error;

/// A detection source exists but could not be read or parsed
///
/// Missing files and directories are not errors; they are reported as
/// "not found" by the detection functions.
#[derive(Error, Debug)]
pub enum DetectError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl DetectError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DetectError::Io {
            path: path.into(),
            source,
        }
    }

    /// Path of the file or directory that failed
    pub fn path(&self) -> &std::path::Path {
        match self {
            DetectError::Io { path, .. }
            | DetectError::Json { path, .. }
            | DetectError::Csv { path, .. } => path,
        }
    }
}
