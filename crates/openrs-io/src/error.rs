//! Error types for openrs-io

use openrs_model::ModelError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IoError>;

#[derive(Error, Debug)]
pub enum IoError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unsupported output file extension {0:?} (expected .vtk or .vtu)")]
    UnsupportedExtension(String),

    #[error("{file}: required marker {marker:?} not found")]
    MissingMarker { file: String, marker: String },

    #[error("{file}:{line}: {message}")]
    Malformed {
        file: String,
        line: usize,
        message: String,
    },

    #[error("result database schema error: {0}")]
    Schema(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to persist {path}: {source}")]
    Persist {
        path: String,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),
}

impl IoError {
    pub(crate) fn malformed(file: &str, line: usize, message: impl Into<String>) -> Self {
        IoError::Malformed {
            file: file.to_string(),
            line,
            message: message.into(),
        }
    }

    pub(crate) fn missing_marker(file: &str, marker: impl Into<String>) -> Self {
        IoError::MissingMarker {
            file: file.to_string(),
            marker: marker.into(),
        }
    }
}

/// Read a whole text input, reporting a missing file as an input fault.
pub(crate) fn read_text(path: &std::path::Path, what: &str) -> Result<String> {
    if !path.is_file() {
        return Err(IoError::InvalidInput(format!(
            "{what} {} does not exist or is not a file",
            path.display()
        )));
    }
    std::fs::read_to_string(path).map_err(|err| {
        IoError::InvalidInput(format!("cannot read {what} {}: {err}", path.display()))
    })
}
