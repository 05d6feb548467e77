//! Pipeline errors, tagged with the stage that failed

use std::fmt;

use openrs_flexure::FlexureError;
use openrs_io::IoError;
use openrs_model::ModelError;
use thiserror::Error;

/// Pipeline stage, as printed in error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Config,
    Parse,
    Average,
    Deform,
    Serialize,
    Fiducials,
    Verify,
    Flexure,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Config => "config",
            Stage::Parse => "parse",
            Stage::Average => "average",
            Stage::Deform => "deform",
            Stage::Serialize => "serialize",
            Stage::Fiducials => "fiducials",
            Stage::Verify => "verify",
            Stage::Flexure => "flexure",
        })
    }
}

#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Flexure(#[from] FlexureError),

    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    Mismatch(String),
}

#[derive(Error, Debug)]
#[error("{stage}: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: StageError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: impl Into<StageError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Attach a [`Stage`] to a library error.
pub trait StageExt<T> {
    fn stage(self, stage: Stage) -> Result<T>;
}

impl<T, E: Into<StageError>> StageExt<T> for std::result::Result<T, E> {
    fn stage(self, stage: Stage) -> Result<T> {
        self.map_err(|err| PipelineError::new(stage, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_names_the_stage() {
        let err: Result<()> =
            Err(IoError::UnsupportedExtension("stl".to_string())).stage(Stage::Serialize);
        let text = err.unwrap_err().to_string();
        assert!(text.starts_with("serialize: unsupported output file extension"), "{text}");
    }

    #[test]
    fn model_errors_keep_their_text() {
        let err = PipelineError::new(Stage::Average, ModelError::DuplicateNode(4));
        assert_eq!(err.to_string(), "average: duplicate node label 4");
    }
}
