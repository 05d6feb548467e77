//! Error types for openrs-flexure

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlexureError>;

#[derive(Error, Debug)]
pub enum FlexureError {
    #[error("expected 4 fiducial points, got {0}")]
    PointCount(usize),

    #[error("fiducial point {index} has a non-finite coordinate")]
    NonFinite { index: usize },

    #[error("degenerate fiducial geometry: {0}")]
    Degenerate(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
