//! OpenRS command-line pipeline.
//!
//! - `openrs-extract`: result container → deformed mesh with nodal stresses
//!   and the fiducial file
//! - `openrs-flexure`: fiducials → closure displacement and the
//!   `*BOUNDARY` card for the follow-up run

pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;

pub use config::{CONFIG_ENV, PipelineConfig};
pub use error::{PipelineError, Result, Stage, StageError};
pub use logging::{LOG_ENV, init_logging};
pub use pipeline::{
    ExtractRequest, ExtractSummary, FiducialInput, FlexureReport, run_extract, run_flexure,
};
