//! Pipeline configuration
//!
//! A JSON document; every field is optional:
//!
//! ```json
//! {
//!   "fiducial_sets": ["LEFT_LOWER_DATUM", "LEFT_UPPER_DATUM", "RIGHT_UPPER_DATUM", "RIGHT_LOWER_DATUM", "LEFT", "RIGHT"],
//!   "empty_node_policy": "nan",
//!   "step_name": "Bend",
//!   "instance_name": "BLANK-1",
//!   "coordinate_precision": 8,
//!   "flexure": { "stand_off": 30.0, "notch_offset": 12.0 }
//! }
//! ```
//!
//! The file comes from `--config`, else from `OPENRS_CONFIG`, else defaults.

use std::path::{Path, PathBuf};

use openrs_flexure::FlexureGeometry;
use openrs_io::DEFAULT_COORDINATE_PRECISION;
use openrs_model::{DATUM_SETS, EmptyNodePolicy};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result, Stage, StageError};

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "OPENRS_CONFIG";

/// Widest coordinate precision that still changes the printed value
const MAX_PRECISION: usize = 17;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Sets written to the fiducial file, in order
    pub fiducial_sets: Vec<String>,
    pub empty_node_policy: EmptyNodePolicy,
    /// Step to read from a result database with several steps
    pub step_name: Option<String>,
    /// Part instance to read from a result database with several instances
    pub instance_name: Option<String>,
    /// Decimals for mesh point coordinates
    pub coordinate_precision: usize,
    pub flexure: FlexureGeometry,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fiducial_sets: DATUM_SETS.iter().map(|s| s.to_string()).collect(),
            empty_node_policy: EmptyNodePolicy::default(),
            step_name: None,
            instance_name: None,
            coordinate_precision: DEFAULT_COORDINATE_PRECISION,
            flexure: FlexureGeometry::default(),
        }
    }
}

fn config_error(message: String) -> PipelineError {
    PipelineError::new(Stage::Config, StageError::Config(message))
}

impl PipelineConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|err| config_error(format!("invalid configuration: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            config_error(format!("cannot read config {}: {err}", path.display()))
        })?;
        Self::from_json(&text)
    }

    /// `explicit`, else the `OPENRS_CONFIG` path, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        Self::load_with(explicit, env_path.as_deref())
    }

    pub fn load_with(explicit: Option<&Path>, env_path: Option<&Path>) -> Result<Self> {
        match explicit.or(env_path) {
            Some(path) => {
                tracing::info!(path = %path.display(), "loading configuration");
                Self::from_file(path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.fiducial_sets.is_empty() {
            return Err(config_error("fiducial_sets must not be empty".to_string()));
        }
        if self.coordinate_precision > MAX_PRECISION {
            return Err(config_error(format!(
                "coordinate_precision {} exceeds {MAX_PRECISION}",
                self.coordinate_precision
            )));
        }
        Ok(())
    }
}
