//! Result back-end selection
//!
//! Both back-ends produce the same [`ResultTables`]; callers pick one from the
//! input path or an explicit [`Backend`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use openrs_model::{Provenance, ResultTables};

use crate::dat_reader::DatFile;
use crate::error::{IoError, Result};
use crate::frd_reader::FrdFile;
use crate::result_db::{ResultDatabase, Selection};

/// A result container that can be read into canonical tables
pub trait ResultSource {
    /// Short description for log lines
    fn describe(&self) -> String;

    /// Read and validate the container.
    fn read(&self) -> Result<ResultTables>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// CalculiX `.frd` plus printed `.dat`
    Frd,
    /// Exported result database (`.json` / `.odb.json`)
    Odb,
}

impl Backend {
    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Frd => "frd",
            Backend::Odb => "odb",
        }
    }

    /// Detect the back-end from the file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "frd" => Ok(Backend::Frd),
            "json" | "odb" => Ok(Backend::Odb),
            other => Err(IoError::InvalidInput(format!(
                "cannot infer result back-end from extension {other:?} of {}; use .frd, .json or .odb.json",
                path.display()
            ))),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = IoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "frd" => Ok(Backend::Frd),
            "odb" => Ok(Backend::Odb),
            other => Err(IoError::InvalidInput(format!(
                "unknown result back-end {other:?} (expected frd or odb)"
            ))),
        }
    }
}

/// CalculiX `.frd` with its printed-output companion
#[derive(Debug, Clone)]
pub struct FrdSource {
    pub frd_path: PathBuf,
    pub dat_path: PathBuf,
}

impl FrdSource {
    /// The companion defaults to the same stem with a `.dat` extension.
    pub fn new(frd_path: impl Into<PathBuf>) -> Self {
        let frd_path = frd_path.into();
        let dat_path = frd_path.with_extension("dat");
        Self { frd_path, dat_path }
    }

    pub fn with_dat(mut self, dat_path: impl Into<PathBuf>) -> Self {
        self.dat_path = dat_path.into();
        self
    }
}

impl ResultSource for FrdSource {
    fn describe(&self) -> String {
        format!(
            "frd {} (+ {})",
            self.frd_path.display(),
            self.dat_path.display()
        )
    }

    fn read(&self) -> Result<ResultTables> {
        let frd = FrdFile::from_file(&self.frd_path)?;
        let dat = DatFile::from_file(&self.dat_path)?;
        let tables = ResultTables {
            provenance: Provenance {
                backend: Backend::Frd.as_str().to_string(),
                step: frd.step.map(|step| step.to_string()),
                increment: Some(frd.increment.unwrap_or(frd.increments)),
            },
            nodes: frd.nodes,
            displacements: frd.displacements,
            elements: frd.elements,
            stress_contributions: frd.stresses,
            named_sets: dat.node_sets(),
        };
        tables.validate()?;
        Ok(tables)
    }
}

/// Exported result database
#[derive(Debug, Clone)]
pub struct ResultDbSource {
    pub path: PathBuf,
    pub selection: Selection,
}

impl ResultDbSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            selection: Selection::default(),
        }
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = selection;
        self
    }
}

impl ResultSource for ResultDbSource {
    fn describe(&self) -> String {
        format!("odb {}", self.path.display())
    }

    fn read(&self) -> Result<ResultTables> {
        let db = ResultDatabase::open(&self.path)?;
        let tables = db.to_tables(&self.selection)?;
        tables.validate()?;
        Ok(tables)
    }
}

/// Options for [`open_source`]
#[derive(Debug, Clone, Default)]
pub struct SourceOptions {
    /// Force a back-end instead of detecting it from the extension
    pub backend: Option<Backend>,
    /// Printed-output companion for the FRD back-end
    pub dat_path: Option<PathBuf>,
    /// Step to read from a result database
    pub step_name: Option<String>,
    /// Part instance to read from a result database
    pub instance_name: Option<String>,
}

/// Choose and configure the back-end for `path`.
pub fn open_source(path: &Path, options: &SourceOptions) -> Result<Box<dyn ResultSource>> {
    let backend = match options.backend {
        Some(backend) => backend,
        None => Backend::from_path(path)?,
    };
    tracing::debug!(path = %path.display(), %backend, "selected result back-end");
    Ok(match backend {
        Backend::Frd => {
            let mut source = FrdSource::new(path);
            if let Some(dat) = &options.dat_path {
                source = source.with_dat(dat);
            }
            Box::new(source)
        }
        Backend::Odb => Box::new(ResultDbSource::new(path).with_selection(Selection {
            instance: options.instance_name.clone(),
            step: options.step_name.clone(),
        })),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_from_extension() {
        assert_eq!(Backend::from_path(Path::new("run.frd")).unwrap(), Backend::Frd);
        assert_eq!(Backend::from_path(Path::new("RUN.FRD")).unwrap(), Backend::Frd);
        assert_eq!(
            Backend::from_path(Path::new("bend.odb.json")).unwrap(),
            Backend::Odb
        );
        assert!(Backend::from_path(Path::new("bend.inp")).is_err());
    }

    #[test]
    fn backend_from_flag() {
        assert_eq!("ODB".parse::<Backend>().unwrap(), Backend::Odb);
        assert!("vtk".parse::<Backend>().is_err());
    }

    #[test]
    fn frd_companion_defaults_to_dat_stem() {
        let source = FrdSource::new("jobs/U_elastic.frd");
        assert_eq!(source.dat_path, PathBuf::from("jobs/U_elastic.dat"));
        let source = source.with_dat("other.dat");
        assert_eq!(source.dat_path, PathBuf::from("other.dat"));
    }

    #[test]
    fn raw_odb_goes_to_database_back_end_and_is_refused() {
        let source = open_source(Path::new("bend.odb"), &SourceOptions::default()).unwrap();
        assert!(source.describe().starts_with("odb"));
        let err = source.read().unwrap_err();
        assert!(err.to_string().contains("export it"), "{err}");
    }

    #[test]
    fn missing_dat_companion_is_an_input_fault() {
        let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
        let dir = tempfile::tempdir().unwrap();
        let frd = dir.path().join("two_hex.frd");
        std::fs::copy(fixtures.join("two_hex.frd"), &frd).unwrap();

        let err = FrdSource::new(&frd).read().unwrap_err();
        assert!(matches!(err, IoError::InvalidInput(_)), "{err}");
        assert!(err.to_string().contains("two_hex.dat"), "{err}");
    }

    #[test]
    fn frd_provenance_names_final_step() {
        let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
        let tables = FrdSource::new(fixtures.join("two_hex.frd")).read().unwrap();
        assert_eq!(tables.provenance.step.as_deref(), Some("1"));
        assert_eq!(tables.provenance.increment, Some(2));
    }

    #[test]
    fn missing_frd_is_an_input_fault() {
        let dir = tempfile::tempdir().unwrap();
        let source = FrdSource::new(dir.path().join("absent.frd"));
        assert!(matches!(source.read(), Err(IoError::InvalidInput(_))));
    }
}
