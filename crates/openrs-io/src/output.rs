//! Atomic output files
//!
//! Outputs are rendered in memory, written to a temporary file in the target
//! directory and renamed into place, so a failed run never leaves a partial
//! mesh or fiducial file behind. A bundle that fails halfway through its
//! renames puts back the files it had already replaced.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{NamedTempFile, TempPath};

use crate::error::{IoError, Result};

fn persist_error(path: &Path, source: std::io::Error) -> IoError {
    IoError::Persist {
        path: path.display().to_string(),
        source,
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn stage_file(path: &Path, bytes: &[u8]) -> Result<NamedTempFile> {
    let mut temp =
        NamedTempFile::new_in(parent_dir(path)).map_err(|err| persist_error(path, err))?;
    temp.write_all(bytes).map_err(|err| persist_error(path, err))?;
    temp.as_file()
        .sync_all()
        .map_err(|err| persist_error(path, err))?;
    Ok(temp)
}

/// Write `bytes` to `path`, replacing any existing file atomically.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let temp = stage_file(path, bytes)?;
    temp.persist(path)
        .map_err(|err| persist_error(path, err.error))?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote output file");
    Ok(())
}

/// Move an existing file at `path` to a temporary name next to it.
fn set_aside(path: &Path) -> Result<Option<TempPath>> {
    if !path.is_file() {
        return Ok(None);
    }
    let backup = NamedTempFile::new_in(parent_dir(path))
        .map_err(|err| persist_error(path, err))?
        .into_temp_path();
    std::fs::rename(path, &backup).map_err(|err| persist_error(path, err))?;
    Ok(Some(backup))
}

/// One rename of a commit, with what it needs to be undone
struct Replacement {
    path: PathBuf,
    previous: Option<TempPath>,
    landed: bool,
}

impl Replacement {
    fn undo(self) {
        let restored = match (self.previous, self.landed) {
            (Some(backup), _) => backup.persist(&self.path).map_err(|err| err.error),
            (None, true) => std::fs::remove_file(&self.path),
            (None, false) => Ok(()),
        };
        if let Err(err) = restored {
            tracing::warn!(path = %self.path.display(), %err, "could not roll back output file");
        }
    }
}

fn roll_back(done: Vec<Replacement>) {
    for replacement in done.into_iter().rev() {
        replacement.undo();
    }
}

/// Several outputs staged together and renamed only once all are written.
///
/// Dropping an uncommitted bundle removes its temporary files.
#[derive(Debug, Default)]
pub struct OutputBundle {
    staged: Vec<(PathBuf, NamedTempFile)>,
}

impl OutputBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&mut self, path: impl Into<PathBuf>, bytes: &[u8]) -> Result<()> {
        let path = path.into();
        let temp = stage_file(&path, bytes)?;
        self.staged.push((path, temp));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.staged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.is_empty()
    }

    /// Rename every staged file into place, in staging order.
    ///
    /// If a rename fails, files already committed are removed and the files
    /// they replaced are restored.
    pub fn commit(self) -> Result<Vec<PathBuf>> {
        let mut done: Vec<Replacement> = Vec::with_capacity(self.staged.len());
        for (path, temp) in self.staged {
            let previous = match set_aside(&path) {
                Ok(previous) => previous,
                Err(err) => {
                    roll_back(done);
                    return Err(err);
                }
            };
            match temp.persist(&path) {
                Ok(_) => done.push(Replacement {
                    path,
                    previous,
                    landed: true,
                }),
                Err(err) => {
                    let error = persist_error(&path, err.error);
                    done.push(Replacement {
                        path,
                        previous,
                        landed: false,
                    });
                    roll_back(done);
                    return Err(error);
                }
            }
        }
        // Replaced files are deleted as their backups drop.
        let written = done.into_iter().map(|r| r.path).collect::<Vec<_>>();
        for path in &written {
            tracing::debug!(path = %path.display(), "committed output file");
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mesh.vtk");
        std::fs::write(&path, "old").unwrap();
        write_atomic(&path, b"new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn missing_directory_is_a_persist_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("mesh.vtk");
        let err = write_atomic(&path, b"data").unwrap_err();
        assert!(matches!(err, IoError::Persist { .. }), "{err}");
    }

    #[test]
    fn dropped_bundle_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut bundle = OutputBundle::new();
            bundle.stage(dir.path().join("a.vtu"), b"a").unwrap();
            assert!(
                bundle
                    .stage(dir.path().join("missing").join("b.txt"), b"b")
                    .is_err()
            );
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn failed_commit_restores_earlier_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().join("a.vtu");
        let fresh = dir.path().join("c.vtu");
        let doomed = dir.path().join("sub");
        std::fs::write(&existing, "old").unwrap();
        std::fs::create_dir(&doomed).unwrap();

        let mut bundle = OutputBundle::new();
        bundle.stage(&existing, b"new").unwrap();
        bundle.stage(&fresh, b"c").unwrap();
        bundle.stage(doomed.join("b.txt"), b"b").unwrap();
        // The last staged file disappears before its rename.
        std::fs::remove_dir_all(&doomed).unwrap();

        let err = bundle.commit().unwrap_err();
        assert!(matches!(err, IoError::Persist { .. }), "{err}");
        assert_eq!(std::fs::read_to_string(&existing).unwrap(), "old");
        assert!(!fresh.exists());
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["a.vtu"]);
    }

    #[test]
    fn commit_replaces_existing_files_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.vtu");
        std::fs::write(&path, "old").unwrap();
        let mut bundle = OutputBundle::new();
        bundle.stage(&path, b"new").unwrap();
        bundle.commit().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn committed_bundle_writes_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut bundle = OutputBundle::new();
        bundle.stage(dir.path().join("a.vtu"), b"a").unwrap();
        bundle.stage(dir.path().join("b.txt"), b"b").unwrap();
        assert_eq!(bundle.len(), 2);
        let written = bundle.commit().unwrap();
        assert_eq!(written.len(), 2);
        assert_eq!(std::fs::read_to_string(dir.path().join("b.txt")).unwrap(), "b");
    }
}
