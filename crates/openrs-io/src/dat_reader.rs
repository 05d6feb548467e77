//! CalculiX DAT (printed output) reader
//!
//! The `.dat` companion of an FRD run holds the `*NODE PRINT` tables. The
//! meshing step requests one table per named node set, so the printed
//! displacement sections are the only place the set membership survives.
//!
//! Section headers look like
//!
//! ```text
//!  displacements (vx,vy,vz) for set LEFT_LOWER_DATUM and time  0.1000000E+01
//! ```
//!
//! followed by fixed-width rows `label[0..10] u1[10..24] u2[24..38] u3[38..52]`.
//! A section ends at the first non-blank line that is not a row.

use std::path::Path;

use openrs_model::{NodeSet, NodeSets, is_recognized, solver_label};

use crate::error::{IoError, Result, read_text};
use crate::frd_reader::parse_fortran_float;

const DISPLACEMENT_HEADER: &str = " displacements";
const STRESS_HEADER: &str = " stresses";
const LABEL_WIDTH: usize = 10;
const VALUE_WIDTH: usize = 14;

/// One printed displacement table
#[derive(Debug, Clone, PartialEq)]
pub struct PrintedSet {
    /// Set name as printed, upper-case
    pub name: String,
    /// `(node label, displacement)` in printed order
    pub rows: Vec<(u32, [f64; 3])>,
}

impl PrintedSet {
    pub fn labels(&self) -> Vec<u32> {
        self.rows.iter().map(|&(label, _)| label).collect()
    }
}

/// Printed displacement tables of a DAT file, in file order
#[derive(Debug, Clone, Default)]
pub struct DatFile {
    pub displacement_sets: Vec<PrintedSet>,
}

fn set_name(header: &str) -> Option<String> {
    let mut tokens = header.split_whitespace();
    while let Some(token) = tokens.next() {
        if token.eq_ignore_ascii_case("set") {
            return tokens.next().map(str::to_ascii_uppercase);
        }
    }
    None
}

fn column(line: &str, start: usize, width: usize) -> Option<&str> {
    if start >= line.len() {
        return None;
    }
    line.get(start..(start + width).min(line.len()))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

impl DatFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = read_text(path, "printed output file")?;
        Self::parse(&text, &path.display().to_string())
    }

    pub fn parse(text: &str, file: &str) -> Result<Self> {
        let lines: Vec<&str> = text.lines().collect();
        let mut displacement_sets = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let line = lines[i];
            i += 1;
            if !line.starts_with(DISPLACEMENT_HEADER) {
                continue;
            }
            let name = set_name(line).ok_or_else(|| {
                IoError::malformed(file, i, "displacement section does not name its set")
            })?;

            let mut rows = Vec::new();
            while i < lines.len() {
                let row = lines[i];
                if row.trim().is_empty() {
                    i += 1;
                    continue;
                }
                if row.starts_with(DISPLACEMENT_HEADER) || row.starts_with(STRESS_HEADER) {
                    break;
                }
                let Some(label) = column(row, 0, LABEL_WIDTH).and_then(|s| s.parse::<i64>().ok())
                else {
                    break;
                };
                let label = solver_label(label)?;
                let mut values = [0.0; 3];
                for (k, value) in values.iter_mut().enumerate() {
                    let start = LABEL_WIDTH + k * VALUE_WIDTH;
                    let raw = column(row, start, VALUE_WIDTH).ok_or_else(|| {
                        IoError::malformed(file, i + 1, format!("missing u{} column", k + 1))
                    })?;
                    *value = parse_fortran_float(raw).ok_or_else(|| {
                        IoError::malformed(file, i + 1, format!("invalid displacement {raw:?}"))
                    })?;
                }
                rows.push((label, values));
                i += 1;
            }

            tracing::debug!(set = %name, rows = rows.len(), "read printed displacement section");
            displacement_sets.push(PrintedSet { name, rows });
        }

        if displacement_sets.is_empty() {
            return Err(IoError::missing_marker(file, DISPLACEMENT_HEADER));
        }
        Ok(Self { displacement_sets })
    }

    /// Recognised sets, each taken from its last printed section.
    pub fn node_sets(&self) -> NodeSets {
        let mut sets = NodeSets::new();
        for printed in &self.displacement_sets {
            if is_recognized(&printed.name) {
                sets.insert(NodeSet::new(&printed.name, printed.labels()));
            } else {
                tracing::debug!(set = %printed.name, "ignoring unrecognised printed set");
            }
        }
        sets
    }
}
