//! Fiducial (datum) node positions
//!
//! The fiducial file lists, for each datum set, a `U_<SET>` header followed
//! by one `label x y z` row per member node in deformed coordinates:
//!
//! ```text
//! U_LEFT_LOWER_DATUM
//! 12 -4.000000000000000000e1 2.500000000000000000e1 0.000000000000000000e0
//! ...
//! ```

use std::fmt::Write as _;
use std::path::Path;

use openrs_model::{DATUM_SETS, DeformedNodes, ModelError, NodeSets};

use crate::error::{IoError, Result, read_text};

/// Header prefix of a displaced-set block
pub const DISPLACED_PREFIX: &str = "U_";

/// Deformed positions of one node set
#[derive(Debug, Clone, PartialEq)]
pub struct FiducialBlock {
    /// Set name without the `U_` prefix
    pub set: String,
    pub rows: Vec<(u32, [f64; 3])>,
}

impl FiducialBlock {
    pub fn centroid(&self) -> Option<[f64; 3]> {
        if self.rows.is_empty() {
            return None;
        }
        let n = self.rows.len() as f64;
        let sum = self.rows.iter().fold([0.0; 3], |acc, (_, p)| {
            [acc[0] + p[0], acc[1] + p[1], acc[2] + p[2]]
        });
        Some([sum[0] / n, sum[1] / n, sum[2] / n])
    }
}

/// Blocks in file order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FiducialBlocks {
    blocks: Vec<FiducialBlock>,
}

impl FiducialBlocks {
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FiducialBlock> + '_ {
        self.blocks.iter()
    }

    pub fn get(&self, set: &str) -> Option<&FiducialBlock> {
        self.blocks
            .iter()
            .find(|b| b.set.eq_ignore_ascii_case(set))
    }

    /// Centroids of the four datum sets: left-lower, left-upper,
    /// right-upper, right-lower.
    pub fn datum_points(&self) -> Result<[[f64; 3]; 4]> {
        let mut points = [[0.0; 3]; 4];
        for (slot, set) in points.iter_mut().zip(DATUM_SETS) {
            let block = self.get(set).ok_or_else(|| {
                IoError::InvalidInput(format!("fiducial file has no {DISPLACED_PREFIX}{set} block"))
            })?;
            *slot = block.centroid().ok_or_else(|| {
                IoError::InvalidInput(format!("fiducial block {DISPLACED_PREFIX}{set} is empty"))
            })?;
        }
        Ok(points)
    }

    /// File text; coordinates use 18 significant decimals.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            let _ = writeln!(out, "{DISPLACED_PREFIX}{}", block.set);
            for (label, p) in &block.rows {
                let _ = writeln!(out, "{label} {:.18e} {:.18e} {:.18e}", p[0], p[1], p[2]);
            }
        }
        out
    }
}

/// Collect deformed positions of `order` sets, in that order.
///
/// A set absent from `sets` is an input fault; every member node must exist
/// in `deformed`.
pub fn extract_fiducials<S: AsRef<str>>(
    sets: &NodeSets,
    deformed: &DeformedNodes,
    order: &[S],
) -> Result<FiducialBlocks> {
    let mut blocks = Vec::with_capacity(order.len());
    for name in order {
        let set = sets
            .require(name.as_ref())
            .map_err(|err| IoError::InvalidInput(err.to_string()))?;
        let rows = set
            .nodes
            .iter()
            .map(|&label| {
                deformed.get(label).map(|p| (label, p)).ok_or_else(|| {
                    ModelError::UnknownNode {
                        label,
                        context: format!("node set {}", set.name),
                    }
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        tracing::debug!(set = %set.name, nodes = rows.len(), "extracted fiducial set");
        blocks.push(FiducialBlock {
            set: set.name.clone(),
            rows,
        });
    }
    Ok(FiducialBlocks { blocks })
}

/// Node label column: an integer, or a float with an integral value as
/// written by array dumps (`1.000000000000000000e+00`).
fn parse_label(raw: &str) -> Option<u32> {
    if let Ok(label) = raw.parse::<u32>() {
        return Some(label);
    }
    let value = raw.parse::<f64>().ok()?;
    let integral = value.is_finite() && value.fract() == 0.0;
    (integral && (0.0..=f64::from(u32::MAX)).contains(&value)).then_some(value as u32)
}

/// Parse fiducial text; blocks whose header lacks the `U_` prefix are skipped.
pub fn parse_fiducials(text: &str, file: &str) -> Result<FiducialBlocks> {
    let mut blocks: Vec<FiducialBlock> = Vec::new();
    // None before the first header; Some(false) inside an ignored block.
    let mut in_block: Option<bool> = None;

    for (i, line) in text.lines().enumerate() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            [] => {}
            [header] if header.parse::<f64>().is_err() => {
                match header.strip_prefix(DISPLACED_PREFIX) {
                    Some(set) => {
                        blocks.push(FiducialBlock {
                            set: set.to_ascii_uppercase(),
                            rows: Vec::new(),
                        });
                        in_block = Some(true);
                    }
                    None => in_block = Some(false),
                }
            }
            [label, x, y, z] => {
                let keep = in_block.ok_or_else(|| {
                    IoError::malformed(file, i + 1, "row before the first set header")
                })?;
                if !keep {
                    continue;
                }
                let label = parse_label(label).ok_or_else(|| {
                    IoError::malformed(file, i + 1, format!("invalid node label {label:?}"))
                })?;
                let mut p = [0.0; 3];
                for (slot, raw) in p.iter_mut().zip([x, y, z]) {
                    *slot = raw.parse().map_err(|_| {
                        IoError::malformed(file, i + 1, format!("invalid coordinate {raw:?}"))
                    })?;
                }
                if let Some(block) = blocks.last_mut() {
                    block.rows.push((label, p));
                }
            }
            _ => {
                return Err(IoError::malformed(
                    file,
                    i + 1,
                    "expected a set header or 'label x y z'",
                ));
            }
        }
    }
    Ok(FiducialBlocks { blocks })
}

pub fn read_fiducials<P: AsRef<Path>>(path: P) -> Result<FiducialBlocks> {
    let path = path.as_ref();
    let text = read_text(path, "fiducial file")?;
    parse_fiducials(&text, &path.display().to_string())
}
