//! Deformed node positions.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::mesh::NodeTable;

/// Deformed coordinates, row `i` holding node label `i + 1`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeformedNodes {
    coords: Vec<[f64; 3]>,
}

impl DeformedNodes {
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn get(&self, label: u32) -> Option<[f64; 3]> {
        let index = (label as usize).checked_sub(1)?;
        self.coords.get(index).copied()
    }

    pub fn rows(&self) -> &[[f64; 3]] {
        &self.coords
    }

    /// Smallest and largest coordinate value over all components.
    pub fn range(&self) -> Option<(f64, f64)> {
        self.coords.iter().flatten().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

/// Add displacements to reference coordinates.
///
/// A node with no displacement record keeps its reference position; the
/// solver omits nodes whose degrees of freedom it did not report. A
/// displacement for a label outside the node table is an error.
pub fn deform(nodes: &NodeTable, displacements: &BTreeMap<u32, [f64; 3]>) -> Result<DeformedNodes> {
    for &label in displacements.keys() {
        nodes.require(label, "displacement")?;
    }

    let coords: Vec<[f64; 3]> = nodes
        .iter()
        .map(|(label, xyz)| {
            let u = displacements.get(&label).copied().unwrap_or([0.0; 3]);
            [xyz[0] + u[0], xyz[1] + u[1], xyz[2] + u[2]]
        })
        .collect();

    let undisplaced = nodes.len() - displacements.len();
    if undisplaced > 0 {
        tracing::debug!(
            nodes = undisplaced,
            "nodes without displacement kept at reference position"
        );
    }

    Ok(DeformedNodes { coords })
}
