//! Canonical tables produced by every result back-end.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::mesh::{ElementTable, NodeTable};
use crate::sets::NodeSets;
use crate::stress::StressContribution;

/// Where a set of tables came from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Provenance {
    /// Back-end name, e.g. `frd` or `odb`
    pub backend: String,
    /// Analysis step name, when the container records one
    pub step: Option<String>,
    /// Frame or increment the results were taken from
    pub increment: Option<u32>,
}

/// Node, element, displacement, stress and set tables for one result container.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultTables {
    pub provenance: Provenance,
    /// Reference coordinates
    pub nodes: NodeTable,
    /// Final-state displacements; nodes may be absent
    pub displacements: BTreeMap<u32, [f64; 3]>,
    /// C3D8 connectivity (0-based point indices)
    pub elements: ElementTable,
    /// Element-nodal S11/S22/S33 values of the final state
    pub stress_contributions: Vec<StressContribution>,
    /// Recognized named node sets
    pub named_sets: NodeSets,
}

impl ResultTables {
    /// Check that every node label referenced anywhere exists in the node table.
    pub fn validate(&self) -> Result<()> {
        self.elements.validate_against(&self.nodes)?;
        for &label in self.displacements.keys() {
            self.nodes.require(label, "displacement")?;
        }
        for contribution in &self.stress_contributions {
            self.nodes.require(contribution.node, "stress contribution")?;
        }
        self.named_sets.validate_against(&self.nodes)
    }
}
