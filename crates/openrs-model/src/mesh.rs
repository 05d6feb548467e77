//! Node and element tables for C3D8 result meshes.
//!
//! Solver node labels are 1-based and dense, so the node table is an arena
//! indexed by `label - 1`: output row `i` always holds node label `i + 1`,
//! whatever order the records were read in. Element connectivity is stored
//! already shifted to 0-based point indices, ready for unstructured-grid
//! output.

use std::collections::BTreeMap;

use crate::error::{ModelError, Result};

/// Nodes per 8-node hexahedral (C3D8) element.
pub const HEX8_NODES: usize = 8;

/// VTK cell type code for an 8-node hexahedron.
pub const VTK_HEXAHEDRON: u8 = 12;

/// A node as read from a result container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeRecord {
    /// Node label (1-based solver numbering)
    pub label: u32,
    /// Reference (undeformed) coordinates
    pub coords: [f64; 3],
}

impl NodeRecord {
    pub fn new(label: u32, coords: [f64; 3]) -> Self {
        Self { label, coords }
    }
}

/// Convert a raw solver label into a 1-based `u32` label.
pub fn solver_label(raw: i64) -> Result<u32> {
    if raw < 1 {
        return Err(ModelError::InvalidLabel(raw));
    }
    u32::try_from(raw).map_err(|_| ModelError::InvalidLabel(raw))
}

/// Reference node coordinates, row `i` holding node label `i + 1`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeTable {
    coords: Vec<[f64; 3]>,
}

impl NodeTable {
    /// Build the table from records in any order.
    ///
    /// Labels must be unique and cover `1..=N` without gaps.
    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = NodeRecord>,
    {
        let mut by_label = BTreeMap::new();
        for record in records {
            if record.label == 0 {
                return Err(ModelError::InvalidLabel(0));
            }
            if by_label.insert(record.label, record.coords).is_some() {
                return Err(ModelError::DuplicateNode(record.label));
            }
        }

        let mut coords = Vec::with_capacity(by_label.len());
        for (expected, (label, xyz)) in (1u32..).zip(by_label) {
            if label != expected {
                return Err(ModelError::NonContiguousLabels {
                    expected,
                    found: label,
                });
            }
            coords.push(xyz);
        }

        Ok(Self { coords })
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Row index for a node label, if the node exists.
    pub fn index_of(&self, label: u32) -> Option<usize> {
        let index = (label as usize).checked_sub(1)?;
        (index < self.coords.len()).then_some(index)
    }

    pub fn contains(&self, label: u32) -> bool {
        self.index_of(label).is_some()
    }

    pub fn get(&self, label: u32) -> Option<[f64; 3]> {
        self.index_of(label).map(|i| self.coords[i])
    }

    /// Coordinates in row order (label ascending).
    pub fn rows(&self) -> &[[f64; 3]] {
        &self.coords
    }

    /// `(label, coords)` pairs in row order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, [f64; 3])> + '_ {
        (1u32..).zip(self.coords.iter().copied())
    }

    /// Fail with a data-consistency error if `label` is not in the table.
    pub fn require(&self, label: u32, context: &str) -> Result<usize> {
        self.index_of(label)
            .ok_or_else(|| ModelError::unknown_node(label, context))
    }
}

/// An 8-node hexahedral element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hex8 {
    /// Element label (1-based solver numbering)
    pub label: u32,
    /// 0-based point indices (solver node label - 1)
    pub points: [usize; HEX8_NODES],
}

impl Hex8 {
    /// Build an element from 1-based solver node labels.
    pub fn from_solver_labels(label: u32, nodes: &[i64]) -> Result<Self> {
        if nodes.len() != HEX8_NODES {
            return Err(ModelError::BadConnectivity {
                label,
                found: nodes.len(),
            });
        }

        let mut points = [0usize; HEX8_NODES];
        for (slot, &raw) in points.iter_mut().zip(nodes) {
            *slot = solver_label(raw)? as usize - 1;
        }
        Ok(Self { label, points })
    }

    /// Connectivity back in 1-based solver numbering.
    pub fn node_labels(&self) -> [u32; HEX8_NODES] {
        self.points.map(|p| p as u32 + 1)
    }
}

/// Elements keyed by label; iteration is ascending by label.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementTable {
    cells: BTreeMap<u32, Hex8>,
}

impl ElementTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, element: Hex8) -> Result<()> {
        if self.cells.insert(element.label, element).is_some() {
            return Err(ModelError::DuplicateElement(element.label));
        }
        Ok(())
    }

    pub fn from_elements<I>(elements: I) -> Result<Self>
    where
        I: IntoIterator<Item = Hex8>,
    {
        let mut table = Self::new();
        for element in elements {
            table.insert(element)?;
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, label: u32) -> Option<&Hex8> {
        self.cells.get(&label)
    }

    /// Elements in ascending label order.
    pub fn iter(&self) -> impl Iterator<Item = &Hex8> + '_ {
        self.cells.values()
    }

    /// Check that every connectivity entry points at an existing node.
    pub fn validate_against(&self, nodes: &NodeTable) -> Result<()> {
        for element in self.cells.values() {
            for label in element.node_labels() {
                nodes.require(label, &format!("element {}", element.label))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records() -> Vec<NodeRecord> {
        vec![
            NodeRecord::new(1, [0.0, 0.0, 0.0]),
            NodeRecord::new(2, [1.0, 0.0, 0.0]),
            NodeRecord::new(3, [1.0, 1.0, 0.0]),
            NodeRecord::new(4, [0.0, 1.0, 0.0]),
        ]
    }

    #[test]
    fn node_rows_follow_label_order_for_any_permutation() {
        let reference = NodeTable::from_records(records()).unwrap();

        let mut shuffled = records();
        shuffled.swap(0, 3);
        shuffled.swap(1, 2);
        let permuted = NodeTable::from_records(shuffled).unwrap();

        assert_eq!(reference, permuted);
        for (row, coords) in permuted.rows().iter().enumerate() {
            assert_eq!(permuted.get(row as u32 + 1), Some(*coords));
        }
        assert_eq!(permuted.rows()[2], [1.0, 1.0, 0.0]);
    }

    #[test]
    fn rejects_duplicate_and_gapped_labels() {
        let mut dup = records();
        dup.push(NodeRecord::new(2, [9.0, 9.0, 9.0]));
        assert_eq!(
            NodeTable::from_records(dup),
            Err(ModelError::DuplicateNode(2))
        );

        let gapped = vec![
            NodeRecord::new(1, [0.0; 3]),
            NodeRecord::new(3, [0.0; 3]),
        ];
        assert_eq!(
            NodeTable::from_records(gapped),
            Err(ModelError::NonContiguousLabels {
                expected: 2,
                found: 3
            })
        );
    }

    #[test]
    fn index_of_is_bounded() {
        let table = NodeTable::from_records(records()).unwrap();
        assert_eq!(table.index_of(0), None);
        assert_eq!(table.index_of(1), Some(0));
        assert_eq!(table.index_of(4), Some(3));
        assert_eq!(table.index_of(5), None);
    }

    #[test]
    fn hex8_connectivity_is_zero_based() {
        let hex = Hex8::from_solver_labels(7, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(hex.points, [0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(hex.node_labels(), [1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn hex8_requires_eight_positive_labels() {
        assert_eq!(
            Hex8::from_solver_labels(3, &[1, 2, 3, 4]),
            Err(ModelError::BadConnectivity { label: 3, found: 4 })
        );
        assert_eq!(
            Hex8::from_solver_labels(3, &[1, 2, 3, 4, 5, 6, 7, 0]),
            Err(ModelError::InvalidLabel(0))
        );
    }

    #[test]
    fn element_table_orders_by_label_and_validates_nodes() {
        let nodes = NodeTable::from_records(
            (1..=8).map(|label| NodeRecord::new(label, [label as f64, 0.0, 0.0])),
        )
        .unwrap();

        let mut table = ElementTable::new();
        table
            .insert(Hex8::from_solver_labels(2, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap())
            .unwrap();
        table
            .insert(Hex8::from_solver_labels(1, &[8, 7, 6, 5, 4, 3, 2, 1]).unwrap())
            .unwrap();
        let labels: Vec<u32> = table.iter().map(|e| e.label).collect();
        assert_eq!(labels, vec![1, 2]);
        assert!(table.validate_against(&nodes).is_ok());

        table
            .insert(Hex8::from_solver_labels(3, &[1, 2, 3, 4, 5, 6, 7, 9]).unwrap())
            .unwrap();
        let err = table.validate_against(&nodes).unwrap_err();
        assert_eq!(err, ModelError::unknown_node(9, "element 3"));
    }

    #[test]
    fn duplicate_element_is_rejected() {
        let hex = Hex8::from_solver_labels(1, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        let err = ElementTable::from_elements([hex, hex]).unwrap_err();
        assert_eq!(err, ModelError::DuplicateElement(1));
    }
}
