//! Canonical result tables for OpenRS U-bend analyses.
//!
//! This crate provides:
//! - **Node/element tables** for C3D8 meshes, indexed by dense solver labels
//! - **Named node sets** (datum, side and `ALL` sets from the meshing step)
//! - **Nodal stress averaging** of element-nodal contributions
//! - **Deformed geometry** from reference coordinates and displacements

pub mod error;
pub mod geometry;
pub mod mesh;
pub mod sets;
pub mod stress;
pub mod tables;

pub use error::{ModelError, Result};
pub use geometry::{DeformedNodes, deform};
pub use mesh::{ElementTable, HEX8_NODES, Hex8, NodeRecord, NodeTable, VTK_HEXAHEDRON, solver_label};
pub use sets::{DATUM_SETS, NodeSet, NodeSets, RECOGNIZED_SETS, is_recognized};
pub use stress::{AveragedStress, EmptyNodePolicy, StressContribution, average_stress};
pub use tables::{Provenance, ResultTables};
