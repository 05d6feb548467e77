//! Named node sets produced by the meshing/partitioning step.

use std::collections::BTreeMap;

use crate::error::{ModelError, Result};
use crate::mesh::NodeTable;

pub const ALL: &str = "ALL";
pub const LEFT_LOWER_DATUM: &str = "LEFT_LOWER_DATUM";
pub const LEFT_UPPER_DATUM: &str = "LEFT_UPPER_DATUM";
pub const RIGHT_UPPER_DATUM: &str = "RIGHT_UPPER_DATUM";
pub const RIGHT_LOWER_DATUM: &str = "RIGHT_LOWER_DATUM";
pub const LEFT: &str = "LEFT";
pub const RIGHT: &str = "RIGHT";

/// Datum sets in fiducial order: left-lower, left-upper, right-upper, right-lower.
pub const DATUM_SETS: [&str; 4] = [
    LEFT_LOWER_DATUM,
    LEFT_UPPER_DATUM,
    RIGHT_UPPER_DATUM,
    RIGHT_LOWER_DATUM,
];

/// Set names the result back-ends keep; anything else is skipped.
pub const RECOGNIZED_SETS: [&str; 7] = [
    ALL,
    LEFT_LOWER_DATUM,
    LEFT_UPPER_DATUM,
    RIGHT_LOWER_DATUM,
    RIGHT_UPPER_DATUM,
    LEFT,
    RIGHT,
];

/// Case-insensitive check against [`RECOGNIZED_SETS`].
pub fn is_recognized(name: &str) -> bool {
    RECOGNIZED_SETS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(name.trim()))
}

/// A named set of nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSet {
    /// Set name, upper-case
    pub name: String,
    /// Node labels in the order the source listed them
    pub nodes: Vec<u32>,
}

impl NodeSet {
    pub fn new(name: impl AsRef<str>, nodes: Vec<u32>) -> Self {
        Self {
            name: normalize_name(name.as_ref()),
            nodes,
        }
    }
}

/// Collection of node sets keyed by upper-case name
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeSets {
    sets: BTreeMap<String, NodeSet>,
}

impl NodeSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a set, replacing any earlier set of the same name.
    pub fn insert(&mut self, set: NodeSet) {
        self.sets.insert(set.name.clone(), set);
    }

    pub fn get(&self, name: &str) -> Option<&NodeSet> {
        self.sets.get(&normalize_name(name))
    }

    /// Like [`NodeSets::get`], but a missing set is an error.
    pub fn require(&self, name: &str) -> Result<&NodeSet> {
        self.get(name)
            .ok_or_else(|| ModelError::MissingSet(normalize_name(name)))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.sets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn validate_against(&self, nodes: &NodeTable) -> Result<()> {
        for set in self.sets.values() {
            for &label in &set.nodes {
                nodes.require(label, &format!("node set {}", set.name))?;
            }
        }
        Ok(())
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}
