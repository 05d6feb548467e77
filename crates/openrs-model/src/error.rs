//! Error types for openrs-model

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("node label {0} is not a valid 1-based label")]
    InvalidLabel(i64),

    #[error("duplicate node label {0}")]
    DuplicateNode(u32),

    #[error("node labels must be contiguous from 1: expected {expected}, found {found}")]
    NonContiguousLabels { expected: u32, found: u32 },

    #[error("{context} references unknown node {label}")]
    UnknownNode { label: u32, context: String },

    #[error("element {label} has {found} nodes, expected 8 (C3D8)")]
    BadConnectivity { label: u32, found: usize },

    #[error("duplicate element label {0}")]
    DuplicateElement(u32),

    #[error("required node set {0} not found")]
    MissingSet(String),
}

impl ModelError {
    pub(crate) fn unknown_node(label: u32, context: impl Into<String>) -> Self {
        ModelError::UnknownNode {
            label,
            context: context.into(),
        }
    }
}
