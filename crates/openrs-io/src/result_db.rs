//! Result-database back-end
//!
//! Abaqus-style databases are binary and only readable through the vendor
//! API, so they are exported once to a JSON document with the same object
//! model and read from there:
//!
//! ```text
//! root_assembly
//!   instances[]           name, nodes, elements, node_sets, element_sets
//! steps[]                 name
//!   frames[]              increment, frame_value
//!     field_outputs{U,S}  values[]: instance, node_label, element_label, position, data
//! ```
//!
//! One part instance is read: the configured one, else the only one, else the
//! one owning an `ALL` node set (the blank of a roller-bending assembly). When
//! that instance has `ALL` node or element sets, nodes, elements and field
//! values outside them are dropped. Field values without an `instance` tag
//! belong to the selected instance.
//!
//! The selected step's last frame is used. Stress values are kept when their
//! position is `ELEMENT_NODAL`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use openrs_model::sets::ALL;
use openrs_model::{
    ElementTable, Hex8, NodeRecord, NodeSet, NodeSets, NodeTable, Provenance, ResultTables,
    StressContribution, is_recognized, solver_label,
};
use serde::{Deserialize, Serialize};

use crate::error::{IoError, Result, read_text};
use crate::output::write_atomic;

/// Field output name of nodal displacements
pub const DISPLACEMENT_FIELD: &str = "U";
/// Field output name of stresses
pub const STRESS_FIELD: &str = "S";

/// Exported result database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDatabase {
    pub root_assembly: RootAssembly,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RootAssembly {
    #[serde(default)]
    pub instances: Vec<PartInstance>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PartInstance {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<DbNode>,
    #[serde(default)]
    pub elements: Vec<DbElement>,
    #[serde(default)]
    pub node_sets: Vec<DbNodeSet>,
    #[serde(default)]
    pub element_sets: Vec<DbElementSet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbNode {
    pub label: i64,
    pub coordinates: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbElement {
    pub label: i64,
    #[serde(rename = "type")]
    pub element_type: String,
    pub connectivity: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbNodeSet {
    pub name: String,
    pub nodes: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbElementSet {
    pub name: String,
    pub elements: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    #[serde(default)]
    pub frames: Vec<Frame>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub increment: u32,
    #[serde(default)]
    pub frame_value: f64,
    #[serde(default)]
    pub field_outputs: BTreeMap<String, FieldOutput>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldOutput {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub values: Vec<FieldValue>,
}

/// Where a field value is located on the mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Position {
    Nodal,
    ElementNodal,
    IntegrationPoint,
    Centroid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    /// Owning part instance; untagged values belong to the selected one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_label: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_label: Option<i64>,
    pub position: Position,
    pub data: Vec<f64>,
}

impl FieldValue {
    fn node_and_components(&self, field: &str) -> Result<(u32, [f64; 3])> {
        let raw = self.node_label.ok_or_else(|| {
            IoError::Schema(format!("{field} value at {:?} has no node label", self.position))
        })?;
        let label = solver_label(raw)?;
        match self.data.as_slice() {
            [a, b, c, ..] => Ok((label, [*a, *b, *c])),
            other => Err(IoError::Schema(format!(
                "{field} value for node {label} has {} components, expected at least 3",
                other.len()
            ))),
        }
    }
}

/// Labels of a set, or `None` when every label is kept
type LabelFilter = Option<BTreeSet<i64>>;

fn keeps(filter: &LabelFilter, label: i64) -> bool {
    filter.as_ref().is_none_or(|labels| labels.contains(&label))
}

impl PartInstance {
    pub fn node_set(&self, name: &str) -> Option<&DbNodeSet> {
        self.node_sets
            .iter()
            .find(|set| set.name.eq_ignore_ascii_case(name))
    }

    pub fn element_set(&self, name: &str) -> Option<&DbElementSet> {
        self.element_sets
            .iter()
            .find(|set| set.name.eq_ignore_ascii_case(name))
    }

    fn owns(&self, value: &FieldValue) -> bool {
        value
            .instance
            .as_deref()
            .is_none_or(|name| name.eq_ignore_ascii_case(&self.name))
    }
}

/// Which instance and step of a database to read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub instance: Option<String>,
    pub step: Option<String>,
}

impl Selection {
    pub fn step(step: impl Into<String>) -> Self {
        Self {
            step: Some(step.into()),
            ..Self::default()
        }
    }

    pub fn instance(instance: impl Into<String>) -> Self {
        Self {
            instance: Some(instance.into()),
            ..Self::default()
        }
    }
}

fn is_binary_database(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("odb"))
}

impl ResultDatabase {
    /// Open an exported database read-only.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if is_binary_database(path) {
            return Err(IoError::InvalidInput(format!(
                "{} is a binary result database; export it to the JSON schema (.odb.json) first",
                path.display()
            )));
        }
        let text = read_text(path, "result database")?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Write the database as pretty JSON, replacing `path` atomically.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        write_atomic(path.as_ref(), &json)
    }

    /// The named part instance, else the only one, else the one owning an
    /// `ALL` node set.
    pub fn instance(&self, name: Option<&str>) -> Result<&PartInstance> {
        let instances = &self.root_assembly.instances;
        if let Some(name) = name {
            return instances
                .iter()
                .find(|i| i.name.eq_ignore_ascii_case(name))
                .ok_or_else(|| IoError::Schema(format!("part instance {name:?} not found")));
        }
        if let [instance] = instances.as_slice() {
            return Ok(instance);
        }
        let owners: Vec<&PartInstance> =
            instances.iter().filter(|i| i.node_set(ALL).is_some()).collect();
        match owners.as_slice() {
            [instance] => Ok(*instance),
            [] => Err(IoError::Schema(format!(
                "{} part instances and none owns an {ALL} node set; configure instance_name",
                instances.len()
            ))),
            many => Err(IoError::Schema(format!(
                "{} part instances own an {ALL} node set; configure instance_name",
                many.len()
            ))),
        }
    }

    /// The named step, or the only step when no name is given.
    pub fn step(&self, name: Option<&str>) -> Result<&Step> {
        match name {
            Some(name) => self
                .steps
                .iter()
                .find(|s| s.name == name)
                .ok_or_else(|| IoError::Schema(format!("step {name:?} not found"))),
            None => match self.steps.as_slice() {
                [step] => Ok(step),
                [] => Err(IoError::Schema("database has no steps".to_string())),
                steps => Err(IoError::Schema(format!(
                    "database has {} steps; configure step_name to choose one",
                    steps.len()
                ))),
            },
        }
    }

    /// Convert the selected step's final frame into canonical tables.
    pub fn to_tables(&self, selection: &Selection) -> Result<ResultTables> {
        let instance = self.instance(selection.instance.as_deref())?;
        let node_filter: LabelFilter = instance
            .node_set(ALL)
            .map(|set| set.nodes.iter().copied().collect());
        let element_filter: LabelFilter = instance
            .element_set(ALL)
            .map(|set| set.elements.iter().copied().collect());

        let nodes = NodeTable::from_records(
            instance
                .nodes
                .iter()
                .filter(|n| keeps(&node_filter, n.label))
                .map(|n| Ok(NodeRecord::new(solver_label(n.label)?, n.coordinates)))
                .collect::<Result<Vec<_>>>()?,
        )?;

        let mut elements = ElementTable::new();
        for element in instance
            .elements
            .iter()
            .filter(|e| keeps(&element_filter, e.label))
        {
            let label = solver_label(element.label)?;
            if !element.element_type.to_ascii_uppercase().starts_with("C3D8") {
                return Err(IoError::Schema(format!(
                    "element {label} has type {}; only C3D8 bricks are supported",
                    element.element_type
                )));
            }
            elements.insert(Hex8::from_solver_labels(label, &element.connectivity)?)?;
        }

        let mut named_sets = NodeSets::new();
        for set in &instance.node_sets {
            if !is_recognized(&set.name) {
                continue;
            }
            let labels = set
                .nodes
                .iter()
                .map(|&raw| solver_label(raw))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            named_sets.insert(NodeSet::new(&set.name, labels));
        }

        let step = self.step(selection.step.as_deref())?;
        let frame = step
            .frames
            .last()
            .ok_or_else(|| IoError::Schema(format!("step {:?} has no frames", step.name)))?;
        let field = |name: &str| {
            frame.field_outputs.get(name).ok_or_else(|| {
                IoError::Schema(format!(
                    "frame {} of step {:?} has no {name} field output",
                    frame.increment, step.name
                ))
            })
        };

        // Values of other instances, or outside the ALL sets, are not read.
        let in_mesh = |value: &FieldValue| {
            instance.owns(value)
                && value.node_label.is_none_or(|label| keeps(&node_filter, label))
                && value
                    .element_label
                    .is_none_or(|label| keeps(&element_filter, label))
        };

        let mut displacements = BTreeMap::new();
        for value in &field(DISPLACEMENT_FIELD)?.values {
            if value.position != Position::Nodal || !in_mesh(value) {
                continue;
            }
            let (label, u) = value.node_and_components(DISPLACEMENT_FIELD)?;
            if displacements.insert(label, u).is_some() {
                return Err(IoError::Schema(format!(
                    "duplicate displacement value for node {label}"
                )));
            }
        }

        let stress_contributions = field(STRESS_FIELD)?
            .values
            .iter()
            .filter(|v| v.position == Position::ElementNodal && in_mesh(*v))
            .map(|v| {
                let (node, s) = v.node_and_components(STRESS_FIELD)?;
                Ok(StressContribution::new(node, s[0], s[1], s[2]))
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(
            instance = %instance.name,
            step = %step.name,
            increment = frame.increment,
            nodes = nodes.len(),
            elements = elements.len(),
            contributions = stress_contributions.len(),
            "read result database frame"
        );

        Ok(ResultTables {
            provenance: Provenance {
                backend: "odb".to_string(),
                step: Some(step.name.clone()),
                increment: Some(frame.increment),
            },
            nodes,
            displacements,
            elements,
            stress_contributions,
            named_sets,
        })
    }
}
