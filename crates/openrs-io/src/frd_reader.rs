//! CalculiX FRD (result) file reader
//!
//! Reads the ASCII `.frd` written by `*NODE FILE` / `*EL FILE` output, keeping
//! node coordinates, C3D8 connectivity, and the final `DISP` and `STRESS`
//! nodal blocks.
//!
//! ## Format Overview
//!
//! A single pass records the line of every block marker:
//! - `    2C` node block, `    3C` element block
//! - ` -4  DISP`, ` -4  STRESS` result headers (dataset name after the key)
//! - ` -3` block terminator
//! - `    1PSTEP` result header (block counter, increment, step)
//!
//! Records inside a block are fixed-width:
//! - node / result value: key `-1` (3), label (10), values (12 each)
//! - element declaration: key `-1` (3), label (10), type (5), group, material
//! - element connectivity: key `-2` (3), node labels (10 each)
//! - `-5` component definitions in result blocks are skipped
//!
//! A file may hold several increments; only the last `DISP` and the last
//! `STRESS` block are read. The `1PSTEP` header in front of the last `DISP`
//! block names its increment and step.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use openrs_io::FrdFile;
//!
//! let frd = FrdFile::from_file("U_elastic_run_ccx.frd")?;
//! println!("Nodes: {}, Elements: {}", frd.nodes.len(), frd.elements.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use openrs_model::{
    ElementTable, Hex8, NodeRecord, NodeTable, StressContribution, solver_label,
};

use crate::error::{IoError, Result, read_text};

/// FRD element type code of the 8-node brick (C3D8)
const FRD_HE8: i64 = 1;

/// Block markers recognised in an FRD file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    NodeBlock,
    ElementBlock,
    Displacement,
    Stress,
    BlockEnd,
    StepHeader,
}

impl Marker {
    /// Literal text the marker starts with
    pub fn text(self) -> &'static str {
        match self {
            Marker::NodeBlock => "    2C",
            Marker::ElementBlock => "    3C",
            Marker::Displacement => " -4  DISP",
            Marker::Stress => " -4  STRESS",
            Marker::BlockEnd => " -3",
            Marker::StepHeader => "    1PSTEP",
        }
    }

    fn classify(line: &str) -> Option<Marker> {
        if line.starts_with(Marker::NodeBlock.text()) {
            return Some(Marker::NodeBlock);
        }
        if line.starts_with(Marker::ElementBlock.text()) {
            return Some(Marker::ElementBlock);
        }
        if line.starts_with(Marker::BlockEnd.text()) {
            return Some(Marker::BlockEnd);
        }
        if line.starts_with(Marker::StepHeader.text()) {
            return Some(Marker::StepHeader);
        }
        // Dataset header: the name is the first token after the key, so
        // `DISP` does not also match `DISPI` or `DISPR`.
        if let Some(rest) = line.strip_prefix(" -4") {
            return match rest.split_whitespace().next() {
                Some("DISP") => Some(Marker::Displacement),
                Some("STRESS") => Some(Marker::Stress),
                _ => None,
            };
        }
        None
    }
}

/// Line numbers (0-based) of every marker occurrence, in file order
#[derive(Debug, Clone, Default)]
pub struct MarkerIndex {
    entries: Vec<(Marker, usize)>,
}

impl MarkerIndex {
    pub fn scan(lines: &[&str]) -> Self {
        let entries = lines
            .iter()
            .enumerate()
            .filter_map(|(i, line)| Marker::classify(line).map(|m| (m, i)))
            .collect();
        Self { entries }
    }

    pub fn count(&self, marker: Marker) -> usize {
        self.entries.iter().filter(|(m, _)| *m == marker).count()
    }

    pub fn first(&self, marker: Marker) -> Option<usize> {
        self.entries
            .iter()
            .find(|(m, _)| *m == marker)
            .map(|&(_, line)| line)
    }

    pub fn last(&self, marker: Marker) -> Option<usize> {
        self.entries
            .iter()
            .rev()
            .find(|(m, _)| *m == marker)
            .map(|&(_, line)| line)
    }

    /// Last occurrence of `marker` strictly before `line`
    pub fn last_before(&self, marker: Marker, line: usize) -> Option<usize> {
        self.entries
            .iter()
            .rev()
            .find(|&&(m, l)| m == marker && l < line)
            .map(|&(_, l)| l)
    }

    fn block_end_after(&self, line: usize) -> Option<usize> {
        self.entries
            .iter()
            .find(|&&(m, l)| m == Marker::BlockEnd && l > line)
            .map(|&(_, l)| l)
    }
}

/// A fixed-width column
#[derive(Debug, Clone, Copy)]
struct Field {
    name: &'static str,
    start: usize,
    width: usize,
}

const RECORD_KEY: Field = Field {
    name: "record key",
    start: 0,
    width: 3,
};
const RECORD_LABEL: Field = Field {
    name: "label",
    start: 3,
    width: 10,
};
const ELEMENT_TYPE: Field = Field {
    name: "element type",
    start: 13,
    width: 5,
};
const VALUE_WIDTH: usize = 12;
const NODE_LABEL_WIDTH: usize = 10;

const fn value_field(component: usize) -> Field {
    Field {
        name: "value",
        start: 13 + component * VALUE_WIDTH,
        width: VALUE_WIDTH,
    }
}

impl Field {
    fn text<'a>(&self, line: &'a str) -> Option<&'a str> {
        if self.start >= line.len() {
            return None;
        }
        let end = (self.start + self.width).min(line.len());
        line.get(self.start..end)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Parse a Fortran `E` float, also accepting the exponent-without-`E` form
/// (`1.234-100`) written for three-digit exponents.
pub(crate) fn parse_fortran_float(raw: &str) -> Option<f64> {
    if let Ok(v) = raw.parse::<f64>() {
        return Some(v);
    }
    let split = raw
        .char_indices()
        .skip(1)
        .find(|&(i, c)| (c == '-' || c == '+') && raw.as_bytes()[i - 1].is_ascii_digit())
        .map(|(i, _)| i)?;
    format!("{}E{}", &raw[..split], &raw[split..]).parse().ok()
}

/// Reads fixed-width records between markers
struct BlockReader<'a> {
    file: &'a str,
    lines: &'a [&'a str],
    index: &'a MarkerIndex,
}

impl<'a> BlockReader<'a> {
    /// Line range strictly between `marker` (at `open`) and its ` -3`.
    fn bounds(&self, marker: Marker, open: Option<usize>) -> Result<(usize, usize)> {
        let open = open.ok_or_else(|| IoError::missing_marker(self.file, marker.text()))?;
        let close = self.index.block_end_after(open).ok_or_else(|| {
            IoError::malformed(
                self.file,
                open + 1,
                format!("block {:?} is not terminated by ' -3'", marker.text()),
            )
        })?;
        Ok((open + 1, close))
    }

    fn records(&self, start: usize, end: usize) -> impl Iterator<Item = (usize, &'a str)> + 'a {
        let lines = self.lines;
        (start..end)
            .map(move |i| (i + 1, lines[i]))
            .filter(|(_, line)| !line.trim().is_empty())
    }

    fn field<'l>(&self, line_no: usize, line: &'l str, field: Field) -> Result<&'l str> {
        field.text(line).ok_or_else(|| {
            IoError::malformed(self.file, line_no, format!("missing {} column", field.name))
        })
    }

    fn int(&self, line_no: usize, line: &str, field: Field) -> Result<i64> {
        let raw = self.field(line_no, line, field)?;
        raw.parse().map_err(|_| {
            IoError::malformed(self.file, line_no, format!("invalid {} {raw:?}", field.name))
        })
    }

    fn float(&self, line_no: usize, line: &str, field: Field) -> Result<f64> {
        let raw = self.field(line_no, line, field)?;
        parse_fortran_float(raw).ok_or_else(|| {
            IoError::malformed(self.file, line_no, format!("invalid {} {raw:?}", field.name))
        })
    }

    fn key<'l>(&self, line_no: usize, line: &'l str) -> Result<&'l str> {
        self.field(line_no, line, RECORD_KEY)
    }

    fn label(&self, line_no: usize, line: &str) -> Result<u32> {
        Ok(solver_label(self.int(line_no, line, RECORD_LABEL)?)?)
    }

    fn nodes(&self) -> Result<NodeTable> {
        let (start, end) = self.bounds(Marker::NodeBlock, self.index.first(Marker::NodeBlock))?;
        let mut records = Vec::with_capacity(end - start);
        for (line_no, line) in self.records(start, end) {
            if self.key(line_no, line)? != "-1" {
                return Err(IoError::malformed(
                    self.file,
                    line_no,
                    "expected a '-1' node record",
                ));
            }
            let label = self.label(line_no, line)?;
            let coords = [
                self.float(line_no, line, value_field(0))?,
                self.float(line_no, line, value_field(1))?,
                self.float(line_no, line, value_field(2))?,
            ];
            records.push(NodeRecord::new(label, coords));
        }
        Ok(NodeTable::from_records(records)?)
    }

    fn elements(&self) -> Result<ElementTable> {
        let (start, end) =
            self.bounds(Marker::ElementBlock, self.index.first(Marker::ElementBlock))?;
        let mut elements = ElementTable::new();
        // Declaration (-1) and connectivity (-2) sit on separate lines.
        let mut current: Option<(u32, Vec<i64>)> = None;

        for (line_no, line) in self.records(start, end) {
            match self.key(line_no, line)? {
                "-1" => {
                    if let Some((label, nodes)) = current.take() {
                        elements.insert(Hex8::from_solver_labels(label, &nodes)?)?;
                    }
                    let label = self.label(line_no, line)?;
                    let element_type = self.int(line_no, line, ELEMENT_TYPE)?;
                    if element_type != FRD_HE8 {
                        return Err(IoError::malformed(
                            self.file,
                            line_no,
                            format!(
                                "element {label} has FRD type {element_type}; only C3D8 (type {FRD_HE8}) is supported"
                            ),
                        ));
                    }
                    current = Some((label, Vec::with_capacity(8)));
                }
                "-2" => {
                    let Some((_, nodes)) = current.as_mut() else {
                        return Err(IoError::malformed(
                            self.file,
                            line_no,
                            "connectivity record without a preceding element declaration",
                        ));
                    };
                    let body = line.trim_end();
                    let mut start = RECORD_KEY.width;
                    while start < body.len() {
                        let field = Field {
                            name: "node label",
                            start,
                            width: NODE_LABEL_WIDTH,
                        };
                        nodes.push(self.int(line_no, body, field)?);
                        start += NODE_LABEL_WIDTH;
                    }
                }
                other => {
                    return Err(IoError::malformed(
                        self.file,
                        line_no,
                        format!("unexpected record key {other:?} in element block"),
                    ));
                }
            }
        }
        if let Some((label, nodes)) = current.take() {
            elements.insert(Hex8::from_solver_labels(label, &nodes)?)?;
        }
        Ok(elements)
    }

    /// `(increment, step)` from the `1PSTEP` header in front of the last
    /// `DISP` block, if the file has one.
    fn final_step(&self) -> Result<Option<(u32, u32)>> {
        let Some(header) = self
            .index
            .last(Marker::Displacement)
            .and_then(|disp| self.index.last_before(Marker::StepHeader, disp))
        else {
            return Ok(None);
        };
        let line = self.lines[header];
        let numbers = line[Marker::StepHeader.text().len()..]
            .split_whitespace()
            .map(|t| t.parse::<u32>())
            .collect::<std::result::Result<Vec<_>, _>>();
        match numbers.as_deref() {
            Ok([_, increment, step, ..]) => Ok(Some((*increment, *step))),
            _ => Err(IoError::malformed(
                self.file,
                header + 1,
                "expected block, increment and step numbers after '1PSTEP'",
            )),
        }
    }

    /// `(label, first three values)` of every `-1` record in the last `marker` block.
    fn last_result_block(&self, marker: Marker) -> Result<Vec<(usize, u32, [f64; 3])>> {
        let (start, end) = self.bounds(marker, self.index.last(marker))?;
        let mut rows = Vec::with_capacity(end - start);
        for (line_no, line) in self.records(start, end) {
            match self.key(line_no, line)? {
                "-5" => continue,
                "-1" => {
                    let label = self.label(line_no, line)?;
                    let values = [
                        self.float(line_no, line, value_field(0))?,
                        self.float(line_no, line, value_field(1))?,
                        self.float(line_no, line, value_field(2))?,
                    ];
                    rows.push((line_no, label, values));
                }
                other => {
                    return Err(IoError::malformed(
                        self.file,
                        line_no,
                        format!("unexpected record key {other:?} in result block"),
                    ));
                }
            }
        }
        Ok(rows)
    }
}

/// Tables read from an FRD result file
#[derive(Debug, Clone)]
pub struct FrdFile {
    /// Reference node coordinates
    pub nodes: NodeTable,
    /// C3D8 connectivity
    pub elements: ElementTable,
    /// Displacements of the final increment
    pub displacements: BTreeMap<u32, [f64; 3]>,
    /// Nodal S11/S22/S33 of the final increment
    pub stresses: Vec<StressContribution>,
    /// Number of displacement blocks in the file; the last one was read
    pub increments: u32,
    /// Increment number of the block that was read, from its `1PSTEP` header
    pub increment: Option<u32>,
    /// Step number of the block that was read
    pub step: Option<u32>,
}

impl FrdFile {
    /// Read FRD file from path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = read_text(path, "result file")?;
        Self::parse(&text, &path.display().to_string())
    }

    /// Parse FRD text; `file` names the source in error messages.
    pub fn parse(text: &str, file: &str) -> Result<Self> {
        let lines: Vec<&str> = text.lines().collect();
        let index = MarkerIndex::scan(&lines);
        let reader = BlockReader {
            file,
            lines: &lines,
            index: &index,
        };

        let nodes = reader.nodes()?;
        let elements = reader.elements()?;

        let mut displacements = BTreeMap::new();
        for (line_no, label, values) in reader.last_result_block(Marker::Displacement)? {
            if displacements.insert(label, values).is_some() {
                return Err(IoError::malformed(
                    file,
                    line_no,
                    format!("duplicate displacement record for node {label}"),
                ));
            }
        }

        let stresses = reader
            .last_result_block(Marker::Stress)?
            .into_iter()
            .map(|(_, label, s)| StressContribution::new(label, s[0], s[1], s[2]))
            .collect::<Vec<_>>();

        let increments = index.count(Marker::Displacement) as u32;
        let (increment, step) = reader.final_step()?.unzip();
        tracing::info!(
            file,
            nodes = nodes.len(),
            elements = elements.len(),
            increments,
            ?increment,
            ?step,
            "read FRD result file"
        );

        Ok(Self {
            nodes,
            elements,
            displacements,
            stresses,
            increments,
            increment,
            step,
        })
    }
}
