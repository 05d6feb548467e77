//! Re-reader for the meshes written by [`crate::vtk_writer`]
//!
//! Only the ASCII subsets produced here are understood: legacy
//! `UNSTRUCTURED_GRID` with `SCALARS` point data, and uncompressed ASCII VTU.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{IoError, Result, read_text};
use crate::vtk_writer::MeshFormat;

/// Mesh content as read back from disk
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeshSnapshot {
    pub points: Vec<[f64; 3]>,
    /// 0-based point indices per cell
    pub cells: Vec<Vec<usize>>,
    pub cell_types: Vec<u8>,
    /// Scalar point arrays by name
    pub point_arrays: BTreeMap<String, Vec<f64>>,
}

impl MeshSnapshot {
    pub fn point_array(&self, name: &str) -> Option<&[f64]> {
        self.point_arrays.get(name).map(Vec::as_slice)
    }

    fn check(&self, file: &str) -> Result<()> {
        if self.cells.len() != self.cell_types.len() {
            return Err(IoError::InvalidInput(format!(
                "{file}: {} cells but {} cell types",
                self.cells.len(),
                self.cell_types.len()
            )));
        }
        let n = self.points.len();
        if let Some(bad) = self.cells.iter().flatten().find(|&&p| p >= n) {
            return Err(IoError::InvalidInput(format!(
                "{file}: cell references point {bad} but the mesh has {n} points"
            )));
        }
        for (name, values) in &self.point_arrays {
            if values.len() != n {
                return Err(IoError::InvalidInput(format!(
                    "{file}: point array {name} has {} values for {n} points",
                    values.len()
                )));
            }
        }
        Ok(())
    }
}

/// Read a `.vtk` or `.vtu` mesh.
pub fn read_mesh<P: AsRef<Path>>(path: P) -> Result<MeshSnapshot> {
    let path = path.as_ref();
    let format = MeshFormat::from_path(path)?;
    let text = read_text(path, "mesh file")?;
    let file = path.display().to_string();
    match format {
        MeshFormat::Legacy => parse_legacy(&text, &file),
        MeshFormat::Xml => parse_xml(&text, &file),
    }
}

/// Whitespace tokens with their 1-based line numbers
struct Tokens<'a> {
    file: &'a str,
    inner: std::iter::Peekable<Box<dyn Iterator<Item = (usize, &'a str)> + 'a>>,
    last_line: usize,
}

impl<'a> Tokens<'a> {
    fn new(file: &'a str, text: &'a str, skip_lines: usize) -> Self {
        let inner: Box<dyn Iterator<Item = (usize, &'a str)> + 'a> = Box::new(
            text.lines()
                .enumerate()
                .skip(skip_lines)
                .flat_map(|(i, line)| line.split_whitespace().map(move |t| (i + 1, t))),
        );
        Self {
            file,
            inner: inner.peekable(),
            last_line: skip_lines,
        }
    }

    fn next(&mut self, what: &str) -> Result<&'a str> {
        match self.inner.next() {
            Some((line, token)) => {
                self.last_line = line;
                Ok(token)
            }
            None => Err(IoError::malformed(
                self.file,
                self.last_line,
                format!("unexpected end of file, expected {what}"),
            )),
        }
    }

    fn peek(&mut self) -> Option<&'a str> {
        self.inner.peek().map(|&(_, t)| t)
    }

    fn parse<T: std::str::FromStr>(&mut self, what: &str) -> Result<T> {
        let token = self.next(what)?;
        token.parse().map_err(|_| {
            IoError::malformed(self.file, self.last_line, format!("invalid {what} {token:?}"))
        })
    }

    fn floats(&mut self, count: usize, what: &str) -> Result<Vec<f64>> {
        (0..count).map(|_| self.parse(what)).collect()
    }
}

/// Parse legacy VTK text.
pub fn parse_legacy(text: &str, file: &str) -> Result<MeshSnapshot> {
    if !text.starts_with("# vtk DataFile") {
        return Err(IoError::missing_marker(file, "# vtk DataFile"));
    }
    // Line 2 is the free-form title.
    let mut tokens = Tokens::new(file, text, 2);
    let mut mesh = MeshSnapshot::default();
    let mut point_data = 0usize;

    while let Some(keyword) = tokens.peek() {
        tokens.next("keyword")?;
        match keyword {
            "ASCII" => {}
            "DATASET" => {
                let kind = tokens.next("dataset type")?;
                if kind != "UNSTRUCTURED_GRID" {
                    return Err(IoError::malformed(
                        file,
                        tokens.last_line,
                        format!("unsupported dataset {kind}"),
                    ));
                }
            }
            "POINTS" => {
                let n: usize = tokens.parse("point count")?;
                let coordinates = n.checked_mul(3).ok_or_else(|| {
                    IoError::malformed(
                        file,
                        tokens.last_line,
                        format!("point count {n} is too large"),
                    )
                })?;
                tokens.next("point data type")?;
                let flat = tokens.floats(coordinates, "coordinate")?;
                mesh.points = flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();
            }
            "CELLS" => {
                let m: usize = tokens.parse("cell count")?;
                let _size: usize = tokens.parse("cell list size")?;
                mesh.cells = (0..m)
                    .map(|_| {
                        let k: usize = tokens.parse("cell size")?;
                        (0..k)
                            .map(|_| tokens.parse("point index"))
                            .collect::<Result<Vec<usize>>>()
                    })
                    .collect::<Result<_>>()?;
            }
            "CELL_TYPES" => {
                let m: usize = tokens.parse("cell type count")?;
                mesh.cell_types = (0..m)
                    .map(|_| tokens.parse("cell type"))
                    .collect::<Result<_>>()?;
            }
            "POINT_DATA" => point_data = tokens.parse("point data count")?,
            "SCALARS" => {
                let name = tokens.next("array name")?.to_string();
                tokens.next("array data type")?;
                if tokens.peek().is_some_and(|t| t.parse::<usize>().is_ok()) {
                    let components: usize = tokens.parse("component count")?;
                    if components != 1 {
                        return Err(IoError::malformed(
                            file,
                            tokens.last_line,
                            format!("array {name} has {components} components"),
                        ));
                    }
                }
                if tokens.next("LOOKUP_TABLE")? != "LOOKUP_TABLE" {
                    return Err(IoError::malformed(
                        file,
                        tokens.last_line,
                        "expected LOOKUP_TABLE",
                    ));
                }
                tokens.next("lookup table name")?;
                let values = tokens.floats(point_data, "scalar value")?;
                mesh.point_arrays.insert(name, values);
            }
            other => {
                return Err(IoError::malformed(
                    file,
                    tokens.last_line,
                    format!("unexpected keyword {other:?}"),
                ));
            }
        }
    }

    mesh.check(file)?;
    Ok(mesh)
}

fn parse_numbers<T: std::str::FromStr>(text: &str, file: &str, array: &str) -> Result<Vec<T>> {
    text.split_whitespace()
        .map(|t| {
            t.parse().map_err(|_| {
                IoError::InvalidInput(format!("{file}: invalid value {t:?} in array {array}"))
            })
        })
        .collect()
}

fn child<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    name: &str,
    file: &str,
) -> Result<roxmltree::Node<'a, 'input>> {
    node.children()
        .find(|n| n.has_tag_name(name))
        .ok_or_else(|| IoError::missing_marker(file, format!("<{name}>")))
}

fn arrays<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
    node.children()
        .filter(|n| n.has_tag_name("DataArray"))
        .map(|n| (n.attribute("Name").unwrap_or(""), n.text().unwrap_or("")))
}

fn count_attr(node: roxmltree::Node, name: &str, file: &str) -> Result<usize> {
    node.attribute(name)
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| IoError::InvalidInput(format!("{file}: <Piece> lacks a valid {name}")))
}

/// Parse ASCII VTU text.
pub fn parse_xml(text: &str, file: &str) -> Result<MeshSnapshot> {
    let doc = roxmltree::Document::parse(text)?;
    let root = doc.root_element();
    if !root.has_tag_name("VTKFile") || root.attribute("type") != Some("UnstructuredGrid") {
        return Err(IoError::missing_marker(
            file,
            "<VTKFile type=\"UnstructuredGrid\">",
        ));
    }
    let grid = child(root, "UnstructuredGrid", file)?;
    let piece = child(grid, "Piece", file)?;
    let n = count_attr(piece, "NumberOfPoints", file)?;
    let m = count_attr(piece, "NumberOfCells", file)?;

    let mut mesh = MeshSnapshot::default();

    if let Ok(point_data) = child(piece, "PointData", file) {
        for (name, body) in arrays(point_data) {
            mesh.point_arrays
                .insert(name.to_string(), parse_numbers(body, file, name)?);
        }
    }

    let points = child(piece, "Points", file)?;
    let flat: Vec<f64> = match arrays(points).next() {
        Some((_, body)) => parse_numbers(body, file, "Points")?,
        None => Vec::new(),
    };
    let coordinates = n
        .checked_mul(3)
        .ok_or_else(|| IoError::InvalidInput(format!("{file}: point count {n} is too large")))?;
    if flat.len() != coordinates {
        return Err(IoError::InvalidInput(format!(
            "{file}: expected {coordinates} coordinates for {n} points, found {}",
            flat.len()
        )));
    }
    mesh.points = flat.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();

    let cells = child(piece, "Cells", file)?;
    let mut connectivity: Vec<usize> = Vec::new();
    let mut offsets: Vec<usize> = Vec::new();
    for (name, body) in arrays(cells) {
        match name {
            "connectivity" => connectivity = parse_numbers(body, file, name)?,
            "offsets" => offsets = parse_numbers(body, file, name)?,
            "types" => mesh.cell_types = parse_numbers(body, file, name)?,
            _ => {}
        }
    }
    if offsets.len() != m {
        return Err(IoError::InvalidInput(format!(
            "{file}: expected {m} cell offsets, found {}",
            offsets.len()
        )));
    }
    let mut start = 0;
    for &end in &offsets {
        let cell = connectivity.get(start..end).ok_or_else(|| {
            IoError::InvalidInput(format!("{file}: cell offset {end} is out of range"))
        })?;
        mesh.cells.push(cell.to_vec());
        start = end;
    }

    mesh.check(file)?;
    Ok(mesh)
}
