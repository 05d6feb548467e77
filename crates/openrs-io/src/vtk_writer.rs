//! VTK/VTU writer for ParaView visualization
//!
//! Writes the deformed C3D8 mesh with averaged nodal stresses as point data.
//!
//! ## Supported Formats
//!
//! - **VTK Legacy** (`.vtk`): ASCII `UNSTRUCTURED_GRID`
//! - **VTU XML** (`.vtu`): ASCII `UnstructuredGrid`, uncompressed
//!
//! Points follow node table rows (ascending label), cells follow ascending
//! element label, and connectivity is 0-based. Stress values are written in
//! shortest round-trip form so a re-read reproduces them exactly.
//!
//! ## Usage
//!
//! ```rust,no_run
//! # use openrs_model::{AveragedStress, DeformedNodes, ElementTable};
//! # fn demo(points: &DeformedNodes, elements: &ElementTable, stress: &AveragedStress)
//! #     -> openrs_io::Result<()> {
//! use openrs_io::MeshWriter;
//!
//! MeshWriter::new(points, elements, stress)
//!     .with_title("U_elastic_run")
//!     .write("U_elastic_run.vtu")?;
//! # Ok(())
//! # }
//! ```

use std::io::{self, Write};
use std::path::Path;

use openrs_model::{AveragedStress, DeformedNodes, ElementTable, HEX8_NODES, VTK_HEXAHEDRON};

use crate::error::{IoError, Result};
use crate::output::write_atomic;

/// Names of the point arrays, in component order
pub const STRESS_ARRAYS: [&str; 3] = ["S11", "S22", "S33"];

/// Default number of decimals for point coordinates
pub const DEFAULT_COORDINATE_PRECISION: usize = 6;

/// Mesh output format, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    /// Legacy `.vtk`
    Legacy,
    /// XML `.vtu`
    Xml,
}

impl MeshFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "vtk" => Ok(MeshFormat::Legacy),
            "vtu" => Ok(MeshFormat::Xml),
            _ => Err(IoError::UnsupportedExtension(ext)),
        }
    }
}

/// Writer for a deformed mesh and its nodal stresses
pub struct MeshWriter<'a> {
    points: &'a DeformedNodes,
    elements: &'a ElementTable,
    stress: &'a AveragedStress,
    title: String,
    precision: usize,
}

impl<'a> MeshWriter<'a> {
    pub fn new(
        points: &'a DeformedNodes,
        elements: &'a ElementTable,
        stress: &'a AveragedStress,
    ) -> Self {
        Self {
            points,
            elements,
            stress,
            title: "mesh".to_string(),
            precision: DEFAULT_COORDINATE_PRECISION,
        }
    }

    /// Dataset name; the legacy header reads `<title>,created by OpenRS`.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    /// Render to `path`, picking the format from its extension.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = self.render(MeshFormat::from_path(path)?)?;
        write_atomic(path, &bytes)
    }

    /// Render the whole file in memory.
    pub fn render(&self, format: MeshFormat) -> Result<Vec<u8>> {
        if self.stress.len() != self.points.len() {
            return Err(IoError::InvalidInput(format!(
                "stress field has {} rows but the mesh has {} points",
                self.stress.len(),
                self.points.len()
            )));
        }
        let mut out = Vec::new();
        match format {
            MeshFormat::Legacy => self.write_legacy(&mut out)?,
            MeshFormat::Xml => self.write_xml(&mut out)?,
        }
        tracing::debug!(
            ?format,
            points = self.points.len(),
            cells = self.elements.len(),
            bytes = out.len(),
            "rendered mesh"
        );
        Ok(out)
    }

    fn write_legacy(&self, out: &mut impl Write) -> io::Result<()> {
        let prec = self.precision;
        let n = self.points.len();
        let m = self.elements.len();

        writeln!(out, "# vtk DataFile Version 2.0")?;
        writeln!(out, "{},created by OpenRS", self.title)?;
        writeln!(out, "ASCII")?;
        writeln!(out, "DATASET UNSTRUCTURED_GRID")?;

        writeln!(out, "POINTS {n} double")?;
        for p in self.points.rows() {
            writeln!(out, "{:.prec$} {:.prec$} {:.prec$}", p[0], p[1], p[2])?;
        }

        writeln!(out, "CELLS {m} {}", m * (HEX8_NODES + 1))?;
        for hex in self.elements.iter() {
            write!(out, "{HEX8_NODES}")?;
            for point in hex.points {
                write!(out, " {point}")?;
            }
            writeln!(out)?;
        }

        writeln!(out, "CELL_TYPES {m}")?;
        for _ in 0..m {
            writeln!(out, "{VTK_HEXAHEDRON}")?;
        }

        writeln!(out, "POINT_DATA {n}")?;
        for (component, name) in STRESS_ARRAYS.iter().enumerate() {
            writeln!(out, "SCALARS {name} float 1")?;
            writeln!(out, "LOOKUP_TABLE default")?;
            for row in self.stress.rows() {
                writeln!(out, "{:e}", row[component])?;
            }
        }
        Ok(())
    }

    fn write_xml(&self, out: &mut impl Write) -> io::Result<()> {
        let prec = self.precision;
        let n = self.points.len();
        let m = self.elements.len();

        writeln!(out, "<?xml version=\"1.0\"?>")?;
        writeln!(
            out,
            "<VTKFile type=\"UnstructuredGrid\" version=\"1.0\" byte_order=\"LittleEndian\" header_type=\"UInt32\">"
        )?;
        writeln!(out, "  <UnstructuredGrid>")?;
        writeln!(out, "    <Piece NumberOfPoints=\"{n}\" NumberOfCells=\"{m}\">")?;

        writeln!(out, "      <PointData>")?;
        for (component, name) in STRESS_ARRAYS.iter().enumerate() {
            let values = self.stress.component(component);
            writeln!(
                out,
                "        <DataArray type=\"Float64\" Name=\"{name}\" format=\"ascii\"{}>",
                range_attrs(values.iter().copied())
            )?;
            for chunk in values.chunks(6) {
                let line: Vec<String> = chunk.iter().map(|v| format!("{v:e}")).collect();
                writeln!(out, "          {}", line.join(" "))?;
            }
            writeln!(out, "        </DataArray>")?;
        }
        writeln!(out, "      </PointData>")?;
        writeln!(out, "      <CellData>")?;
        writeln!(out, "      </CellData>")?;

        writeln!(out, "      <Points>")?;
        let magnitudes = self
            .points
            .rows()
            .iter()
            .map(|p| (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt());
        writeln!(
            out,
            "        <DataArray type=\"Float64\" Name=\"Points\" NumberOfComponents=\"3\" format=\"ascii\"{}>",
            range_attrs(magnitudes)
        )?;
        for p in self.points.rows() {
            writeln!(out, "          {:.prec$} {:.prec$} {:.prec$}", p[0], p[1], p[2])?;
        }
        writeln!(out, "        </DataArray>")?;
        writeln!(out, "      </Points>")?;

        writeln!(out, "      <Cells>")?;
        let max_point = self
            .elements
            .iter()
            .flat_map(|hex| hex.points)
            .max();
        let connectivity_range = match max_point {
            Some(max) => format!(" RangeMin=\"0\" RangeMax=\"{max}\""),
            None => String::new(),
        };
        writeln!(
            out,
            "        <DataArray type=\"Int64\" Name=\"connectivity\" format=\"ascii\"{connectivity_range}>"
        )?;
        for hex in self.elements.iter() {
            let line: Vec<String> = hex.points.iter().map(usize::to_string).collect();
            writeln!(out, "          {}", line.join(" "))?;
        }
        writeln!(out, "        </DataArray>")?;

        let offsets_range = if m > 0 {
            format!(" RangeMin=\"{HEX8_NODES}\" RangeMax=\"{}\"", HEX8_NODES * m)
        } else {
            String::new()
        };
        writeln!(
            out,
            "        <DataArray type=\"Int64\" Name=\"offsets\" format=\"ascii\"{offsets_range}>"
        )?;
        let offsets: Vec<String> = (1..=m).map(|i| (i * HEX8_NODES).to_string()).collect();
        for chunk in offsets.chunks(6) {
            writeln!(out, "          {}", chunk.join(" "))?;
        }
        writeln!(out, "        </DataArray>")?;

        let types_range = if m > 0 {
            format!(" RangeMin=\"{VTK_HEXAHEDRON}\" RangeMax=\"{VTK_HEXAHEDRON}\"")
        } else {
            String::new()
        };
        writeln!(
            out,
            "        <DataArray type=\"UInt8\" Name=\"types\" format=\"ascii\"{types_range}>"
        )?;
        let types = vec![VTK_HEXAHEDRON.to_string(); m];
        for chunk in types.chunks(6) {
            writeln!(out, "          {}", chunk.join(" "))?;
        }
        writeln!(out, "        </DataArray>")?;
        writeln!(out, "      </Cells>")?;

        writeln!(out, "    </Piece>")?;
        writeln!(out, "  </UnstructuredGrid>")?;
        writeln!(out, "</VTKFile>")?;
        Ok(())
    }
}

/// ` RangeMin=".." RangeMax=".."` over the finite values, or nothing.
fn range_attrs(values: impl Iterator<Item = f64>) -> String {
    let range = values
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        });
    match range {
        Some((lo, hi)) => format!(" RangeMin=\"{lo:e}\" RangeMax=\"{hi:e}\""),
        None => String::new(),
    }
}
