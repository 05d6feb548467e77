//! I/O support for OpenRS result extraction.
//!
//! This crate provides:
//! - **FRD (result file)** reader for CalculiX node/element/DISP/STRESS blocks
//! - **DAT (printed output)** reader for the named node sets of a CalculiX run
//! - **Result-database** reader for exported Abaqus-style databases (JSON)
//! - **Back-end selection** behind the [`ResultSource`] trait
//! - **VTK/VTU export** of the deformed mesh for ParaView, plus a re-reader
//! - **Fiducial files** (`U_<SET>` blocks) writer and reader
//! - **Atomic output** persistence

pub mod dat_reader;
pub mod error;
pub mod fiducial;
pub mod frd_reader;
mod output;
pub mod result_db;
pub mod source;
pub mod vtk_reader;
pub mod vtk_writer;

pub use dat_reader::{DatFile, PrintedSet};
pub use error::{IoError, Result};
pub use fiducial::{
    DISPLACED_PREFIX, FiducialBlock, FiducialBlocks, extract_fiducials, parse_fiducials,
    read_fiducials,
};
pub use frd_reader::{FrdFile, Marker, MarkerIndex};
pub use output::{OutputBundle, write_atomic};
pub use result_db::{
    DbElement, DbElementSet, DbNode, DbNodeSet, FieldOutput, FieldValue, Frame, PartInstance,
    Position, ResultDatabase, RootAssembly, Selection, Step,
};
pub use source::{
    Backend, FrdSource, ResultDbSource, ResultSource, SourceOptions, open_source,
};
pub use vtk_reader::{MeshSnapshot, parse_legacy, parse_xml, read_mesh};
pub use vtk_writer::{DEFAULT_COORDINATE_PRECISION, MeshFormat, MeshWriter, STRESS_ARRAYS};
