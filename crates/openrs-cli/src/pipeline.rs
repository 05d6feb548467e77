//! Extraction and flexure pipelines
//!
//! Extraction runs parse → average → deform → serialize → fiducials. Both
//! output files are rendered in memory and only renamed into place once every
//! stage has succeeded.

use std::path::{Path, PathBuf};

use openrs_flexure::{
    Closure, ClosureBoundary, FiducialPoints, closure_displacement, dti_reading, write_svg,
};
use openrs_io::{
    Backend, MeshFormat, MeshSnapshot, MeshWriter, OutputBundle, STRESS_ARRAYS, SourceOptions,
    extract_fiducials, open_source, read_fiducials, read_mesh,
};
use openrs_model::{AveragedStress, Provenance, average_stress, deform};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result, Stage, StageError, StageExt};

/// Inputs of one extraction run
#[derive(Debug, Clone)]
pub struct ExtractRequest {
    pub result_file: PathBuf,
    pub mesh_out: PathBuf,
    pub fiducial_out: PathBuf,
    /// Printed-output companion of an FRD file
    pub dat: Option<PathBuf>,
    pub backend: Option<Backend>,
    /// Re-read the written mesh and compare it with what was rendered
    pub verify: bool,
}

impl ExtractRequest {
    pub fn new(
        result_file: impl Into<PathBuf>,
        mesh_out: impl Into<PathBuf>,
        fiducial_out: impl Into<PathBuf>,
    ) -> Self {
        Self {
            result_file: result_file.into(),
            mesh_out: mesh_out.into(),
            fiducial_out: fiducial_out.into(),
            dat: None,
            backend: None,
            verify: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractSummary {
    pub provenance: Provenance,
    pub nodes: usize,
    pub elements: usize,
    /// Nodes that received no stress contribution
    pub empty_stress_nodes: usize,
    pub fiducial_sets: usize,
    pub written: Vec<PathBuf>,
    /// Datum set centroids, when all four datum sets were extracted
    pub datum_points: Option<[[f64; 3]; 4]>,
}

fn mesh_title(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("mesh")
        .to_string()
}

pub fn run_extract(request: &ExtractRequest, config: &PipelineConfig) -> Result<ExtractSummary> {
    // Reject the output format before doing any reading.
    let mesh_format = MeshFormat::from_path(&request.mesh_out).stage(Stage::Serialize)?;

    let options = SourceOptions {
        backend: request.backend,
        dat_path: request.dat.clone(),
        step_name: config.step_name.clone(),
        instance_name: config.instance_name.clone(),
    };
    let source = open_source(&request.result_file, &options).stage(Stage::Parse)?;
    tracing::info!(source = %source.describe(), "reading results");
    let tables = source.read().stage(Stage::Parse)?;

    let stress = average_stress(
        tables.nodes.len(),
        &tables.stress_contributions,
        config.empty_node_policy,
    )
    .stage(Stage::Average)?;

    let deformed = deform(&tables.nodes, &tables.displacements).stage(Stage::Deform)?;
    if let Some((lo, hi)) = deformed.range() {
        tracing::debug!(lo, hi, "deformed coordinate range");
    }

    let mesh_bytes = MeshWriter::new(&deformed, &tables.elements, &stress)
        .with_title(mesh_title(&request.mesh_out))
        .with_precision(config.coordinate_precision)
        .render(mesh_format)
        .stage(Stage::Serialize)?;

    let fiducials = extract_fiducials(
        &tables.named_sets,
        &deformed,
        config.fiducial_sets.as_slice(),
    )
    .stage(Stage::Fiducials)?;
    let fiducial_text = fiducials.render();

    let mut bundle = OutputBundle::new();
    bundle
        .stage(&request.mesh_out, &mesh_bytes)
        .stage(Stage::Serialize)?;
    bundle
        .stage(&request.fiducial_out, fiducial_text.as_bytes())
        .stage(Stage::Fiducials)?;
    let written = bundle.commit().stage(Stage::Serialize)?;

    if request.verify {
        let snapshot = read_mesh(&request.mesh_out).stage(Stage::Verify)?;
        verify_mesh(&snapshot, tables.elements.len(), &stress)?;
        let reread = read_fiducials(&request.fiducial_out).stage(Stage::Verify)?;
        if reread != fiducials {
            return Err(mismatch("fiducial file does not read back as written"));
        }
        tracing::info!("verified written outputs");
    }

    let summary = ExtractSummary {
        provenance: tables.provenance,
        nodes: tables.nodes.len(),
        elements: tables.elements.len(),
        empty_stress_nodes: stress.empty_nodes(),
        fiducial_sets: fiducials.len(),
        written,
        datum_points: fiducials.datum_points().ok(),
    };
    tracing::info!(
        nodes = summary.nodes,
        elements = summary.elements,
        fiducial_sets = summary.fiducial_sets,
        "extraction complete"
    );
    Ok(summary)
}

fn mismatch(message: impl Into<String>) -> PipelineError {
    PipelineError::new(Stage::Verify, StageError::Mismatch(message.into()))
}

/// Tolerance for stresses read back from a written mesh
const VERIFY_TOLERANCE: f64 = 1e-6;

fn verify_mesh(snapshot: &MeshSnapshot, elements: usize, stress: &AveragedStress) -> Result<()> {
    if snapshot.points.len() != stress.len() {
        return Err(mismatch(format!(
            "mesh has {} points, expected {}",
            snapshot.points.len(),
            stress.len()
        )));
    }
    if snapshot.cells.len() != elements {
        return Err(mismatch(format!(
            "mesh has {} cells, expected {elements}",
            snapshot.cells.len()
        )));
    }
    for (component, name) in STRESS_ARRAYS.iter().enumerate() {
        let read = snapshot
            .point_array(name)
            .ok_or_else(|| mismatch(format!("mesh has no {name} array")))?;
        let expected = stress.component(component);
        let differs = read.iter().zip(&expected).position(|(a, b)| {
            !((a - b).abs() <= VERIFY_TOLERANCE || (a.is_nan() && b.is_nan()))
        });
        if let Some(row) = differs {
            return Err(mismatch(format!(
                "{name} of node {} reads back as {}, expected {}",
                row + 1,
                read[row],
                expected[row]
            )));
        }
    }
    Ok(())
}

/// Where the four fiducial points come from
#[derive(Debug, Clone)]
pub enum FiducialInput {
    Points([[f64; 3]; 4]),
    /// Fiducial file; its datum set centroids are used
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct FlexureReport {
    pub closure: Closure,
    pub boundary: ClosureBoundary,
    /// Dial-gauge equivalent of the closure
    pub dti_reading: f64,
}

pub fn run_flexure(
    input: &FiducialInput,
    config: &PipelineConfig,
    plot: Option<&Path>,
) -> Result<FlexureReport> {
    let raw = match input {
        FiducialInput::Points(points) => *points,
        FiducialInput::File(path) => read_fiducials(path)
            .and_then(|blocks| blocks.datum_points())
            .stage(Stage::Fiducials)?,
    };
    let points = FiducialPoints::new(raw).stage(Stage::Flexure)?;
    let closure = closure_displacement(&points, &config.flexure).stage(Stage::Flexure)?;

    if let Some(path) = plot {
        write_svg(&closure, path).stage(Stage::Flexure)?;
    }

    let boundary = ClosureBoundary::from_displacement(closure.displacement);
    let dti = dti_reading(closure.displacement, &config.flexure);
    tracing::info!(
        displacement = closure.displacement,
        dti_reading = dti,
        "computed flexure boundary condition"
    );
    Ok(FlexureReport {
        closure,
        boundary,
        dti_reading: dti,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_the_output_stem() {
        assert_eq!(mesh_title(Path::new("out/U_elastic_run.vtu")), "U_elastic_run");
    }

    #[test]
    fn unsupported_mesh_extension_fails_before_reading() {
        let request = ExtractRequest::new("missing.frd", "mesh.stl", "fid.txt");
        let err = run_extract(&request, &PipelineConfig::default()).unwrap_err();
        assert_eq!(err.stage, Stage::Serialize);
    }

    #[test]
    fn verify_flags_changed_stress() {
        let stress = average_stress(
            1,
            &[openrs_model::StressContribution::new(1, 1.0, 2.0, 3.0)],
            Default::default(),
        )
        .unwrap();
        let mut snapshot = MeshSnapshot {
            points: vec![[0.0; 3]],
            ..MeshSnapshot::default()
        };
        for (name, v) in STRESS_ARRAYS.iter().zip([1.0, 2.0, 3.5]) {
            snapshot.point_arrays.insert(name.to_string(), vec![v]);
        }
        let err = verify_mesh(&snapshot, 0, &stress).unwrap_err();
        assert!(err.to_string().contains("S33 of node 1"), "{err}");
    }

    #[test]
    fn flexure_from_points() {
        let input = FiducialInput::Points([
            [-40.0, 25.0, 0.0],
            [-40.0, 45.0, 0.0],
            [40.0, 45.0, 0.0],
            [40.0, 25.0, 0.0],
        ]);
        let report = run_flexure(&input, &PipelineConfig::default(), None).unwrap();
        assert!(report.closure.displacement.abs() < 1e-12);
        assert!(report.boundary.left.abs() < 1e-12);
    }
}
