use std::path::PathBuf;
use std::process::Command;

use openrs_cli::{
    ExtractRequest, FiducialInput, PipelineConfig, Stage, run_extract, run_flexure,
};
use openrs_io::{Backend, read_fiducials, read_mesh};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../openrs-io/tests/fixtures")
        .join(name)
}

#[test]
fn test_extract_frd_to_legacy_mesh() {
    let dir = tempfile::tempdir().unwrap();
    let mesh = dir.path().join("two_hex.vtk");
    let fid = dir.path().join("two_hex_fiducials.txt");

    let mut request = ExtractRequest::new(fixture("two_hex.frd"), &mesh, &fid);
    request.verify = true;
    let summary = run_extract(&request, &PipelineConfig::default()).expect("extract frd");

    assert_eq!(summary.provenance.backend, "frd");
    assert_eq!(summary.nodes, 12);
    assert_eq!(summary.elements, 2);
    assert_eq!(summary.empty_stress_nodes, 0);
    assert_eq!(summary.fiducial_sets, 4);
    assert_eq!(summary.written.len(), 2);
    assert!(summary.datum_points.is_some());

    let snapshot = read_mesh(&mesh).unwrap();
    assert_eq!(snapshot.points.len(), 12);
    assert_eq!(snapshot.cells.len(), 2);
    assert!(snapshot.point_array("S11").is_some());

    let blocks = read_fiducials(&fid).unwrap();
    assert_eq!(blocks.len(), 4);
    assert_eq!(blocks.datum_points().unwrap(), summary.datum_points.unwrap());
}

#[test]
fn test_backends_write_the_same_mesh() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig::default();

    let frd_mesh = dir.path().join("frd.vtu");
    let frd = ExtractRequest::new(fixture("two_hex.frd"), &frd_mesh, dir.path().join("frd.txt"));
    run_extract(&frd, &config).unwrap();

    let db_mesh = dir.path().join("db.vtu");
    let mut db = ExtractRequest::new(
        fixture("two_hex.odb.json"),
        &db_mesh,
        dir.path().join("db.txt"),
    );
    db.backend = Some(Backend::Odb);
    let summary = run_extract(&db, &config).unwrap();
    assert_eq!(summary.provenance.step.as_deref(), Some("Bend"));

    let a = read_mesh(&frd_mesh).unwrap();
    let b = read_mesh(&db_mesh).unwrap();
    assert_eq!(a.cells, b.cells);
    for (p, q) in a.points.iter().zip(&b.points) {
        for k in 0..3 {
            assert!((p[k] - q[k]).abs() < 1e-9);
        }
    }
    for name in ["S11", "S22", "S33"] {
        let (x, y) = (a.point_array(name).unwrap(), b.point_array(name).unwrap());
        for (u, v) in x.iter().zip(y) {
            assert!((u - v).abs() < 1e-9, "{name}: {u} vs {v}");
        }
    }
}

#[test]
fn test_missing_set_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mesh = dir.path().join("out.vtk");
    let fid = dir.path().join("fid.txt");
    let config = PipelineConfig::from_json(r#"{"fiducial_sets": ["LEFT", "NO_SUCH_SET"]}"#)
        .unwrap();

    let request = ExtractRequest::new(fixture("two_hex.frd"), &mesh, &fid);
    let err = run_extract(&request, &config).unwrap_err();
    assert_eq!(err.stage, Stage::Fiducials);
    assert!(!mesh.exists());
    assert!(!fid.exists());
}

#[test]
fn test_flexure_from_extracted_fiducials() {
    let dir = tempfile::tempdir().unwrap();
    let fid = dir.path().join("fid.txt");
    let request = ExtractRequest::new(fixture("two_hex.frd"), dir.path().join("m.vtk"), &fid);
    let config = PipelineConfig::default();
    let summary = run_extract(&request, &config).unwrap();

    let plot = dir.path().join("closure.svg");
    let from_file = run_flexure(&FiducialInput::File(fid), &config, Some(&plot)).unwrap();
    let from_points =
        run_flexure(&FiducialInput::Points(summary.datum_points.unwrap()), &config, None)
            .unwrap();

    assert!(from_file.closure.displacement.is_finite());
    assert!((from_file.closure.displacement - from_points.closure.displacement).abs() < 1e-12);
    assert!((from_file.boundary.left - from_file.closure.displacement / 2.0).abs() < 1e-12);
    assert!(plot.exists());
}

#[test]
fn test_extract_binary_reports_stage() {
    let dir = tempfile::tempdir().unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_openrs-extract"))
        .arg(fixture("two_hex.frd"))
        .arg(dir.path().join("out.stl"))
        .arg(dir.path().join("fid.txt"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error: serialize:"), "{stderr}");
}

#[test]
fn test_extract_binary_writes_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let mesh = dir.path().join("out.vtu");
    let fid = dir.path().join("fid.txt");
    let output = Command::new(env!("CARGO_BIN_EXE_openrs-extract"))
        .arg(fixture("two_hex.odb.json"))
        .arg(&mesh)
        .arg(&fid)
        .arg("--verify")
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("backend: odb"));
    assert!(stdout.contains("nodes: 12"));
    assert!(mesh.exists() && fid.exists());
}

#[test]
fn test_flexure_binary_prints_boundary() {
    let output = Command::new(env!("CARGO_BIN_EXE_openrs-flexure"))
        .args(["--points", "-40,25,0", "-40,45,0", "40,45,0", "40,25,0"])
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: f64 = stdout
        .lines()
        .find_map(|line| line.strip_prefix("closure_displacement: "))
        .unwrap()
        .parse()
        .unwrap();
    assert!(value.abs() < 1e-9);
    assert!(stdout.contains("*BOUNDARY"));
}
