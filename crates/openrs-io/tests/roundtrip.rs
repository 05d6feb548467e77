use std::path::PathBuf;

use openrs_io::{
    DISPLACED_PREFIX, DbNode, DbNodeSet, FrdSource, MeshFormat, MeshWriter, PartInstance,
    ResultDatabase, ResultDbSource, ResultSource, extract_fiducials, read_fiducials, read_mesh,
    write_atomic,
};
use openrs_model::{DATUM_SETS, EmptyNodePolicy, average_stress, deform};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

#[test]
fn test_frd_fixture_tables() {
    let tables = FrdSource::new(fixture("two_hex.frd")).read().expect("read frd fixture");

    assert_eq!(tables.provenance.backend, "frd");
    assert_eq!(tables.provenance.increment, Some(2));
    assert_eq!(tables.nodes.len(), 12);
    assert_eq!(tables.elements.len(), 2);
    assert_eq!(tables.displacements.len(), 12);
    assert_eq!(tables.stress_contributions.len(), 12);

    // Node records are permuted in the fixture; rows still follow labels.
    assert_eq!(tables.nodes.get(3), Some([1.0, 1.0, 0.0]));
    assert_eq!(tables.nodes.get(11), Some([1.0, 1.0, 2.0]));

    // Final increment only.
    let u12 = tables.displacements[&12];
    assert!((u12[0] - 0.012).abs() < 1e-12);
    assert!((u12[1] + 0.024).abs() < 1e-12);

    assert_eq!(tables.named_sets.len(), 6);
    assert_eq!(
        tables.named_sets.require("LEFT_UPPER_DATUM").unwrap().nodes,
        vec![4, 3]
    );
}

#[test]
fn test_backends_agree() {
    let frd = FrdSource::new(fixture("two_hex.frd")).read().unwrap();
    let odb = ResultDbSource::new(fixture("two_hex.odb.json")).read().unwrap();

    assert_eq!(odb.provenance.step.as_deref(), Some("Bend"));
    assert_eq!(odb.provenance.increment, Some(5));
    assert_eq!(frd.nodes, odb.nodes);
    assert_eq!(frd.elements, odb.elements);
    assert_eq!(frd.named_sets, odb.named_sets);

    let frd_avg = average_stress(frd.nodes.len(), &frd.stress_contributions, EmptyNodePolicy::Zero)
        .unwrap();
    let odb_avg = average_stress(odb.nodes.len(), &odb.stress_contributions, EmptyNodePolicy::Zero)
        .unwrap();
    for (a, b) in frd_avg.rows().iter().zip(odb_avg.rows()) {
        for k in 0..3 {
            assert!((a[k] - b[k]).abs() < 1e-9, "{a:?} vs {b:?}");
        }
    }
    // Nodes 5..=8 are shared by both elements in the database export.
    assert_eq!(odb_avg.count(6), Some(2));
    assert_eq!(odb_avg.get(6), Some([60.0, -30.0, 15.0]));
}

#[test]
fn test_roller_assembly_reads_the_blank() {
    let mut db = ResultDatabase::open(fixture("two_hex.odb.json")).unwrap();
    let blank = &mut db.root_assembly.instances[0];
    blank.node_sets.push(DbNodeSet {
        name: "ALL".to_string(),
        nodes: (1..=12).collect(),
    });
    for (i, name) in ["ROLLER-1", "ROLLER-2", "ROLLER-3"].into_iter().enumerate() {
        db.root_assembly.instances.push(PartInstance {
            name: name.to_string(),
            nodes: vec![DbNode {
                label: 1,
                coordinates: [10.0 * i as f64, -5.0, 0.0],
            }],
            ..PartInstance::default()
        });
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plastic.odb.json");
    db.save(&path).unwrap();

    let single = ResultDbSource::new(fixture("two_hex.odb.json")).read().unwrap();
    let assembly = ResultDbSource::new(&path).read().unwrap();
    assert_eq!(assembly.nodes, single.nodes);
    assert_eq!(assembly.elements, single.elements);
    assert_eq!(assembly.displacements, single.displacements);
    assert_eq!(assembly.stress_contributions, single.stress_contributions);
    assert_eq!(assembly.named_sets.require("ALL").unwrap().nodes.len(), 12);
}

#[test]
fn test_legacy_and_xml_roundtrip_agree() {
    let tables = FrdSource::new(fixture("two_hex.frd")).read().unwrap();
    let stress = average_stress(
        tables.nodes.len(),
        &tables.stress_contributions,
        EmptyNodePolicy::Zero,
    )
    .unwrap();
    let points = deform(&tables.nodes, &tables.displacements).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let vtk = dir.path().join("two_hex.vtk");
    let vtu = dir.path().join("two_hex.vtu");
    let writer = MeshWriter::new(&points, &tables.elements, &stress).with_title("two_hex");
    writer.write(&vtk).unwrap();
    writer.write(&vtu).unwrap();

    let legacy = read_mesh(&vtk).unwrap();
    let xml = read_mesh(&vtu).unwrap();

    assert_eq!(legacy.points.len(), 12);
    assert_eq!(xml.points.len(), 12);
    assert_eq!(legacy.cells, xml.cells);
    assert_eq!(legacy.cells[1], vec![4, 5, 6, 7, 8, 9, 10, 11]);
    assert_eq!(legacy.cell_types, vec![12, 12]);
    assert_eq!(xml.cell_types, vec![12, 12]);

    for (a, b) in legacy.points.iter().zip(&xml.points) {
        for k in 0..3 {
            assert!((a[k] - b[k]).abs() < 1e-6);
        }
    }
    for name in ["S11", "S22", "S33"] {
        let a = legacy.point_array(name).unwrap();
        let b = xml.point_array(name).unwrap();
        assert_eq!(a.len(), 12);
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-6, "{name}: {x} vs {y}");
        }
    }

    // Stresses come back exactly as averaged.
    assert_eq!(legacy.point_array("S11").unwrap(), stress.component(0).as_slice());
}

#[test]
fn test_unsupported_mesh_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("two_hex.ply");
    assert!(MeshFormat::from_path(&path).is_err());
}

#[test]
fn test_fiducial_file_roundtrip() {
    let tables = FrdSource::new(fixture("two_hex.frd")).read().unwrap();
    let points = deform(&tables.nodes, &tables.displacements).unwrap();
    let blocks = extract_fiducials(&tables.named_sets, &points, &DATUM_SETS).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fiducials.txt");
    write_atomic(&path, blocks.render().as_bytes()).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let headers: Vec<&str> = text.lines().filter(|l| l.starts_with(DISPLACED_PREFIX)).collect();
    assert_eq!(
        headers,
        vec![
            "U_LEFT_LOWER_DATUM",
            "U_LEFT_UPPER_DATUM",
            "U_RIGHT_UPPER_DATUM",
            "U_RIGHT_LOWER_DATUM"
        ]
    );

    let back = read_fiducials(&path).unwrap();
    assert_eq!(back, blocks);
    let datum = back.datum_points().unwrap();
    // LEFT_LOWER_DATUM = nodes 1 and 2.
    assert!((datum[0][0] - (0.5 + 0.0015)).abs() < 1e-12);
}
