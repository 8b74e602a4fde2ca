//! End-to-end repair scenarios through the public API.

use stl_repair::{
    Facet, Mesh, RepairParams, SourceFormat, StlError, Vertex, FACET_SIZE, HEADER_SIZE,
};
use tempfile::NamedTempFile;

fn v(x: f32, y: f32, z: f32) -> Vertex {
    Vertex::new(x, y, z)
}

/// Closed unit right tetrahedron, outward winding, zero normals.
fn tetrahedron() -> Vec<Facet> {
    let v0 = v(0.0, 0.0, 0.0);
    let v1 = v(1.0, 0.0, 0.0);
    let v2 = v(0.0, 1.0, 0.0);
    let v3 = v(0.0, 0.0, 1.0);
    vec![
        Facet::from_vertices(v0, v2, v1),
        Facet::from_vertices(v0, v1, v3),
        Facet::from_vertices(v1, v2, v3),
        Facet::from_vertices(v2, v0, v3),
    ]
}

/// Unit cube, 12 facets, outward winding, zero normals.
fn cube() -> Vec<Facet> {
    let p = [
        v(0.0, 0.0, 0.0),
        v(1.0, 0.0, 0.0),
        v(1.0, 1.0, 0.0),
        v(0.0, 1.0, 0.0),
        v(0.0, 0.0, 1.0),
        v(1.0, 0.0, 1.0),
        v(1.0, 1.0, 1.0),
        v(0.0, 1.0, 1.0),
    ];
    [
        [0, 2, 1],
        [0, 3, 2],
        [4, 5, 6],
        [4, 6, 7],
        [0, 1, 5],
        [0, 5, 4],
        [3, 7, 6],
        [3, 6, 2],
        [0, 4, 7],
        [0, 7, 3],
        [1, 2, 6],
        [1, 6, 5],
    ]
    .iter()
    .map(|&[a, b, c]| Facet::from_vertices(p[a], p[b], p[c]))
    .collect()
}

fn roundtrip_through_binary(facets: Vec<Facet>) -> Mesh {
    let mesh = Mesh::from_facets(facets);
    let file = NamedTempFile::new().unwrap();
    mesh.write_binary(file.path()).unwrap();
    Mesh::load(file.path()).unwrap()
}

#[test]
fn scenario_degenerate_single_facet() {
    // One facet with two identical vertices: repair empties the mesh.
    let facets = vec![Facet::from_vertices(
        v(0.0, 0.0, 0.0),
        v(1.0, 0.0, 0.0),
        v(1.0, 0.0, 0.0),
    )];
    let mut mesh = roundtrip_through_binary(facets);
    assert_eq!(mesh.facet_count(), 1);

    mesh.repair().unwrap();

    assert_eq!(mesh.facet_count(), 0);
    let stats = mesh.stats();
    assert_eq!(stats.degenerate_facets, 1);
    assert_eq!(stats.facets_removed, 1);
}

#[test]
fn scenario_tetrahedron_zero_normals() {
    let mut mesh = roundtrip_through_binary(tetrahedron());

    mesh.repair().unwrap();

    let stats = mesh.stats();
    assert_eq!(stats.normals_fixed, 4);
    assert_eq!(stats.number_of_parts, 1);
    assert!((stats.volume.abs() - 1.0 / 6.0).abs() < 1e-5);
    for facet in &mesh.facets {
        assert!((facet.normal.norm() - 1.0).abs() < 1e-5);
    }
}

#[test]
fn scenario_cube_one_facet_reversed() {
    let mut facets = cube();
    facets[10].vertices.swap(1, 2);
    let mut mesh = roundtrip_through_binary(facets);

    mesh.repair().unwrap();

    let stats = mesh.stats();
    assert_eq!(stats.facets_reversed, 1);
    assert_eq!(stats.connected_facets_3_edge, 12);
    assert!((stats.volume - 1.0).abs() < 1e-5);

    // Every stored normal agrees with the winding after repair.
    for facet in &mesh.facets {
        let diff = facet.normal - facet.computed_normal();
        assert!(diff.norm() < 1e-5);
    }
}

#[test]
fn scenario_cube_missing_facet_fill() {
    let mut facets = cube();
    facets.pop();
    let mut mesh = roundtrip_through_binary(facets);
    assert_eq!(mesh.facet_count(), 11);

    mesh.repair().unwrap();

    let stats = mesh.stats();
    assert_eq!(stats.facets_added, 1);
    assert_eq!(mesh.facet_count(), 12);
    assert_eq!(stats.connected_facets_3_edge, 12);
    assert!((stats.volume - 1.0).abs() < 1e-5);
    mesh.verify_neighbors().unwrap();
}

#[test]
fn scenario_cube_with_offset_vertex_snaps() {
    // One facet's copy of corner (1,1,1) is off by 1e-5 in z.
    let mut facets = cube();
    facets[10].vertices[2].z += 1e-5;
    let mut mesh = roundtrip_through_binary(facets);

    let params = RepairParams {
        fixed_tolerance: Some(1e-4),
        ..Default::default()
    };
    mesh.repair_with_config(&params).unwrap();

    let stats = mesh.stats();
    assert!(stats.edges_fixed >= 2, "edges_fixed = {}", stats.edges_fixed);
    assert_eq!(mesh.facet_count(), 12);
    assert_eq!(stats.connected_facets_3_edge, 12);
    assert!((stats.volume - 1.0).abs() < 1e-3);
}

#[test]
fn scenario_solid_prefixed_binary() {
    // A binary file whose header spells `solid` but whose size arithmetic
    // says binary: decoded as binary.
    let mut mesh = Mesh::from_facets(tetrahedron());
    mesh.stats.header[..5].copy_from_slice(b"solid");

    let file = NamedTempFile::new().unwrap();
    mesh.write_binary(file.path()).unwrap();

    let expected_len = (HEADER_SIZE + 4 + 4 * FACET_SIZE) as u64;
    assert_eq!(file.path().metadata().unwrap().len(), expected_len);

    let reloaded = Mesh::load(file.path()).unwrap();
    assert_eq!(reloaded.stats().format, SourceFormat::BinaryWithSolidHeader);
    assert_eq!(reloaded.facet_count(), 4);
}

#[test]
fn empty_mesh_loads_writes_and_reports_zeros() {
    let mut mesh = roundtrip_through_binary(Vec::new());
    assert_eq!(mesh.facet_count(), 0);

    mesh.repair().unwrap();

    let stats = mesh.stats();
    assert_eq!(stats.original_num_facets, 0);
    assert_eq!(stats.facets_removed, 0);
    assert_eq!(stats.facets_added, 0);
    assert_eq!(stats.number_of_parts, 0);
    assert_eq!(stats.volume, 0.0);

    let out = NamedTempFile::new().unwrap();
    mesh.write_binary(out.path()).unwrap();
    assert_eq!(
        out.path().metadata().unwrap().len(),
        (HEADER_SIZE + 4) as u64
    );
}

#[test]
fn single_tetrahedron_connectivity_profile() {
    let mut mesh = Mesh::from_facets(tetrahedron());
    mesh.repair().unwrap();

    let stats = mesh.stats();
    assert_eq!(stats.connected_facets_3_edge, 4);
    assert_eq!(stats.number_of_parts, 1);
}

#[test]
fn two_disjoint_tetrahedra_are_two_parts() {
    let mut facets = tetrahedron();
    for facet in tetrahedron() {
        let mut shifted = facet;
        for vertex in &mut shifted.vertices {
            vertex.x += 5.0;
        }
        facets.push(shifted);
    }
    let mut mesh = Mesh::from_facets(facets);
    mesh.repair().unwrap();

    assert_eq!(mesh.stats().number_of_parts, 2);
    assert_eq!(mesh.stats().connected_facets_3_edge, 8);
}

#[test]
fn repair_is_idempotent_after_hole_fill() {
    let mut facets = cube();
    facets.pop();
    let mut mesh = Mesh::from_facets(facets);
    mesh.repair().unwrap();

    let facets_first = mesh.facets.clone();
    let stats_first = mesh.stats();

    mesh.repair().unwrap();
    let stats_second = mesh.stats();

    assert_eq!(mesh.facets, facets_first);
    assert_eq!(stats_second.facets_added, stats_first.facets_added);
    assert_eq!(stats_second.facets_removed, stats_first.facets_removed);
    assert_eq!(stats_second.facets_reversed, stats_first.facets_reversed);
    assert_eq!(stats_second.edges_fixed, stats_first.edges_fixed);
    assert_eq!(stats_second.normals_fixed, stats_first.normals_fixed);
    assert_eq!(stats_second.degenerate_facets, stats_first.degenerate_facets);
}

#[test]
fn attribute_bytes_survive_repair_and_roundtrip() {
    let mut facets = cube();
    for (i, facet) in facets.iter_mut().enumerate() {
        facet.attr = 0xAB00 | i as u16;
    }
    let mut mesh = roundtrip_through_binary(facets);
    mesh.repair().unwrap();

    // No facets were added or removed, so every attribute survives
    // (possibly at a different index after compaction-free repair).
    let mut attrs: Vec<u16> = mesh.facets.iter().map(|f| f.attr).collect();
    attrs.sort_unstable();
    let expected: Vec<u16> = (0..12).map(|i| 0xAB00 | i as u16).collect();
    assert_eq!(attrs, expected);

    let out = NamedTempFile::new().unwrap();
    mesh.write_binary(out.path()).unwrap();
    let reloaded = Mesh::load(out.path()).unwrap();
    assert_eq!(reloaded.facets[0].attr & 0xFF00, 0xAB00);
}

#[test]
fn load_error_reports_missing_file() {
    match Mesh::load("/nonexistent/mesh.stl") {
        Err(StlError::IoRead { path, .. }) => {
            assert!(path.to_string_lossy().contains("nonexistent"));
        }
        other => panic!("expected IoRead error, got {other:?}"),
    }
}

#[test]
fn stats_report_mentions_all_counters() {
    let mut mesh = Mesh::from_facets(cube());
    mesh.repair().unwrap();
    let report = mesh.stats().to_string();
    for needle in [
        "Number of facets",
        "Number of parts",
        "Degenerate facets",
        "Edges fixed",
        "Facets removed",
        "Facets added",
        "Facets reversed",
        "Backwards edges",
        "Normals fixed",
        "Volume",
    ] {
        assert!(report.contains(needle), "report missing {needle:?}");
    }
}
