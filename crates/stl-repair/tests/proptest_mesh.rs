//! Property-based tests: round-trip laws and repair invariants.

use proptest::prelude::*;

use stl_repair::{Facet, Mesh, Vertex};
use tempfile::NamedTempFile;

fn finite_coord() -> impl Strategy<Value = f32> {
    prop_oneof![
        -1.0e6f32..1.0e6f32,
        Just(0.0f32),
        Just(-0.0f32),
        Just(1.0f32),
        Just(-1.0f32),
    ]
}

fn arb_vertex() -> impl Strategy<Value = Vertex> {
    (finite_coord(), finite_coord(), finite_coord()).prop_map(|(x, y, z)| Vertex::new(x, y, z))
}

fn arb_facet() -> impl Strategy<Value = Facet> {
    (
        arb_vertex(),
        arb_vertex(),
        arb_vertex(),
        arb_vertex(),
        any::<u16>(),
    )
        .prop_map(|(n, v0, v1, v2, attr)| Facet {
            normal: n,
            vertices: [v0, v1, v2],
            attr,
        })
}

proptest! {
    /// Binary write then read then write again is the identity on bytes,
    /// whatever the facet payload.
    #[test]
    fn prop_binary_roundtrip_byte_identity(facets in prop::collection::vec(arb_facet(), 0..24)) {
        let mesh = Mesh::from_facets(facets);
        let first = NamedTempFile::new().unwrap();
        mesh.write_binary(first.path()).unwrap();
        let bytes_first = std::fs::read(first.path()).unwrap();

        let reloaded = Mesh::load(first.path()).unwrap();
        let second = NamedTempFile::new().unwrap();
        reloaded.write_binary(second.path()).unwrap();
        let bytes_second = std::fs::read(second.path()).unwrap();

        prop_assert_eq!(bytes_first, bytes_second);
    }

    /// ASCII round-trips reproduce every vertex coordinate exactly: nine
    /// significant digits uniquely identify a finite f32.
    #[test]
    fn prop_ascii_roundtrip_exact_vertices(facets in prop::collection::vec(arb_facet(), 1..8)) {
        let mesh = Mesh::from_facets(facets);
        let file = NamedTempFile::new().unwrap();
        mesh.write_ascii(file.path(), "prop").unwrap();
        let reloaded = Mesh::load(file.path()).unwrap();

        prop_assert_eq!(reloaded.facet_count(), mesh.facet_count());
        for (a, b) in mesh.facets.iter().zip(reloaded.facets.iter()) {
            for (va, vb) in a.vertices.iter().zip(b.vertices.iter()) {
                prop_assert_eq!(va.x.to_bits(), vb.x.to_bits());
                prop_assert_eq!(va.y.to_bits(), vb.y.to_bits());
                prop_assert_eq!(va.z.to_bits(), vb.z.to_bits());
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Repairing any subset of a cube's facets terminates and leaves the
    /// adjacency graph symmetric.
    #[test]
    fn prop_repair_preserves_neighbor_invariants(mask in 0u16..4096) {
        let p = [
            Vertex::new(0.0, 0.0, 0.0),
            Vertex::new(1.0, 0.0, 0.0),
            Vertex::new(1.0, 1.0, 0.0),
            Vertex::new(0.0, 1.0, 0.0),
            Vertex::new(0.0, 0.0, 1.0),
            Vertex::new(1.0, 0.0, 1.0),
            Vertex::new(1.0, 1.0, 1.0),
            Vertex::new(0.0, 1.0, 1.0),
        ];
        let faces: [[usize; 3]; 12] = [
            [0, 2, 1], [0, 3, 2], [4, 5, 6], [4, 6, 7],
            [0, 1, 5], [0, 5, 4], [3, 7, 6], [3, 6, 2],
            [0, 4, 7], [0, 7, 3], [1, 2, 6], [1, 6, 5],
        ];
        let facets: Vec<Facet> = faces
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, &[a, b, c])| Facet::from_vertices(p[a], p[b], p[c]))
            .collect();

        let mut mesh = Mesh::from_facets(facets);
        mesh.repair().unwrap();
        mesh.verify_neighbors().unwrap();

        // Whatever survives is consistently oriented: no same-direction
        // markers remain on any connected edge.
        for nb in &mesh.neighbors {
            for (slot, neighbor) in nb.neighbor.iter().enumerate() {
                if neighbor.is_some() {
                    prop_assert!(nb.which_vertex_not[slot] < 3);
                }
            }
        }
    }

    /// Repair is idempotent: a second pass changes neither geometry nor the
    /// cumulative counters.
    #[test]
    fn prop_repair_idempotent_on_shifted_tetrahedra(dx in -50.0f32..50.0, dy in -50.0f32..50.0) {
        let v0 = Vertex::new(dx, dy, 0.0);
        let v1 = Vertex::new(dx + 1.0, dy, 0.0);
        let v2 = Vertex::new(dx, dy + 1.0, 0.0);
        let v3 = Vertex::new(dx, dy, 1.0);
        let mut mesh = Mesh::from_facets(vec![
            Facet::from_vertices(v0, v2, v1),
            Facet::from_vertices(v0, v1, v3),
            Facet::from_vertices(v1, v2, v3),
            Facet::from_vertices(v2, v0, v3),
        ]);

        mesh.repair().unwrap();
        let facets_first = mesh.facets.clone();
        let stats_first = mesh.stats();

        mesh.repair().unwrap();
        let stats_second = mesh.stats();

        prop_assert_eq!(&mesh.facets, &facets_first);
        prop_assert_eq!(stats_second.facets_removed, stats_first.facets_removed);
        prop_assert_eq!(stats_second.facets_added, stats_first.facets_added);
        prop_assert_eq!(stats_second.facets_reversed, stats_first.facets_reversed);
        prop_assert_eq!(stats_second.edges_fixed, stats_first.edges_fixed);
        prop_assert_eq!(stats_second.normals_fixed, stats_first.normals_fixed);
    }
}
