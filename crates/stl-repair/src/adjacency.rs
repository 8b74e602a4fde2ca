//! Facet adjacency via edge hashing.
//!
//! Every facet contributes three directed edges. An edge and its
//! anti-parallel partner in another facet canonicalize to the same 24-byte
//! key, so pairing them is a hash-table insert that either installs the edge
//! or meets its partner and records the neighbor relation for both facets.
//!
//! Two passes share this machinery: the exact pass keys on the raw vertex
//! bits, the nearby pass keys on a tolerance grid so that almost-touching
//! edges (T-junctions, sloppy exports) can still be paired. The table is a
//! scoped resource: it holds facet indices, which go stale the moment a
//! facet is removed or added, so each pass builds its own table and tears it
//! down before the mesh is mutated further.

use tracing::debug;

use crate::types::{vertex_bits, vertex_lower, FacetNeighbors, Mesh, Vertex};

/// Primes for addressing roughly a 30-bit space, used to size the table for
/// ~50% occupancy over the 3N edges in flight.
const HASH_PRIMES: [u32; 15] = [
    98317, 196613, 393241, 786433, 1572869, 3145739, 6291469, 12582917, 25165843, 50331653,
    100663319, 201326611, 402653189, 805306457, 1610612741,
];

/// Smallest tabulated prime strictly greater than `6·N − 1`, or the largest
/// prime when `N` is beyond the table.
pub(crate) fn hash_table_size(nr_facets: usize) -> usize {
    let threshold = nr_facets.saturating_mul(6).saturating_sub(1);
    HASH_PRIMES
        .iter()
        .find(|&&p| p as usize > threshold)
        .copied()
        .unwrap_or(*HASH_PRIMES.last().expect("prime table is non-empty")) as usize
}

/// A directed facet edge in canonical key form.
///
/// `which_edge` is the edge index 0..2, offset by +3 when the facet's
/// natural direction was reversed to canonicalize the key.
#[derive(Debug, Clone, Copy)]
pub(crate) struct HashEdge {
    pub key: [u32; 6],
    pub facet: u32,
    pub which_edge: u8,
}

struct Entry {
    edge: HashEdge,
    next: Option<u32>,
}

/// Chained hash table over canonical edge keys. Chains are arena indices
/// with explicit `Option` links; matched entries are unlinked and their
/// arena slots simply retired.
pub(crate) struct EdgeHash {
    heads: Vec<Option<u32>>,
    entries: Vec<Entry>,
    pub collisions: usize,
}

impl EdgeHash {
    pub fn for_facet_count(nr_facets: usize) -> Self {
        let m = hash_table_size(nr_facets);
        Self {
            heads: vec![None; m],
            entries: Vec::with_capacity(nr_facets * 3),
            collisions: 0,
        }
    }

    fn bucket(&self, key: &[u32; 6]) -> usize {
        let sum = (key[0] / 23) as u64
            + (key[1] / 19) as u64
            + (key[2] / 17) as u64
            + (key[3] / 13) as u64
            + (key[4] / 11) as u64
            + (key[5] / 7) as u64;
        (sum % self.heads.len() as u64) as usize
    }

    /// Install the edge, unless a bytewise-equal key from a different facet
    /// is already chained here — in that case unlink and return the partner
    /// instead of inserting.
    pub fn insert_or_match(&mut self, edge: HashEdge) -> Option<HashEdge> {
        let bucket = self.bucket(&edge.key);
        let mut prev: Option<u32> = None;
        let mut cursor = self.heads[bucket];

        while let Some(idx) = cursor {
            let entry = &self.entries[idx as usize];
            if entry.edge.key == edge.key && entry.edge.facet != edge.facet {
                let next = entry.next;
                match prev {
                    None => self.heads[bucket] = next,
                    Some(p) => self.entries[p as usize].next = next,
                }
                return Some(self.entries[idx as usize].edge);
            }
            self.collisions += 1;
            prev = Some(idx);
            cursor = entry.next;
        }

        // Append at the chain tail so ties on non-manifold edges resolve in
        // insertion order.
        let idx = self.entries.len() as u32;
        self.entries.push(Entry { edge, next: None });
        match prev {
            None => self.heads[bucket] = Some(idx),
            Some(p) => self.entries[p as usize].next = Some(idx),
        }
        None
    }
}

/// Build the canonical exact key for the edge `a → b` of facet `facet`,
/// tracking the shortest edge seen so far.
pub(crate) fn load_edge_exact(
    mesh: &mut Mesh,
    facet: u32,
    which_edge: u8,
    a: &Vertex,
    b: &Vertex,
) -> HashEdge {
    let diff = (a - b).abs();
    let max_diff = diff.x.max(diff.y).max(diff.z);
    mesh.stats.shortest_edge = mesh.stats.shortest_edge.min(max_diff);

    let (first, second, which_edge) = if vertex_lower(a, b) {
        (a, b, which_edge)
    } else {
        (b, a, which_edge + 3)
    };

    let fb = vertex_bits(first);
    let sb = vertex_bits(second);
    HashEdge {
        key: [fb[0], fb[1], fb[2], sb[0], sb[1], sb[2]],
        facet,
        which_edge,
    }
}

/// Build the tolerance-grid key for the edge `a → b`, or `None` when both
/// endpoints quantize to the same cell — the edge is below tolerance and its
/// facet degenerate at this resolution.
fn load_edge_nearby(
    mesh: &Mesh,
    facet: u32,
    which_edge: u8,
    a: &Vertex,
    b: &Vertex,
    tolerance: f32,
) -> Option<HashEdge> {
    let quantize = |v: &Vertex| -> [i32; 3] {
        let cell = (v - mesh.stats.min) / tolerance;
        [cell.x as i32, cell.y as i32, cell.z as i32]
    };
    let cell_a = quantize(a);
    let cell_b = quantize(b);
    if cell_a == cell_b {
        return None;
    }

    let (first, second, which_edge) = if cell_a < cell_b {
        (cell_a, cell_b, which_edge)
    } else {
        (cell_b, cell_a, which_edge + 3)
    };

    Some(HashEdge {
        key: [
            first[0] as u32,
            first[1] as u32,
            first[2] as u32,
            second[0] as u32,
            second[1] as u32,
            second[2] as u32,
        ],
        facet,
        which_edge,
    })
}

/// Record the neighbor relation for a matched edge pair in both facets.
///
/// `which_vertex_not` gets the partner's opposite-vertex index; when both
/// edges were canonicalized in the same direction the facets traverse the
/// shared edge the same way, so both entries are offset by +3 to mark the
/// local orientation flip.
pub(crate) fn record_neighbors(mesh: &mut Mesh, edge_a: &HashEdge, edge_b: &HashEdge) {
    let fa = edge_a.facet as usize;
    let fb = edge_b.facet as usize;
    let slot_a = (edge_a.which_edge % 3) as usize;
    let slot_b = (edge_b.which_edge % 3) as usize;

    mesh.neighbors[fa].neighbor[slot_a] = Some(edge_b.facet);
    mesh.neighbors[fa].which_vertex_not[slot_a] = (edge_b.which_edge + 2) % 3;
    mesh.neighbors[fb].neighbor[slot_b] = Some(edge_a.facet);
    mesh.neighbors[fb].which_vertex_not[slot_b] = (edge_a.which_edge + 2) % 3;

    if (edge_a.which_edge < 3) == (edge_b.which_edge < 3) {
        mesh.neighbors[fa].which_vertex_not[slot_a] += 3;
        mesh.neighbors[fb].which_vertex_not[slot_b] += 3;
    }

    mesh.stats.connected_edges += 2;
    for f in [fa, fb] {
        match mesh.neighbors[f].open_edge_count() {
            2 => mesh.stats.connected_facets_1_edge += 1,
            1 => mesh.stats.connected_facets_2_edge += 1,
            _ => mesh.stats.connected_facets_3_edge += 1,
        }
    }
}

/// Exact connectivity pass: drop degenerate facets, then pair every directed
/// edge whose six key floats match an anti-parallel partner exactly.
///
/// Degenerates go first because the table stores facet indices and the
/// swap-with-last removal would invalidate them.
pub fn check_facets_exact(mesh: &mut Mesh) {
    mesh.stats.connected_edges = 0;
    mesh.stats.connected_facets_1_edge = 0;
    mesh.stats.connected_facets_2_edge = 0;
    mesh.stats.connected_facets_3_edge = 0;

    let mut i = 0;
    while i < mesh.facets.len() {
        if mesh.facets[i].is_degenerate() {
            mesh.facets.swap_remove(i);
            mesh.stats.facets_removed += 1;
            mesh.stats.degenerate_facets += 1;
        } else {
            i += 1;
        }
    }

    mesh.neighbors.clear();
    mesh.neighbors
        .resize(mesh.facets.len(), FacetNeighbors::UNCONNECTED);

    let mut table = EdgeHash::for_facet_count(mesh.facets.len());
    for i in 0..mesh.facets.len() {
        let vertices = mesh.facets[i].vertices;
        for j in 0..3 {
            let edge = load_edge_exact(
                mesh,
                i as u32,
                j as u8,
                &vertices[j],
                &vertices[(j + 1) % 3],
            );
            if let Some(partner) = table.insert_or_match(edge) {
                record_neighbors(mesh, &edge, &partner);
            }
        }
    }
    mesh.stats.collisions += table.collisions;

    debug!(
        "Exact pass: {} of {} facets fully connected, {} connected edges",
        mesh.stats.connected_facets_3_edge,
        mesh.facet_count(),
        mesh.stats.connected_edges
    );
}

/// Nearby connectivity pass: pair still-open edges whose endpoints fall into
/// the same tolerance-grid cells, snapping the near-coincident vertices onto
/// a common position as matches are found.
pub fn check_facets_nearby(mesh: &mut Mesh, tolerance: f32) {
    let n = mesh.facet_count();
    if mesh.stats.connected_facets_1_edge == n
        && mesh.stats.connected_facets_2_edge == n
        && mesh.stats.connected_facets_3_edge == n
    {
        // Already fully connected.
        return;
    }

    let mut table = EdgeHash::for_facet_count(n);
    for i in 0..n {
        let facet = mesh.facets[i];
        for j in 0..3 {
            if mesh.neighbors[i].neighbor[j].is_some() {
                continue;
            }
            let Some(edge) = load_edge_nearby(
                mesh,
                i as u32,
                j as u8,
                &facet.vertices[j],
                &facet.vertices[(j + 1) % 3],
                tolerance,
            ) else {
                continue;
            };
            if let Some(partner) = table.insert_or_match(edge) {
                record_neighbors(mesh, &edge, &partner);
                crate::repair::snap_shared_vertices(mesh, &edge, &partner);
            }
        }
    }
    mesh.stats.collisions += table.collisions;

    debug!(
        "Nearby pass at tolerance {:.3e}: {} of {} facets fully connected",
        tolerance, mesh.stats.connected_facets_3_edge, n
    );
}
