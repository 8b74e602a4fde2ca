//! Topology repair: vertex snapping, facet removal, and the repair pipeline.
//!
//! All adjacency surgery happens through facet indices. Removal swaps the
//! last facet into the vacated slot, so every removal loop re-tests the same
//! index instead of advancing past it.

use tracing::{debug, info, warn};

use crate::adjacency::{self, HashEdge};
use crate::error::StlResult;
use crate::types::{vertices_equal, Mesh, Vertex};
use crate::{holes, winding};

/// Configuration for a repair run.
///
/// The defaults reproduce the standard fix-everything pass: exact matching,
/// two nearby iterations at an automatically chosen tolerance, unconnected
/// facet removal, hole filling, and both normal fixes.
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "pipeline-config",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct RepairParams {
    /// Tolerance for the nearby pass. `None` selects
    /// `max(shortest_edge, bounding_diameter / 500_000)`; a fixed value is
    /// mostly useful for tests and known-bad exports.
    pub fixed_tolerance: Option<f32>,

    /// Added to the tolerance before each further nearby iteration.
    pub tolerance_increment: f32,

    /// Upper bound on nearby iterations. `0` disables the nearby pass.
    pub max_iterations: u32,

    /// Fill open-edge loops with fan triangles.
    pub fill_holes: bool,

    /// Re-orient facets so every part is wound consistently.
    pub check_normal_directions: bool,

    /// Replace stored normals that disagree with the vertex winding.
    pub check_normal_values: bool,

    /// Drop facets with no connected edges at all.
    pub remove_unconnected: bool,

    /// Emit an info-level summary report after the run.
    pub verbose: bool,
}

impl Default for RepairParams {
    fn default() -> Self {
        Self {
            fixed_tolerance: None,
            tolerance_increment: 0.01,
            max_iterations: 2,
            fill_holes: true,
            check_normal_directions: true,
            check_normal_values: true,
            remove_unconnected: true,
            verbose: false,
        }
    }
}

impl RepairParams {
    /// Connectivity-only repair: no hole filling, no normal rewrites.
    /// Leaves the facet set maximal for inspection tooling.
    pub fn connectivity_only() -> Self {
        Self {
            fill_holes: false,
            check_normal_directions: false,
            check_normal_values: false,
            remove_unconnected: false,
            ..Default::default()
        }
    }
}

/// Run the full repair pipeline with default parameters.
pub fn repair_mesh(mesh: &mut Mesh) -> StlResult<()> {
    repair_mesh_with_config(mesh, &RepairParams::default())
}

/// Run the full repair pipeline.
///
/// Stage order: exact adjacency (with degenerate removal) → nearby passes at
/// growing tolerance → unconnected-facet removal → hole filling →
/// orientation fix → normal value fix → volume and bounds.
pub fn repair_mesh_with_config(mesh: &mut Mesh, params: &RepairParams) -> StlResult<()> {
    info!(
        "Starting repair: {} facets, tolerance {:?}, {} nearby iteration(s)",
        mesh.facet_count(),
        params.fixed_tolerance,
        params.max_iterations
    );

    adjacency::check_facets_exact(mesh);

    // Pre-repair disconnection profile, derived from the cumulative
    // connectivity counters right after the exact pass.
    mesh.stats.facets_w_1_bad_edge =
        mesh.stats.connected_facets_2_edge - mesh.stats.connected_facets_3_edge;
    mesh.stats.facets_w_2_bad_edge =
        mesh.stats.connected_facets_1_edge - mesh.stats.connected_facets_2_edge;
    mesh.stats.facets_w_3_bad_edge = mesh.facet_count() - mesh.stats.connected_facets_1_edge;

    #[cfg(debug_assertions)]
    crate::validate::verify_neighbors(mesh)?;

    if mesh.stats.connected_facets_3_edge < mesh.facet_count() && params.max_iterations > 0 {
        let mut tolerance = params
            .fixed_tolerance
            .unwrap_or_else(|| auto_tolerance(mesh));
        for iteration in 0..params.max_iterations {
            if mesh.stats.connected_facets_3_edge == mesh.facet_count() {
                break;
            }
            debug!(
                "Nearby iteration {} at tolerance {:.3e}",
                iteration + 1,
                tolerance
            );
            adjacency::check_facets_nearby(mesh, tolerance);
            tolerance += params.tolerance_increment;
        }
    }

    if params.remove_unconnected {
        remove_unconnected_facets(mesh);
    }

    if params.fill_holes && mesh.stats.connected_facets_3_edge < mesh.facet_count() {
        holes::fill_holes(mesh);
    }

    if params.check_normal_directions {
        winding::fix_normal_directions(mesh);
    }
    if params.check_normal_values {
        winding::fix_normal_values(mesh);
    }

    mesh.update_bounds();
    winding::calculate_volume(mesh);

    #[cfg(debug_assertions)]
    crate::validate::verify_neighbors(mesh)?;

    if params.verbose {
        info!("Repair summary:\n{}", mesh.stats);
    } else {
        info!(
            "Repair complete: {} facets, {} parts, {} edges fixed, {} added, {} removed",
            mesh.facet_count(),
            mesh.stats.number_of_parts,
            mesh.stats.edges_fixed,
            mesh.stats.facets_added,
            mesh.stats.facets_removed
        );
    }

    Ok(())
}

/// Initial nearby tolerance when none is fixed: generous enough to catch
/// export jitter, but never wider than the shortest real edge.
fn auto_tolerance(mesh: &Mesh) -> f32 {
    mesh.stats
        .shortest_edge
        .max(mesh.stats.bounding_diameter / 500_000.0)
}

/// One step of a fan walk around a pivot vertex.
///
/// The walk state is (current facet, `vnot`, direction): `vnot` is the
/// `which_vertex_not` value that led into the current facet, and a value
/// >= 3 means the edge just crossed flips orientation, which toggles the
/// direction. Returns the pivot vertex slot to act on and the edge slot to
/// cross next.
pub(crate) fn fan_step(vnot: usize, direction: &mut usize) -> (usize, usize) {
    if vnot > 2 {
        if *direction == 0 {
            let pivot = (vnot + 2) % 3;
            *direction = 1;
            (pivot, pivot)
        } else {
            let pivot = (vnot + 1) % 3;
            *direction = 0;
            (pivot, vnot % 3)
        }
    } else if *direction == 0 {
        ((vnot + 1) % 3, vnot)
    } else {
        let pivot = (vnot + 2) % 3;
        (pivot, pivot)
    }
}

/// A pending coordinate replacement produced by [`which_vertices_to_change`].
struct VertexChange {
    facet: u32,
    vertex: usize,
    new_position: Vertex,
}

/// For a freshly matched nearby edge pair, decide per shared endpoint which
/// facet's vertex to pull onto the other's position.
///
/// A "free corner" — a vertex whose two adjacent edges are both still open —
/// is cheap to move, so it is preferred; otherwise the first facet's vertex
/// moves onto the second's.
fn which_vertices_to_change(
    mesh: &Mesh,
    edge_a: &HashEdge,
    edge_b: &HashEdge,
) -> [Option<VertexChange>; 2] {
    // Endpoint pairs in canonical key order. For a backwards-loaded edge the
    // facet's natural first vertex is the canonical second.
    let pairs_of = |edge: &HashEdge| -> (usize, usize) {
        let e = edge.which_edge as usize;
        if e < 3 { (e, (e + 1) % 3) } else { ((e + 1) % 3, e % 3) }
    };
    let (v1a, v2a) = pairs_of(edge_a);
    let (v1b, v2b) = pairs_of(edge_b);

    let decide = |va: usize, vb: usize| -> Option<VertexChange> {
        let pos_a = mesh.facets[edge_a.facet as usize].vertices[va];
        let pos_b = mesh.facets[edge_b.facet as usize].vertices[vb];
        if vertices_equal(&pos_a, &pos_b) {
            return None;
        }
        let nb_a = &mesh.neighbors[edge_a.facet as usize];
        if nb_a.neighbor[va].is_none() && nb_a.neighbor[(va + 2) % 3].is_none() {
            Some(VertexChange {
                facet: edge_a.facet,
                vertex: va,
                new_position: pos_b,
            })
        } else {
            Some(VertexChange {
                facet: edge_b.facet,
                vertex: vb,
                new_position: pos_a,
            })
        }
    };

    [decide(v1a, v1b), decide(v2a, v2b)]
}

/// Snap the shared endpoints of a nearby-matched edge pair onto common
/// positions, propagating each replacement around the vertex fan.
pub(crate) fn snap_shared_vertices(mesh: &mut Mesh, edge_a: &HashEdge, edge_b: &HashEdge) {
    let changes = which_vertices_to_change(mesh, edge_a, edge_b);
    for change in changes.into_iter().flatten() {
        let mut vnot = if change.facet == edge_a.facet {
            (edge_a.which_edge as usize + 2) % 3
        } else {
            (edge_b.which_edge as usize + 2) % 3
        };
        if (vnot + 2) % 3 == change.vertex {
            vnot += 3;
        }
        change_vertices(mesh, change.facet as usize, vnot, change.new_position);
    }
    mesh.stats.edges_fixed += 2;
}

/// Replace the pivot vertex's coordinate on every facet in its fan.
///
/// The walk alternates pivoting to the next edge around the vertex and
/// hopping to the neighbor across it, overwriting one coordinate per facet.
/// It ends at an open edge; returning to the start facet instead means the
/// fan is non-orientable, and the walk is abandoned with a diagnostic.
fn change_vertices(mesh: &mut Mesh, start_facet: usize, start_vnot: usize, new_position: Vertex) {
    let first_facet = start_facet;
    let mut facet_num = start_facet;
    let mut vnot = start_vnot;
    let mut direction = 0usize;

    loop {
        let (pivot_vertex, next_edge) = fan_step(vnot, &mut direction);
        mesh.facets[facet_num].vertices[pivot_vertex] = new_position;

        let next = mesh.neighbors[facet_num].neighbor[next_edge];
        vnot = mesh.neighbors[facet_num].which_vertex_not[next_edge] as usize;
        match next {
            None => break,
            Some(next) => {
                facet_num = next as usize;
                if facet_num == first_facet {
                    warn!(
                        "Vertex fan walk returned to facet {first_facet}: probably a mobius \
                         part; use a smaller tolerance or skip the nearby check"
                    );
                    return;
                }
            }
        }
    }
}

/// Remove one facet by swapping the last facet into its slot.
///
/// The moved facet's neighbors still point at its old index (the former
/// tail); those back-pointers are redirected here. Connectivity counters
/// drop by the levels the removed facet had reached.
pub(crate) fn remove_facet(mesh: &mut Mesh, facet_number: usize) {
    mesh.stats.facets_removed += 1;

    let connected = 3 - mesh.neighbors[facet_number].open_edge_count();
    if connected >= 1 {
        mesh.stats.connected_facets_1_edge -= 1;
    }
    if connected >= 2 {
        mesh.stats.connected_facets_2_edge -= 1;
    }
    if connected >= 3 {
        mesh.stats.connected_facets_3_edge -= 1;
    }

    mesh.facets.swap_remove(facet_number);
    mesh.neighbors.swap_remove(facet_number);

    let old_tail = mesh.facets.len();
    if facet_number == old_tail {
        // Removed the tail itself; nothing moved.
        return;
    }

    let moved = mesh.neighbors[facet_number];
    for j in 0..3 {
        if let Some(k) = moved.neighbor[j] {
            let slot = (moved.which_vertex_not[j] as usize + 1) % 3;
            let back = &mut mesh.neighbors[k as usize].neighbor[slot];
            debug_assert_eq!(
                *back,
                Some(old_tail as u32),
                "stale back-pointer while compacting facet {facet_number}"
            );
            *back = Some(facet_number as u32);
        }
    }
}

/// Drop one facet's contribution from the cumulative connectivity counters
/// before one of its edges is disconnected.
fn update_connects_remove_1(mesh: &mut Mesh, facet_num: usize) {
    match mesh.neighbors[facet_num].open_edge_count() {
        0 => mesh.stats.connected_facets_3_edge -= 1,
        1 => mesh.stats.connected_facets_2_edge -= 1,
        2 => mesh.stats.connected_facets_1_edge -= 1,
        _ => {}
    }
}

/// Remove a degenerate facet, stitching its surviving neighbors to each
/// other across the collapsed edge so the boundary graph stays walkable.
fn remove_degenerate(mesh: &mut Mesh, facet: usize) {
    let vs = &mesh.facets[facet].vertices;
    let eq01 = vertices_equal(&vs[0], &vs[1]);
    let eq12 = vertices_equal(&vs[1], &vs[2]);
    let eq20 = vertices_equal(&vs[2], &vs[0]);

    if eq01 && eq12 {
        // All three vertices coincide; nothing to stitch.
        remove_facet(mesh, facet);
        return;
    }

    // edge3 is the collapsed edge; edge1/edge2 are the surviving pair that
    // must be joined to each other.
    let (edge1, edge2, edge3) = if eq01 {
        (1, 2, 0)
    } else if eq12 {
        (0, 2, 1)
    } else if eq20 {
        (0, 1, 2)
    } else {
        return;
    };

    let nb = mesh.neighbors[facet];
    let neighbor1 = nb.neighbor[edge1];
    let neighbor2 = nb.neighbor[edge2];
    let neighbor3 = nb.neighbor[edge3];
    let vnot1 = nb.which_vertex_not[edge1];
    let vnot2 = nb.which_vertex_not[edge2];
    let vnot3 = nb.which_vertex_not[edge3];

    // A neighbor left with an open edge across the stitch loses a
    // connection level.
    if neighbor1.is_none() {
        if let Some(n2) = neighbor2 {
            update_connects_remove_1(mesh, n2 as usize);
        }
    }
    if neighbor2.is_none() {
        if let Some(n1) = neighbor1 {
            update_connects_remove_1(mesh, n1 as usize);
        }
    }

    if let Some(n1) = neighbor1 {
        let slot = (vnot1 as usize + 1) % 3;
        mesh.neighbors[n1 as usize].neighbor[slot] = neighbor2;
        mesh.neighbors[n1 as usize].which_vertex_not[slot] = vnot2;
    }
    if let Some(n2) = neighbor2 {
        let slot = (vnot2 as usize + 1) % 3;
        mesh.neighbors[n2 as usize].neighbor[slot] = neighbor1;
        mesh.neighbors[n2 as usize].which_vertex_not[slot] = vnot1;
    }

    remove_facet(mesh, facet);

    if let Some(n3) = neighbor3 {
        // The compaction may have moved the facet n3 referred to.
        let n3 = if n3 as usize == mesh.facet_count() {
            facet
        } else {
            n3 as usize
        };
        update_connects_remove_1(mesh, n3);
        let slot = (vnot3 as usize + 1) % 3;
        mesh.neighbors[n3].neighbor[slot] = None;
    }
}

/// Remove facets the nearby pass degenerated, then facets with no
/// connections at all — those are as likely noise as geometry.
pub fn remove_unconnected_facets(mesh: &mut Mesh) {
    if mesh.neighbors.len() != mesh.facet_count() {
        debug!("Adjacency not built; skipping unconnected-facet removal");
        return;
    }
    let before = mesh.facet_count();

    let mut i = 0;
    while i < mesh.facet_count() {
        if mesh.facets[i].is_degenerate() {
            remove_degenerate(mesh, i);
            // Swap-with-last put an untested facet at index i.
        } else {
            i += 1;
        }
    }

    if mesh.stats.connected_facets_1_edge < mesh.facet_count() {
        let mut i = 0;
        while i < mesh.facet_count() {
            if mesh.neighbors[i].is_unconnected() {
                remove_facet(mesh, i);
            } else {
                i += 1;
            }
        }
    }

    let removed = before - mesh.facet_count();
    if removed > 0 {
        debug!("Removed {removed} degenerate or unconnected facets");
    }
}
