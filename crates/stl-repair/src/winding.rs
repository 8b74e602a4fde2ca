//! Orientation consistency, normal values, parts and volume.
//!
//! Orientation disagreements were marked by the edge hasher: a
//! `which_vertex_not` value >= 3 means the two facets meeting at that edge
//! traverse it in the same direction, so one of them is wound backwards.
//! A breadth-first walk over the adjacency propagates one reference winding
//! per connected component, reversing disagreeing facets as it goes.

use hashbrown::HashSet;
use std::collections::VecDeque;
use tracing::{debug, info};

use crate::types::{vertex_lower, Mesh, Vertex};

/// Componentwise tolerance when comparing a stored normal against the one
/// recomputed from the vertex winding.
const NORMAL_TOLERANCE: f32 = 0.001;

/// Make every connected component consistently wound and count the parts.
///
/// Each component is seeded at the facet containing its lexicographically
/// smallest vertex; that facet's winding is the component's reference. Every
/// neighbor reached through a same-direction edge is reversed, and every
/// such disagreement bumps `backwards_edges`.
pub fn fix_normal_directions(mesh: &mut Mesh) {
    if mesh.is_empty() {
        mesh.stats.number_of_parts = 0;
        return;
    }
    if mesh.neighbors.len() != mesh.facet_count() {
        debug!("Adjacency not built; skipping orientation fix");
        return;
    }

    let mut visited: HashSet<u32> = HashSet::with_capacity(mesh.facet_count());
    let mut parts = 0usize;
    let mut queue: VecDeque<u32> = VecDeque::new();

    while let Some(seed) = component_seed(mesh, &visited) {
        parts += 1;
        visited.insert(seed as u32);
        queue.push_back(seed as u32);

        while let Some(facet) = queue.pop_front() {
            let facet = facet as usize;
            for j in 0..3 {
                let Some(neighbor) = mesh.neighbors[facet].neighbor[j] else {
                    continue;
                };
                if mesh.neighbors[facet].which_vertex_not[j] >= 3 {
                    mesh.stats.backwards_edges += 1;
                    if !visited.contains(&neighbor) {
                        reverse_facet(mesh, neighbor as usize);
                    }
                }
                if visited.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
    }

    mesh.stats.number_of_parts = parts;
    if mesh.stats.facets_reversed > 0 {
        info!(
            "Orientation fix: {} facets reversed across {} part(s)",
            mesh.stats.facets_reversed, parts
        );
    } else {
        debug!("Orientation already consistent across {parts} part(s)");
    }
}

/// The unvisited facet containing the lexicographically smallest vertex.
fn component_seed(mesh: &Mesh, visited: &HashSet<u32>) -> Option<usize> {
    let mut best: Option<(Vertex, usize)> = None;
    for (i, facet) in mesh.facets.iter().enumerate() {
        if visited.contains(&(i as u32)) {
            continue;
        }
        let mut facet_min = facet.vertices[0];
        for v in &facet.vertices[1..] {
            if vertex_lower(v, &facet_min) {
                facet_min = *v;
            }
        }
        match &best {
            Some((current, _)) if !vertex_lower(&facet_min, current) => {}
            _ => best = Some((facet_min, i)),
        }
    }
    best.map(|(_, i)| i)
}

/// Reverse one facet's winding in place: swap vertices 0 and 1, negate the
/// stored normal, and remap the adjacency records on both sides.
///
/// Swapping vertices 0 and 1 keeps edge 0 on the same neighbor but swaps
/// edges 1 and 2, moves the facet's vertex indices 0 and 1, and toggles the
/// same-direction flag on every edge.
pub(crate) fn reverse_facet(mesh: &mut Mesh, facet_num: usize) {
    mesh.stats.facets_reversed += 1;

    mesh.facets[facet_num].vertices.swap(0, 1);
    mesh.facets[facet_num].normal = -mesh.facets[facet_num].normal;

    if mesh.neighbors.len() != mesh.facets.len() {
        // Adjacency not built yet; nothing to remap.
        return;
    }
    let nb = mesh.neighbors[facet_num];

    // Neighbors describe this facet's opposite vertex by index; the swap
    // renumbers those vertices (0 <-> 1) and flips every direction flag.
    // Edge 0's opposite vertex (2) keeps its index: flag toggle only.
    // Edge 1's opposite vertex moves 0 -> 1; edge 2's moves 1 -> 0.
    let deltas = [3u8, 4, 2];
    for (j, &delta) in deltas.iter().enumerate() {
        if let Some(k) = nb.neighbor[j] {
            let slot = (nb.which_vertex_not[j] as usize + 1) % 3;
            let entry = &mut mesh.neighbors[k as usize].which_vertex_not[slot];
            *entry = (*entry + delta) % 6;
        }
    }

    let own = &mut mesh.neighbors[facet_num];
    own.neighbor[1] = nb.neighbor[2];
    own.neighbor[2] = nb.neighbor[1];
    own.which_vertex_not[0] = (nb.which_vertex_not[0] + 3) % 6;
    own.which_vertex_not[1] = (nb.which_vertex_not[2] + 3) % 6;
    own.which_vertex_not[2] = (nb.which_vertex_not[1] + 3) % 6;
}

/// Reverse every facet in the mesh. Turns a consistently inside-out mesh
/// right-side out.
pub fn reverse_all_facets(mesh: &mut Mesh) {
    for i in 0..mesh.facet_count() {
        reverse_facet(mesh, i);
    }
}

/// Replace stored normals that are zero, missing, or disagree with the
/// vertex winding beyond tolerance.
pub fn fix_normal_values(mesh: &mut Mesh) {
    let mut fixed = 0usize;
    for facet in &mut mesh.facets {
        let computed = facet.computed_normal();
        let diff = facet.normal - computed;
        if diff.x.abs() > NORMAL_TOLERANCE
            || diff.y.abs() > NORMAL_TOLERANCE
            || diff.z.abs() > NORMAL_TOLERANCE
        {
            facet.normal = computed;
            fixed += 1;
        }
    }
    mesh.stats.normals_fixed += fixed;
    if fixed > 0 {
        debug!("Recomputed {fixed} stored normals");
    }
}

/// Record the mesh volume. A negative value on a closed mesh means the
/// whole surface is wound inward; flip everything and keep the magnitude.
pub fn calculate_volume(mesh: &mut Mesh) {
    let volume = mesh.signed_volume();
    if volume < 0.0 {
        reverse_all_facets(mesh);
        mesh.stats.volume = -volume;
    } else {
        mesh.stats.volume = volume;
    }
}
