//! Hole filling by walking open edge loops.
//!
//! After the connectivity passes, every hole in the surface is a cycle of
//! open edges. Each open edge is closed by walking the fan around one of its
//! endpoints until another open edge appears; the far endpoint of that edge
//! becomes the third vertex of a new triangle. Repeating from every open
//! edge fills each hole with a fan, one triangle per iteration, with the
//! auxiliary hash table kept current so later iterations see the new
//! adjacency.

use tracing::{debug, warn};

use crate::adjacency::{load_edge_exact, record_neighbors, EdgeHash};
use crate::repair::fan_step;
use crate::types::{Facet, Mesh};

/// Fill every open-edge loop with fan triangles.
///
/// New facets get a zero normal (the normal fixer recomputes them) and are
/// re-hashed immediately so the next open edge can connect to them. A walk
/// that returns to its starting facet indicates a non-orientable
/// configuration; that hole is abandoned with a diagnostic.
pub fn fill_holes(mesh: &mut Mesh) {
    if mesh.neighbors.len() != mesh.facet_count() {
        debug!("Adjacency not built; skipping hole filling");
        return;
    }
    let before = mesh.facet_count();

    // Re-hash all still-open edges with exact keys so boundary loops become
    // walkable through freshly recorded adjacency.
    let mut table = EdgeHash::for_facet_count(mesh.facet_count());
    for i in 0..mesh.facet_count() {
        let vertices = mesh.facets[i].vertices;
        for j in 0..3 {
            if mesh.neighbors[i].neighbor[j].is_some() {
                continue;
            }
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

    let mut i = 0;
    while i < mesh.facet_count() {
        let facet = mesh.facets[i];
        let neighbors_initial = mesh.neighbors[i].neighbor;
        let first_facet = i;

        for j in 0..3 {
            if mesh.neighbors[i].neighbor[j].is_some() {
                continue;
            }

            // The new triangle starts with the open edge, in this facet's
            // winding order; the walk supplies the third vertex.
            let mut new_vertices = [
                facet.vertices[j],
                facet.vertices[(j + 1) % 3],
                facet.vertices[0],
            ];

            let mut direction = usize::from(neighbors_initial[(j + 2) % 3].is_none());
            let mut facet_num = i;
            let mut vnot = (j + 2) % 3;

            loop {
                let (_, next_edge) = fan_step(vnot, &mut direction);

                match mesh.neighbors[facet_num].neighbor[next_edge] {
                    None => {
                        // Found the other open edge of this corner; its far
                        // vertex closes the triangle.
                        new_vertices[2] = mesh.facets[facet_num].vertices[vnot % 3];
                        mesh.add_facet(Facet {
                            normal: crate::types::Normal::zeros(),
                            vertices: new_vertices,
                            attr: 0,
                        });

                        let new_index = (mesh.facet_count() - 1) as u32;
                        for k in 0..3usize {
                            let edge = load_edge_exact(
                                mesh,
                                new_index,
                                k as u8,
                                &new_vertices[k],
                                &new_vertices[(k + 1) % 3],
                            );
                            if let Some(partner) = table.insert_or_match(edge) {
                                record_neighbors(mesh, &edge, &partner);
                            }
                        }
                        break;
                    }
                    Some(next_facet) => {
                        vnot = mesh.neighbors[facet_num].which_vertex_not[next_edge] as usize;
                        facet_num = next_facet as usize;
                        if facet_num == first_facet {
                            warn!(
                                "Hole walk returned to facet {first_facet}: probably a mobius \
                                 part; giving up on this hole"
                            );
                            break;
                        }
                    }
                }
            }
        }
        i += 1;
    }

    mesh.stats.collisions += table.collisions;

    let added = mesh.facet_count() - before;
    if added > 0 {
        debug!("Filled holes with {added} facets");
    }
}
