//! Adjacency invariant verification.
//!
//! The neighbor array is a cyclic index graph with redundant back-pointers;
//! every repair operation must leave it symmetric. These checks are cheap
//! enough to run after each pipeline phase in debug builds, and tests run
//! them unconditionally. A failure is a pipeline bug, never a property of
//! the input file.

use crate::error::{StlError, StlResult};
use crate::types::Mesh;

/// Verify the neighbor graph invariants:
///
/// - both parallel arrays have the same length;
/// - every neighbor index is in range and never the facet itself;
/// - every `which_vertex_not` is in 0..5;
/// - symmetry: if facet `i` names `k` across slot `j`, then `k` names `i`
///   back across slot `(which_vertex_not[i][j] + 1) % 3`;
/// - edge correspondence: for such a pair,
///   `(vnot_i % 3) + (vnot_k % 3) + 2 ≡ j + j' (mod 3)`.
pub fn verify_neighbors(mesh: &Mesh) -> StlResult<()> {
    let violation = |details: String| StlError::InvariantViolation { details };

    if mesh.neighbors.len() != mesh.facets.len() {
        return Err(violation(format!(
            "facet/neighbor arrays out of step: {} facets, {} neighbor records",
            mesh.facets.len(),
            mesh.neighbors.len()
        )));
    }

    let n = mesh.facets.len();
    for i in 0..n {
        for j in 0..3 {
            let vnot = mesh.neighbors[i].which_vertex_not[j];
            if vnot > 5 {
                return Err(violation(format!(
                    "facet {i} slot {j}: which_vertex_not {vnot} out of range"
                )));
            }

            let Some(k) = mesh.neighbors[i].neighbor[j] else {
                continue;
            };
            let k = k as usize;
            if k >= n {
                return Err(violation(format!(
                    "facet {i} slot {j}: neighbor {k} out of range (mesh has {n} facets)"
                )));
            }
            if k == i {
                return Err(violation(format!("facet {i} slot {j}: self-neighbor")));
            }

            let back_slot = (vnot as usize + 1) % 3;
            if mesh.neighbors[k].neighbor[back_slot] != Some(i as u32) {
                return Err(violation(format!(
                    "facet {i} slot {j}: neighbor {k} does not point back from slot {back_slot}"
                )));
            }

            let vnot_back = mesh.neighbors[k].which_vertex_not[back_slot] as usize;
            if (vnot as usize % 3 + vnot_back % 3 + 2) % 3 != (j + back_slot) % 3 {
                return Err(violation(format!(
                    "facet {i} slot {j} <-> facet {k} slot {back_slot}: \
                     edge correspondence broken (vnot {vnot} / {vnot_back})"
                )));
            }
        }
    }
    Ok(())
}
