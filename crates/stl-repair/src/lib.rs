//! Watertight repair for triangulated STL meshes.
//!
//! This crate takes a raw, potentially broken triangle soup — as produced by
//! CAD exporters and faceters — and produces a closed, consistently oriented,
//! manifold mesh suitable for slicing. It covers:
//!
//! - **File I/O**: binary and ASCII STL, including `solid`-prefixed binary
//!   files, with bit-exact binary round-trips (header and per-facet
//!   attribute bytes preserved).
//! - **Adjacency**: per-facet neighbor reconstruction by exact and
//!   tolerance-based edge hashing.
//! - **Repair**: degenerate facet removal, near-coincident vertex snapping,
//!   hole filling along open edge loops, winding and normal fixes.
//! - **Statistics**: a per-mesh record of everything the pipeline did —
//!   facets added/removed/reversed, edges fixed, parts, volume.
//!
//! # Quick Start
//!
//! ```no_run
//! use stl_repair::Mesh;
//!
//! let mut mesh = Mesh::load("broken.stl").unwrap();
//! mesh.repair().unwrap();
//! println!("{}", mesh.stats());
//! mesh.write_binary("repaired.stl").unwrap();
//! ```
//!
//! # Repair pipeline
//!
//! [`Mesh::repair`] runs the stages in a fixed order: exact edge matching
//! (which also drops degenerate facets), nearby matching at a growing
//! tolerance with vertex snapping, removal of wholly unconnected facets,
//! hole filling, orientation fixing, and normal recomputation. Each stage is
//! also available as a free function for callers that need finer control.
//!
//! ```no_run
//! use stl_repair::{Mesh, RepairParams};
//!
//! let mut mesh = Mesh::load("scan.stl").unwrap();
//! let params = RepairParams {
//!     fixed_tolerance: Some(1e-3),
//!     fill_holes: false,
//!     ..Default::default()
//! };
//! mesh.repair_with_config(&params).unwrap();
//! ```
//!
//! # Units and precision
//!
//! STL stores 32-bit floats and no units; everything here is `f32` and
//! unit-agnostic. Vertex identity is bitwise (with negative zero normalized
//! to positive zero), so repair decisions are exact, not epsilon-based —
//! the only tolerance in the pipeline is the explicit one of the nearby
//! pass.
//!
//! # Concurrency
//!
//! The pipeline is single-threaded and synchronous. A [`Mesh`] has no shared
//! mutable state, so distinct meshes may be repaired from independent
//! threads.

mod error;
mod stats;
mod types;

pub mod adjacency;
pub mod holes;
pub mod io;
pub mod repair;
pub mod validate;
pub mod winding;

pub use error::{StlError, StlResult};
pub use stats::{RepairStats, SourceFormat, StatsSnapshot};
pub use types::{Facet, FacetNeighbors, Mesh, Normal, Vertex, FACET_SIZE, HEADER_SIZE};

pub use adjacency::{check_facets_exact, check_facets_nearby};
pub use holes::fill_holes;
pub use io::{load_stl, write_ascii, write_binary};
pub use repair::{remove_unconnected_facets, repair_mesh, repair_mesh_with_config, RepairParams};
pub use validate::verify_neighbors;
pub use winding::{calculate_volume, fix_normal_directions, fix_normal_values, reverse_all_facets};

// Convenience methods on Mesh
impl Mesh {
    /// Load a mesh from an STL file, auto-detecting binary vs ASCII.
    pub fn load(path: impl AsRef<std::path::Path>) -> StlResult<Self> {
        io::load_stl(path.as_ref())
    }

    /// Write the mesh as binary STL. Byte-identical to the source file when
    /// the mesh was loaded from binary and left unrepaired.
    pub fn write_binary(&self, path: impl AsRef<std::path::Path>) -> StlResult<()> {
        io::write_binary(self, path.as_ref())
    }

    /// Write the mesh as ASCII STL under the given solid label.
    pub fn write_ascii(
        &self,
        path: impl AsRef<std::path::Path>,
        label: &str,
    ) -> StlResult<()> {
        io::write_ascii(self, path.as_ref(), label)
    }

    /// Run the full repair pipeline with default parameters.
    pub fn repair(&mut self) -> StlResult<()> {
        repair::repair_mesh(self)
    }

    /// Run the full repair pipeline with custom parameters.
    pub fn repair_with_config(&mut self, params: &RepairParams) -> StlResult<()> {
        repair::repair_mesh_with_config(self, params)
    }

    /// Read-only snapshot of the statistics block.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Check the neighbor-graph invariants.
    pub fn verify_neighbors(&self) -> StlResult<()> {
        validate::verify_neighbors(self)
    }
}
