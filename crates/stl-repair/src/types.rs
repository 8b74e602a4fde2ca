//! Core mesh data types.
//!
//! The mesh is a facet soup: every triangle carries its own three vertices,
//! exactly as stored in the STL container. Adjacency lives in a parallel
//! array of per-facet neighbor records rebuilt by the connectivity passes.

use nalgebra::Vector3;

use crate::stats::RepairStats;

/// A vertex position. STL stores 32-bit floats, so the whole pipeline works
/// in `f32` and compares positions at the bit level.
pub type Vertex = Vector3<f32>;

/// A facet normal. Same representation as a vertex.
pub type Normal = Vector3<f32>;

/// On-disk size of one binary facet record: normal + 3 vertices + attribute.
pub const FACET_SIZE: usize = 50;

/// On-disk size of the binary header.
pub const HEADER_SIZE: usize = 80;

/// Normalize the bit pattern of one coordinate so that `-0.0` and `+0.0`
/// compare equal when keys are compared bytewise.
#[inline]
pub(crate) fn coord_bits(value: f32) -> u32 {
    let bits = value.to_bits();
    if bits == 0x8000_0000 { 0 } else { bits }
}

/// The three coordinates of a vertex as negative-zero-normalized bit words.
#[inline]
pub(crate) fn vertex_bits(v: &Vertex) -> [u32; 3] {
    [coord_bits(v.x), coord_bits(v.y), coord_bits(v.z)]
}

/// Bitwise vertex equality, with negative zero treated as positive zero.
#[inline]
pub(crate) fn vertices_equal(a: &Vertex, b: &Vertex) -> bool {
    vertex_bits(a) == vertex_bits(b)
}

/// Lexicographic order on the three components. Used to pick the canonical
/// direction of an edge so both facets sharing it build the same key.
#[inline]
pub(crate) fn vertex_lower(a: &Vertex, b: &Vertex) -> bool {
    if a.x != b.x {
        a.x < b.x
    } else if a.y != b.y {
        a.y < b.y
    } else {
        a.z < b.z
    }
}

/// A single triangle as stored in the file: a normal, three vertices in
/// winding order, and the opaque two-byte attribute preserved verbatim
/// through read/repair/write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Facet {
    pub normal: Normal,
    pub vertices: [Vertex; 3],
    pub attr: u16,
}

impl Facet {
    /// Build a facet from raw coordinates with a zero normal.
    pub fn from_vertices(v0: Vertex, v1: Vertex, v2: Vertex) -> Self {
        Self {
            normal: Normal::zeros(),
            vertices: [v0, v1, v2],
            attr: 0,
        }
    }

    /// A facet is degenerate when any two of its vertices coincide bitwise.
    pub fn is_degenerate(&self) -> bool {
        vertices_equal(&self.vertices[0], &self.vertices[1])
            || vertices_equal(&self.vertices[1], &self.vertices[2])
            || vertices_equal(&self.vertices[0], &self.vertices[2])
    }

    /// Unit normal computed from the vertex winding, or zero for a
    /// degenerate facet.
    pub fn computed_normal(&self) -> Normal {
        let e1 = self.vertices[1] - self.vertices[0];
        let e2 = self.vertices[2] - self.vertices[0];
        let n = e1.cross(&e2);
        let len = n.norm();
        if len > f32::EPSILON { n / len } else { Normal::zeros() }
    }
}

/// Per-facet adjacency. Slot `j` describes the neighbor across the directed
/// edge from vertex `j` to vertex `(j + 1) % 3`.
///
/// `which_vertex_not[j]` is the index (0..2) of the neighbor's vertex that
/// lies opposite the shared edge, offset by +3 when both facets traverse the
/// edge in the same direction — meaning one of the two is wound backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FacetNeighbors {
    pub neighbor: [Option<u32>; 3],
    pub which_vertex_not: [u8; 3],
}

impl FacetNeighbors {
    /// All three edges open.
    pub const UNCONNECTED: Self = Self {
        neighbor: [None, None, None],
        which_vertex_not: [0, 0, 0],
    };

    /// Number of edges with no neighbor.
    #[inline]
    pub fn open_edge_count(&self) -> usize {
        self.neighbor.iter().filter(|n| n.is_none()).count()
    }

    /// True when every edge has a neighbor.
    #[inline]
    pub fn is_fully_connected(&self) -> bool {
        self.open_edge_count() == 0
    }

    /// True when no edge has a neighbor.
    #[inline]
    pub fn is_unconnected(&self) -> bool {
        self.open_edge_count() == 3
    }
}

impl Default for FacetNeighbors {
    fn default() -> Self {
        Self::UNCONNECTED
    }
}

/// Facet array growth quantum. Hole filling appends facets one at a time;
/// growing in blocks keeps the reallocation pattern of the original format
/// loader.
const GROWTH_BLOCK: usize = 256;

/// A triangle mesh under repair: the facet array, the parallel neighbor
/// array, and the statistics block that records what the pipeline did.
///
/// Facet indices are positional. Removal swaps the last facet into the hole,
/// so callers must not hold indices across a removal; the repair loops
/// re-test the same index after removing.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub facets: Vec<Facet>,
    pub neighbors: Vec<FacetNeighbors>,
    pub stats: RepairStats,
}

impl Mesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mesh directly from a facet array, bypassing the codec.
    /// Statistics are initialized as for a freshly loaded file.
    pub fn from_facets(facets: Vec<Facet>) -> Self {
        let mut stats = RepairStats::default();
        stats.original_num_facets = facets.len();
        let mut mesh = Self {
            facets,
            neighbors: Vec::new(),
            stats,
        };
        mesh.update_bounds();
        mesh
    }

    /// Number of facets currently in the mesh.
    #[inline]
    pub fn facet_count(&self) -> usize {
        self.facets.len()
    }

    /// True when the mesh holds no facets.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.facets.is_empty()
    }

    /// Append a facet during hole filling. The stored normal is zeroed (the
    /// normal fixer recomputes it later) and all three edges start open.
    pub fn add_facet(&mut self, mut facet: Facet) {
        if self.facets.len() == self.facets.capacity() {
            self.facets.reserve(GROWTH_BLOCK);
            self.neighbors.reserve(GROWTH_BLOCK);
        }
        facet.normal = Normal::zeros();
        self.facets.push(facet);
        self.neighbors.push(FacetNeighbors::UNCONNECTED);
        self.stats.facets_added += 1;
    }

    /// Recompute the bounding box, size and diameter from the facet array.
    pub fn update_bounds(&mut self) {
        if self.facets.is_empty() {
            self.stats.min = Vertex::zeros();
            self.stats.max = Vertex::zeros();
            self.stats.size = Vertex::zeros();
            self.stats.bounding_diameter = 0.0;
            return;
        }

        let mut min = self.facets[0].vertices[0];
        let mut max = min;
        for facet in &self.facets {
            for v in &facet.vertices {
                min.x = min.x.min(v.x);
                min.y = min.y.min(v.y);
                min.z = min.z.min(v.z);
                max.x = max.x.max(v.x);
                max.y = max.y.max(v.y);
                max.z = max.z.max(v.z);
            }
        }
        self.stats.min = min;
        self.stats.max = max;
        self.stats.size = max - min;
        self.stats.bounding_diameter = self.stats.size.norm();
    }

    /// Signed volume via the divergence theorem: the sum of signed
    /// tetrahedra spanned by each facet and the origin. Positive for a
    /// closed mesh wound counter-clockwise when seen from outside.
    pub fn signed_volume(&self) -> f64 {
        let mut volume = 0.0f64;
        for facet in &self.facets {
            let v0 = facet.vertices[0].cast::<f64>();
            let v1 = facet.vertices[1].cast::<f64>();
            let v2 = facet.vertices[2].cast::<f64>();
            volume += v0.dot(&v1.cross(&v2));
        }
        volume / 6.0
    }
}
