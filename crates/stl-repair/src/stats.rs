//! Repair statistics: what the file looked like, and what the pipeline did.

use crate::types::{Normal, Vertex, HEADER_SIZE};

/// How the source file was encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceFormat {
    /// Plain binary STL.
    #[default]
    Binary,
    /// ASCII `solid`/`facet` token stream.
    Ascii,
    /// Header spells `solid`, but the facet count is consistent with the
    /// file size, so the body was decoded as binary. Common in the wild.
    BinaryWithSolidHeader,
}

/// The statistics block owned by every [`Mesh`](crate::Mesh).
///
/// The `connected_facets_*` counters are cumulative: a facet with all three
/// edges connected contributes to all three of them, so
/// `connected_facets_1_edge` reads as "facets with at least one connected
/// edge". The final per-bucket counts in the [`Display`] report are derived
/// by subtraction, matching the original statistics output.
#[derive(Debug, Clone)]
pub struct RepairStats {
    /// Encoding of the source file.
    pub format: SourceFormat,
    /// The 80-byte binary header, preserved verbatim. For ASCII sources this
    /// holds the `solid` line, truncated to 80 bytes.
    pub header: [u8; HEADER_SIZE],
    /// Facet count at load time.
    pub original_num_facets: usize,

    /// Edges successfully paired with an anti-parallel partner.
    pub connected_edges: usize,
    /// Facets with >= 1 connected edge.
    pub connected_facets_1_edge: usize,
    /// Facets with >= 2 connected edges.
    pub connected_facets_2_edge: usize,
    /// Facets with all 3 edges connected.
    pub connected_facets_3_edge: usize,

    /// Facets with exactly 1 open edge after the exact pass, before repair.
    pub facets_w_1_bad_edge: usize,
    /// Facets with exactly 2 open edges after the exact pass, before repair.
    pub facets_w_2_bad_edge: usize,
    /// Facets with all 3 edges open after the exact pass, before repair.
    pub facets_w_3_bad_edge: usize,

    /// Connected components found by the orientation fixer.
    pub number_of_parts: usize,
    /// Signed volume, recorded after orientation fixing.
    pub volume: f64,

    /// Bounding-box minimum corner.
    pub min: Vertex,
    /// Bounding-box maximum corner.
    pub max: Vertex,
    /// Bounding-box extent per axis.
    pub size: Normal,
    /// Diagonal of the bounding box.
    pub bounding_diameter: f32,
    /// Chebyshev length of the shortest edge seen while hashing.
    pub shortest_edge: f32,

    /// Degenerate facets dropped.
    pub degenerate_facets: usize,
    /// Vertex-snap events (two per matched nearby edge pair).
    pub edges_fixed: usize,
    /// Facets removed (degenerate or wholly unconnected).
    pub facets_removed: usize,
    /// Facets appended by hole filling.
    pub facets_added: usize,
    /// Facets whose winding was reversed.
    pub facets_reversed: usize,
    /// Orientation disagreements encountered during the orientation walk.
    pub backwards_edges: usize,
    /// Stored normals replaced by recomputed ones.
    pub normals_fixed: usize,

    /// Hash-chain collisions across the connectivity passes.
    pub collisions: usize,
}

impl Default for RepairStats {
    fn default() -> Self {
        Self {
            format: SourceFormat::Binary,
            header: [0; HEADER_SIZE],
            original_num_facets: 0,
            connected_edges: 0,
            connected_facets_1_edge: 0,
            connected_facets_2_edge: 0,
            connected_facets_3_edge: 0,
            facets_w_1_bad_edge: 0,
            facets_w_2_bad_edge: 0,
            facets_w_3_bad_edge: 0,
            number_of_parts: 0,
            volume: 0.0,
            min: Vertex::zeros(),
            max: Vertex::zeros(),
            size: Normal::zeros(),
            bounding_diameter: 0.0,
            shortest_edge: f32::MAX,
            degenerate_facets: 0,
            edges_fixed: 0,
            facets_removed: 0,
            facets_added: 0,
            facets_reversed: 0,
            backwards_edges: 0,
            normals_fixed: 0,
            collisions: 0,
        }
    }
}

impl RepairStats {
    /// Lossy text view of the 80-byte header, trailing NULs stripped.
    pub fn header_text(&self) -> String {
        let end = self
            .header
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |p| p + 1);
        String::from_utf8_lossy(&self.header[..end]).into_owned()
    }

    /// Snapshot of the current counters. A plain clone today; the type alias
    /// keeps callers insulated from the block's layout.
    pub fn snapshot(&self) -> StatsSnapshot {
        self.clone()
    }
}

/// Read-only copy of the statistics block handed to callers.
pub type StatsSnapshot = RepairStats;

/// Report in the layout of the classic repair-summary printout: sizes,
/// facet status before and after, then the processing counters.
impl std::fmt::Display for RepairStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let current = self.original_num_facets + self.facets_added - self.facets_removed;
        writeln!(
            f,
            "File type          : {}",
            match self.format {
                SourceFormat::Binary => "Binary STL file",
                SourceFormat::Ascii => "ASCII STL file",
                SourceFormat::BinaryWithSolidHeader => "Binary STL file (solid header)",
            }
        )?;
        writeln!(f, "Header             : {}", self.header_text())?;
        writeln!(f, "============== Size ==============")?;
        writeln!(f, "Min X = {:.6}, Max X = {:.6}", self.min.x, self.max.x)?;
        writeln!(f, "Min Y = {:.6}, Max Y = {:.6}", self.min.y, self.max.y)?;
        writeln!(f, "Min Z = {:.6}, Max Z = {:.6}", self.min.z, self.max.z)?;
        writeln!(
            f,
            "========= Facet Status ========== Original ============ Final ===="
        )?;
        writeln!(
            f,
            "Number of facets                 : {:5}               {:5}",
            self.original_num_facets, current
        )?;
        writeln!(
            f,
            "Facets with 1 disconnected edge  : {:5}               {:5}",
            self.facets_w_1_bad_edge,
            self.connected_facets_2_edge - self.connected_facets_3_edge
        )?;
        writeln!(
            f,
            "Facets with 2 disconnected edges : {:5}               {:5}",
            self.facets_w_2_bad_edge,
            self.connected_facets_1_edge - self.connected_facets_2_edge
        )?;
        writeln!(
            f,
            "Facets with 3 disconnected edges : {:5}               {:5}",
            self.facets_w_3_bad_edge,
            current - self.connected_facets_1_edge
        )?;
        writeln!(
            f,
            "=== Processing Statistics ===     ===== Other Statistics ====="
        )?;
        writeln!(
            f,
            "Number of parts       : {:5}        Volume   : {:.6}",
            self.number_of_parts, self.volume
        )?;
        writeln!(f, "Degenerate facets     : {:5}", self.degenerate_facets)?;
        writeln!(f, "Edges fixed           : {:5}", self.edges_fixed)?;
        writeln!(f, "Facets removed        : {:5}", self.facets_removed)?;
        writeln!(f, "Facets added          : {:5}", self.facets_added)?;
        writeln!(f, "Facets reversed       : {:5}", self.facets_reversed)?;
        writeln!(f, "Backwards edges       : {:5}", self.backwards_edges)?;
        write!(f, "Normals fixed         : {:5}", self.normals_fixed)
    }
}
