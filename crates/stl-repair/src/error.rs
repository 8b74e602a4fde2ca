//! Error types for STL loading, writing and repair.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for STL operations.
pub type StlResult<T> = Result<T, StlError>;

/// Errors that can occur while loading, repairing, or writing a mesh.
#[derive(Debug, Error)]
pub enum StlError {
    /// Filesystem-level failure while reading.
    #[error("failed to read {path}: {source}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem-level failure while writing.
    #[error("failed to write {path}: {source}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Ill-formed ASCII input. Carries the byte offset of the offending
    /// token and what the parser expected to find there.
    #[error("parse error at byte {offset}: expected {expected}, found {found:?}")]
    Parse {
        offset: usize,
        expected: &'static str,
        found: String,
    },

    /// Binary file ends before the facet count says it should, or an ASCII
    /// stream ends mid-facet.
    #[error("truncated file: {details}")]
    TruncatedFile { details: String },

    /// Binary facet count disagrees with the file size.
    #[error(
        "inconsistent facet count: header claims {claimed} facets, \
         file size {file_size} implies {implied}"
    )]
    InconsistentFacetCount {
        claimed: usize,
        implied: usize,
        file_size: u64,
    },

    /// An internal adjacency invariant broke mid-repair. This is a bug in
    /// the repair pipeline, not a property of the input; the repair of the
    /// affected mesh is aborted.
    #[error("invariant violation: {details}")]
    InvariantViolation { details: String },
}
