/// SliceView Errors
///
/// Every failure in the pipeline is fatal for the operation that raised it:
/// shape errors, lookup misses and root ambiguities all surface to the caller
/// immediately. Transient conditions of the reactive layer are reported as
/// warnings instead (see `reactive::PipelineWarning`).

use thiserror::Error;

/// Errors raised by selections, views, processors and joins.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A row does not have one cell per selected column.
    #[error("row {row} has {actual} cells, but the column selection has {expected} columns")]
    RowLength {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// The number of precomputed row hashes does not match the number of rows.
    #[error("got {hashes} row hashes for {rows} rows")]
    RowHashCount { rows: usize, hashes: usize },

    #[error("row {row} out of range [0, {len})")]
    RowOutOfRange { row: usize, len: usize },

    #[error("duplicate alias '{0}' in column selection")]
    DuplicateAlias(String),

    #[error("duplicate route '{0}' in column selection")]
    DuplicateRoute(String),

    /// An alias or route segment is not lower camel case.
    #[error("invalid {kind} '{name}': must be lower camel case (e.g. 'myColumn1')")]
    InvalidName { kind: &'static str, name: String },

    #[error("invalid route '{route}': {reason}")]
    InvalidRoute { route: String, reason: String },

    /// A single column lookup failed.
    #[error("column '{key}' not found. Available routes: {}", .available.join(", "))]
    ColumnNotFound { key: String, available: Vec<String> },

    /// One or more routes are missing from a view's column selection.
    #[error("routes not found: {}. Available routes: {}", .missing.join(", "), .available.join(", "))]
    MissingColumns {
        missing: Vec<String>,
        available: Vec<String>,
    },

    /// A join spans more than one cake.
    #[error("join must reference exactly one cake, found {}: {}", .roots.len(), .roots.join(", "))]
    AmbiguousCakeRoot { roots: Vec<String> },

    /// A layer references more than one component table.
    #[error("layer '{layer}' references more than one component table: {}", .components.join(", "))]
    AmbiguousComponent {
        layer: String,
        components: Vec<String>,
    },

    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
