//! Error type for the purchase-table seam.

use thiserror::Error;

/// Error returned by store operations.
///
/// Store failures indicate a local resource problem, not untrusted remote
/// input; callers are expected to propagate them rather than swallow them.
#[derive(Debug, Error)]
pub enum DbError {
    /// The backing store could not be opened.
    #[error("store open failed: {0}")]
    Open(String),
    /// A read or write against an open session failed.
    #[error("store operation failed: {0}")]
    Operation(String),
}

/// Result type for store operations.
pub type DbResult<T> = Result<T, DbError>;
