//! Error taxonomy for the overlay cache.

use thiserror::Error;

/// Errors surfaced by every [`OverlayStore`](crate::OverlayStore) operation.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// The underlying ordered store failed. Propagated unchanged and never
    /// retried here.
    #[error("storage failure: {0:#}")]
    Storage(anyhow::Error),

    /// A stored overlay or index entry could not be decoded.
    #[error("corrupt {table} record: {reason}")]
    CorruptRecord { table: &'static str, reason: String },

    /// A secondary index disagrees with the primary index.
    #[error("index inconsistency for {key}: {detail}")]
    IndexInconsistency { key: String, detail: String },

    /// A path that is not a valid collection or document path.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },
}

impl From<anyhow::Error> for OverlayError {
    fn from(e: anyhow::Error) -> Self {
        OverlayError::Storage(e)
    }
}

impl OverlayError {
    pub(crate) fn corrupt(table: &'static str, reason: impl Into<String>) -> Self {
        let err = OverlayError::CorruptRecord {
            table,
            reason: reason.into(),
        };
        log::error!("{}", err);
        err
    }

    pub(crate) fn inconsistent(key: impl ToString, detail: impl Into<String>) -> Self {
        let err = OverlayError::IndexInconsistency {
            key: key.to_string(),
            detail: detail.into(),
        };
        log::error!("{}", err);
        err
    }
}

pub type Result<T> = std::result::Result<T, OverlayError>;
