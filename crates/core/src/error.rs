//! Error types for the shared log runtime
//!
//! All failures surface as typed variants from the runtime API; nothing
//! fails silently and no failed update leaves partial state visible.
//! We use `thiserror` for the `Display`/`Error` implementations.

use thiserror::Error;

use crate::id::LogObjectId;
use crate::seqnum::SeqNum;

/// Result type alias for shared log operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the shared log runtime.
#[derive(Debug, Error)]
pub enum Error {
    /// The proposed update conflicts with current replicated state.
    ///
    /// Local and retriable: the caller may re-read and retry with a
    /// recomputed payload. Nothing was written to the caller-visible log
    /// state.
    #[error("log value not applicable, rejected by {oid}")]
    NotApplicable {
        /// Object that rejected the update.
        oid: LogObjectId,
    },

    /// A write could not be confirmed within the retry budget.
    ///
    /// The outcome is indeterminate at the log level; the caller must
    /// re-query before assuming anything about whether the write landed.
    #[error("log write timed out for {oid}")]
    WriteTimedOut {
        /// Object whose stream the write targeted.
        oid: LogObjectId,
    },

    /// A stored entry could not be decoded during replay.
    ///
    /// Fatal for that read; never silently skipped as a tombstone.
    #[error("corrupt log entry: {0}")]
    Corrupt(String),

    /// A snapshot restore target does not exist.
    #[error("snapshot {seq} not found for {oid}")]
    SnapshotNotFound {
        /// Object being restored.
        oid: LogObjectId,
        /// Requested snapshot id.
        seq: SeqNum,
    },

    /// Sequencer or log store backend failure.
    ///
    /// Transient infrastructure fault; propagated, not retried internally.
    #[error("store error: {0}")]
    Store(String),

    /// Invalid argument (reserved sequence number, empty object name, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Whether the caller may retry after refreshing local state.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::NotApplicable { .. } | Error::WriteTimedOut { .. })
    }
}
