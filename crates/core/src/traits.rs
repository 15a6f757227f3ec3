//! Backend contracts for the shared log
//!
//! The runtime talks to three stores through these traits so deployments
//! can swap the in-memory backend for a clustered one without touching
//! the engine. All implementations must be safe for concurrent use from
//! multiple threads.

use std::sync::Arc;

use crate::error::Result;
use crate::id::LogObjectId;
use crate::seqnum::SeqNum;
use crate::value::{LogValue, SnapshotValue};

/// Cluster-wide atomic sequence allocator, keyed by object id.
///
/// Contract: monotonic per key along the sequence ring, never hands the
/// same value to two callers for the same key, and survives individual
/// client crashes (a crashed client simply leaves its slot pending).
pub trait SequencerStore: Send + Sync {
    /// Current sequence number for `oid` without advancing it.
    ///
    /// [`SeqNum::INITIAL`] when nothing was ever allocated. This is also
    /// the "latest known position" of the stream: every committed entry
    /// is at or before it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Store`] on backend failure.
    fn current(&self, oid: &LogObjectId) -> Result<SeqNum>;

    /// Atomically advances and returns the new sequence number.
    ///
    /// Skips the reserved 0 on wraparound; never returns
    /// [`SeqNum::INITIAL`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Store`] on backend failure.
    fn next(&self, oid: &LogObjectId) -> Result<SeqNum>;
}

/// Watcher invoked by a [`LogStore`] when a slot commits.
pub trait LogWatcher: Send + Sync {
    /// Called after the slot at `seq` received its permanent value.
    fn entry_added(&self, seq: SeqNum, value: &LogValue);
}

/// Write-once slot store holding the log entries themselves.
///
/// The log store is the single source of truth for replicated state;
/// object instances are caches refreshed through replay.
pub trait LogStore: Send + Sync {
    /// Writes `value` at `(oid, seq)` if the slot is still unwritten.
    ///
    /// Returns the previous occupant when the slot was already taken, in
    /// which case nothing is written (slots are immutable once set).
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Store`] on backend failure.
    fn put_if_absent(
        &self,
        oid: &LogObjectId,
        seq: SeqNum,
        value: &LogValue,
    ) -> Result<Option<LogValue>>;

    /// Reads the slot at `(oid, seq)`; `None` while pending/unallocated.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Corrupt`] if the stored bytes do
    /// not decode, [`crate::error::Error::Store`] on backend failure.
    fn get(&self, oid: &LogObjectId, seq: SeqNum) -> Result<Option<LogValue>>;

    /// Removes a slot (log trimming after checkpoints).
    ///
    /// Returns the removed value, if any.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Store`] on backend failure.
    fn remove(&self, oid: &LogObjectId, seq: SeqNum) -> Result<Option<LogValue>>;

    /// Registers a watcher for commits on `oid`'s stream.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Store`] on backend failure.
    fn add_watcher(&self, oid: &LogObjectId, watcher: Arc<dyn LogWatcher>) -> Result<()>;
}

/// Side channel storing serialized checkpoints keyed by `(oid, seq)`.
pub trait SnapshotStore: Send + Sync {
    /// Stores a checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Store`] on backend failure.
    fn put(&self, oid: &LogObjectId, seq: SeqNum, value: &SnapshotValue) -> Result<()>;

    /// Reads a checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Corrupt`] if the stored bytes do
    /// not decode, [`crate::error::Error::Store`] on backend failure.
    fn get(&self, oid: &LogObjectId, seq: SeqNum) -> Result<Option<SnapshotValue>>;

    /// Latest checkpoint id; [`SeqNum::INITIAL`] when none exists.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Store`] on backend failure.
    fn latest(&self, oid: &LogObjectId) -> Result<SeqNum>;

    /// Advances the latest-checkpoint pointer to `seq` if `seq` is newer
    /// in ring order; concurrent calls must not move it backwards.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Store`] on backend failure.
    fn advance_latest(&self, oid: &LogObjectId, seq: SeqNum) -> Result<()>;

    /// Ids of all stored checkpoints for `oid`, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Store`] on backend failure.
    fn seq_nums(&self, oid: &LogObjectId) -> Result<Vec<SeqNum>>;

    /// Deletes a checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::Error::Store`] on backend failure.
    fn remove(&self, oid: &LogObjectId, seq: SeqNum) -> Result<()>;
}
