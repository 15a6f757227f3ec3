//! The replicated state machine contract
//!
//! Any application object that wants replicated, log-backed consistency
//! implements [`SharedLogObject`]. Instances are local caches of the
//! shared log's state: they start empty at [`SeqNum::INITIAL`] (or at a
//! snapshot via [`SharedLogObject::reset`]) and advance strictly forward
//! by [`SharedLogObject::apply`] calls driven by the runtime. No other
//! path may mutate replicated state.

use crate::id::LogObjectId;
use crate::lock::ReentrantRwLock;
use crate::seqnum::SeqNum;
use crate::value::{ByteValue, LogValue, SnapshotValue};

/// Shared object backed by the shared log.
///
/// Implementations own their domain state, their current sequence number,
/// and one [`ReentrantRwLock`] guarding both. The runtime brackets
/// `apply`/`reset` with the write half and `create_snapshot` with the
/// read half; implementations may reacquire either half internally.
pub trait SharedLogObject: Send + Sync {
    /// Id of this object's log stream.
    fn object_id(&self) -> &LogObjectId;

    /// The sequence number this instance has replayed up to.
    fn seq_num(&self) -> SeqNum;

    /// The lock guarding this object's state.
    ///
    /// Only the runtime's replay/update path acquires the write half;
    /// application reads take the read half.
    fn lock(&self) -> &ReentrantRwLock;

    /// Applies one committed log entry.
    ///
    /// Called only by the runtime, with the write lock held, in strictly
    /// increasing sequence order. Must be total: any error condition has
    /// to be checked beforehand in [`SharedLogObject::is_applicable`].
    /// A [`LogValue::NoOp`] advances the recorded sequence number without
    /// changing domain state.
    fn apply(&self, seq: SeqNum, value: &LogValue);

    /// Tests whether a proposed payload can be applied at `seq`.
    ///
    /// Pure, side-effect-free predicate (compare-and-set style
    /// precondition). Called by the runtime before the log write.
    fn is_applicable(&self, seq: SeqNum, value: &ByteValue) -> bool;

    /// Replaces the entire state from a snapshot.
    ///
    /// Called only by the runtime's snapshot restore, with the write lock
    /// held, never during normal replay. [`SnapshotValue::Initial`]
    /// restores the empty starting state.
    fn reset(&self, seq: SeqNum, snapshot: &SnapshotValue);

    /// Captures the current state as a checkpoint.
    ///
    /// Called with the read lock held. The returned pair must be
    /// internally consistent: the value reflects exactly the state as of
    /// the returned sequence number.
    fn create_snapshot(&self) -> (SeqNum, SnapshotValue);
}
