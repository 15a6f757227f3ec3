//! Commit notifications

use crate::seqnum::SeqNum;

/// Notification hook fired when new log entries commit on a stream.
///
/// Delivery is best effort and at-least-once, in increasing sequence
/// order per listener; ordering across different listeners is not
/// guaranteed. A failing listener never breaks the commit path, so a
/// listener that needs the entry's content must read it back through the
/// runtime rather than assume it was the only recent commit.
pub trait LogEventListener: Send + Sync {
    /// Called after the entry at `seq` was committed.
    fn log_added(&self, seq: SeqNum);
}
