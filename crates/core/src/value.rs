//! Log entry values
//!
//! Every committed log slot holds exactly one [`LogValue`]: either an
//! opaque application payload ([`ByteValue`]) or a [`LogValue::NoOp`]
//! tombstone marking a slot that was allocated but abandoned. Once a slot
//! holds a value it never changes.
//!
//! Snapshots reuse the same payload type: a [`SnapshotValue`] is either
//! serialized object state or [`SnapshotValue::Initial`], which restores
//! the object's empty state.

use std::fmt;
use std::sync::Arc;

/// Immutable opaque payload carried by a committed log entry.
///
/// The bytes are shared behind an `Arc`, so cloning is cheap and no
/// caller can mutate a payload another reader is holding.
#[derive(Clone, PartialEq, Eq)]
pub struct ByteValue(Arc<[u8]>);

impl ByteValue {
    /// Creates a payload from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> ByteValue {
        ByteValue(bytes.into().into())
    }

    /// Payload bytes.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    /// Payload length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the payload is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ByteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteValue({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for ByteValue {
    fn from(bytes: Vec<u8>) -> ByteValue {
        ByteValue::new(bytes)
    }
}

impl From<&[u8]> for ByteValue {
    fn from(bytes: &[u8]) -> ByteValue {
        ByteValue::new(bytes.to_vec())
    }
}

/// Value held by one committed log slot.
///
/// Slot lifecycle: unallocated, then pending once a sequencer handed the
/// position to a writer, then exactly one of the two variants below.
/// Committed slots are immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogValue {
    /// A successful write carrying an application payload.
    Bytes(ByteValue),
    /// Tombstone: the slot was allocated and then abandoned (writer crash
    /// or timeout). Applying it advances an object's sequence number
    /// without changing domain state. Equality is structural; every NoOp
    /// equals every other NoOp.
    NoOp,
}

impl LogValue {
    /// Payload bytes, if this is a committed write.
    pub fn as_bytes(&self) -> Option<&ByteValue> {
        match self {
            LogValue::Bytes(b) => Some(b),
            LogValue::NoOp => None,
        }
    }

    /// Whether this entry is a tombstone.
    pub fn is_noop(&self) -> bool {
        matches!(self, LogValue::NoOp)
    }
}

impl From<ByteValue> for LogValue {
    fn from(b: ByteValue) -> LogValue {
        LogValue::Bytes(b)
    }
}

/// Checkpoint of a shared object's full state.
///
/// Both log variants can be recycled into a checkpoint: a `Bytes`
/// snapshot restores serialized state, while `Initial` restores the
/// object's empty starting state (the checkpoint of an object that had
/// only seen tombstones, or the implicit snapshot at `SeqNum::INITIAL`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotValue {
    /// Serialized object state as of the snapshot's sequence number.
    Bytes(ByteValue),
    /// The empty/initial state.
    Initial,
}

impl SnapshotValue {
    /// Serialized state, if any.
    pub fn as_bytes(&self) -> Option<&ByteValue> {
        match self {
            SnapshotValue::Bytes(b) => Some(b),
            SnapshotValue::Initial => None,
        }
    }
}

impl From<ByteValue> for SnapshotValue {
    fn from(b: ByteValue) -> SnapshotValue {
        SnapshotValue::Bytes(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_value_immutable_sharing() {
        let v = ByteValue::new(vec![1, 2, 3]);
        let w = v.clone();
        assert_eq!(v, w);
        assert_eq!(v.bytes(), &[1, 2, 3]);
        assert_eq!(v.len(), 3);
        assert!(!v.is_empty());
    }

    #[test]
    fn test_byte_value_empty() {
        let v = ByteValue::new(Vec::new());
        assert!(v.is_empty());
        assert_eq!(v.len(), 0);
    }

    #[test]
    fn test_noop_structural_equality() {
        assert_eq!(LogValue::NoOp, LogValue::NoOp);
        assert_ne!(LogValue::NoOp, LogValue::Bytes(ByteValue::new(vec![])));
        assert!(LogValue::NoOp.is_noop());
        assert!(LogValue::NoOp.as_bytes().is_none());
    }

    #[test]
    fn test_log_value_bytes_accessor() {
        let v = LogValue::from(ByteValue::new(vec![7]));
        assert!(!v.is_noop());
        assert_eq!(v.as_bytes().unwrap().bytes(), &[7]);
    }

    #[test]
    fn test_snapshot_value_roles() {
        let ss = SnapshotValue::from(ByteValue::new(vec![9]));
        assert_eq!(ss.as_bytes().unwrap().bytes(), &[9]);
        assert!(SnapshotValue::Initial.as_bytes().is_none());
        assert_eq!(SnapshotValue::Initial, SnapshotValue::Initial);
    }

    #[test]
    fn test_byte_value_debug_hides_payload() {
        let v = ByteValue::new(vec![0xde, 0xad]);
        assert_eq!(format!("{:?}", v), "ByteValue(2 bytes)");
    }
}
