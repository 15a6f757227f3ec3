//! Backend selection
//!
//! Deployments pick a backend through configuration and inject the
//! resulting [`StoreSet`] into the runtime at startup. There is no global
//! static lookup; tests build as many independent sets as they need.

use std::sync::Arc;

use crate::memory::{MemoryLogStore, MemorySequencerStore, MemorySnapshotStore};
use fabriclog_core::{LogStore, SequencerStore, SnapshotStore};

/// Available storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Single-process in-memory backend.
    #[default]
    Memory,
}

/// Storage configuration selected at startup.
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    /// Which backend family to build.
    pub backend: Backend,
}

/// The three backend handles the runtime needs.
#[derive(Clone)]
pub struct StoreSet {
    /// Write-once log slots.
    pub log: Arc<dyn LogStore>,
    /// Per-stream atomic sequence allocation.
    pub sequencer: Arc<dyn SequencerStore>,
    /// Checkpoint side channel.
    pub snapshots: Arc<dyn SnapshotStore>,
}

impl StorageConfig {
    /// Builds the configured backend.
    pub fn build(&self) -> StoreSet {
        match self.backend {
            Backend::Memory => StoreSet {
                log: Arc::new(MemoryLogStore::new()),
                sequencer: Arc::new(MemorySequencerStore::new()),
                snapshots: Arc::new(MemorySnapshotStore::new()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabriclog_core::{ByteValue, LogObjectId, LogValue, SeqNum};

    #[test]
    fn test_default_builds_memory_backend() {
        let stores = StorageConfig::default().build();
        let oid = LogObjectId::new("flows").unwrap();
        let seq = stores.sequencer.next(&oid).unwrap();
        assert_eq!(seq, SeqNum::new(1).unwrap());

        let value = LogValue::Bytes(ByteValue::new(vec![1]));
        assert!(stores.log.put_if_absent(&oid, seq, &value).unwrap().is_none());
        assert_eq!(stores.log.get(&oid, seq).unwrap(), Some(value));
    }

    #[test]
    fn test_store_sets_are_independent() {
        let a = StorageConfig::default().build();
        let b = StorageConfig::default().build();
        let oid = LogObjectId::new("flows").unwrap();
        a.sequencer.next(&oid).unwrap();
        assert_eq!(b.sequencer.current(&oid).unwrap(), SeqNum::INITIAL);
    }
}
