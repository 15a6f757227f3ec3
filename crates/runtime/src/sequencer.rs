//! Per-stream sequencer handle

use std::sync::Arc;

use fabriclog_core::{LogObjectId, Result, SeqNum, SequencerStore};

/// Issues monotonically increasing sequence numbers for one log stream.
///
/// A thin handle binding a [`SequencerStore`] to an object id; cheap to
/// clone and safe to share. The backing store can be swapped per
/// deployment (and, because the binding is per id, per object).
#[derive(Clone)]
pub struct Sequencer {
    store: Arc<dyn SequencerStore>,
    oid: LogObjectId,
}

impl Sequencer {
    /// Binds `store` to `oid`.
    pub fn new(store: Arc<dyn SequencerStore>, oid: LogObjectId) -> Sequencer {
        Sequencer { store, oid }
    }

    /// Current sequence number without advancing it.
    ///
    /// # Errors
    ///
    /// Propagates backend failures as `Error::Store`.
    pub fn get(&self) -> Result<SeqNum> {
        self.store.current(&self.oid)
    }

    /// Atomically advances and returns the new sequence number.
    ///
    /// Safe under concurrent invocation from threads and processes
    /// sharing this sequencer's identity.
    ///
    /// # Errors
    ///
    /// Propagates backend failures as `Error::Store`.
    pub fn next(&self) -> Result<SeqNum> {
        self.store.next(&self.oid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabriclog_storage::MemorySequencerStore;

    #[test]
    fn test_get_does_not_advance() {
        let store = Arc::new(MemorySequencerStore::new());
        let seq = Sequencer::new(store, LogObjectId::new("flows").unwrap());

        assert_eq!(seq.get().unwrap(), SeqNum::INITIAL);
        assert_eq!(seq.get().unwrap(), SeqNum::INITIAL);
        assert_eq!(seq.next().unwrap(), SeqNum::new(1).unwrap());
        assert_eq!(seq.get().unwrap(), SeqNum::new(1).unwrap());
    }

    #[test]
    fn test_streams_independent() {
        let store: Arc<dyn SequencerStore> = Arc::new(MemorySequencerStore::new());
        let a = Sequencer::new(Arc::clone(&store), LogObjectId::new("a").unwrap());
        let b = Sequencer::new(store, LogObjectId::new("b").unwrap());

        a.next().unwrap();
        a.next().unwrap();
        assert_eq!(b.get().unwrap(), SeqNum::INITIAL);
    }
}
