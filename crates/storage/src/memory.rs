//! In-memory backend
//!
//! Single-process implementation of the three backend contracts, used by
//! tests and by single-instance deployments. Values are persisted in
//! their wire encoding so decode failures behave exactly like they would
//! against a remote store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::trace;

use fabriclog_core::codec;
use fabriclog_core::{
    LogObjectId, LogStore, LogValue, LogWatcher, Result, SeqNum, SequencerStore, SnapshotStore,
    SnapshotValue,
};

type SlotKey = (LogObjectId, u64);

/// Write-once slot store backed by a concurrent hash map.
#[derive(Default)]
pub struct MemoryLogStore {
    slots: DashMap<SlotKey, Vec<u8>>,
    watchers: DashMap<LogObjectId, Arc<RwLock<Vec<Arc<dyn LogWatcher>>>>>,
}

impl MemoryLogStore {
    /// Creates an empty store.
    pub fn new() -> MemoryLogStore {
        MemoryLogStore::default()
    }

    /// Number of stored slots across all streams.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no slot has ever been written.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn insert_raw(&self, oid: &LogObjectId, seq: SeqNum, bytes: Vec<u8>) {
        self.slots.insert((oid.clone(), seq.value()), bytes);
    }

    fn notify(&self, oid: &LogObjectId, seq: SeqNum, value: &LogValue) {
        let watchers = match self.watchers.get(oid) {
            Some(entry) => Arc::clone(entry.value()),
            None => return,
        };
        for watcher in watchers.read().iter() {
            watcher.entry_added(seq, value);
        }
    }
}

impl LogStore for MemoryLogStore {
    fn put_if_absent(
        &self,
        oid: &LogObjectId,
        seq: SeqNum,
        value: &LogValue,
    ) -> Result<Option<LogValue>> {
        let key = (oid.clone(), seq.value());
        let existing = {
            match self.slots.entry(key) {
                dashmap::mapref::entry::Entry::Occupied(occupied) => {
                    Some(codec::decode_log_value(occupied.get())?)
                }
                dashmap::mapref::entry::Entry::Vacant(vacant) => {
                    vacant.insert(codec::encode_log_value(value));
                    None
                }
            }
            // entry guard dropped here; watchers may read the map freely
        };
        if existing.is_none() {
            trace!(%oid, %seq, "log slot committed");
            self.notify(oid, seq, value);
        }
        Ok(existing)
    }

    fn get(&self, oid: &LogObjectId, seq: SeqNum) -> Result<Option<LogValue>> {
        match self.slots.get(&(oid.clone(), seq.value())) {
            Some(bytes) => Ok(Some(codec::decode_log_value(&bytes)?)),
            None => Ok(None),
        }
    }

    fn remove(&self, oid: &LogObjectId, seq: SeqNum) -> Result<Option<LogValue>> {
        match self.slots.remove(&(oid.clone(), seq.value())) {
            Some((_, bytes)) => Ok(Some(codec::decode_log_value(&bytes)?)),
            None => Ok(None),
        }
    }

    fn add_watcher(&self, oid: &LogObjectId, watcher: Arc<dyn LogWatcher>) -> Result<()> {
        let list = self
            .watchers
            .entry(oid.clone())
            .or_insert_with(|| Arc::new(RwLock::new(Vec::new())));
        list.write().push(watcher);
        Ok(())
    }
}

/// Atomic per-stream counter.
///
/// `next` skips the reserved 0 on wraparound, so it never allocates
/// [`SeqNum::INITIAL`].
#[derive(Default)]
pub struct MemorySequencerStore {
    counters: DashMap<LogObjectId, AtomicU64>,
}

impl MemorySequencerStore {
    /// Creates an empty sequencer backend.
    pub fn new() -> MemorySequencerStore {
        MemorySequencerStore::default()
    }
}

impl SequencerStore for MemorySequencerStore {
    fn current(&self, oid: &LogObjectId) -> Result<SeqNum> {
        Ok(self
            .counters
            .get(oid)
            .map(|counter| SeqNum::any(counter.load(Ordering::SeqCst)))
            .unwrap_or(SeqNum::INITIAL))
    }

    fn next(&self, oid: &LogObjectId) -> Result<SeqNum> {
        let counter = self
            .counters
            .entry(oid.clone())
            .or_insert_with(|| AtomicU64::new(0));
        loop {
            let allocated = counter.fetch_add(1, Ordering::SeqCst).wrapping_add(1);
            if allocated != 0 {
                return Ok(SeqNum::any(allocated));
            }
            // wrapped exactly onto the reserved value; draw again
        }
    }
}

/// Checkpoint store with a ring-monotone latest pointer per stream.
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshots: DashMap<SlotKey, Vec<u8>>,
    latest: DashMap<LogObjectId, Mutex<SeqNum>>,
}

impl MemorySnapshotStore {
    /// Creates an empty snapshot store.
    pub fn new() -> MemorySnapshotStore {
        MemorySnapshotStore::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn put(&self, oid: &LogObjectId, seq: SeqNum, value: &SnapshotValue) -> Result<()> {
        self.snapshots
            .insert((oid.clone(), seq.value()), codec::encode_snapshot_value(value));
        Ok(())
    }

    fn get(&self, oid: &LogObjectId, seq: SeqNum) -> Result<Option<SnapshotValue>> {
        match self.snapshots.get(&(oid.clone(), seq.value())) {
            Some(bytes) => Ok(Some(codec::decode_snapshot_value(&bytes)?)),
            None => Ok(None),
        }
    }

    fn latest(&self, oid: &LogObjectId) -> Result<SeqNum> {
        Ok(self
            .latest
            .get(oid)
            .map(|pointer| *pointer.lock())
            .unwrap_or(SeqNum::INITIAL))
    }

    fn advance_latest(&self, oid: &LogObjectId, seq: SeqNum) -> Result<()> {
        let pointer = self
            .latest
            .entry(oid.clone())
            .or_insert_with(|| Mutex::new(SeqNum::INITIAL));
        let mut latest = pointer.lock();
        if latest.ring_cmp(&seq) == std::cmp::Ordering::Less {
            *latest = seq;
        }
        Ok(())
    }

    fn seq_nums(&self, oid: &LogObjectId) -> Result<Vec<SeqNum>> {
        Ok(self
            .snapshots
            .iter()
            .filter(|entry| &entry.key().0 == oid)
            .map(|entry| SeqNum::any(entry.key().1))
            .collect())
    }

    fn remove(&self, oid: &LogObjectId, seq: SeqNum) -> Result<()> {
        self.snapshots.remove(&(oid.clone(), seq.value()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabriclog_core::{ByteValue, Error};
    use std::sync::atomic::AtomicUsize;

    fn oid(name: &str) -> LogObjectId {
        LogObjectId::new(name).unwrap()
    }

    fn seq(n: u64) -> SeqNum {
        SeqNum::new(n).unwrap()
    }

    fn bytes(data: &[u8]) -> LogValue {
        LogValue::Bytes(ByteValue::new(data.to_vec()))
    }

    #[test]
    fn test_put_if_absent_write_once() {
        let store = MemoryLogStore::new();
        let id = oid("flows");

        let first = store.put_if_absent(&id, seq(1), &bytes(b"a")).unwrap();
        assert!(first.is_none());

        // second write loses and sees the committed value
        let second = store.put_if_absent(&id, seq(1), &bytes(b"b")).unwrap();
        assert_eq!(second, Some(bytes(b"a")));

        // slot unchanged
        assert_eq!(store.get(&id, seq(1)).unwrap(), Some(bytes(b"a")));
    }

    #[test]
    fn test_get_pending_slot() {
        let store = MemoryLogStore::new();
        assert_eq!(store.get(&oid("flows"), seq(9)).unwrap(), None);
    }

    #[test]
    fn test_remove_slot() {
        let store = MemoryLogStore::new();
        let id = oid("flows");
        store.put_if_absent(&id, seq(1), &LogValue::NoOp).unwrap();
        assert_eq!(store.remove(&id, seq(1)).unwrap(), Some(LogValue::NoOp));
        assert_eq!(store.remove(&id, seq(1)).unwrap(), None);
    }

    #[test]
    fn test_streams_are_disjoint() {
        let store = MemoryLogStore::new();
        store.put_if_absent(&oid("a"), seq(1), &bytes(b"x")).unwrap();
        assert_eq!(store.get(&oid("b"), seq(1)).unwrap(), None);
    }

    #[test]
    fn test_watcher_fires_on_commit_only() {
        struct Counting(AtomicUsize);
        impl LogWatcher for Counting {
            fn entry_added(&self, _seq: SeqNum, _value: &LogValue) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let store = MemoryLogStore::new();
        let id = oid("flows");
        let watcher = Arc::new(Counting(AtomicUsize::new(0)));
        store.add_watcher(&id, watcher.clone()).unwrap();

        store.put_if_absent(&id, seq(1), &bytes(b"a")).unwrap();
        assert_eq!(watcher.0.load(Ordering::SeqCst), 1);

        // losing write does not notify
        store.put_if_absent(&id, seq(1), &bytes(b"b")).unwrap();
        assert_eq!(watcher.0.load(Ordering::SeqCst), 1);

        // other streams do not notify
        store.put_if_absent(&oid("other"), seq(1), &bytes(b"c")).unwrap();
        assert_eq!(watcher.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_corrupt_slot_surfaces_error() {
        let store = MemoryLogStore::new();
        let id = oid("flows");
        store.insert_raw(&id, seq(3), vec![0xFF, 0xFF, 0xFF]);
        assert!(matches!(store.get(&id, seq(3)), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_sequencer_monotonic() {
        let store = MemorySequencerStore::new();
        let id = oid("flows");
        assert_eq!(store.current(&id).unwrap(), SeqNum::INITIAL);
        assert_eq!(store.next(&id).unwrap(), seq(1));
        assert_eq!(store.next(&id).unwrap(), seq(2));
        assert_eq!(store.current(&id).unwrap(), seq(2));
        // peek does not advance
        assert_eq!(store.current(&id).unwrap(), seq(2));
    }

    #[test]
    fn test_sequencer_unique_under_contention() {
        let store = Arc::new(MemorySequencerStore::new());
        let id = oid("flows");
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let id = id.clone();
                std::thread::spawn(move || {
                    (0..100)
                        .map(|_| store.next(&id).unwrap().value())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 800, "sequencer handed out a duplicate");
    }

    #[test]
    fn test_snapshot_latest_pointer_monotone() {
        let store = MemorySnapshotStore::new();
        let id = oid("flows");
        assert_eq!(store.latest(&id).unwrap(), SeqNum::INITIAL);

        store.advance_latest(&id, seq(10)).unwrap();
        assert_eq!(store.latest(&id).unwrap(), seq(10));

        // stale advance is ignored
        store.advance_latest(&id, seq(4)).unwrap();
        assert_eq!(store.latest(&id).unwrap(), seq(10));

        store.advance_latest(&id, seq(11)).unwrap();
        assert_eq!(store.latest(&id).unwrap(), seq(11));
    }

    #[test]
    fn test_snapshot_round_trip_and_listing() {
        let store = MemorySnapshotStore::new();
        let id = oid("flows");
        let ss = SnapshotValue::Bytes(ByteValue::new(vec![1, 2]));

        store.put(&id, seq(5), &ss).unwrap();
        store.put(&id, seq(9), &SnapshotValue::Initial).unwrap();

        assert_eq!(store.get(&id, seq(5)).unwrap(), Some(ss));
        let mut ids: Vec<u64> = store
            .seq_nums(&id)
            .unwrap()
            .into_iter()
            .map(|s| s.value())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![5, 9]);

        store.remove(&id, seq(5)).unwrap();
        assert_eq!(store.get(&id, seq(5)).unwrap(), None);
    }
}
