//! Per-stream cache and listener dispatch
//!
//! One [`LogStream`] exists per shared object id. It registers itself as
//! the store watcher for that stream, keeps a bounded cache of recently
//! committed values so replay does not hammer the store, and fans commit
//! notifications out to registered [`LogEventListener`]s.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{error, trace};

use fabriclog_core::{
    LogEventListener, LogObjectId, LogStore, LogValue, LogWatcher, Result, SeqNum,
};

// Bounded read-through cache; sized for a busy stream's recent window.
const CACHE_CAPACITY: usize = 10_000;

/// Cache and notification hub for one object's log stream.
pub struct LogStream {
    oid: LogObjectId,
    log: Arc<dyn LogStore>,
    cache: DashMap<u64, LogValue>,
    listeners: RwLock<Vec<Arc<dyn LogEventListener>>>,
    /// Highest committed position dispatched so far; also the cache
    /// pruning reference point. Held across a dispatch so every listener
    /// observes a non-decreasing sequence of notifications.
    watermark: Mutex<SeqNum>,
}

impl LogStream {
    /// Creates the stream hub for `oid`.
    pub fn new(oid: LogObjectId, log: Arc<dyn LogStore>) -> LogStream {
        LogStream {
            oid,
            log,
            cache: DashMap::new(),
            listeners: RwLock::new(Vec::new()),
            watermark: Mutex::new(SeqNum::INITIAL),
        }
    }

    /// Reads the slot at `seq` through the cache.
    ///
    /// `None` while the slot is pending or unallocated.
    ///
    /// # Errors
    ///
    /// Propagates store and decode failures.
    pub fn fetch(&self, seq: SeqNum) -> Result<Option<LogValue>> {
        if let Some(hit) = self.cache.get(&seq.value()) {
            return Ok(Some(hit.clone()));
        }
        let value = self.log.get(&self.oid, seq)?;
        if let Some(ref v) = value {
            self.cache.insert(seq.value(), v.clone());
        }
        Ok(value)
    }

    /// Registers a listener for this stream.
    pub fn add_listener(&self, listener: Arc<dyn LogEventListener>) {
        let mut listeners = self.listeners.write();
        if !listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            listeners.push(listener);
        }
    }

    /// Removes a previously registered listener.
    pub fn remove_listener(&self, listener: &Arc<dyn LogEventListener>) {
        self.listeners.write().retain(|l| !Arc::ptr_eq(l, listener));
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    fn prune(&self, watermark: SeqNum) {
        if self.cache.len() <= CACHE_CAPACITY {
            return;
        }
        let horizon = -(CACHE_CAPACITY as i64);
        self.cache
            .retain(|seq, _| watermark.distance(&SeqNum::any(*seq)) >= horizon);
    }
}

impl LogWatcher for LogStream {
    fn entry_added(&self, seq: SeqNum, value: &LogValue) {
        self.cache.insert(seq.value(), value.clone());

        // Dispatch serially so per-listener ordering is non-decreasing
        // even when slots commit out of order. The notified position is
        // the highest committed one; replaying to it covers every slot
        // at or below.
        let mut watermark = self.watermark.lock();
        if watermark.ring_cmp(&seq) == std::cmp::Ordering::Less {
            *watermark = seq;
        }
        let notify = *watermark;
        for listener in self.listeners.read().iter() {
            // Listener failures are not part of the commit's durability
            // contract; isolate them from the write path.
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.log_added(notify)));
            if outcome.is_err() {
                error!(oid = %self.oid, seq = %notify, "log event listener panicked");
            }
        }
        trace!(oid = %self.oid, seq = %notify, "dispatched commit notification");
        drop(watermark);

        self.prune(notify);
    }
}
