//! The shared log engine
//!
//! [`LogRuntime`] drives [`SharedLogObject`]s against the backend stores:
//! it allocates slots, performs the precondition-checked write-once
//! commit protocol, replays committed entries into local instances, and
//! schedules checkpoint housekeeping in the background.
//!
//! One runtime serves any number of objects; per-object coordination
//! happens through each object's own lock and through the write-once
//! semantics of the log store, so the engine itself holds no long-lived
//! locks.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, error, trace, warn};

use fabriclog_core::{
    ByteValue, Error, LogEventListener, LogObjectId, LogStore, LogValue, LogWatcher, Result,
    SeqNum, SequencerStore, SharedLogObject, SnapshotStore, SnapshotValue,
};
use fabriclog_storage::StoreSet;

use crate::config::RuntimeConfig;
use crate::maintenance::MaintenanceScheduler;
use crate::sequencer::Sequencer;
use crate::stream::LogStream;

// Pending-slot poll granularity; bounds how late a commit is observed.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Log-backed runtime for shared objects.
pub struct LogRuntime {
    config: RuntimeConfig,
    stores: StoreSet,
    streams: DashMap<LogObjectId, Arc<LogStream>>,
    maintenance: MaintenanceScheduler,
}

impl LogRuntime {
    /// Creates a runtime over `stores` with default tuning.
    pub fn new(stores: StoreSet) -> LogRuntime {
        LogRuntime::with_config(stores, RuntimeConfig::default())
    }

    /// Creates a runtime over `stores` with explicit tuning.
    pub fn with_config(stores: StoreSet, config: RuntimeConfig) -> LogRuntime {
        let maintenance = MaintenanceScheduler::new(config.maintenance_queue_depth);
        LogRuntime {
            config,
            stores,
            streams: DashMap::new(),
            maintenance,
        }
    }

    /// Maps an object name to its log stream id.
    ///
    /// Deterministic: every caller mapping the same name reaches the same
    /// stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an empty name.
    pub fn oid(&self, name: &str) -> Result<LogObjectId> {
        LogObjectId::new(name)
    }

    /// Brings a freshly constructed object online: restores the latest
    /// checkpoint and replays the log tail.
    ///
    /// # Errors
    ///
    /// Propagates restore and replay failures; the object is left at
    /// whatever position was reached.
    pub fn setup(&self, sobj: &dyn SharedLogObject) -> Result<()> {
        let latest = self.latest_snapshot(sobj.object_id())?;
        self.reset_to_snapshot(sobj, latest)?;
        self.replay(sobj)
    }

    /// Proposes `value` as the next entry on `sobj`'s stream.
    ///
    /// Protocol: allocate a slot from the sequencer; when
    /// `query_before_update` is set, first replay up to the slot's
    /// predecessor; under the object's write lock evaluate
    /// [`SharedLogObject::is_applicable`], abandoning the slot with a
    /// tombstone on rejection; then commit via the write-once
    /// `put_if_absent`. A slot invalidated by a timed-out reader costs a
    /// retry with a freshly allocated slot.
    ///
    /// Returns the committed sequence number. On success the entry is
    /// already applied locally and listeners have been notified.
    ///
    /// # Errors
    ///
    /// - [`Error::NotApplicable`] if the object rejected the payload.
    /// - [`Error::WriteTimedOut`] after `write_retries` invalidated slots;
    ///   the outcome is indeterminate until re-queried.
    /// - [`Error::Corrupt`] / [`Error::Store`] from the replay or the
    ///   backend.
    pub fn update(
        &self,
        sobj: &dyn SharedLogObject,
        value: ByteValue,
        query_before_update: bool,
    ) -> Result<SeqNum> {
        let oid = sobj.object_id().clone();
        let sequencer = Sequencer::new(Arc::clone(&self.stores.sequencer), oid.clone());

        for attempt in 0..=self.config.write_retries {
            let allocated = sequencer.next()?;
            trace!(%oid, seq = %allocated, attempt, "allocated write slot");

            if query_before_update {
                self.replay_to(sobj, predecessor(allocated))?;
            }

            let guard = sobj.lock().write();

            if !sobj.is_applicable(allocated, &value) {
                trace!(%oid, seq = %allocated, "update rejected, abandoning slot");
                // the slot still needs a permanent value or readers
                // would stall on it for a full timeout
                let occupant = self
                    .stores
                    .log
                    .put_if_absent(&oid, allocated, &LogValue::NoOp)?;
                if sobj.seq_num().next() == allocated {
                    sobj.apply(allocated, occupant.as_ref().unwrap_or(&LogValue::NoOp));
                }
                drop(guard);
                return Err(Error::NotApplicable { oid });
            }

            let proposed = LogValue::Bytes(value.clone());
            match self.stores.log.put_if_absent(&oid, allocated, &proposed)? {
                None => {
                    sobj.apply(allocated, &proposed);
                    drop(guard);
                    self.maybe_snapshot(sobj, allocated);
                    return Ok(allocated);
                }
                Some(LogValue::NoOp) => {
                    // a reader declared us dead and tombstoned the slot;
                    // consume it and try again with a fresh one
                    if sobj.seq_num().next() == allocated {
                        sobj.apply(allocated, &LogValue::NoOp);
                    }
                    drop(guard);
                    debug!(%oid, seq = %allocated, attempt, "slot invalidated, retrying");
                }
                Some(LogValue::Bytes(_)) => {
                    drop(guard);
                    return Err(Error::Store(format!(
                        "slot {} on {} committed by a foreign writer",
                        allocated, oid
                    )));
                }
            }
        }

        warn!(%oid, retries = self.config.write_retries, "write retry budget exhausted");
        Err(Error::WriteTimedOut { oid })
    }

    /// Replays `sobj` to the stream's latest allocated position.
    ///
    /// # Errors
    ///
    /// See [`LogRuntime::replay_to`].
    pub fn replay(&self, sobj: &dyn SharedLogObject) -> Result<()> {
        let target = self.stores.sequencer.current(sobj.object_id())?;
        self.replay_to(sobj, target)
    }

    /// Replays `sobj` forward until its position reaches `target`.
    ///
    /// Holds the object's write lock for the whole walk and applies each
    /// slot in strictly increasing order. A slot still pending after
    /// `read_timeout` is conclusively abandoned with a tombstone; if the
    /// writer's value appears concurrently, that value wins and is
    /// applied. Positions at or behind the object are a no-op, so replay
    /// is idempotent.
    ///
    /// # Errors
    ///
    /// [`Error::Corrupt`] aborts the walk at the offending slot;
    /// [`Error::Store`] on backend failure.
    pub fn replay_to(&self, sobj: &dyn SharedLogObject, target: SeqNum) -> Result<()> {
        let oid = sobj.object_id();
        let stream = self.stream(oid)?;

        let _guard = sobj.lock().write();
        while sobj.seq_num().ring_cmp(&target) == Ordering::Less {
            let pos = sobj.seq_num().next();
            let value = self.await_slot(&stream, oid, pos)?;
            sobj.apply(pos, &value);
            trace!(%oid, seq = %pos, "replayed entry");
        }
        Ok(())
    }

    /// Latest checkpoint position for `oid`; [`SeqNum::INITIAL`] when the
    /// stream has never been checkpointed.
    ///
    /// # Errors
    ///
    /// [`Error::Store`] on backend failure.
    pub fn latest_snapshot(&self, oid: &LogObjectId) -> Result<SeqNum> {
        self.stores.snapshots.latest(oid)
    }

    /// Resets `sobj` to the checkpoint at `seq`.
    ///
    /// [`SeqNum::INITIAL`] restores the empty starting state whether or
    /// not a checkpoint was ever stored.
    ///
    /// # Errors
    ///
    /// [`Error::SnapshotNotFound`] if no checkpoint exists at `seq`.
    pub fn reset_to_snapshot(&self, sobj: &dyn SharedLogObject, seq: SeqNum) -> Result<()> {
        let oid = sobj.object_id();
        let snapshot = match self.stores.snapshots.get(oid, seq)? {
            Some(snapshot) => snapshot,
            None if seq.is_initial() => SnapshotValue::Initial,
            None => {
                return Err(Error::SnapshotNotFound {
                    oid: oid.clone(),
                    seq,
                })
            }
        };
        let _guard = sobj.lock().write();
        sobj.reset(seq, &snapshot);
        debug!(%oid, %seq, "object reset to checkpoint");
        Ok(())
    }

    /// Registers a commit listener on `oid`'s stream.
    ///
    /// # Errors
    ///
    /// [`Error::Store`] if the stream's watcher could not be registered.
    pub fn add_listener(
        &self,
        oid: &LogObjectId,
        listener: Arc<dyn LogEventListener>,
    ) -> Result<()> {
        self.stream(oid)?.add_listener(listener);
        Ok(())
    }

    /// Removes a previously registered commit listener.
    ///
    /// # Errors
    ///
    /// [`Error::Store`] if the stream's watcher could not be registered.
    pub fn remove_listener(
        &self,
        oid: &LogObjectId,
        listener: &Arc<dyn LogEventListener>,
    ) -> Result<()> {
        self.stream(oid)?.remove_listener(listener);
        Ok(())
    }

    /// Reads the committed values in `(after, up_to]` in ring order.
    ///
    /// Pending slots get the same timeout-then-tombstone treatment as
    /// replay, so the result always covers the full range.
    ///
    /// # Errors
    ///
    /// [`Error::Corrupt`] / [`Error::Store`] as for replay.
    pub fn log_range(
        &self,
        oid: &LogObjectId,
        after: SeqNum,
        up_to: SeqNum,
    ) -> Result<Vec<LogValue>> {
        let stream = self.stream(oid)?;
        let mut values = Vec::new();
        let mut pos = after;
        while pos.ring_cmp(&up_to) == Ordering::Less {
            pos = pos.next();
            values.push(self.await_slot(&stream, oid, pos)?);
        }
        Ok(values)
    }

    fn stream(&self, oid: &LogObjectId) -> Result<Arc<LogStream>> {
        if let Some(existing) = self.streams.get(oid) {
            return Ok(Arc::clone(&existing));
        }
        match self.streams.entry(oid.clone()) {
            dashmap::mapref::entry::Entry::Occupied(occupied) => Ok(Arc::clone(occupied.get())),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let stream = Arc::new(LogStream::new(oid.clone(), Arc::clone(&self.stores.log)));
                self.stores
                    .log
                    .add_watcher(oid, Arc::clone(&stream) as Arc<dyn LogWatcher>)?;
                vacant.insert(Arc::clone(&stream));
                Ok(stream)
            }
        }
    }

    fn await_slot(&self, stream: &LogStream, oid: &LogObjectId, seq: SeqNum) -> Result<LogValue> {
        let deadline = Instant::now() + self.config.read_timeout;
        loop {
            if let Some(value) = stream.fetch(seq)? {
                return Ok(value);
            }
            if Instant::now() >= deadline {
                warn!(%oid, %seq, "pending slot timed out, invalidating");
                // the writer may still land first; its value wins
                return match self.stores.log.put_if_absent(oid, seq, &LogValue::NoOp)? {
                    Some(existing) => Ok(existing),
                    None => Ok(LogValue::NoOp),
                };
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Checkpoint hint, called after every committed update.
    ///
    /// The distance check and state capture happen here, on the writer's
    /// thread, because the object is only borrowed for this call;
    /// persistence and pruning run on the maintenance worker. Failures
    /// are logged and dropped: checkpointing is an optimization and must
    /// never fail a committed write.
    fn maybe_snapshot(&self, sobj: &dyn SharedLogObject, committed: SeqNum) {
        let check = self.config.snapshot_check_interval;
        if check == 0 || committed.value() % check != 0 {
            return;
        }
        let oid = sobj.object_id().clone();

        let latest = match self.stores.snapshots.latest(&oid) {
            Ok(latest) => latest,
            Err(err) => {
                warn!(%oid, %err, "checkpoint check failed");
                return;
            }
        };
        let (seq, snapshot) = {
            let _guard = sobj.lock().read();
            let current = sobj.seq_num();
            if latest.distance(&current) < self.config.snapshot_interval as i64 {
                trace!(%oid, %current, %latest, "checkpoint not due yet");
                return;
            }
            sobj.create_snapshot()
        };

        let snapshots = Arc::clone(&self.stores.snapshots);
        let log = Arc::clone(&self.stores.log);
        let max_snapshots = self.config.max_snapshots;
        self.maintenance.submit(Box::new(move || {
            if let Err(err) =
                persist_snapshot(&*snapshots, &*log, &oid, seq, &snapshot, max_snapshots)
            {
                error!(%oid, %seq, %err, "checkpoint persistence failed");
            }
        }));
    }
}

/// The slot just before `seq`, treating the first slot's predecessor as
/// the initial position rather than wrapping backwards around the ring.
fn predecessor(seq: SeqNum) -> SeqNum {
    if seq.value() == 1 {
        SeqNum::INITIAL
    } else {
        seq.prev()
    }
}

fn persist_snapshot(
    snapshots: &dyn SnapshotStore,
    log: &dyn LogStore,
    oid: &LogObjectId,
    seq: SeqNum,
    snapshot: &SnapshotValue,
    max_snapshots: usize,
) -> Result<()> {
    snapshots.put(oid, seq, snapshot)?;
    snapshots.advance_latest(oid, seq)?;
    debug!(%oid, %seq, "checkpoint created");
    prune_snapshots(snapshots, log, oid, max_snapshots)
}

/// Drops checkpoints beyond the retention limit, newest first, then
/// trims log entries the dropped checkpoints covered.
fn prune_snapshots(
    snapshots: &dyn SnapshotStore,
    log: &dyn LogStore,
    oid: &LogObjectId,
    max_snapshots: usize,
) -> Result<()> {
    let mut ids = snapshots.seq_nums(oid)?;
    if ids.len() <= max_snapshots {
        return Ok(());
    }
    ids.sort_by(|a, b| b.ring_cmp(a));
    let stale = ids.split_off(max_snapshots);

    // stale is sorted newest first
    let trim_from = stale.first().copied();
    for seq in stale {
        snapshots.remove(oid, seq)?;
        debug!(%oid, %seq, "checkpoint pruned");
    }

    // entries at or before the newest dropped checkpoint are covered by
    // the retained ones; walk backwards until the first gap
    if let Some(mut cursor) = trim_from {
        debug!(%oid, from = %cursor, "trimming log");
        while log.remove(oid, cursor)?.is_some() {
            cursor = cursor.prev();
        }
    }
    Ok(())
}
