//! CAS-able replicated counter
//!
//! [`LogCell`] is the reference [`SharedLogObject`] implementation: a
//! replicated `u64` with unconditional `set` and `compare_and_set`,
//! driven entirely through the shared log. Useful on its own and as the
//! template for writing richer shared objects.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use fabriclog_core::{
    ByteValue, Error, LogObjectId, LogValue, ReentrantRwLock, Result, SeqNum, SharedLogObject,
    SnapshotValue,
};

use crate::runtime::LogRuntime;

/// Events appended to a cell's log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum CellEvent {
    /// Unconditional overwrite.
    Set(u64),
    /// Conditional overwrite; applicable only while the cell still holds
    /// `expect`.
    CompareAndSet {
        /// Value the cell must currently hold.
        expect: u64,
        /// Replacement value.
        update: u64,
    },
}

impl CellEvent {
    fn encode(&self) -> Result<ByteValue> {
        let bytes = bincode::serialize(self)
            .map_err(|e| Error::InvalidArgument(format!("unencodable cell event: {}", e)))?;
        Ok(ByteValue::new(bytes))
    }

    fn decode(bytes: &ByteValue) -> Option<CellEvent> {
        bincode::deserialize(bytes.bytes()).ok()
    }
}

#[derive(Debug, Clone, Copy)]
struct CellState {
    current: SeqNum,
    value: u64,
}

/// Replicated `u64` cell backed by the shared log.
///
/// Every instance with the same name converges on the same value; the
/// log, not the instance, is authoritative.
pub struct LogCell {
    runtime: Arc<LogRuntime>,
    oid: LogObjectId,
    lock: ReentrantRwLock,
    state: Mutex<CellState>,
}

impl std::fmt::Debug for LogCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogCell").field("oid", &self.oid).finish_non_exhaustive()
    }
}

impl LogCell {
    /// Creates an instance synced to the stream's latest checkpoint.
    ///
    /// Call [`LogCell::get`] afterwards (or rely on the next operation)
    /// to also replay the log tail.
    ///
    /// # Errors
    ///
    /// Propagates id validation and checkpoint restore failures.
    pub fn new(runtime: Arc<LogRuntime>, name: &str) -> Result<LogCell> {
        let oid = runtime.oid(name)?;
        let latest = runtime.latest_snapshot(&oid)?;
        LogCell::at_snapshot(runtime, name, latest)
    }

    /// Creates an instance synced to a specific checkpoint.
    ///
    /// # Errors
    ///
    /// [`Error::SnapshotNotFound`] if no checkpoint exists at `snapshot`.
    pub fn at_snapshot(runtime: Arc<LogRuntime>, name: &str, snapshot: SeqNum) -> Result<LogCell> {
        let oid = runtime.oid(name)?;
        let cell = LogCell {
            runtime,
            oid,
            lock: ReentrantRwLock::new(),
            state: Mutex::new(CellState {
                current: SeqNum::INITIAL,
                value: 0,
            }),
        };
        cell.runtime.reset_to_snapshot(&cell, snapshot)?;
        Ok(cell)
    }

    /// Sets the value unconditionally.
    ///
    /// No replay is needed beforehand: a plain overwrite is applicable
    /// against any current state. Invalidated slots are retried until the
    /// write commits.
    ///
    /// # Errors
    ///
    /// Propagates backend and decode failures.
    pub fn set(&self, new_value: u64) -> Result<()> {
        let event = CellEvent::Set(new_value).encode()?;
        loop {
            match self.runtime.update(self, event.clone(), false) {
                Ok(_) => return Ok(()),
                Err(Error::WriteTimedOut { .. }) => {
                    warn!(oid = %self.oid, "set timed out, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Replaces the value only if it still equals `expect`.
    ///
    /// Returns whether the swap committed. A `false` means some other
    /// writer got in first; the losing proposal left only a tombstone.
    ///
    /// # Errors
    ///
    /// Propagates backend and decode failures.
    pub fn compare_and_set(&self, expect: u64, update: u64) -> Result<bool> {
        let event = CellEvent::CompareAndSet { expect, update }.encode()?;
        loop {
            match self.runtime.update(self, event.clone(), true) {
                Ok(_) => return Ok(true),
                Err(Error::NotApplicable { .. }) => return Ok(false),
                Err(Error::WriteTimedOut { .. }) => {
                    warn!(oid = %self.oid, "compare_and_set timed out, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Reads the value after replaying the log tail.
    ///
    /// # Errors
    ///
    /// Propagates replay failures.
    pub fn get(&self) -> Result<u64> {
        self.runtime.replay(self)?;
        let _guard = self.lock.read();
        Ok(self.state.lock().value)
    }
}

impl SharedLogObject for LogCell {
    fn object_id(&self) -> &LogObjectId {
        &self.oid
    }

    fn seq_num(&self) -> SeqNum {
        self.state.lock().current
    }

    fn lock(&self) -> &ReentrantRwLock {
        &self.lock
    }

    fn apply(&self, seq: SeqNum, value: &LogValue) {
        let mut state = self.state.lock();
        state.current = seq;
        let bytes = match value {
            LogValue::Bytes(bytes) => bytes,
            LogValue::NoOp => return,
        };
        match CellEvent::decode(bytes) {
            Some(CellEvent::Set(new_value)) => state.value = new_value,
            Some(CellEvent::CompareAndSet { expect, update }) => {
                debug_assert_eq!(state.value, expect);
                state.value = update;
            }
            None => {
                // apply is total; a foreign payload only advances the clock
                error!(oid = %self.oid, %seq, "undecodable cell event");
            }
        }
    }

    fn is_applicable(&self, _seq: SeqNum, value: &ByteValue) -> bool {
        match CellEvent::decode(value) {
            Some(CellEvent::Set(_)) => true,
            Some(CellEvent::CompareAndSet { expect, .. }) => self.state.lock().value == expect,
            None => false,
        }
    }

    fn reset(&self, seq: SeqNum, snapshot: &SnapshotValue) {
        let mut state = self.state.lock();
        state.current = seq;
        state.value = match snapshot {
            SnapshotValue::Bytes(bytes) => match CellEvent::decode(bytes) {
                Some(CellEvent::Set(value)) => value,
                _ => {
                    error!(oid = %self.oid, %seq, "unexpected checkpoint payload");
                    return;
                }
            },
            SnapshotValue::Initial => 0,
        };
    }

    fn create_snapshot(&self) -> (SeqNum, SnapshotValue) {
        let state = self.state.lock();
        match CellEvent::Set(state.value).encode() {
            Ok(bytes) => (state.current, SnapshotValue::Bytes(bytes)),
            Err(_) => (state.current, SnapshotValue::Initial),
        }
    }
}
