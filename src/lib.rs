//! fabriclog: a shared replicated log runtime
//!
//! A cluster of controller instances shares state by appending to
//! per-object logs with write-once slots. Each instance keeps local
//! [`SharedLogObject`] caches, refreshed by replaying committed entries
//! in sequence order, and periodically checkpointed so the log can be
//! trimmed.
//!
//! The workspace splits into three layers, all re-exported here:
//! - `fabriclog-core`: sequence numbers, values, contracts, errors
//! - `fabriclog-storage`: backend implementations and selection
//! - `fabriclog-runtime`: the engine ([`LogRuntime`]) and the reference
//!   shared object ([`LogCell`])
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use fabriclog::{LogCell, LogRuntime, StorageConfig};
//!
//! # fn main() -> fabriclog::Result<()> {
//! let runtime = Arc::new(LogRuntime::new(StorageConfig::default().build()));
//! let cell = LogCell::new(Arc::clone(&runtime), "counter")?;
//!
//! cell.set(42)?;
//! assert!(!cell.compare_and_set(0, 7)?);
//! assert!(cell.compare_and_set(42, 43)?);
//! assert_eq!(cell.get()?, 43);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use fabriclog_core::{
    ByteValue, Error, LogEventListener, LogObjectId, LogStore, LogValue, LogWatcher,
    ReentrantRwLock, Result, SeqNum, SequencerStore, SharedLogObject, SnapshotStore,
    SnapshotValue,
};
pub use fabriclog_runtime::{LogCell, LogRuntime, LogStream, RuntimeConfig, Sequencer};
pub use fabriclog_storage::{
    Backend, MemoryLogStore, MemorySequencerStore, MemorySnapshotStore, StorageConfig, StoreSet,
};

/// Core contracts and value types.
pub use fabriclog_core as core;
/// Storage backends.
pub use fabriclog_storage as storage;
/// The engine.
pub use fabriclog_runtime as runtime;
