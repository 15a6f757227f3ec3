//! Storage backends for fabriclog
//!
//! Implements the backend contracts from `fabriclog-core`:
//! - memory: single-process DashMap-backed stores
//! - config: configuration-selected backend strategy (`StorageConfig`)
//! - testing: helpers for failure-injection in tests

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod memory;
pub mod testing;

pub use config::{Backend, StorageConfig, StoreSet};
pub use memory::{MemoryLogStore, MemorySequencerStore, MemorySnapshotStore};
