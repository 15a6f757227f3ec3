//! Core types and traits for fabriclog
//!
//! This crate defines the foundation of the shared replicated log:
//! - SeqNum: ring-ordered log sequence number with a reserved INITIAL
//! - ByteValue / LogValue / SnapshotValue: entry and checkpoint payloads
//! - codec: versioned tagged wire encoding for stored values
//! - LogObjectId: identity of one replicated object's stream
//! - SharedLogObject: the replicated state machine contract
//! - ReentrantRwLock: per-object reentrant read/write locking
//! - Backend traits: SequencerStore, LogStore, SnapshotStore, LogWatcher
//! - LogEventListener: commit notification hook
//! - Error: typed failure taxonomy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod error;
pub mod id;
pub mod listener;
pub mod lock;
pub mod object;
pub mod seqnum;
pub mod traits;
pub mod value;

pub use error::{Error, Result};
pub use id::LogObjectId;
pub use listener::LogEventListener;
pub use lock::{ReadGuard, ReentrantRwLock, WriteGuard};
pub use object::SharedLogObject;
pub use seqnum::SeqNum;
pub use traits::{LogStore, LogWatcher, SequencerStore, SnapshotStore};
pub use value::{ByteValue, LogValue, SnapshotValue};
