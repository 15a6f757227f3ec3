//! Shared log runtime
//!
//! The engine that turns the core contracts and a storage backend into a
//! working replicated log:
//! - config: runtime tunables (retries, timeouts, checkpoint cadence)
//! - sequencer: per-stream slot allocation handle
//! - stream: per-object commit cache and listener dispatch
//! - maintenance: bounded background worker for checkpoint housekeeping
//! - runtime: [`LogRuntime`], the update/replay/checkpoint protocol
//! - cell: [`LogCell`], the reference shared object implementation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cell;
pub mod config;
pub mod maintenance;
pub mod runtime;
pub mod sequencer;
pub mod stream;

pub use cell::LogCell;
pub use config::RuntimeConfig;
pub use runtime::LogRuntime;
pub use sequencer::Sequencer;
pub use stream::LogStream;
