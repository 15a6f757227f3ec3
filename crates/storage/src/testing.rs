//! Test support utilities
//!
//! Helpers for integration tests that need to manufacture conditions the
//! public API forbids, such as a corrupt log slot.

use crate::memory::MemoryLogStore;
use fabriclog_core::{LogObjectId, SeqNum};

/// Overwrites the slot at `(oid, seq)` with bytes that do not decode.
///
/// Simulates on-the-wire or at-rest corruption; a subsequent read of the
/// slot fails with `Error::Corrupt`.
pub fn corrupt_slot(store: &MemoryLogStore, oid: &LogObjectId, seq: SeqNum) {
    store.insert_raw(oid, seq, vec![0xFF, 0x00, 0xBA, 0xD0]);
}
