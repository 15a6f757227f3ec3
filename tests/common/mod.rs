//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use fabriclog::{
    ByteValue, LogObjectId, LogRuntime, LogValue, ReentrantRwLock, SeqNum, SharedLogObject,
    SnapshotValue, StorageConfig, StoreSet,
};

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
});

pub fn init_tracing() {
    Lazy::force(&TRACING);
}

pub fn fresh_runtime() -> (StoreSet, Arc<LogRuntime>) {
    init_tracing();
    let stores = StorageConfig::default().build();
    (stores.clone(), Arc::new(LogRuntime::new(stores)))
}

/// Insert-only replicated map: a key can be claimed exactly once, so
/// concurrent claims of the same key surface the conflict path.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claim {
    pub key: String,
    pub owner: u64,
}

pub struct ClaimMap {
    oid: LogObjectId,
    lock: ReentrantRwLock,
    state: Mutex<(SeqNum, BTreeMap<String, u64>)>,
}

impl ClaimMap {
    pub fn new(name: &str) -> ClaimMap {
        ClaimMap {
            oid: LogObjectId::new(name).unwrap(),
            lock: ReentrantRwLock::new(),
            state: Mutex::new((SeqNum::INITIAL, BTreeMap::new())),
        }
    }

    pub fn event(key: &str, owner: u64) -> ByteValue {
        let claim = Claim {
            key: key.to_string(),
            owner,
        };
        ByteValue::new(bincode::serialize(&claim).unwrap())
    }

    pub fn owner_of(&self, key: &str) -> Option<u64> {
        let _guard = self.lock.read();
        self.state.lock().1.get(key).copied()
    }

    pub fn entries(&self) -> BTreeMap<String, u64> {
        let _guard = self.lock.read();
        self.state.lock().1.clone()
    }
}

impl SharedLogObject for ClaimMap {
    fn object_id(&self) -> &LogObjectId {
        &self.oid
    }

    fn seq_num(&self) -> SeqNum {
        self.state.lock().0
    }

    fn lock(&self) -> &ReentrantRwLock {
        &self.lock
    }

    fn apply(&self, seq: SeqNum, value: &LogValue) {
        let mut state = self.state.lock();
        state.0 = seq;
        if let LogValue::Bytes(bytes) = value {
            if let Ok(claim) = bincode::deserialize::<Claim>(bytes.bytes()) {
                state.1.entry(claim.key).or_insert(claim.owner);
            }
        }
    }

    fn is_applicable(&self, _seq: SeqNum, value: &ByteValue) -> bool {
        match bincode::deserialize::<Claim>(value.bytes()) {
            Ok(claim) => !self.state.lock().1.contains_key(&claim.key),
            Err(_) => false,
        }
    }

    fn reset(&self, seq: SeqNum, snapshot: &SnapshotValue) {
        let mut state = self.state.lock();
        state.0 = seq;
        state.1 = match snapshot {
            SnapshotValue::Bytes(bytes) => {
                bincode::deserialize(bytes.bytes()).unwrap_or_default()
            }
            SnapshotValue::Initial => BTreeMap::new(),
        };
    }

    fn create_snapshot(&self) -> (SeqNum, SnapshotValue) {
        let state = self.state.lock();
        if state.1.is_empty() {
            (state.0, SnapshotValue::Initial)
        } else {
            let bytes = bincode::serialize(&state.1).unwrap();
            (state.0, SnapshotValue::Bytes(ByteValue::new(bytes)))
        }
    }
}
