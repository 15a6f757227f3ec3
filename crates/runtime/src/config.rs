//! Runtime configuration

use std::time::Duration;

/// Tunables for [`crate::runtime::LogRuntime`].
///
/// The defaults match the deployment the protocol was tuned on; override
/// individual fields as needed.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// How many times a write is re-attempted with a fresh sequence
    /// number after another node invalidated the allocated slot.
    /// Exhausting the budget surfaces `Error::WriteTimedOut`.
    pub write_retries: u32,

    /// How long a reader waits for a pending slot before conclusively
    /// treating it as abandoned. Process-wide; applies to replay and
    /// range reads alike.
    pub read_timeout: Duration,

    /// A committed sequence number divisible by this value triggers a
    /// snapshot check. 0 disables snapshotting.
    pub snapshot_check_interval: u64,

    /// Minimum ring distance between the latest checkpoint and the
    /// current position before a new checkpoint is created.
    pub snapshot_interval: u64,

    /// Checkpoints retained per object before pruning (and trimming the
    /// log below the pruned checkpoints).
    pub max_snapshots: usize,

    /// Pending maintenance tasks held before the oldest is dropped.
    pub maintenance_queue_depth: usize,
}

impl Default for RuntimeConfig {
    fn default() -> RuntimeConfig {
        RuntimeConfig {
            write_retries: 5,
            read_timeout: Duration::from_secs(1),
            snapshot_check_interval: 50,
            snapshot_interval: 500,
            max_snapshots: 10,
            maintenance_queue_depth: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.write_retries, 5);
        assert_eq!(config.read_timeout, Duration::from_secs(1));
        assert_eq!(config.snapshot_check_interval, 50);
        assert_eq!(config.snapshot_interval, 500);
        assert_eq!(config.max_snapshots, 10);
        assert_eq!(config.maintenance_queue_depth, 10);
    }
}
