//! Immutable configuration structs built once at startup.
//!
//! Resolves the design note against global mutable gflag state: every
//! tunable is a field here, loaded from a `serde_yaml` file plus
//! environment overrides in `main`, then handed around as `Arc<ClusterConfig>`.
//! Nothing in the library mutates a config value after startup; the log
//! monitor's dynamic level is the one deliberate exception and lives on its
//! own atomic, not here.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaftConfig {
    /// Lower bound of the randomized election timeout, in milliseconds.
    pub election_timeout_min_ms: u64,
    /// Upper bound of the randomized election timeout, in milliseconds.
    pub election_timeout_max_ms: u64,
    /// Heartbeat interval, in milliseconds. Defaults to election_timeout_min / 3.
    pub heartbeat_interval_ms: u64,
    /// Max log records batched into one append-entries call.
    pub max_batch_size: usize,
    /// Deadline multiplier applied to heartbeat_interval for outbound appends.
    pub append_deadline_factor: u32,
    /// How many missed heartbeat-intervals before a leader steps down.
    pub expired_time_factor: u32,
}

impl Default for RaftConfig {
    fn default() -> Self {
        Self {
            election_timeout_min_ms: 1500,
            election_timeout_max_ms: 3000,
            heartbeat_interval_ms: 500,
            max_batch_size: 300,
            append_deadline_factor: 2,
            expired_time_factor: 3,
        }
    }
}

impl RaftConfig {
    pub fn election_timeout_range(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.election_timeout_min_ms),
            Duration::from_millis(self.election_timeout_max_ms),
        )
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn append_deadline(&self) -> Duration {
        self.heartbeat_interval() * self.append_deadline_factor
    }

    pub fn leader_lease_timeout(&self) -> Duration {
        self.heartbeat_interval() * self.expired_time_factor
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Max transparent retries on Transport::{Timeout,LeaderChanged}.
    pub max_retry_count: u32,
    /// Base backoff before the first retry, in milliseconds.
    pub retry_backoff_base_ms: u64,
    /// Backoff ceiling, in milliseconds.
    pub retry_backoff_max_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_retry_count: 3,
            retry_backoff_base_ms: 50,
            retry_backoff_max_ms: 2000,
        }
    }
}

impl ClientConfig {
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let millis = self
            .retry_backoff_base_ms
            .saturating_mul(1u64 << attempt.min(16))
            .min(self.retry_backoff_max_ms);
        Duration::from_millis(millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory; one subdirectory per (space_id, partition_id) beneath it.
    pub data_path: std::path::PathBuf,
    /// WAL file size bound, in bytes, before rotation.
    pub wal_rotate_bytes: u64,
    /// Log buffer capacity, in bytes, per partition.
    pub log_buffer_capacity_bytes: usize,
    /// Max query-level parallelism (bounded concurrent-task executor).
    pub max_threads_per_query: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_path: std::path::PathBuf::from("./data"),
            wal_rotate_bytes: 64 * 1024 * 1024,
            log_buffer_capacity_bytes: 8 * 1024 * 1024,
            max_threads_per_query: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClusterConfig {
    pub raft: RaftConfig,
    pub client: ClientConfig,
    pub storage: StorageConfig,
    /// Replica factor applied to newly created spaces unless overridden.
    pub default_replica_factor: u32,
    /// Default partition count applied to newly created spaces.
    pub default_partition_count: u32,
}

impl ClusterConfig {
    pub fn load(path: impl AsRef<std::path::Path>) -> crate::error::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&text)
            .map_err(|e| crate::error::Error::Unsupported(format!("invalid config: {e}")))
    }
}

impl RaftConfig {
    /// Minimum viable config matching spec.md's defaults (openraft-style tuning,
    /// kept from the teacher's `default_raft_config`).
    pub fn fast_for_tests() -> Self {
        Self {
            election_timeout_min_ms: 150,
            election_timeout_max_ms: 300,
            heartbeat_interval_ms: 50,
            max_batch_size: 300,
            append_deadline_factor: 2,
            expired_time_factor: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_grows_and_caps() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.backoff_for_attempt(0), Duration::from_millis(50));
        assert_eq!(cfg.backoff_for_attempt(1), Duration::from_millis(100));
        assert!(cfg.backoff_for_attempt(10) <= Duration::from_millis(cfg.retry_backoff_max_ms));
    }

    #[test]
    fn raft_timeouts_derive_sane_ranges() {
        let cfg = RaftConfig::default();
        let (lo, hi) = cfg.election_timeout_range();
        assert!(lo < hi);
        assert!(cfg.heartbeat_interval() < lo);
    }
}
