//! Log monitor (THE CORE §4.10): samples free disk bytes for the log
//! directory on an interval and raises the minimum log level as thresholds
//! are crossed, restoring the previous level once space recovers. Grounded
//! on the original's `common/log/LogMonitor.{h,cpp}`; `FLAGS_minloglevel`
//! becomes one atomic field instead of a global, per SPEC_FULL.md's config
//! design note.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum MinLogLevel {
    Info = 0,
    Warn = 1,
    Error = 2,
    Fatal = 3,
}

impl MinLogLevel {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => MinLogLevel::Info,
            1 => MinLogLevel::Warn,
            2 => MinLogLevel::Error,
            _ => MinLogLevel::Fatal,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogMonitorConfig {
    pub log_dir: PathBuf,
    pub min_reserved_bytes_to_warn: u64,
    pub min_reserved_bytes_to_error: u64,
    pub min_reserved_bytes_to_fatal: u64,
    pub check_interval: Duration,
}

impl Default for LogMonitorConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./logs"),
            min_reserved_bytes_to_warn: 256 * (1 << 20),
            min_reserved_bytes_to_error: 64 * (1 << 20),
            min_reserved_bytes_to_fatal: 4 * (1 << 20),
            check_interval: Duration::from_secs(10),
        }
    }
}

/// Samples free bytes for the filesystem backing `path`; kept as a trait so
/// tests can inject a fixed reading instead of touching the filesystem.
pub trait FreeSpaceSource: Send + Sync {
    fn free_bytes(&self, path: &std::path::Path) -> Option<u64>;
}

/// Picks the disk whose mount point is the longest prefix of `path` and
/// reports its available space, the way `sysinfo`'s own examples resolve a
/// directory to its backing volume.
pub struct SysinfoFreeSpace;

impl FreeSpaceSource for SysinfoFreeSpace {
    fn free_bytes(&self, path: &std::path::Path) -> Option<u64> {
        let disks = sysinfo::Disks::new_with_refreshed_list();
        disks
            .iter()
            .filter(|d| path.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len())
            .map(|d| d.available_space())
    }
}

pub struct LogMonitor {
    config: LogMonitorConfig,
    old_min_level: MinLogLevel,
    current_level: AtomicU8,
    free_bytes: AtomicU64,
    source: Arc<dyn FreeSpaceSource>,
}

impl LogMonitor {
    pub fn new(config: LogMonitorConfig, old_min_level: MinLogLevel) -> Self {
        Self::with_source(config, old_min_level, Arc::new(SysinfoFreeSpace))
    }

    pub fn with_source(config: LogMonitorConfig, old_min_level: MinLogLevel, source: Arc<dyn FreeSpaceSource>) -> Self {
        Self {
            config,
            old_min_level,
            current_level: AtomicU8::new(old_min_level as u8),
            free_bytes: AtomicU64::new(u64::MAX >> 4),
            source,
        }
    }

    pub fn current_level(&self) -> MinLogLevel {
        MinLogLevel::from_u8(self.current_level.load(Ordering::Acquire))
    }

    pub fn free_bytes(&self) -> u64 {
        self.free_bytes.load(Ordering::Acquire)
    }

    fn refresh_free_bytes(&self) {
        if let Some(bytes) = self.source.free_bytes(&self.config.log_dir) {
            self.free_bytes.store(bytes, Ordering::Release);
        } else {
            warn!(dir = %self.config.log_dir.display(), "failed to read log directory free space");
        }
    }

    /// `checkAndChangeLogLevel`: validates the threshold ordering, then
    /// raises or restores the min log level based on the last sample.
    pub fn check_and_change_log_level(&self) {
        self.refresh_free_bytes();

        let c = &self.config;
        if c.min_reserved_bytes_to_fatal > c.min_reserved_bytes_to_error
            || c.min_reserved_bytes_to_fatal > c.min_reserved_bytes_to_warn
            || c.min_reserved_bytes_to_error > c.min_reserved_bytes_to_warn
        {
            error!("invalid log monitor config: expected warn > error > fatal thresholds");
            return;
        }

        let free = self.free_bytes();
        let new_level = if free < c.min_reserved_bytes_to_fatal {
            MinLogLevel::Fatal
        } else if free < c.min_reserved_bytes_to_error {
            MinLogLevel::Error
        } else if free < c.min_reserved_bytes_to_warn {
            MinLogLevel::Warn
        } else {
            self.old_min_level
        };

        if new_level != self.current_level() {
            error!(free_bytes = free, ?new_level, "log disk space crossed a threshold, changing min log level");
            self.current_level.store(new_level as u8, Ordering::Release);
        }
    }

    /// Spawns the periodic check as a tokio task; returns its handle so the
    /// caller can abort it on shutdown.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let interval = self.config.check_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.check_and_change_log_level();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MutableFreeSpace(AtomicU64);

    impl FreeSpaceSource for MutableFreeSpace {
        fn free_bytes(&self, _path: &std::path::Path) -> Option<u64> {
            Some(self.0.load(Ordering::Relaxed))
        }
    }

    fn config() -> LogMonitorConfig {
        LogMonitorConfig {
            log_dir: PathBuf::from("/tmp"),
            min_reserved_bytes_to_warn: 300,
            min_reserved_bytes_to_error: 200,
            min_reserved_bytes_to_fatal: 100,
            check_interval: Duration::from_secs(1),
        }
    }

    #[test]
    fn plenty_of_space_keeps_old_level() {
        let source = Arc::new(MutableFreeSpace(AtomicU64::new(1_000)));
        let mon = LogMonitor::with_source(config(), MinLogLevel::Info, source);
        mon.check_and_change_log_level();
        assert_eq!(mon.current_level(), MinLogLevel::Info);
    }

    #[test]
    fn crossing_each_threshold_raises_the_level() {
        let source = Arc::new(MutableFreeSpace(AtomicU64::new(1_000)));
        let mon = LogMonitor::with_source(config(), MinLogLevel::Info, source.clone());

        source.0.store(250, Ordering::Relaxed);
        mon.check_and_change_log_level();
        assert_eq!(mon.current_level(), MinLogLevel::Warn);

        source.0.store(150, Ordering::Relaxed);
        mon.check_and_change_log_level();
        assert_eq!(mon.current_level(), MinLogLevel::Error);

        source.0.store(50, Ordering::Relaxed);
        mon.check_and_change_log_level();
        assert_eq!(mon.current_level(), MinLogLevel::Fatal);
    }

    #[test]
    fn level_restores_once_space_recovers() {
        let source = Arc::new(MutableFreeSpace(AtomicU64::new(50)));
        let mon = LogMonitor::with_source(config(), MinLogLevel::Info, source.clone());
        mon.check_and_change_log_level();
        assert_eq!(mon.current_level(), MinLogLevel::Fatal);

        source.0.store(1_000, Ordering::Relaxed);
        mon.check_and_change_log_level();
        assert_eq!(mon.current_level(), MinLogLevel::Info);
    }

    #[test]
    fn inverted_thresholds_are_rejected_without_changing_level() {
        let bad = LogMonitorConfig {
            min_reserved_bytes_to_warn: 100,
            min_reserved_bytes_to_error: 200,
            ..config()
        };
        let source = Arc::new(MutableFreeSpace(AtomicU64::new(1)));
        let mon = LogMonitor::with_source(bad, MinLogLevel::Info, source);
        mon.check_and_change_log_level();
        assert_eq!(mon.current_level(), MinLogLevel::Info);
    }
}
