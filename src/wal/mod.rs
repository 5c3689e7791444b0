//! Partitioned write-ahead log (THE CORE §4.4): every voter persists its
//! own copy of the replicated log; the in-memory [`AtomicLogBuffer`] sits in
//! front of the on-disk [`Wal`] so steady-state replication rarely touches
//! disk for reads.

pub mod log;
pub mod log_buffer;

pub use log::{LogRecord, Wal};
pub use log_buffer::{AtomicLogBuffer, BufferedEntry};

use crate::error::Result;
use std::sync::Arc;

/// One partition's durable log: WAL on disk, atomic buffer in memory.
/// `append` always writes through to the WAL before publishing into the
/// buffer, so a crash between the two never loses an acknowledged entry.
pub struct PartitionLog {
    wal: Wal,
    buffer: AtomicLogBuffer,
}

impl PartitionLog {
    pub fn open(dir: impl AsRef<std::path::Path>, rotate_bytes: u64, buffer_capacity_bytes: usize) -> Result<Self> {
        Ok(Self { wal: Wal::open(dir, rotate_bytes)?, buffer: AtomicLogBuffer::new(buffer_capacity_bytes) })
    }

    pub fn append(&mut self, term: u64, log_id: u64, cluster_id: u64, payload: Vec<u8>) -> Result<()> {
        let record = LogRecord { term, log_id, cluster_id, payload };
        self.wal.append(&record)?;
        self.buffer.push(vec![BufferedEntry { log_id, term, payload: Arc::from(record.payload) }]);
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.wal.flush()
    }

    /// Fetches one entry by log id, preferring the in-memory buffer and
    /// falling back to a WAL scan when the entry has aged out of it.
    pub fn get(&self, log_id: u64) -> Result<Option<BufferedEntry>> {
        let snapshot = self.buffer.snapshot();
        if let Some(entry) = snapshot.get(log_id) {
            return Ok(Some(entry));
        }
        let records = self.wal.replay(log_id)?;
        Ok(records
            .into_iter()
            .find(|r| r.log_id == log_id)
            .map(|r| BufferedEntry { log_id: r.log_id, term: r.term, payload: Arc::from(r.payload) }))
    }

    /// Entries with `log_id >= from_log_id`, preferring the buffer and
    /// filling in anything older directly from the WAL.
    pub fn entries_from(&self, from_log_id: u64) -> Result<Vec<BufferedEntry>> {
        let snapshot = self.buffer.snapshot();
        match snapshot.oldest_resident_log_id() {
            Some(oldest) if oldest <= from_log_id => Ok(snapshot.entries_from(from_log_id)),
            _ => {
                let records = self.wal.replay(from_log_id)?;
                Ok(records
                    .into_iter()
                    .map(|r| BufferedEntry { log_id: r.log_id, term: r.term, payload: Arc::from(r.payload) })
                    .collect())
            }
        }
    }

    /// Called once this partition's snapshot has advanced past
    /// `frontier`: drops WAL files fully covered by the snapshot.
    pub fn truncate_before(&mut self, frontier: u64) -> Result<()> {
        self.wal.truncate_before(frontier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn append_then_get_round_trips_through_buffer() {
        let dir = TempDir::new().unwrap();
        let mut log = PartitionLog::open(dir.path(), 1024 * 1024, 1024 * 1024).unwrap();
        log.append(1, 1, 42, b"hello".to_vec()).unwrap();
        let entry = log.get(1).unwrap().unwrap();
        assert_eq!(&*entry.payload, b"hello");
    }

    #[test]
    fn get_falls_back_to_wal_once_evicted_from_buffer() {
        let dir = TempDir::new().unwrap();
        let mut log = PartitionLog::open(dir.path(), 1024 * 1024, 64).unwrap();
        for i in 1..=50u64 {
            log.append(1, i, 42, vec![0u8; 16]).unwrap();
        }
        log.flush().unwrap();
        let entry = log.get(1).unwrap().unwrap();
        assert_eq!(entry.log_id, 1);
    }
}
