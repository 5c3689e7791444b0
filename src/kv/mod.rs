//! Multi-space KV façade over an LSM backend (THE CORE §4.6): one RocksDB
//! column family per space, `atomic_batch` as the single consistency
//! primitive everything else (index maintenance, `storage-svc` writes) is
//! built on.
//!
//! Mutating calls here are the *applied* side of a write: the Raft layer
//! commits a [`crate::raft::Command`] first and only then calls into this
//! module via [`RaftKvSink`]. Reads are exposed directly for callers that
//! already know they're talking to a leader (strong) or have opted into
//! stale reads from any replica — this façade does not itself enforce that
//! policy, matching spec.md §4.6 ("reads may be served by the leader only
//! ... or any replica ... explicitly opted into").

use crate::error::{Error, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

fn cf_name(space_id: u32) -> String {
    format!("space_{space_id}")
}

/// One unit of the `atomic_batch` primitive.
#[derive(Debug, Clone)]
pub enum KvOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Remove { key: Vec<u8> },
    RemoveRange { start: Vec<u8>, end: Vec<u8> },
}

/// Multi-space KV engine. One `DB` handle, one column family per space so
/// `compact`/`flush`/`drop` can operate space-at-a-time without scanning key
/// prefixes for a space boundary.
pub struct KvEngine {
    db: DB,
    path: std::path::PathBuf,
    // Guards column-family creation; RocksDB's own locking protects reads
    // and writes to an already-open CF.
    open_spaces: RwLock<HashMap<u32, ()>>,
}

impl KvEngine {
    pub fn open(path: impl AsRef<Path>, existing_spaces: &[u32]) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs: Vec<ColumnFamilyDescriptor> = existing_spaces
            .iter()
            .map(|id| ColumnFamilyDescriptor::new(cf_name(*id), Options::default()))
            .collect();

        let db = if cfs.is_empty() {
            DB::open(&opts, &path)?
        } else {
            DB::open_cf_descriptors(&opts, &path, cfs)?
        };

        let open_spaces = existing_spaces.iter().map(|id| (*id, ())).collect();
        info!(spaces = existing_spaces.len(), ?path, "kv engine opened");
        Ok(Self { db, path, open_spaces: RwLock::new(open_spaces) })
    }

    /// Creates the column family backing `space_id` if it does not already
    /// exist. Idempotent.
    pub fn create_space(&self, space_id: u32) -> Result<()> {
        if self.open_spaces.read().unwrap().contains_key(&space_id) {
            return Ok(());
        }
        let mut guard = self.open_spaces.write().unwrap();
        if guard.contains_key(&space_id) {
            return Ok(());
        }
        self.db.create_cf(cf_name(space_id), &Options::default())?;
        guard.insert(space_id, ());
        debug!(space_id, "space column family created");
        Ok(())
    }

    fn cf(&self, space_id: u32) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(&cf_name(space_id))
            .ok_or_else(|| Error::SchemaNotFound(format!("space {space_id} has no column family")))
    }

    pub fn get(&self, space_id: u32, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get_cf(self.cf(space_id)?, key)?)
    }

    pub fn multi_get(&self, space_id: u32, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>> {
        let cf = self.cf(space_id)?;
        keys.iter().map(|k| Ok(self.db.get_cf(cf, k)?)).collect()
    }

    pub fn put(&self, space_id: u32, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        Ok(self.db.put_cf(self.cf(space_id)?, key, value)?)
    }

    pub fn multi_put(&self, space_id: u32, pairs: Vec<(Vec<u8>, Vec<u8>)>) -> Result<()> {
        self.atomic_batch(
            space_id,
            pairs.into_iter().map(|(key, value)| KvOp::Put { key, value }).collect(),
        )
    }

    pub fn remove(&self, space_id: u32, key: &[u8]) -> Result<()> {
        Ok(self.db.delete_cf(self.cf(space_id)?, key)?)
    }

    pub fn remove_range(&self, space_id: u32, start: &[u8], end: &[u8]) -> Result<()> {
        Ok(self.db.delete_range_cf(self.cf(space_id)?, start, end)?)
    }

    /// All key/value pairs whose key starts with `prefix`, in key order.
    pub fn prefix_scan(&self, space_id: u32, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let cf = self.cf(space_id)?;
        let mode = IteratorMode::From(prefix, rocksdb::Direction::Forward);
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, mode) {
            let (key, value) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push((key.to_vec(), value.to_vec()));
        }
        Ok(out)
    }

    /// Key/value pairs in `[start, end)`.
    pub fn range_scan(&self, space_id: u32, start: &[u8], end: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let cf = self.cf(space_id)?;
        let mode = IteratorMode::From(start, rocksdb::Direction::Forward);
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, mode) {
            let (key, value) = item?;
            if key.as_ref() >= end {
                break;
            }
            out.push((key.to_vec(), value.to_vec()));
        }
        Ok(out)
    }

    /// The unit of consistency: every op applies, or none does.
    pub fn atomic_batch(&self, space_id: u32, ops: Vec<KvOp>) -> Result<()> {
        let cf = self.cf(space_id)?;
        let mut batch = WriteBatch::default();
        for op in ops {
            match op {
                KvOp::Put { key, value } => batch.put_cf(cf, key, value),
                KvOp::Remove { key } => batch.delete_cf(cf, key),
                KvOp::RemoveRange { start, end } => batch.delete_range_cf(cf, start, end),
            }
        }
        Ok(self.db.write(batch)?)
    }

    /// A point-in-time consistent read view over one space, for backfills
    /// (e.g. rebuild-index) and the learner snapshot transfer path.
    pub fn snapshot(&self, space_id: u32) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let cf = self.cf(space_id)?;
        let snap = self.db.snapshot();
        let mut out = Vec::new();
        for item in snap.iterator_cf(cf, IteratorMode::Start) {
            let (key, value) = item?;
            out.push((key.to_vec(), value.to_vec()));
        }
        Ok(out)
    }

    pub fn compact(&self, space_id: u32) -> Result<()> {
        self.db.compact_range_cf(self.cf(space_id)?, None::<&[u8]>, None::<&[u8]>);
        Ok(())
    }

    pub fn flush(&self, space_id: u32) -> Result<()> {
        Ok(self.db.flush_cf(self.cf(space_id)?)?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Applies committed [`crate::raft::Command`]s to one partition's space.
/// Each `RaftNode` task owns one of these; committing through Raft and then
/// calling `apply` here is what makes a mutation durable and visible.
pub struct RaftKvSink {
    engine: Arc<KvEngine>,
    space_id: u32,
}

impl RaftKvSink {
    pub fn new(engine: Arc<KvEngine>, space_id: u32) -> Self {
        Self { engine, space_id }
    }

    fn flatten(command: &crate::raft::Command, out: &mut Vec<KvOp>) {
        use crate::raft::Command;
        match command {
            Command::Put { key, value } => out.push(KvOp::Put { key: key.clone(), value: value.clone() }),
            Command::Delete { key } => out.push(KvOp::Remove { key: key.clone() }),
            Command::Batch(cmds) => cmds.iter().for_each(|c| Self::flatten(c, out)),
        }
    }
}

#[async_trait]
impl crate::raft::ApplySink for RaftKvSink {
    async fn apply(&self, index: u64, command: &crate::raft::Command) {
        let mut ops = Vec::new();
        Self::flatten(command, &mut ops);
        if let Err(err) = self.engine.atomic_batch(self.space_id, ops) {
            tracing::error!(space_id = self.space_id, log_id = index, %err, "failed to apply committed command");
        }
    }
}
