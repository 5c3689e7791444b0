//! Write-ahead log: varint-framed `(term, log_id, cluster_id, payload)`
//! records, one file per rotation window, named by the first log id they
//! hold so replay and truncation can both work file-at-a-time without
//! parsing every record up front.

use crate::codec::varint;
use crate::error::{Error, Result};
use rustc_hash::FxHasher;
use std::fs::{File, OpenOptions};
use std::hash::Hasher;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub term: u64,
    pub log_id: u64,
    pub cluster_id: u64,
    pub payload: Vec<u8>,
}

fn checksum(record: &LogRecord) -> u32 {
    let mut hasher = FxHasher::default();
    hasher.write_u64(record.term);
    hasher.write_u64(record.log_id);
    hasher.write_u64(record.cluster_id);
    hasher.write(&record.payload);
    (hasher.finish() & 0xFFFF_FFFF) as u32
}

fn encode_record(record: &LogRecord) -> Vec<u8> {
    let mut body = Vec::new();
    varint::encode_u64(record.term, &mut body);
    varint::encode_u64(record.log_id, &mut body);
    varint::encode_u64(record.cluster_id, &mut body);
    varint::encode_u64(record.payload.len() as u64, &mut body);
    body.extend_from_slice(&record.payload);
    body.extend_from_slice(&checksum(record).to_le_bytes());

    let mut framed = Vec::with_capacity(body.len() + 5);
    varint::encode_u64(body.len() as u64, &mut framed);
    framed.extend_from_slice(&body);
    framed
}

fn decode_record(body: &[u8]) -> Result<LogRecord> {
    let (term, n1) = varint::decode_u64(body).ok_or(Error::BufferOverflow)?;
    let (log_id, n2) = varint::decode_u64(&body[n1..]).ok_or(Error::BufferOverflow)?;
    let (cluster_id, n3) = varint::decode_u64(&body[n1 + n2..]).ok_or(Error::BufferOverflow)?;
    let (payload_len, n4) = varint::decode_u64(&body[n1 + n2 + n3..]).ok_or(Error::BufferOverflow)?;
    let payload_start = n1 + n2 + n3 + n4;
    let payload_end = payload_start + payload_len as usize;
    let payload = body
        .get(payload_start..payload_end)
        .ok_or(Error::BufferOverflow)?
        .to_vec();
    let record = LogRecord { term, log_id, cluster_id, payload };
    let stored_crc =
        u32::from_le_bytes(body[payload_end..payload_end + 4].try_into().map_err(|_| Error::BufferOverflow)?);
    if stored_crc != checksum(&record) {
        return Err(Error::Unsupported(format!("wal record {log_id} failed checksum")));
    }
    Ok(record)
}

/// One partition's on-disk WAL: a directory of `wal-<first_log_id>.log`
/// files, each append-only until rotated.
pub struct Wal {
    dir: PathBuf,
    current_file: Option<BufWriter<File>>,
    current_file_start: u64,
    current_file_bytes: u64,
    rotate_bytes: u64,
    sync_mode: bool,
}

impl Wal {
    pub fn open(dir: impl AsRef<Path>, rotate_bytes: u64) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        info!(?dir, "opening wal directory");
        Ok(Self { dir, current_file: None, current_file_start: 0, current_file_bytes: 0, rotate_bytes, sync_mode: false })
    }

    pub fn set_sync_mode(&mut self, sync: bool) {
        self.sync_mode = sync;
    }

    fn file_path(dir: &Path, first_log_id: u64) -> PathBuf {
        dir.join(format!("wal-{first_log_id:020}.log"))
    }

    fn existing_files(&self) -> Result<Vec<(u64, PathBuf)>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)?.flatten() {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(id_str) = name.strip_prefix("wal-").and_then(|s| s.strip_suffix(".log")) {
                    if let Ok(id) = id_str.parse::<u64>() {
                        files.push((id, entry.path()));
                    }
                }
            }
        }
        files.sort_by_key(|(id, _)| *id);
        Ok(files)
    }

    fn rotate(&mut self, next_log_id: u64) -> Result<()> {
        if let Some(file) = &mut self.current_file {
            file.flush()?;
        }
        let path = Self::file_path(&self.dir, next_log_id);
        debug!(?path, "rotating wal file");
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        self.current_file = Some(BufWriter::new(file));
        self.current_file_start = next_log_id;
        self.current_file_bytes = 0;
        Ok(())
    }

    pub fn append(&mut self, record: &LogRecord) -> Result<()> {
        let framed = encode_record(record);
        let needs_rotation = self.current_file.is_none() || self.current_file_bytes >= self.rotate_bytes;
        if needs_rotation {
            self.rotate(record.log_id)?;
        }
        if let Some(file) = &mut self.current_file {
            file.write_all(&framed)?;
            if self.sync_mode {
                file.flush()?;
            }
        }
        self.current_file_bytes += framed.len() as u64;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        if let Some(file) = &mut self.current_file {
            file.flush()?;
        }
        Ok(())
    }

    fn read_file(path: &Path) -> Result<Vec<LogRecord>> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut records = Vec::new();
        loop {
            let mut len_buf = Vec::new();
            let mut one_byte = [0u8; 1];
            let frame_len = loop {
                match reader.read_exact(&mut one_byte) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(records),
                    Err(e) => return Err(Error::Io(e)),
                }
                len_buf.push(one_byte[0]);
                if one_byte[0] & 0x80 == 0 {
                    break varint::decode_u64(&len_buf).ok_or(Error::BufferOverflow)?.0;
                }
            };
            let mut body = vec![0u8; frame_len as usize];
            reader.read_exact(&mut body)?;
            match decode_record(&body) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(?path, error = %e, "stopping wal replay at corrupt record");
                    return Ok(records);
                }
            }
        }
    }

    /// Replays every record with `log_id >= from_log_id`, in order.
    pub fn replay(&self, from_log_id: u64) -> Result<Vec<LogRecord>> {
        let mut out = Vec::new();
        for (_, path) in self.existing_files()? {
            let records = Self::read_file(&path)?;
            out.extend(records.into_iter().filter(|r| r.log_id >= from_log_id));
        }
        Ok(out)
    }

    /// Deletes every WAL file whose highest log id is below `frontier` (the
    /// last log id covered by a durable snapshot). Called on every voter
    /// once its own snapshot advances, so each replica's WAL directory
    /// stays bounded independent of the others' snapshot progress.
    pub fn truncate_before(&mut self, frontier: u64) -> Result<()> {
        let files = self.existing_files()?;
        for i in 0..files.len() {
            let (start, path) = &files[i];
            if *start >= frontier {
                continue;
            }
            let next_start = files.get(i + 1).map(|(id, _)| *id);
            let fully_covered = next_start.map(|next| next <= frontier).unwrap_or(false);
            if fully_covered && Some(*start) != Some(self.current_file_start) {
                info!(?path, frontier, "truncating wal file past snapshot frontier");
                std::fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}
