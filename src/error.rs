//! Crate-wide error taxonomy.
//!
//! One enum grouped by the kinds the storage and query layers actually
//! distinguish: transport, auth, schema, storage, raft, consistency,
//! resource and semantic errors. Every variant carries the short,
//! user-visible string; detailed causes are logged via `tracing` at the
//! call site, never folded into the returned message.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // -- Transport --
    #[error("disconnected from peer")]
    Disconnected,
    #[error("rpc failure: {0}")]
    RpcFailure(String),
    #[error("request timed out")]
    Timeout,
    #[error("leader changed, new leader: {new_leader:?}")]
    LeaderChanged { new_leader: Option<u64> },

    // -- Auth --
    #[error("bad username or password")]
    BadUserPassword,
    #[error("session invalid")]
    SessionInvalid,
    #[error("session timed out")]
    SessionTimeout,

    // -- Schema --
    #[error("schema not found: {0}")]
    SchemaNotFound(String),
    #[error("schema already exists: {0}")]
    SchemaExisted(String),
    #[error("incompatible type for column {0}")]
    IncompatibleType(String),
    #[error("unknown column name: {0}")]
    NameNotFound(String),
    #[error("column index out of range: {0}")]
    IndexOutOfRange(usize),
    #[error("value out of range for column {0}")]
    ValueOutOfRange(String),

    // -- Storage --
    #[error("key not found")]
    KeyNotFound,
    #[error("partial result: {0} part(s) failed")]
    PartialResult(usize),
    #[error("buffer overflow")]
    BufferOverflow,
    #[error("invalid filter expression: {0}")]
    InvalidFilter(String),
    #[error("partition not found: {0}")]
    PartNotFound(u32),

    // -- Raft --
    #[error("not the leader")]
    NotLeader { leader: Option<u64> },
    #[error("term mismatch: local {local} remote {remote}")]
    TermMismatch { local: u64, remote: u64 },
    #[error("log is stale")]
    LogStale,
    #[error("raft group stopped")]
    Stopped,

    // -- Consistency --
    #[error("write conflict")]
    WriteConflict,
    #[error("index check failed")]
    IndexCheckFailed,

    // -- Resource --
    #[error("disk full")]
    DiskFull,
    #[error("operation cancelled")]
    Cancelled,

    // -- Semantic --
    #[error("syntax error: {0}")]
    SyntaxError(String),
    #[error("unsupported: {0}")]
    Unsupported(String),

    // -- Ambient (I/O, serialization, storage backend) --
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("rocksdb error: {0}")]
    RocksDb(#[from] rocksdb::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether a storage client should retry this error transparently.
    /// Per the retry policy: transport and leader-changed errors are
    /// retried up to a bound with backoff; everything else surfaces
    /// immediately.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Disconnected | Error::RpcFailure(_) | Error::Timeout | Error::LeaderChanged { .. }
        )
    }

    /// CLI exit code contract (spec.md §6): 0 success (not represented
    /// here), 1 user/auth error, 2 syntax/semantic error, 3 storage error.
    pub fn cli_exit_code(&self) -> i32 {
        match self {
            Error::BadUserPassword | Error::SessionInvalid | Error::SessionTimeout => 1,
            Error::SyntaxError(_) | Error::Unsupported(_) => 2,
            _ => 3,
        }
    }
}
