//! Lock-free atomic log buffer: an in-memory, singly-linked list of
//! append-only batches sitting in front of the WAL so followers usually
//! read hot entries without touching disk. Single writer (the partition's
//! Raft task), many concurrent readers.
//!
//! The head is published through an `AtomicPtr` with release/acquire
//! ordering: the writer builds a complete node (including its `next` link)
//! before publishing it, so any reader that observes the new head via an
//! acquire load is guaranteed to see a fully-initialized node and its
//! entire backward chain.

use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct BufferedEntry {
    pub log_id: u64,
    pub term: u64,
    pub payload: Arc<[u8]>,
}

struct Node {
    entries: Vec<BufferedEntry>,
    cumulative_bytes: usize,
    first_log_id: u64,
    last_log_id: u64,
    next: Option<Arc<Node>>,
}

/// A read-only view over the buffer's current chain at the moment it was
/// taken; `get` walks it without touching the atomic head again.
pub struct LogBufferSnapshot {
    head: Option<Arc<Node>>,
}

impl LogBufferSnapshot {
    /// Returns the entry for `log_id` if it is still resident in the
    /// buffer. `None` means the caller must fall back to the WAL — either
    /// the id was evicted past the byte bound, or it was never buffered.
    pub fn get(&self, log_id: u64) -> Option<BufferedEntry> {
        let mut node = self.head.clone();
        while let Some(n) = node {
            if log_id >= n.first_log_id && log_id <= n.last_log_id {
                return n.entries.iter().find(|e| e.log_id == log_id).cloned();
            }
            if log_id > n.last_log_id {
                return None;
            }
            node = n.next.clone();
        }
        None
    }

    /// Oldest log id still resident, or `None` if the buffer is empty.
    pub fn oldest_resident_log_id(&self) -> Option<u64> {
        let mut node = self.head.clone();
        let mut oldest = None;
        while let Some(n) = node {
            oldest = Some(n.first_log_id);
            node = n.next.clone();
        }
        oldest
    }

    pub fn entries_from(&self, from_log_id: u64) -> Vec<BufferedEntry> {
        let mut out = Vec::new();
        let mut node = self.head.clone();
        while let Some(n) = node {
            if n.last_log_id >= from_log_id {
                out.extend(n.entries.iter().filter(|e| e.log_id >= from_log_id).cloned());
            }
            node = n.next.clone();
        }
        out.sort_by_key(|e| e.log_id);
        out
    }
}

pub struct AtomicLogBuffer {
    head: AtomicPtr<Node>,
    capacity_bytes: usize,
}

impl AtomicLogBuffer {
    pub fn new(capacity_bytes: usize) -> Self {
        Self { head: AtomicPtr::new(std::ptr::null_mut()), capacity_bytes }
    }

    /// Appends a new batch. Must only ever be called by one writer at a
    /// time (the partition's single-threaded Raft executor); concurrent
    /// calls would race on the read-modify-publish of `head`.
    pub fn push(&self, entries: Vec<BufferedEntry>) {
        if entries.is_empty() {
            return;
        }
        let bytes: usize = entries.iter().map(|e| e.payload.len() + 16).sum();
        let first_log_id = entries.first().unwrap().log_id;
        let last_log_id = entries.last().unwrap().log_id;

        let current_head_ptr = self.head.load(Ordering::Acquire);
        // SAFETY: `current_head_ptr` was published by a previous `push` via
        // `Arc::into_raw`, or is null. We reconstruct the Arc the head owns,
        // clone a reader-side handle from it, then forget our reconstruction
        // so the head's canonical strong count is untouched.
        let current_head: Option<Arc<Node>> = if current_head_ptr.is_null() {
            None
        } else {
            let borrowed = unsafe { Arc::from_raw(current_head_ptr) };
            let cloned = borrowed.clone();
            std::mem::forget(borrowed);
            Some(cloned)
        };

        let next = match &current_head {
            Some(h) if h.cumulative_bytes <= self.capacity_bytes => Some(h.clone()),
            // Past the byte bound: stop linking further back. Readers that
            // still hold an Arc to the old chain can keep walking it, but
            // any reader starting fresh from the new head sees the cut and
            // must fall back to the WAL for anything older.
            _ => None,
        };
        let cumulative_bytes = bytes + next.as_ref().map(|n| n.cumulative_bytes).unwrap_or(0);

        let node = Arc::new(Node { entries, cumulative_bytes, first_log_id, last_log_id, next });
        let new_ptr = Arc::into_raw(node) as *mut Node;
        let old_ptr = self.head.swap(new_ptr, Ordering::Release);
        if !old_ptr.is_null() {
            // Reclaim the head's previous canonical strong count.
            unsafe {
                drop(Arc::from_raw(old_ptr));
            }
        }
    }

    pub fn snapshot(&self) -> LogBufferSnapshot {
        let ptr = self.head.load(Ordering::Acquire);
        if ptr.is_null() {
            return LogBufferSnapshot { head: None };
        }
        // SAFETY: same borrow-then-forget pattern as in `push`.
        let borrowed = unsafe { Arc::from_raw(ptr) };
        let cloned = borrowed.clone();
        std::mem::forget(borrowed);
        LogBufferSnapshot { head: Some(cloned) }
    }
}

impl Drop for AtomicLogBuffer {
    fn drop(&mut self) {
        let ptr = self.head.swap(std::ptr::null_mut(), Ordering::Acquire);
        if !ptr.is_null() {
            unsafe {
                drop(Arc::from_raw(ptr));
            }
        }
    }
}

// `Node` contains only `Send + Sync` fields (`Vec`, `Arc`, primitives); the
// buffer's soundness relies on the single-writer contract above, not on any
// interior mutability inside `Node` itself.
unsafe impl Send for AtomicLogBuffer {}
unsafe impl Sync for AtomicLogBuffer {}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(log_id: u64, size: usize) -> BufferedEntry {
        BufferedEntry { log_id, term: 1, payload: Arc::from(vec![0u8; size]) }
    }

    #[test]
    fn push_then_get_returns_entry() {
        let buf = AtomicLogBuffer::new(1024 * 1024);
        buf.push(vec![entry(1, 8), entry(2, 8)]);
        let snap = buf.snapshot();
        assert_eq!(snap.get(2).unwrap().log_id, 2);
        assert_eq!(snap.get(1).unwrap().log_id, 1);
        assert!(snap.get(99).is_none());
    }

    #[test]
    fn bounded_capacity_evicts_oldest_batches() {
        let buf = AtomicLogBuffer::new(64);
        for i in 0..20u64 {
            buf.push(vec![entry(i, 32)]);
        }
        let snap = buf.snapshot();
        assert!(snap.get(0).is_none(), "oldest entries must fall out of the bounded buffer");
        assert!(snap.get(19).is_some(), "most recent entry must remain resident");
    }

    #[test]
    fn entries_from_returns_sorted_contiguous_range() {
        let buf = AtomicLogBuffer::new(1024 * 1024);
        buf.push(vec![entry(1, 8), entry(2, 8)]);
        buf.push(vec![entry(3, 8), entry(4, 8)]);
        let snap = buf.snapshot();
        let entries = snap.entries_from(2);
        let ids: Vec<u64> = entries.iter().map(|e| e.log_id).collect();
        assert_eq!(ids, vec![2, 3, 4]);
    }

    #[test]
    fn concurrent_push_and_snapshot_do_not_corrupt_state() {
        use std::sync::Arc as StdArc;
        use std::thread;

        let buf = StdArc::new(AtomicLogBuffer::new(1024 * 1024));
        let writer = {
            let buf = buf.clone();
            thread::spawn(move || {
                for i in 0..200u64 {
                    buf.push(vec![entry(i, 8)]);
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let buf = buf.clone();
                thread::spawn(move || {
                    for _ in 0..200 {
                        let snap = buf.snapshot();
                        let _ = snap.oldest_resident_log_id();
                    }
                })
            })
            .collect();
        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
    }
}
