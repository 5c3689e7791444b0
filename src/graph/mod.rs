//! Graph data model (THE CORE §3): spaces and the vertex/edge identifiers
//! the storage service, key layout and index maintenance all share.

pub mod space;

pub use space::{Space, SpaceManager};

use std::hash::Hasher;

pub type VertexId = i64;
pub type EdgeType = i32;
pub type Rank = i64;

/// `partition_id = hash(vid) mod partition_count` (spec.md §3). Uses the
/// same non-cryptographic hash as the schema registry's name index so the
/// crate has one hash function for one purpose, not two.
pub fn partition_of(vid: VertexId, partition_count: u32) -> u32 {
    debug_assert!(partition_count > 0);
    let mut hasher = rustc_hash::FxHasher::default();
    hasher.write_i64(vid);
    (hasher.finish() % partition_count as u64) as u32
}

/// One physical edge write implies two logical keys: the forward edge in
/// `src`'s partition and its mirror in `dst`'s partition. Bundled here so
/// every caller (storage-svc, index maintenance) derives both the same way.
#[derive(Debug, Clone, Copy)]
pub struct EdgeKeyPair {
    pub src_vid: VertexId,
    pub edge_type: EdgeType,
    pub rank: Rank,
    pub dst_vid: VertexId,
}

impl EdgeKeyPair {
    pub fn src_partition(&self, partition_count: u32) -> u32 {
        partition_of(self.src_vid, partition_count)
    }

    pub fn dst_partition(&self, partition_count: u32) -> u32 {
        partition_of(self.dst_vid, partition_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitioning_is_deterministic_and_in_range() {
        for vid in [0i64, 1, -1, 42, i64::MAX, i64::MIN] {
            let p = partition_of(vid, 16);
            assert!(p < 16);
            assert_eq!(p, partition_of(vid, 16));
        }
    }
}
