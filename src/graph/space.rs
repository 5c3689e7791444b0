//! Space: the top-level container of schemas and partitions (spec.md §3).
//! Immutable after creation except charset/default-vid-type tweaks;
//! `partition_count` fixes the hash space for the space's lifetime.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone, PartialEq)]
pub struct Space {
    pub space_id: u32,
    pub name: String,
    pub partition_count: u32,
    pub replica_factor: u32,
    pub charset: String,
}

impl Space {
    pub fn new(space_id: u32, name: impl Into<String>, partition_count: u32, replica_factor: u32) -> Self {
        Self {
            space_id,
            name: name.into(),
            partition_count,
            replica_factor,
            charset: "utf8".to_string(),
        }
    }
}

/// Cluster-wide catalog of spaces, keyed by id and by name. Read-mostly:
/// creation takes an exclusive lock, lookups a shared one.
#[derive(Default)]
pub struct SpaceManager {
    by_id: RwLock<HashMap<u32, Space>>,
    by_name: RwLock<HashMap<String, u32>>,
}

impl SpaceManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, space: Space) -> Result<()> {
        let mut by_name = self.by_name.write().unwrap();
        if by_name.contains_key(&space.name) {
            return Err(Error::SchemaExisted(format!("space '{}' already exists", space.name)));
        }
        let mut by_id = self.by_id.write().unwrap();
        if by_id.contains_key(&space.space_id) {
            return Err(Error::SchemaExisted(format!("space id {} already exists", space.space_id)));
        }
        by_name.insert(space.name.clone(), space.space_id);
        by_id.insert(space.space_id, space);
        Ok(())
    }

    pub fn get(&self, space_id: u32) -> Result<Space> {
        self.by_id
            .read()
            .unwrap()
            .get(&space_id)
            .cloned()
            .ok_or_else(|| Error::SchemaNotFound(format!("space {space_id}")))
    }

    pub fn get_by_name(&self, name: &str) -> Result<Space> {
        let space_id = *self
            .by_name
            .read()
            .unwrap()
            .get(name)
            .ok_or_else(|| Error::SchemaNotFound(format!("space '{name}'")))?;
        self.get(space_id)
    }

    /// Charset may be tweaked after creation (spec.md §3); everything else
    /// about a space is immutable for its lifetime.
    pub fn set_charset(&self, space_id: u32, charset: impl Into<String>) -> Result<()> {
        let mut by_id = self.by_id.write().unwrap();
        let space = by_id
            .get_mut(&space_id)
            .ok_or_else(|| Error::SchemaNotFound(format!("space {space_id}")))?;
        space.charset = charset.into();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_lookup_by_id_and_name() {
        let mgr = SpaceManager::new();
        mgr.create(Space::new(1, "demo", 16, 3)).unwrap();
        assert_eq!(mgr.get(1).unwrap().name, "demo");
        assert_eq!(mgr.get_by_name("demo").unwrap().space_id, 1);
    }

    #[test]
    fn duplicate_name_is_rejected() {
        let mgr = SpaceManager::new();
        mgr.create(Space::new(1, "demo", 16, 3)).unwrap();
        assert!(mgr.create(Space::new(2, "demo", 8, 1)).is_err());
    }
}
