//! Schema registry: `(space, tag|edge, version) -> column set`.
//!
//! Replaces the source's `SchemaProviderIf -> ResultSchemaProvider ->
//! ThriftSchemaProvider -> SchemaWriter` inheritance chain with one concrete
//! `Schema` type plus the `SchemaProvider` trait for the read-only interface;
//! `SchemaBuilder` is the distinct builder that produces a `Schema`.

use crate::codec::value::{ColumnType, Value};
use crate::error::{Error, Result};
use rustc_hash::FxHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};

fn name_hash(name: &str) -> u64 {
    let mut hasher = FxHasher::default();
    name.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub col_type: ColumnType,
    pub nullable: bool,
    pub default: Option<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, col_type: ColumnType) -> Self {
        Self { name: name.into(), col_type, nullable: true, default: None }
    }

    pub fn with_default(mut self, default: Value) -> Result<Self> {
        if default.column_type().map(|t| t != self.col_type).unwrap_or(false) {
            return Err(Error::IncompatibleType(self.name.clone()));
        }
        self.default = Some(default);
        Ok(self)
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// A single published version of a tag or edge schema.
#[derive(Debug)]
pub struct Schema {
    pub version: u32,
    columns: Vec<Column>,
    name_index: HashMap<u64, usize>,
}

/// Read-only interface a row reader/updater needs; implemented by `Schema`.
pub trait SchemaProvider {
    fn field_count(&self) -> usize;
    fn field(&self, index: usize) -> Option<&Column>;
    fn index_of(&self, name: &str) -> Option<usize>;
    fn version(&self) -> u32;
}

impl SchemaProvider for Schema {
    fn field_count(&self) -> usize {
        self.columns.len()
    }
    fn field(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }
    fn index_of(&self, name: &str) -> Option<usize> {
        self.name_index.get(&name_hash(name)).copied()
    }
    fn version(&self) -> u32 {
        self.version
    }
}

impl Schema {
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
}

/// Builder for a `Schema`; fails registration at build time if two column
/// names hash identically (collisions are not tolerated).
pub struct SchemaBuilder {
    version: u32,
    columns: Vec<Column>,
}

impl SchemaBuilder {
    pub fn new(version: u32) -> Self {
        Self { version, columns: Vec::new() }
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn build(self) -> Result<Schema> {
        let mut name_index = HashMap::with_capacity(self.columns.len());
        for (idx, col) in self.columns.iter().enumerate() {
            let hash = name_hash(&col.name);
            if name_index.insert(hash, idx).is_some() {
                return Err(Error::SchemaExisted(format!(
                    "column name hash collision registering '{}'",
                    col.name
                )));
            }
        }
        Ok(Schema { version: self.version, columns: self.columns, name_index })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaOwner {
    Tag(u32),
    /// Signed edge type: positive out-edge, negative mirrored in-edge,
    /// same schema for both signs of the same absolute value.
    Edge(i32),
}

impl SchemaOwner {
    fn canonical_edge(self) -> SchemaOwner {
        match self {
            SchemaOwner::Edge(t) => SchemaOwner::Edge(t.abs()),
            other => other,
        }
    }
}

#[derive(Default)]
struct SpaceSchemaTable {
    versions: HashMap<SchemaOwner, Vec<Arc<Schema>>>,
}

impl SpaceSchemaTable {
    fn install(&mut self, owner: SchemaOwner, schema: Schema) -> Result<()> {
        let owner = owner.canonical_edge();
        let versions = self.versions.entry(owner).or_default();
        if let Some(last) = versions.last() {
            if schema.version <= last.version {
                return Err(Error::SchemaExisted(format!(
                    "version {} is not newer than installed version {}",
                    schema.version, last.version
                )));
            }
        }
        versions.push(Arc::new(schema));
        Ok(())
    }

    /// Latest version with `version <= requested`, or the newest version
    /// when `requested` is `None`.
    fn get(&self, owner: SchemaOwner, requested: Option<u32>) -> Option<Arc<Schema>> {
        let owner = owner.canonical_edge();
        let versions = self.versions.get(&owner)?;
        match requested {
            None => versions.last().cloned(),
            Some(v) => versions.iter().rev().find(|s| s.version <= v).cloned(),
        }
    }
}

/// Maps `(space, tag|edge, version) -> column set`. Read-mostly; writers
/// take an exclusive lock on a single space's table while installing a new
/// version, leaving every other space's readers unblocked.
pub struct SchemaRegistry {
    spaces: RwLock<HashMap<u32, Arc<RwLock<SpaceSchemaTable>>>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self { spaces: RwLock::new(HashMap::new()) }
    }

    fn space_table(&self, space_id: u32) -> Arc<RwLock<SpaceSchemaTable>> {
        if let Some(table) = self.spaces.read().unwrap().get(&space_id) {
            return table.clone();
        }
        let mut spaces = self.spaces.write().unwrap();
        spaces
            .entry(space_id)
            .or_insert_with(|| Arc::new(RwLock::new(SpaceSchemaTable::default())))
            .clone()
    }

    pub fn install(&self, space_id: u32, owner: SchemaOwner, schema: Schema) -> Result<()> {
        let table = self.space_table(space_id);
        table.write().unwrap().install(owner, schema)
    }

    pub fn get(&self, space_id: u32, owner: SchemaOwner, version: Option<u32>) -> Result<Arc<Schema>> {
        let table = self.space_table(space_id);
        let table = table.read().unwrap();
        table
            .get(owner, version)
            .ok_or_else(|| Error::SchemaNotFound(format!("space {space_id:?} owner {owner:?}")))
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}
