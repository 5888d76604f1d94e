//! Database: directory ownership, metadata sidecar, table registry (§4.9).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::buffer::WriteBufferConfig;
use crate::error::{ErrorKind, Result, StoreError};
use crate::schema::Schema;
use crate::table::Table;

/// One entry in the database metadata sidecar (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableEntry {
    name: String,
    schema: String,
}

/// The `db_metadata.json` sidecar (§4.9, §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DatabaseMetadata {
    tables: Vec<TableEntry>,
}

const METADATA_FILE: &str = "db_metadata.json";

/// Owns `<base>/<db_name>/`: the metadata sidecar plus every open table's
/// schema and data files.
pub struct Database {
    name: String,
    dir: PathBuf,
    write_buffer_config: WriteBufferConfig,
    cache_capacity: usize,
    tables: RwLock<BTreeMap<String, Arc<Table>>>,
}

impl Database {
    /// Opens (creating if absent) the database directory under `base`,
    /// reads its metadata sidecar and loads every table it lists (§4.9
    /// `create`).
    #[tracing::instrument(skip(base), fields(database = name))]
    pub fn open(base: &Path, name: &str) -> Result<Self> {
        Self::open_with_config(base, name, WriteBufferConfig::default(), crate::cache::DEFAULT_CACHE_CAPACITY)
    }

    pub fn open_with_config(
        base: &Path,
        name: &str,
        write_buffer_config: WriteBufferConfig,
        cache_capacity: usize,
    ) -> Result<Self> {
        if name.is_empty() {
            return Err(StoreError::validation("database name must not be empty"));
        }
        let dir = base.join(name);
        fs::create_dir_all(&dir).map_err(|e| {
            StoreError::new(ErrorKind::FileSystemError, e.to_string()).with_path(&dir)
        })?;

        let metadata_path = dir.join(METADATA_FILE);
        let metadata = if metadata_path.exists() {
            let raw = fs::read(&metadata_path)?;
            serde_json::from_slice(&raw)?
        } else {
            let metadata = DatabaseMetadata::default();
            fs::write(&metadata_path, serde_json::to_vec_pretty(&metadata)?)?;
            metadata
        };

        let mut tables = BTreeMap::new();
        for entry in &metadata.tables {
            let table = Table::open(&dir, &entry.name, write_buffer_config, cache_capacity)?;
            tables.insert(entry.name.clone(), Arc::new(table));
        }

        Ok(Self {
            name: name.to_owned(),
            dir,
            write_buffer_config,
            cache_capacity,
            tables: RwLock::new(tables),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    fn write_metadata(&self, tables: &BTreeMap<String, Arc<Table>>) -> Result<()> {
        let metadata = DatabaseMetadata {
            tables: tables
                .keys()
                .map(|name| TableEntry {
                    name: name.clone(),
                    schema: format!("{name}.schema.json"),
                })
                .collect(),
        };
        fs::write(self.metadata_path(), serde_json::to_vec_pretty(&metadata)?)?;
        Ok(())
    }

    /// Creates `name` with `schema` and registers it in the metadata
    /// sidecar. Idempotent: if a table with this name is already open, it is
    /// returned unchanged rather than recreated (§4.9).
    #[tracing::instrument(skip(self, schema), fields(database = %self.name, table = name))]
    pub fn create_table(&self, name: &str, schema: Schema) -> Result<Arc<Table>> {
        // Held for the whole check-create-insert sequence, not just the
        // lookup: a read-then-write split here would let two concurrent
        // callers both pass the "not yet open" check and both open
        // independent runtime state over the same data file (§5 assumes a
        // single writer per table).
        let mut tables = self.tables.write();
        if let Some(existing) = tables.get(name) {
            return Ok(existing.clone());
        }

        let table = Arc::new(Table::create(
            &self.dir,
            schema,
            self.write_buffer_config,
            self.cache_capacity,
        )?);
        tables.insert(name.to_owned(), table.clone());
        self.write_metadata(&tables)?;
        Ok(table)
    }

    pub fn get_table(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.read().get(name).cloned()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    /// Closes, unlinks the schema and data files, and rewrites the metadata
    /// sidecar. Returns `false` if `name` was not a known table (§4.9).
    #[tracing::instrument(skip(self), fields(database = %self.name, table = name))]
    pub fn delete_table(&self, name: &str) -> Result<bool> {
        let removed = {
            let mut tables = self.tables.write();
            tables.remove(name)
        };
        let Some(table) = removed else {
            return Ok(false);
        };

        table.close()?;
        let schema_path = table.schema_path().to_path_buf();
        let data_path = self.dir.join(format!("{name}.data"));
        let _ = fs::remove_file(&schema_path);
        let _ = fs::remove_file(&data_path);

        let tables = self.tables.read();
        self.write_metadata(&tables)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{ColumnDef, ColumnType};
    use tempfile::TempDir;

    fn schema(table: &str) -> Schema {
        Schema::new("db", table, vec![ColumnDef::new("name", ColumnType::Text).with_length(8)])
    }

    #[test]
    fn create_table_is_idempotent() {
        let base = TempDir::with_prefix("bindb-database-").unwrap();
        let db = Database::open(base.path(), "db").unwrap();
        let a = db.create_table("users", schema("users")).unwrap();
        let b = db.create_table("users", schema("users")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn delete_table_removes_files_and_registry_entry() {
        let base = TempDir::with_prefix("bindb-database-").unwrap();
        let db = Database::open(base.path(), "db").unwrap();
        db.create_table("users", schema("users")).unwrap();
        assert!(db.delete_table("users").unwrap());
        assert!(db.get_table("users").is_none());
        assert!(!db.delete_table("users").unwrap());
    }

    #[test]
    fn reopen_loads_previously_created_tables() {
        let base = TempDir::with_prefix("bindb-database-").unwrap();
        {
            let db = Database::open(base.path(), "db").unwrap();
            db.create_table("users", schema("users")).unwrap();
        }
        let reopened = Database::open(base.path(), "db").unwrap();
        assert_eq!(reopened.table_names(), vec!["users".to_owned()]);
        assert!(reopened.get_table("users").is_some());
    }
}
