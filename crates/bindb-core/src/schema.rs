//! Schema model and layout planner (§4.1, §6).
//!
//! [`Schema`] is the JSON-sidecar-shaped input; [`RecordLayout`] is the
//! planner's frozen output and the authoritative record layout for all
//! subsequent I/O.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::column::{ColumnDef, ColumnType};
use crate::error::{Result, StoreError};
use crate::id::{table_hash, IdGenerator};

/// The name the planner looks for (and injects) as the id column.
pub const ID_COLUMN_NAME: &str = "id";

/// An ordered column list plus the database/table names it belongs to, as
/// persisted in the schema sidecar (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    pub database: String,
    pub table: String,
    pub columns: Vec<ColumnDef>,
}

impl Schema {
    pub fn new(database: impl Into<String>, table: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            columns,
        }
    }
}

/// One column's byte-level position within a record, as computed by the
/// layout planner.
#[derive(Debug, Clone)]
pub struct ColumnLayout {
    pub def: ColumnDef,
    /// Byte offset of the column's payload within the record.
    pub offset: usize,
    /// Payload size in bytes (not counting the null flag).
    pub size: usize,
    /// Byte offset of the 1-byte null flag, always `offset + size`.
    pub null_flag_offset: usize,
}

/// The planner's frozen output: the authoritative on-disk layout for a table.
///
/// Once computed, a `RecordLayout` never changes for the lifetime of the
/// table's data file (§4.1: "the record layout... is frozen").
#[derive(Debug, Clone)]
pub struct RecordLayout {
    pub database: String,
    pub table: String,
    pub columns: Vec<ColumnLayout>,
    pub record_size: usize,
    pub id_column_index: usize,
    pub table_hash: [u8; 4],
}

impl RecordLayout {
    /// Computes the layout for `schema`, injecting an id column at position 0
    /// when absent (§4.1).
    pub fn plan(schema: Schema) -> Result<Self> {
        if schema.columns.is_empty() {
            return Err(StoreError::invalid_schema("schema must declare at least one column"));
        }

        let mut seen = HashSet::with_capacity(schema.columns.len());
        for col in &schema.columns {
            col.validate()?;
            if !seen.insert(col.name.clone()) {
                return Err(StoreError::invalid_schema(format!(
                    "column name `{}` is declared more than once",
                    col.name
                )));
            }
        }

        let mut columns = schema.columns;
        let id_column_index = match columns.iter().position(|c| c.name == ID_COLUMN_NAME) {
            Some(pos) => {
                if columns[pos].column_type != ColumnType::UniqueIdentifier {
                    return Err(StoreError::invalid_column_type(format!(
                        "column `{ID_COLUMN_NAME}` must be of type UniqueIdentifier, found {:?}",
                        columns[pos].column_type
                    )));
                }
                pos
            }
            None => {
                columns.insert(0, ColumnDef::new(ID_COLUMN_NAME, ColumnType::UniqueIdentifier));
                0
            }
        };

        let table_hash = table_hash(&schema.database, &schema.table)?;

        let mut layout_columns = Vec::with_capacity(columns.len());
        let mut cursor = 1usize; // byte 0 is the row status flag
        for def in columns {
            let size = def.column_type.payload_size(def.length)?;
            let offset = cursor;
            let null_flag_offset = offset + size;
            cursor = null_flag_offset + 1;
            layout_columns.push(ColumnLayout {
                def,
                offset,
                size,
                null_flag_offset,
            });
        }

        Ok(RecordLayout {
            database: schema.database,
            table: schema.table,
            columns: layout_columns,
            record_size: cursor,
            id_column_index,
            table_hash,
        })
    }

    pub fn id_column(&self) -> &ColumnLayout {
        &self.columns[self.id_column_index]
    }

    pub fn id_generator(&self) -> IdGenerator {
        IdGenerator::from_hash(self.table_hash)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnLayout> {
        self.columns.iter().find(|c| c.def.name == name)
    }

    /// Reconstructs the plain [`Schema`] this layout was planned from, for
    /// re-serializing the sidecar after a fresh load.
    pub fn to_schema(&self) -> Schema {
        Schema {
            database: self.database.clone(),
            table: self.table.clone(),
            columns: self.columns.iter().map(|c| c.def.clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnType;

    #[test]
    fn injects_id_column_when_absent() {
        let schema = Schema::new(
            "db",
            "users",
            vec![ColumnDef::new("name", ColumnType::Text).with_length(16)],
        );
        let layout = RecordLayout::plan(schema).unwrap();
        assert_eq!(layout.id_column_index, 0);
        assert_eq!(layout.columns[0].def.name, "id");
        // status byte + (12 id payload + 1 null flag) + (2+4*16 text payload + 1 null flag)
        assert_eq!(layout.record_size, 1 + 13 + (2 + 64 + 1));
    }

    #[test]
    fn text_column_without_length_plans_at_default_32() {
        let schema = Schema::new("db", "users", vec![ColumnDef::new("name", ColumnType::Text)]);
        let layout = RecordLayout::plan(schema).unwrap();
        let name_col = layout.column("name").unwrap();
        // 2-byte length prefix + 4*32 payload bytes.
        assert_eq!(name_col.size, 2 + 4 * 32);
    }

    #[test]
    fn rejects_empty_schema() {
        let schema = Schema::new("db", "users", vec![]);
        assert!(RecordLayout::plan(schema).is_err());
    }

    #[test]
    fn rejects_duplicate_column_names() {
        let schema = Schema::new(
            "db",
            "users",
            vec![
                ColumnDef::new("name", ColumnType::Text).with_length(8),
                ColumnDef::new("name", ColumnType::Number),
            ],
        );
        assert!(RecordLayout::plan(schema).is_err());
    }

    #[test]
    fn rejects_buffer_without_length() {
        let schema = Schema::new("db", "t", vec![ColumnDef::new("blob", ColumnType::Buffer)]);
        assert!(RecordLayout::plan(schema).is_err());
    }

    #[test]
    fn keeps_user_supplied_id_column_in_place() {
        let schema = Schema::new(
            "db",
            "users",
            vec![
                ColumnDef::new("name", ColumnType::Text).with_length(8),
                ColumnDef::new("id", ColumnType::UniqueIdentifier),
            ],
        );
        let layout = RecordLayout::plan(schema).unwrap();
        assert_eq!(layout.id_column_index, 1);
    }
}
