//! The closed column-type variant set and its on-disk payload sizing (§3, §4.1).

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, Result, StoreError};

/// Default declared character length for `Text` columns that omit `length`.
pub const DEFAULT_TEXT_LENGTH: u32 = 32;

/// One of the column types the store knows how to encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum ColumnType {
    UniqueIdentifier,
    Text,
    Number,
    Boolean,
    Date,
    UpdatedAt,
    Buffer,
    Coordinates,
}

impl ColumnType {
    /// Whether this type requires a declared `length` in the schema sidecar.
    /// `Text` is exempt: it falls back to [`DEFAULT_TEXT_LENGTH`] when the
    /// schema omits `length` (§4.1); only `Buffer` has no usable default.
    pub fn requires_length(self) -> bool {
        matches!(self, ColumnType::Buffer)
    }

    /// The on-disk payload size in bytes, given the column's declared length
    /// (only meaningful for `Text`/`Buffer`; ignored otherwise).
    pub fn payload_size(self, declared_length: Option<u32>) -> Result<usize> {
        Ok(match self {
            ColumnType::UniqueIdentifier => 12,
            ColumnType::Number | ColumnType::Date | ColumnType::UpdatedAt => 8,
            ColumnType::Boolean => 1,
            ColumnType::Coordinates => 16,
            ColumnType::Text => {
                let len = declared_length.unwrap_or(DEFAULT_TEXT_LENGTH);
                2 + 4 * len as usize
            }
            ColumnType::Buffer => {
                let len = declared_length.ok_or_else(|| {
                    StoreError::new(
                        ErrorKind::InvalidSchema,
                        "Buffer column requires a positive declared length",
                    )
                })?;
                len as usize
            }
        })
    }
}

/// One column in a schema, as it appears in the JSON sidecar (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            length: None,
        }
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// The declared character/byte length for `Text`/`Buffer` columns,
    /// `Text` defaulting to [`DEFAULT_TEXT_LENGTH`] when unset.
    pub fn declared_length(&self) -> u32 {
        self.length.unwrap_or(DEFAULT_TEXT_LENGTH)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(StoreError::invalid_schema("column name must not be empty"));
        }
        if self.column_type.requires_length() {
            match self.length {
                Some(l) if l > 0 => {}
                _ => {
                    return Err(StoreError::invalid_schema(format!(
                        "column `{}` of type {:?} requires a positive `length`",
                        self.name, self.column_type
                    )))
                }
            }
        }
        Ok(())
    }
}
