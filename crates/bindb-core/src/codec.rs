//! Row serialization / deserialization against a [`RecordLayout`] (§4.2).

use std::time::{SystemTime, UNIX_EPOCH};

use crate::column::ColumnType;
use crate::error::{Result, StoreError};
use crate::id::Id;
use crate::schema::{ColumnLayout, RecordLayout};
use crate::value::{Row, Value};

const STATUS_ACTIVE: u8 = 0x00;
const STATUS_DELETED: u8 = 0xFF;

fn now_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as f64)
        .unwrap_or(0.0)
}

/// Serializes `row` against `layout`, discarding generated values. Prefer
/// [`serialize_with_generated`] when the caller needs to merge server-side
/// defaults (id, `UpdatedAt`) back into the returned row.
pub fn serialize(layout: &RecordLayout, row: &Row) -> Result<Vec<u8>> {
    Ok(serialize_with_generated(layout, row)?.0)
}

/// Serializes `row` against `layout`, returning the encoded bytes alongside
/// the subset of columns whose value was generated by the store rather than
/// supplied by the caller (§4.2).
pub fn serialize_with_generated(layout: &RecordLayout, row: &Row) -> Result<(Vec<u8>, Row)> {
    let mut buf = vec![0u8; layout.record_size];
    buf[0] = STATUS_ACTIVE;
    let mut generated = Row::new();

    for (i, col) in layout.columns.iter().enumerate() {
        let supplied = row.get(&col.def.name);
        let is_id = i == layout.id_column_index;
        let is_updated_at = col.def.column_type == ColumnType::UpdatedAt;

        let effective = if is_updated_at {
            let now = Value::Date(now_ms());
            generated.insert(col.def.name.clone(), now.clone());
            Some(now)
        } else if is_id {
            match supplied {
                Some(v) if !v.is_null() => Some(v.clone()),
                _ => {
                    let id = layout.id_generator().next();
                    let value = Value::Id(id.to_hex());
                    generated.insert(col.def.name.clone(), value.clone());
                    Some(value)
                }
            }
        } else {
            supplied.cloned()
        };

        match effective {
            None | Some(Value::Null) => {
                buf[col.null_flag_offset] = 0x01;
            }
            Some(value) => {
                buf[col.null_flag_offset] = 0x00;
                encode_value(col, &value, &mut buf)?;
            }
        }
    }

    Ok((buf, generated))
}

fn encode_value(col: &ColumnLayout, value: &Value, buf: &mut [u8]) -> Result<()> {
    let offset = col.offset;
    match col.def.column_type {
        ColumnType::UniqueIdentifier => {
            let text = value
                .as_text()
                .ok_or_else(|| type_mismatch(col, "UniqueIdentifier"))?;
            let id = Id::from_hex(text)?;
            buf[offset..offset + col.size].copy_from_slice(id.as_bytes());
        }
        ColumnType::Text => {
            let s = value.as_text().ok_or_else(|| type_mismatch(col, "Text"))?;
            let max_bytes = col.size - 2;
            let truncated = truncate_to_byte_limit(s, max_bytes);
            let len = truncated.len() as u16;
            buf[offset..offset + 2].copy_from_slice(&len.to_be_bytes());
            buf[offset + 2..offset + 2 + truncated.len()].copy_from_slice(truncated.as_bytes());
        }
        ColumnType::Number | ColumnType::Date | ColumnType::UpdatedAt => {
            let n = value.as_number().ok_or_else(|| type_mismatch(col, "Number"))?;
            buf[offset..offset + 8].copy_from_slice(&n.to_be_bytes());
        }
        ColumnType::Boolean => {
            let b = value.as_bool().ok_or_else(|| type_mismatch(col, "Boolean"))?;
            buf[offset] = b as u8;
        }
        ColumnType::Coordinates => {
            let (lat, lng) = value.as_coordinates().ok_or_else(|| type_mismatch(col, "Coordinates"))?;
            buf[offset..offset + 8].copy_from_slice(&lat.to_be_bytes());
            buf[offset + 8..offset + 16].copy_from_slice(&lng.to_be_bytes());
        }
        ColumnType::Buffer => {
            let bytes = value.as_buffer().ok_or_else(|| type_mismatch(col, "Buffer"))?;
            let capacity = col.size - 1;
            if bytes.len() > capacity {
                return Err(StoreError::invalid_buffer_size(format!(
                    "column `{}` accepts at most {} bytes, got {}",
                    col.def.name,
                    capacity,
                    bytes.len()
                ))
                .with_field(col.def.name.clone()));
            }
            buf[offset..offset + bytes.len()].copy_from_slice(bytes);
        }
    }
    Ok(())
}

fn type_mismatch(col: &ColumnLayout, expected: &str) -> StoreError {
    StoreError::validation(format!(
        "column `{}` expects a {expected} value",
        col.def.name
    ))
    .with_field(col.def.name.clone())
}

/// Truncates `s` to the longest character-boundary-respecting prefix whose
/// UTF-8 byte length is at most `max_bytes` (§4.2 text truncation policy).
fn truncate_to_byte_limit(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Deserializes a record-sized byte buffer. Returns `Ok(None)` for a
/// tombstoned (deleted) row, per §4.2.
pub fn deserialize(layout: &RecordLayout, bytes: &[u8]) -> Result<Option<Row>> {
    if bytes.len() != layout.record_size {
        return Err(StoreError::deserialization(format!(
            "expected a {}-byte record, got {}",
            layout.record_size,
            bytes.len()
        )));
    }

    match bytes[0] {
        STATUS_DELETED => return Ok(None),
        STATUS_ACTIVE => {}
        other => {
            return Err(StoreError::deserialization(format!(
                "corrupted row status byte 0x{other:02x}"
            )))
        }
    }

    let mut row = Row::new();
    for col in &layout.columns {
        let null_flag = bytes[col.null_flag_offset];
        let value = match null_flag {
            0x01 => Value::Null,
            0x00 => decode_value(col, bytes)?,
            other => {
                return Err(StoreError::deserialization(format!(
                    "corrupted null flag 0x{other:02x} for column `{}`",
                    col.def.name
                )))
            }
        };
        row.insert(col.def.name.clone(), value);
    }
    Ok(Some(row))
}

fn decode_value(col: &ColumnLayout, bytes: &[u8]) -> Result<Value> {
    let offset = col.offset;
    Ok(match col.def.column_type {
        ColumnType::UniqueIdentifier => {
            let mut raw = [0u8; 12];
            raw.copy_from_slice(&bytes[offset..offset + col.size]);
            Value::Id(Id::from_bytes(raw).to_hex())
        }
        ColumnType::Text => {
            let len = u16::from_be_bytes([bytes[offset], bytes[offset + 1]]) as usize;
            let start = offset + 2;
            let text = std::str::from_utf8(&bytes[start..start + len])
                .map_err(|e| StoreError::deserialization(format!("invalid UTF-8 in text column: {e}")))?;
            Value::Text(text.to_owned())
        }
        ColumnType::Number | ColumnType::Date | ColumnType::UpdatedAt => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[offset..offset + 8]);
            let n = f64::from_be_bytes(raw);
            if matches!(col.def.column_type, ColumnType::Number) {
                Value::Number(n)
            } else {
                Value::Date(n)
            }
        }
        ColumnType::Boolean => Value::Boolean(bytes[offset] != 0),
        ColumnType::Coordinates => {
            let mut lat_raw = [0u8; 8];
            let mut lng_raw = [0u8; 8];
            lat_raw.copy_from_slice(&bytes[offset..offset + 8]);
            lng_raw.copy_from_slice(&bytes[offset + 8..offset + 16]);
            Value::Coordinates {
                lat: f64::from_be_bytes(lat_raw),
                lng: f64::from_be_bytes(lng_raw),
            }
        }
        ColumnType::Buffer => {
            let capacity = col.size - 1;
            Value::Buffer(bytes[offset..offset + capacity].to_vec())
        }
    })
}

/// Builds a record-sized deleted (tombstone) marker.
pub fn deleted_record(record_size: usize) -> Vec<u8> {
    let mut buf = vec![0u8; record_size];
    buf[0] = STATUS_DELETED;
    buf
}
