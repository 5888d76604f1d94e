//! 12-byte surrogate id generator (§3, §4.3).
//!
//! Layout: `[0..4)` table hash, `[4..10)` big-endian milliseconds since epoch,
//! `[10..12)` big-endian monotonic counter modulo 65536. The counter is
//! process-global, replacing the spec's unsynchronized global with an atomic
//! (Design Note "Global mutable id counter"): correctness still assumes a
//! single process.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::Shake256;

use crate::error::{Result, StoreError};

/// Shared across every table in the process, matching §3's "shared across
/// tables" invariant for the counter.
static GLOBAL_COUNTER: AtomicU32 = AtomicU32::new(0);

/// The raw 12-byte id representation.
pub const ID_BYTES: usize = 12;

/// Computes the 4-byte table hash (`SHAKE256(database_name || table_name)`)
/// used as the first 4 bytes of every id minted for this table.
pub fn table_hash(database: &str, table: &str) -> Result<[u8; 4]> {
    if database.is_empty() || table.is_empty() {
        return Err(StoreError::validation(
            "binding an id generator requires a non-empty database and table name",
        ));
    }
    let mut hasher = Shake256::default();
    hasher.update(database.as_bytes());
    hasher.update(table.as_bytes());
    let mut reader = hasher.finalize_xof();
    let mut out = [0u8; 4];
    reader.read(&mut out);
    Ok(out)
}

/// Generates ids bound to a single table's hash.
#[derive(Debug, Clone, Copy)]
pub struct IdGenerator {
    table_hash: [u8; 4],
}

impl IdGenerator {
    pub fn new(database: &str, table: &str) -> Result<Self> {
        Ok(Self {
            table_hash: table_hash(database, table)?,
        })
    }

    pub fn from_hash(table_hash: [u8; 4]) -> Self {
        Self { table_hash }
    }

    /// Mints a new id: table hash + current wall-clock millis + the next
    /// counter tick.
    pub fn next(&self) -> Id {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
            & 0xFFFF_FFFF_FFFF;
        let counter = GLOBAL_COUNTER.fetch_add(1, Ordering::Relaxed) as u16;

        let mut bytes = [0u8; ID_BYTES];
        bytes[0..4].copy_from_slice(&self.table_hash);
        bytes[4..10].copy_from_slice(&now_ms.to_be_bytes()[2..8]);
        bytes[10..12].copy_from_slice(&counter.to_be_bytes());
        Id(bytes)
    }
}

/// A 12-byte surrogate primary key, hex-encoded at every external boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id([u8; ID_BYTES]);

impl Id {
    pub fn from_bytes(bytes: [u8; ID_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ID_BYTES] {
        &self.0
    }

    pub fn to_hex(self) -> String {
        let mut s = String::with_capacity(ID_BYTES * 2);
        for b in self.0 {
            s.push_str(&format!("{b:02x}"));
        }
        s
    }

    /// Parses a 24-character lowercase (or mixed-case) hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        if s.len() != ID_BYTES * 2 {
            return Err(StoreError::invalid_id_format(format!(
                "id must be {} hex characters, got {}",
                ID_BYTES * 2,
                s.len()
            )));
        }
        let mut bytes = [0u8; ID_BYTES];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hi = hex_nibble(chunk[0])?;
            let lo = hex_nibble(chunk[1])?;
            bytes[i] = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }
}

fn hex_nibble(c: u8) -> Result<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(StoreError::invalid_id_format(format!("invalid hex character `{}`", c as char))),
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let gen = IdGenerator::new("db", "users").unwrap();
        let id = gen.next();
        let hex = id.to_hex();
        assert_eq!(hex.len(), 24);
        let parsed = Id::from_hex(&hex).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn ids_are_distinct_within_a_millisecond() {
        let gen = IdGenerator::new("db", "users").unwrap();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            let id = gen.next();
            assert!(seen.insert(id), "duplicate id generated");
        }
    }

    #[test]
    fn rejects_empty_names() {
        assert!(IdGenerator::new("", "users").is_err());
        assert!(IdGenerator::new("db", "").is_err());
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!(Id::from_hex("not-hex").is_err());
        assert!(Id::from_hex("abcd").is_err());
    }
}
