//! Write-behind buffer: coalesces pending writes keyed by slot, auto-flushing
//! on a record-count or byte-size threshold (§4.6).
//!
//! The flush callback is supplied at construction time rather than the
//! buffer holding a back-reference to its owning table (Design Note
//! "Circular references between table and cache/buffer").

use std::collections::BTreeMap;

use crate::error::Result;

/// Default thresholds (§4.6).
pub const DEFAULT_MAX_RECORDS: usize = 10_000;
pub const DEFAULT_MAX_BYTES: usize = 50 * 1024 * 1024;

/// Thresholds that trigger a synchronous auto-flush.
#[derive(Debug, Clone, Copy)]
pub struct WriteBufferConfig {
    pub max_records: usize,
    pub max_bytes: usize,
}

impl Default for WriteBufferConfig {
    fn default() -> Self {
        Self {
            max_records: DEFAULT_MAX_RECORDS,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

/// One pending write, snapshotted for the flush callback.
#[derive(Debug, Clone)]
pub struct FlushEntry {
    pub slot: u64,
    pub bytes: Vec<u8>,
    pub position: u64,
}

/// Invoked with a snapshot of pending writes when the buffer flushes. Owned
/// by the buffer, supplied by the table at construction.
pub type FlushCallback = Box<dyn FnMut(Vec<FlushEntry>) -> Result<()> + Send>;

/// Coalesces writes to the same slot (last-writer-wins) until a threshold is
/// crossed or `flush` is called explicitly.
pub struct WriteBuffer {
    table: String,
    entries: BTreeMap<u64, (Vec<u8>, u64)>,
    byte_size: usize,
    flush_in_progress: bool,
    config: WriteBufferConfig,
    on_flush: FlushCallback,
}

impl WriteBuffer {
    pub fn new(table: impl Into<String>, config: WriteBufferConfig, on_flush: FlushCallback) -> Self {
        Self {
            table: table.into(),
            entries: BTreeMap::new(),
            byte_size: 0,
            flush_in_progress: false,
            config,
            on_flush,
        }
    }

    /// Enqueues `bytes` for `slot` at `position`, overwriting any existing
    /// pending entry for that slot. Triggers a synchronous flush if either
    /// threshold is crossed.
    pub fn add(&mut self, slot: u64, bytes: Vec<u8>, position: u64) -> Result<()> {
        let new_len = bytes.len();
        match self.entries.insert(slot, (bytes, position)) {
            Some((old_bytes, _)) => {
                self.byte_size = self.byte_size - old_bytes.len() + new_len;
            }
            None => {
                self.byte_size += new_len;
            }
        }

        if self.entries.len() >= self.config.max_records {
            tracing::debug!(records = self.entries.len(), "write buffer threshold crossed, auto-flushing");
            bindb_metrics::record_auto_flush(&self.table, "records");
            self.flush()?;
        } else if self.byte_size >= self.config.max_bytes {
            tracing::debug!(bytes = self.byte_size, "write buffer threshold crossed, auto-flushing");
            bindb_metrics::record_auto_flush(&self.table, "bytes");
            self.flush()?;
        }
        Ok(())
    }

    /// Read-through for a pending write, for the table's `cache → buffer →
    /// disk` precedence chain.
    pub fn get(&self, slot: u64) -> Option<&[u8]> {
        self.entries.get(&slot).map(|(bytes, _)| bytes.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.entries.len()
    }

    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    /// Flushes pending writes through the callback. A no-op if already
    /// flushing (the guard) or empty.
    pub fn flush(&mut self) -> Result<()> {
        if self.flush_in_progress || self.entries.is_empty() {
            return Ok(());
        }
        self.flush_in_progress = true;

        let snapshot: Vec<FlushEntry> = std::mem::take(&mut self.entries)
            .into_iter()
            .map(|(slot, (bytes, position))| FlushEntry { slot, bytes, position })
            .collect();
        self.byte_size = 0;

        let result = (self.on_flush)(snapshot);
        self.flush_in_progress = false;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn buffer_with_sink(config: WriteBufferConfig) -> (WriteBuffer, Arc<Mutex<Vec<FlushEntry>>>) {
        let flushed = Arc::new(Mutex::new(Vec::new()));
        let sink = flushed.clone();
        let buffer = WriteBuffer::new(
            "t",
            config,
            Box::new(move |entries| {
                sink.lock().unwrap().extend(entries);
                Ok(())
            }),
        );
        (buffer, flushed)
    }

    #[test]
    fn overwriting_same_slot_collapses_to_one_entry() {
        let (mut buf, flushed) = buffer_with_sink(WriteBufferConfig {
            max_records: 100,
            max_bytes: 1_000_000,
        });
        buf.add(0, vec![1, 2, 3], 0).unwrap();
        buf.add(0, vec![4, 5, 6], 0).unwrap();
        assert_eq!(buf.pending_count(), 1);
        assert_eq!(buf.get(0), Some([4, 5, 6].as_slice()));
        buf.flush().unwrap();
        let flushed = flushed.lock().unwrap();
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].bytes, vec![4, 5, 6]);
    }

    #[test]
    fn auto_flushes_on_record_threshold() {
        let (mut buf, flushed) = buffer_with_sink(WriteBufferConfig {
            max_records: 2,
            max_bytes: 1_000_000,
        });
        buf.add(0, vec![1], 0).unwrap();
        assert!(flushed.lock().unwrap().is_empty());
        buf.add(1, vec![2], 1).unwrap();
        assert_eq!(flushed.lock().unwrap().len(), 2);
        assert!(buf.is_empty());
    }

    #[test]
    fn auto_flushes_on_byte_threshold() {
        let (mut buf, flushed) = buffer_with_sink(WriteBufferConfig {
            max_records: 1_000_000,
            max_bytes: 4,
        });
        buf.add(0, vec![1, 2, 3, 4, 5], 0).unwrap();
        assert_eq!(flushed.lock().unwrap().len(), 1);
    }

    #[test]
    fn flush_on_empty_buffer_is_noop() {
        let (mut buf, flushed) = buffer_with_sink(WriteBufferConfig::default());
        buf.flush().unwrap();
        assert!(flushed.lock().unwrap().is_empty());
    }
}
