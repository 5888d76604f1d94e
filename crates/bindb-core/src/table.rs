//! Table runtime: schema load, initial scan, CRUD orchestration, stats and
//! lifecycle (§4.8).
//!
//! Concurrency model: the spec assumes a single caller per table and takes
//! no locks internally (§5). Per the "Open question: concurrent access"
//! design note, this implementation resolves that question by wrapping the
//! mutable runtime state (allocator, cache, buffer) in a `parking_lot::Mutex`
//! so `Table` is safely `Send + Sync` for embedding in a multi-threaded host
//! (e.g. the out-of-scope HTTP transport); the *ordering* guarantees of §5
//! still assume one logical writer at a time.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::{FlushEntry, WriteBuffer, WriteBufferConfig};
use crate::cache::ReadCache;
use crate::codec;
use crate::error::{ErrorKind, Result, StoreError};
use crate::fileio::FileIo;
use crate::id::Id;
use crate::schema::{RecordLayout, Schema};
use crate::slot::{ScannedSlot, SlotAllocator};
use crate::value::Row;

/// Snapshot of per-table counters for the out-of-scope `GET /v1/stats` and
/// `GET /v1/count` routes (§14 [ADDED]).
#[derive(Debug, Clone, Copy)]
pub struct TableStats {
    pub row_count: u64,
    pub free_slots: u64,
    pub slot_count: u64,
    pub file_size: u64,
    pub record_size: usize,
    pub cache_len: usize,
    pub pending_writes: usize,
}

struct TableInner {
    allocator: SlotAllocator,
    cache: ReadCache,
    buffer: WriteBuffer,
    closed: bool,
}

/// One table: a fixed-width binary data file plus its in-memory runtime
/// state. Cheap to clone (an `Arc`-backed handle) so the owning [`Database`]
/// and any external caller can share it.
pub struct Table {
    layout: Arc<RecordLayout>,
    fileio: Arc<FileIo>,
    schema_path: PathBuf,
    inner: Mutex<TableInner>,
}

impl Table {
    /// Creates a brand-new table: persists the schema sidecar, creates the
    /// data file if absent, and loads the (necessarily empty, for a fresh
    /// file) layout (§4.8 `init`).
    #[tracing::instrument(skip(schema), fields(table = %schema.table))]
    pub fn create(
        dir: &Path,
        schema: Schema,
        write_buffer_config: WriteBufferConfig,
        cache_capacity: usize,
    ) -> Result<Self> {
        let layout = RecordLayout::plan(schema)?;
        let schema_path = schema_sidecar_path(dir, &layout.table);
        let data_path = data_file_path(dir, &layout.table);

        let schema_json = serde_json::to_vec_pretty(&layout.to_schema())?;
        fs::create_dir_all(dir).map_err(|e| {
            StoreError::new(ErrorKind::FileSystemError, e.to_string()).with_path(dir)
        })?;
        fs::write(&schema_path, schema_json).map_err(|e| {
            StoreError::new(ErrorKind::FileSystemError, e.to_string()).with_path(&schema_path)
        })?;

        let fileio = FileIo::open(&data_path)
            .map_err(|e| e.with_operation("table_create"))?;

        Self::from_layout(layout, fileio, schema_path, write_buffer_config, cache_capacity)
    }

    /// Reopens an existing table by reading its schema sidecar and
    /// re-scanning its data file (§4.8 `load`).
    #[tracing::instrument(fields(table = table_name))]
    pub fn open(
        dir: &Path,
        table_name: &str,
        write_buffer_config: WriteBufferConfig,
        cache_capacity: usize,
    ) -> Result<Self> {
        let schema_path = schema_sidecar_path(dir, table_name);
        let raw = fs::read(&schema_path).map_err(|e| {
            StoreError::new(ErrorKind::FileSystemError, e.to_string()).with_path(&schema_path)
        })?;
        let schema: Schema = serde_json::from_slice(&raw)?;
        let layout = RecordLayout::plan(schema)?;
        let data_path = data_file_path(dir, table_name);
        let fileio = FileIo::open(&data_path)?;
        Self::from_layout(layout, fileio, schema_path, write_buffer_config, cache_capacity)
    }

    fn from_layout(
        layout: RecordLayout,
        fileio: FileIo,
        schema_path: PathBuf,
        write_buffer_config: WriteBufferConfig,
        cache_capacity: usize,
    ) -> Result<Self> {
        let layout = Arc::new(layout);
        let fileio = Arc::new(fileio);

        let allocator = scan(&fileio, &layout)?;
        let cache = ReadCache::new(cache_capacity.max(1));

        let flush_io = fileio.clone();
        let buffer = WriteBuffer::new(
            layout.table.clone(),
            write_buffer_config,
            Box::new(move |entries: Vec<FlushEntry>| {
                let writes = entries.into_iter().map(|e| (e.position, e.bytes)).collect();
                flush_io.write_multiple(writes).map_err(|e| e.with_operation("flush"))
            }),
        );

        Ok(Self {
            layout,
            fileio,
            schema_path,
            inner: Mutex::new(TableInner {
                allocator,
                cache,
                buffer,
                closed: false,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.layout.table
    }

    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    pub fn schema_path(&self) -> &Path {
        &self.schema_path
    }

    fn guard(&self) -> parking_lot::MutexGuard<'_, TableInner> {
        self.inner.lock()
    }

    fn ensure_open(inner: &TableInner) -> Result<()> {
        if inner.closed {
            return Err(StoreError::storage("table is closed").with_operation("table"));
        }
        Ok(())
    }

    /// Resolves `id`, consulting read cache → write buffer → disk in that
    /// order (§5 precedence chain), populating the cache on a buffer or disk
    /// hit.
    #[tracing::instrument(skip(self))]
    pub fn get(&self, id_hex: &str) -> Result<Option<Row>> {
        let _timer = bindb_metrics::op_timer(self.name(), "get");
        let result = (|| {
            let id = Id::from_hex(id_hex)?;
            let mut inner = self.guard();
            Self::ensure_open(&inner)?;
            let Some(slot) = inner.allocator.resolve(&id) else {
                return Ok(None);
            };
            Self::read_slot(&self.fileio, &self.layout, &mut inner, id, slot)
        })();
        self.record_outcome("get", &result);
        result
    }

    fn read_slot(
        fileio: &FileIo,
        layout: &RecordLayout,
        inner: &mut TableInner,
        id: Id,
        slot: u64,
    ) -> Result<Option<Row>> {
        if let Some(row) = inner.cache.get(&id) {
            return Ok(Some(row.clone()));
        }

        if let Some(bytes) = inner.buffer.get(slot).map(|b| b.to_vec()) {
            let row = codec::deserialize(layout, &bytes)?;
            if let Some(row) = &row {
                inner.cache.set(id, row.clone());
            }
            return Ok(row);
        }

        let position = slot * layout.record_size as u64;
        let bytes = fileio.read(layout.record_size, position)?;
        let row = codec::deserialize(layout, &bytes)?;
        if let Some(row) = &row {
            inner.cache.set(id, row.clone());
        }
        Ok(row)
    }

    /// Serializes `row`, allocates a slot and enqueues the write, returning
    /// the merged row (input ⊕ generated fields) (§4.8 `insert`).
    #[tracing::instrument(skip_all)]
    pub fn insert(&self, row: Row) -> Result<Row> {
        let _timer = bindb_metrics::op_timer(self.name(), "insert");
        let result = (|| {
            let mut inner = self.guard();
            Self::ensure_open(&inner)?;

            let (bytes, generated) = codec::serialize_with_generated(&self.layout, &row)?;
            let id = extract_id(&self.layout, &row, &generated)?;
            let slot = inner.allocator.allocate(id);
            tracing::trace!(slot, "allocated slot for insert");
            let position = slot * self.layout.record_size as u64;

            let mut merged = row;
            merged.extend(generated);

            inner.buffer.add(slot, bytes, position)?;
            inner.cache.set(id, merged.clone());
            Ok(merged)
        })();
        self.record_outcome("insert", &result);
        result
    }

    /// Phase 1: serialize every row and allocate its slot. Phase 2: enqueue
    /// all writes, so at most one flush latency is paid per threshold
    /// crossing instead of one per row (§4.8 `bulk_insert`).
    #[tracing::instrument(skip_all, fields(count = rows.len()))]
    pub fn bulk_insert(&self, rows: Vec<Row>) -> Result<Vec<Row>> {
        let _timer = bindb_metrics::op_timer(self.name(), "bulk_insert");
        let result = (|| {
            let mut inner = self.guard();
            Self::ensure_open(&inner)?;

            let mut planned = Vec::with_capacity(rows.len());
            for row in rows {
                let (bytes, generated) = codec::serialize_with_generated(&self.layout, &row)?;
                let id = extract_id(&self.layout, &row, &generated)?;
                let slot = inner.allocator.allocate(id);
                let position = slot * self.layout.record_size as u64;
                let mut merged = row;
                merged.extend(generated);
                planned.push((id, slot, position, bytes, merged));
            }

            let mut results = Vec::with_capacity(planned.len());
            for (id, slot, position, bytes, merged) in planned {
                inner.buffer.add(slot, bytes, position)?;
                inner.cache.set(id, merged.clone());
                results.push(merged);
            }
            Ok(results)
        })();
        self.record_outcome("bulk_insert", &result);
        result
    }

    /// Merges `patch` onto the current row (the id column is preserved
    /// regardless of patch contents, invariant (iv)), invalidates the cache
    /// entry before enqueuing the new bytes (invariant (v)), and returns the
    /// merged row. Returns `None` if `id` does not resolve to a live slot.
    #[tracing::instrument(skip(self, patch))]
    pub fn update(&self, id_hex: &str, patch: Row) -> Result<Option<Row>> {
        let _timer = bindb_metrics::op_timer(self.name(), "update");
        let result = (|| {
            let id = Id::from_hex(id_hex)?;
            let mut inner = self.guard();
            Self::ensure_open(&inner)?;

            let Some(slot) = inner.allocator.resolve(&id) else {
                return Ok(None);
            };

            let Some(mut current) = Self::read_slot(&self.fileio, &self.layout, &mut inner, id, slot)? else {
                return Ok(None);
            };

            let id_column = self.layout.id_column().def.name.clone();
            for (key, value) in patch {
                if key == id_column {
                    continue;
                }
                current.insert(key, value);
            }

            let (bytes, generated) = codec::serialize_with_generated(&self.layout, &current)?;
            current.extend(generated);

            inner.cache.delete(&id);
            let position = slot * self.layout.record_size as u64;
            inner.buffer.add(slot, bytes, position)?;
            inner.cache.set(id, current.clone());

            Ok(Some(current))
        })();
        self.record_outcome("update", &result);
        result
    }

    /// Marks `id`'s slot deleted on disk, releases the slot and invalidates
    /// the cache. Returns `false` if `id` does not resolve.
    #[tracing::instrument(skip(self))]
    pub fn delete(&self, id_hex: &str) -> Result<bool> {
        let _timer = bindb_metrics::op_timer(self.name(), "delete");
        let result = (|| {
            let id = Id::from_hex(id_hex)?;
            let mut inner = self.guard();
            Self::ensure_open(&inner)?;

            let Some(slot) = inner.allocator.resolve(&id) else {
                return Ok(false);
            };

            inner.allocator.deallocate(&id);
            inner.cache.delete(&id);
            let position = slot * self.layout.record_size as u64;
            let tombstone = codec::deleted_record(self.layout.record_size);
            inner.buffer.add(slot, tombstone, position)?;
            Ok(true)
        })();
        self.record_outcome("delete", &result);
        result
    }

    /// Returns every currently-live row (§8 scenario 6's `getAll()`).
    #[tracing::instrument(skip(self))]
    pub fn get_all(&self) -> Result<Vec<Row>> {
        let mut inner = self.guard();
        Self::ensure_open(&inner)?;
        let ids: Vec<Id> = inner.allocator.active_ids().collect();
        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            let slot = inner
                .allocator
                .resolve(&id)
                .expect("id returned by active_ids() must still resolve");
            if let Some(row) = Self::read_slot(&self.fileio, &self.layout, &mut inner, id, slot)? {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    /// Force-flushes the write buffer (§4.8 `flush`).
    #[tracing::instrument(skip(self))]
    pub fn flush(&self) -> Result<()> {
        let _timer = bindb_metrics::op_timer(self.name(), "flush");
        let result = (|| {
            let mut inner = self.guard();
            Self::ensure_open(&inner)?;
            inner.buffer.flush()
        })();
        self.record_outcome("flush", &result);
        result
    }

    /// Records the op counter (and, on failure, the error counter tagged by
    /// [`ErrorKind`]) for one completed operation. `#[tracing::instrument]`
    /// already gives structured logs; this is the corresponding metrics half
    /// of the ambient stack (§2 "Metrics").
    fn record_outcome<T>(&self, op: &'static str, result: &Result<T>) {
        match result {
            Ok(_) => bindb_metrics::record_op(self.name(), op),
            Err(e) => bindb_metrics::record_op_error(self.name(), op, &e.kind.to_string()),
        }
    }

    /// Flushes, clears the read cache, and marks the table closed. Further
    /// operations return `STORAGE_ERROR` (§4.8 `close`).
    #[tracing::instrument(skip(self))]
    pub fn close(&self) -> Result<()> {
        let mut inner = self.guard();
        inner.buffer.flush()?;
        inner.cache.clear();
        inner.closed = true;
        Ok(())
    }

    pub fn stats(&self) -> Result<TableStats> {
        let inner = self.guard();
        Ok(TableStats {
            row_count: inner.allocator.active_count(),
            free_slots: inner.allocator.free_count(),
            slot_count: inner.allocator.slot_count(),
            file_size: self.fileio.len()?,
            record_size: self.layout.record_size,
            cache_len: inner.cache.len(),
            pending_writes: inner.buffer.pending_count(),
        })
    }

    pub fn count(&self) -> u64 {
        self.guard().allocator.active_count()
    }
}

fn schema_sidecar_path(dir: &Path, table: &str) -> PathBuf {
    dir.join(format!("{table}.schema.json"))
}

fn data_file_path(dir: &Path, table: &str) -> PathBuf {
    dir.join(format!("{table}.data"))
}

/// Reopens the data file and rebuilds the id↔slot map by reading only the
/// status byte and id field of each slot — never the whole row (§4.8 `load`).
fn scan(fileio: &FileIo, layout: &RecordLayout) -> Result<SlotAllocator> {
    let record_size = layout.record_size as u64;
    let file_len = fileio.truncate_to_record_multiple(record_size)?;
    let n_slots = if record_size == 0 { 0 } else { file_len / record_size };

    let id_column = layout.id_column();
    let prefix_len = id_column.null_flag_offset + 1;

    let mut scanned = Vec::with_capacity(n_slots as usize);
    for slot in 0..n_slots {
        let base = slot * record_size;
        let prefix = fileio.read(prefix_len, base)?;
        match prefix[0] {
            0xFF => scanned.push(ScannedSlot::Tombstone),
            0x00 => {
                if prefix[id_column.null_flag_offset] == 0x01 {
                    return Err(StoreError::deserialization(format!(
                        "slot {slot} is active but its id column is null"
                    )));
                }
                let mut raw = [0u8; 12];
                raw.copy_from_slice(&prefix[id_column.offset..id_column.offset + id_column.size]);
                scanned.push(ScannedSlot::Active(Id::from_bytes(raw)));
            }
            other => {
                return Err(StoreError::deserialization(format!(
                    "slot {slot} has a corrupted status byte 0x{other:02x}"
                )))
            }
        }
    }

    Ok(SlotAllocator::load(scanned))
}

fn extract_id(layout: &RecordLayout, row: &Row, generated: &Row) -> Result<Id> {
    let id_name = &layout.id_column().def.name;
    let value = generated
        .get(id_name)
        .or_else(|| row.get(id_name))
        .ok_or_else(|| StoreError::internal("id column missing after serialization"))?;
    let hex = value
        .as_text()
        .ok_or_else(|| StoreError::internal("id value is not a hex string"))?;
    Id::from_hex(hex)
}
