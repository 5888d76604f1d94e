//! Per-file positional read/write handles and the sorted-coalesced
//! `write_multiple` contract (§4.7).
//!
//! Grounded on the teacher's [`MessageLog`] positional I/O (`read_exact_at` /
//! `write_all_at` via [`std::os::unix::fs::FileExt`]). No fsync guarantee is
//! made here; crash consistency is not promised (§4.7, §5).

use std::fs::{self, File};
use std::path::{Path, PathBuf};

#[cfg(target_family = "unix")]
use std::os::unix::fs::FileExt;
#[cfg(target_family = "windows")]
use std::os::windows::fs::FileExt;

use crate::error::{Result, StoreError};

/// Holds one read and one write handle for a single data file, opened
/// lazily by [`FileIo::open`].
pub struct FileIo {
    path: PathBuf,
    read_handle: File,
    write_handle: File,
}

impl FileIo {
    /// Opens `path`, creating an empty file if it does not yet exist
    /// (`Table::init`, §4.8).
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .open(path)?;

        let read_handle = fs::OpenOptions::new().read(true).open(path)?;
        let write_handle = fs::OpenOptions::new().write(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            read_handle,
            write_handle,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file size in bytes.
    pub fn len(&self) -> Result<u64> {
        Ok(self.read_handle.metadata()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Reads exactly `size` bytes starting at `position`.
    pub fn read(&self, size: usize, position: u64) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; size];
        self.read_at(&mut buf, position)?;
        Ok(buf)
    }

    fn read_at(&self, buf: &mut [u8], position: u64) -> Result<()> {
        #[cfg(target_family = "unix")]
        {
            self.read_handle.read_exact_at(buf, position).map_err(|e| {
                StoreError::storage(format!("read at offset {position} failed: {e}")).with_path(&self.path)
            })
        }
        #[cfg(target_family = "windows")]
        {
            let mut read_total = 0;
            while read_total < buf.len() {
                let n = self
                    .read_handle
                    .seek_read(&mut buf[read_total..], position + read_total as u64)
                    .map_err(|e| StoreError::storage(format!("read at offset {position} failed: {e}")).with_path(&self.path))?;
                if n == 0 {
                    return Err(StoreError::storage("unexpected EOF during positional read").with_path(&self.path));
                }
                read_total += n;
            }
            Ok(())
        }
    }

    /// Writes `bytes` at `position`, extending the file if necessary.
    pub fn write(&self, bytes: &[u8], position: u64) -> Result<()> {
        #[cfg(target_family = "unix")]
        {
            self.write_handle.write_all_at(bytes, position).map_err(|e| {
                StoreError::storage(format!("write at offset {position} failed: {e}")).with_path(&self.path)
            })
        }
        #[cfg(target_family = "windows")]
        {
            let mut written = 0;
            while written < bytes.len() {
                let n = self
                    .write_handle
                    .seek_write(&bytes[written..], position + written as u64)
                    .map_err(|e| StoreError::storage(format!("write at offset {position} failed: {e}")).with_path(&self.path))?;
                written += n;
            }
            Ok(())
        }
    }

    /// Writes multiple `(position, bytes)` entries, sorting by ascending
    /// position and coalescing adjacent runs into a single `write` call
    /// (§4.7). Used by the write buffer's flush callback.
    #[tracing::instrument(skip_all, fields(entries = entries.len()))]
    pub fn write_multiple(&self, mut entries: Vec<(u64, Vec<u8>)>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        entries.sort_by_key(|(position, _)| *position);

        let mut i = 0;
        while i < entries.len() {
            let run_start = entries[i].0;
            let mut run_bytes = std::mem::take(&mut entries[i].1);
            let mut j = i + 1;
            while j < entries.len() {
                let prev_end = entries[j - 1].0 + entries[j - 1].1.len() as u64;
                if prev_end == entries[j].0 {
                    run_bytes.extend_from_slice(&entries[j].1);
                    j += 1;
                } else {
                    break;
                }
            }
            self.write(&run_bytes, run_start)?;
            i = j;
        }
        Ok(())
    }

    /// Truncates a trailing partial record, per the "Open question: crash
    /// consistency" design note — the data file size is always expected to
    /// be a multiple of `record_size` (§3 invariant ii); a crash mid-write
    /// can leave a short tail that `load()` must not try to parse.
    pub fn truncate_to_record_multiple(&self, record_size: u64) -> Result<u64> {
        if record_size == 0 {
            return Ok(0);
        }
        let len = self.len()?;
        let whole = (len / record_size) * record_size;
        if whole != len {
            tracing::warn!(
                path = %self.path.display(),
                file_len = len,
                truncated_to = whole,
                "truncating partial tail record"
            );
            self.write_handle.set_len(whole)?;
        }
        Ok(whole)
    }
}
