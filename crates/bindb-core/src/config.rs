//! Storage configuration: base directory resolution and write-buffer
//! thresholds (ambient stack, grounded on the teacher's per-OS path
//! resolution in `crates/core/src/config.rs`).

use std::env;
use std::path::PathBuf;

use crate::buffer::WriteBufferConfig;
use crate::cache::DEFAULT_CACHE_CAPACITY;

/// Environment variable selecting the base storage directory (§6).
pub const STORAGE_PATH_ENV: &str = "BINDB_STORAGE_PATH";

/// Top-level storage configuration: where databases live on disk and the
/// write-buffer thresholds new tables are opened with.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub base_dir: PathBuf,
    pub write_buffer: WriteBufferConfig,
    pub cache_capacity: usize,
}

impl StorageConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            write_buffer: WriteBufferConfig::default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }

    /// Reads [`STORAGE_PATH_ENV`], falling back to `<os temp dir>/bindb`
    /// (mirroring the teacher's `stdb_path_temp()` fallback pattern).
    pub fn from_env() -> Self {
        let base_dir = env::var_os(STORAGE_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_temp_path);
        Self::new(base_dir)
    }

    pub fn default_temp_path() -> PathBuf {
        env::temp_dir().join("bindb")
    }

    pub fn with_write_buffer(mut self, config: WriteBufferConfig) -> Self {
        self.write_buffer = config;
        self
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_temp_dir_when_env_unset() {
        env::remove_var(STORAGE_PATH_ENV);
        let config = StorageConfig::from_env();
        assert_eq!(config.base_dir, StorageConfig::default_temp_path());
    }
}
