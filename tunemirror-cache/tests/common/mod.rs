#![allow(dead_code)]

//! Shared fixtures for cache integration tests
use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;
use tunemirror_cache::LocalCache;

pub const INSTANCE: &str = "test-instance";

/// Temporary cache directory holding one on-disk cache
pub struct CacheHarness {
    _dir: TempDir,
    pub root: Utf8PathBuf,
    pub cache: LocalCache,
}

impl CacheHarness {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let cache = LocalCache::open(&root, INSTANCE).unwrap();
        Self {
            _dir: dir,
            root,
            cache,
        }
    }

    pub fn file(&self) -> Utf8PathBuf {
        self.root.join(format!("{INSTANCE}.db"))
    }

    /// Close the cache and hand back the directory so the file can be tampered with
    pub fn into_dir(self) -> (TempDir, Utf8PathBuf) {
        drop(self.cache);
        (self._dir, self.root)
    }
}

pub fn db_file(root: &Utf8Path) -> Utf8PathBuf {
    root.join(format!("{INSTANCE}.db"))
}
