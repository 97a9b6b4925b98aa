//! Shared setup for projection integration tests
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use common::testkit::MemoryStore;
use diskfs_daemon::vfs::{FilesystemProjection, VfsConfig};
use tempfile::TempDir;

pub const TTL: Duration = Duration::from_secs(60);

pub fn config(chunk_size: u64, chunk_dir: &TempDir) -> VfsConfig {
    VfsConfig {
        chunk_size,
        attribute_ttl: TTL,
        directory_ttl: TTL,
        chunk_ttl: None,
        max_cache_bytes: 64 * 1024 * 1024,
        chunk_dir: chunk_dir.path().join("chunks"),
    }
}

/// A projection over an empty in-memory remote
pub fn setup(chunk_size: u64) -> (Arc<MemoryStore>, FilesystemProjection, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new());
    let projection = FilesystemProjection::new(store.clone(), &config(chunk_size, &temp_dir)).unwrap();
    (store, projection, temp_dir)
}
