//! On-demand chunk fetching with a bounded on-disk cache
//!
//! A remote file is addressed as a sequence of fixed-size chunks whose
//! boundaries are global to the file. A chunk is fetched with one range
//! request the first time it is needed, written to the chunk directory,
//! and served from disk afterwards.
//!
//! The index of materialized chunks is a moka cache weighted by chunk
//! length, so the directory never holds more than `max_cache_bytes`.
//! Evicted chunks have their files removed by the eviction listener.
//! Each index entry also records the remote modification time its chunk
//! was fetched under, so no per-file state outlives the chunks themselves.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use common::remote::{RemoteError, RemoteStore};
use http::StatusCode;
use moka::notification::RemovalCause;
use moka::sync::Cache;
use sha2::{Digest, Sha256};

use super::config::VfsConfig;

const CHUNK_MARKER: &str = ".chunk_";

#[derive(Debug, thiserror::Error)]
pub enum ChunkError {
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),
    #[error("range request for chunk {index} of {path} returned {status}")]
    UnexpectedStatus {
        path: String,
        index: u64,
        status: StatusCode,
    },
    #[error("chunk cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid chunk size {0} (expected 1 to {} bytes)", VfsConfig::MAX_CHUNK_SIZE)]
    InvalidChunkSize(u64),
}

/// Identity of one chunk: the full remote path and the chunk index
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    pub path: String,
    pub index: u64,
}

impl ChunkKey {
    pub fn new(path: &str, index: u64) -> Self {
        Self {
            path: path.to_string(),
            index,
        }
    }

    /// Local file name, derived from a hash of the full path so that
    /// files sharing a basename in different directories never collide
    pub fn file_name(&self) -> String {
        let digest = Sha256::digest(self.path.as_bytes());
        format!("{}{}{}", hex::encode(digest), CHUNK_MARKER, self.index)
    }
}

/// Index value of one materialized chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ChunkEntry {
    len: u64,
    /// Remote modification time the chunk was fetched under, if known
    modified_at: Option<i64>,
}

impl ChunkEntry {
    fn is_current(&self, modified_at: Option<i64>) -> bool {
        modified_at.is_none() || self.modified_at == modified_at
    }
}

pub struct ChunkStore {
    remote: Arc<dyn RemoteStore>,
    chunk_size: u64,
    dir: PathBuf,
    index: Cache<ChunkKey, ChunkEntry>,
}

impl ChunkStore {
    /// Create the store, preparing the chunk directory.
    ///
    /// Chunk files left behind by an earlier process are removed, since
    /// nothing records which remote version they came from.
    pub fn new(remote: Arc<dyn RemoteStore>, config: &VfsConfig) -> Result<Self, ChunkError> {
        if config.chunk_size == 0 || config.chunk_size > VfsConfig::MAX_CHUNK_SIZE {
            return Err(ChunkError::InvalidChunkSize(config.chunk_size));
        }

        let dir = config.chunk_dir.clone();
        std::fs::create_dir_all(&dir)?;
        let purged = Self::purge_dir(&dir)?;
        if purged > 0 {
            tracing::info!("removed {} stale chunk files from {:?}", purged, dir);
        }

        let listener_dir = dir.clone();
        let mut builder = Cache::builder()
            .max_capacity(config.max_cache_bytes)
            // Chunks never exceed the validated chunk size, so the weight fits
            .weigher(|_key: &ChunkKey, entry: &ChunkEntry| -> u32 {
                u32::try_from(entry.len).unwrap_or(u32::MAX)
            })
            .eviction_listener(move |key: Arc<ChunkKey>, _entry: ChunkEntry, cause: RemovalCause| {
                // A replaced entry still owns its (rewritten) file
                if matches!(cause, RemovalCause::Replaced) {
                    return;
                }
                let file = listener_dir.join(key.file_name());
                match std::fs::remove_file(&file) {
                    Ok(()) => tracing::trace!(
                        "evicted chunk {} of {} ({:?})",
                        key.index,
                        key.path,
                        cause
                    ),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => tracing::warn!("failed to remove chunk file {:?}: {}", file, e),
                }
            });
        if let Some(ttl) = config.chunk_ttl {
            builder = builder.time_to_live(ttl);
        }

        Ok(Self {
            remote,
            chunk_size: config.chunk_size,
            dir,
            index: builder.build(),
        })
    }

    fn purge_dir(dir: &Path) -> Result<usize, std::io::Error> {
        let mut purged = 0;
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let is_chunk = entry
                .file_name()
                .to_str()
                .map(|name| name.contains(CHUNK_MARKER))
                .unwrap_or(false);
            if is_chunk && entry.file_type()?.is_file() {
                std::fs::remove_file(entry.path())?;
                purged += 1;
            }
        }
        Ok(purged)
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn chunk_path(&self, key: &ChunkKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    /// Get chunk `index` of the file at `path`, whatever version it was
    /// cached under.
    ///
    /// Returns `chunk_size` bytes, fewer only for the last chunk of a file.
    pub async fn get_chunk(&self, path: &str, index: u64) -> Result<Bytes, ChunkError> {
        self.load(path, index, None).await
    }

    /// Get chunk `index` of the file at `path` as of remote modification
    /// time `modified_at`.
    ///
    /// Cached chunks of `path` fetched under a different time are dropped
    /// and the chunk is fetched again.
    pub async fn get_chunk_at(
        &self,
        path: &str,
        index: u64,
        modified_at: i64,
    ) -> Result<Bytes, ChunkError> {
        self.load(path, index, Some(modified_at)).await
    }

    async fn load(
        &self,
        path: &str,
        index: u64,
        modified_at: Option<i64>,
    ) -> Result<Bytes, ChunkError> {
        let key = ChunkKey::new(path, index);
        let file = self.chunk_path(&key);

        let cached = match self.index.get(&key) {
            Some(entry) if entry.is_current(modified_at) => true,
            Some(entry) => {
                tracing::info!(
                    "{} changed remotely ({:?} -> {:?}), dropping cached chunks",
                    path,
                    entry.modified_at,
                    modified_at
                );
                self.drop_stale(path, modified_at);
                false
            }
            None => false,
        };

        if cached {
            match tokio::fs::read(&file).await {
                Ok(data) => {
                    tracing::trace!("chunk {} of {} served from disk", index, path);
                    return Ok(Bytes::from(data));
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::warn!("chunk file for {} #{} vanished, refetching", path, index);
                    self.index.invalidate(&key);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let start = index * self.chunk_size;
        let end = start.saturating_add(self.chunk_size - 1);
        tracing::debug!("fetching chunk {} of {}: bytes={}-{}", index, path, start, end);

        let response = self.remote.fetch_range(path, start, end).await?;
        if !response.is_partial_content() {
            tracing::error!(
                "range request for chunk {} of {} returned {}",
                index,
                path,
                response.status
            );
            return Err(ChunkError::UnexpectedStatus {
                path: path.to_string(),
                index,
                status: response.status,
            });
        }

        let mut data = response.data;
        if data.len() as u64 > self.chunk_size {
            data.truncate(self.chunk_size as usize);
        }

        tokio::fs::write(&file, &data).await?;
        self.index.insert(
            key,
            ChunkEntry {
                len: data.len() as u64,
                modified_at,
            },
        );
        tracing::debug!("stored chunk {} of {} ({} bytes)", index, path, data.len());

        Ok(data)
    }

    /// Drop every cached chunk of `path`
    pub fn invalidate(&self, path: &str) {
        self.invalidate_where(path, |_| true);
    }

    fn drop_stale(&self, path: &str, modified_at: Option<i64>) {
        self.invalidate_where(path, |entry| !entry.is_current(modified_at));
    }

    fn invalidate_where(&self, path: &str, pred: impl Fn(&ChunkEntry) -> bool) {
        let keys: Vec<Arc<ChunkKey>> = self
            .index
            .iter()
            .filter(|(key, entry)| key.path == path && pred(entry))
            .map(|(key, _)| key)
            .collect();
        for key in keys {
            self.index.invalidate(key.as_ref());
        }
    }

    /// Drop a single cached chunk
    pub fn remove_chunk(&self, path: &str, index: u64) {
        self.index.invalidate(&ChunkKey::new(path, index));
    }

    pub fn is_cached(&self, path: &str, index: u64) -> bool {
        self.index.contains_key(&ChunkKey::new(path, index))
    }

    /// Bytes currently accounted to cached chunks
    pub fn cached_bytes(&self) -> u64 {
        self.index.run_pending_tasks();
        self.index.weighted_size()
    }

    pub fn cached_chunks(&self) -> u64 {
        self.index.run_pending_tasks();
        self.index.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::testkit::{patterned_bytes, MemoryStore};
    use tempfile::TempDir;

    fn setup(chunk_size: u64, max_cache_bytes: u64) -> (Arc<MemoryStore>, ChunkStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let remote = Arc::new(MemoryStore::new());
        let config = VfsConfig {
            chunk_size,
            max_cache_bytes,
            chunk_ttl: None,
            chunk_dir: temp.path().join("chunks"),
            ..VfsConfig::default()
        };
        let store = ChunkStore::new(remote.clone(), &config).unwrap();
        (remote, store, temp)
    }

    fn chunk_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_key_uses_full_path() {
        let a = ChunkKey::new("/one/photo.jpg", 0).file_name();
        let b = ChunkKey::new("/two/photo.jpg", 0).file_name();
        assert_ne!(a, b);
        assert!(a.ends_with(".chunk_0"));
        assert_ne!(a, ChunkKey::new("/one/photo.jpg", 1).file_name());
    }

    #[tokio::test]
    async fn test_second_get_is_local() {
        let (remote, store, _temp) = setup(1024, 1 << 20);
        let data = patterned_bytes(2500);
        remote.add_file("/file.bin", data.clone());

        let first = store.get_chunk("/file.bin", 1).await.unwrap();
        let second = store.get_chunk("/file.bin", 1).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(&first[..], &data[1024..2048]);
        assert_eq!(remote.range_calls(), 1);
    }

    #[tokio::test]
    async fn test_last_chunk_is_short() {
        let (remote, store, _temp) = setup(1024, 1 << 20);
        let data = patterned_bytes(2500);
        remote.add_file("/file.bin", data.clone());

        let last = store.get_chunk("/file.bin", 2).await.unwrap();
        assert_eq!(last.len(), 2500 - 2048);
        assert_eq!(&last[..], &data[2048..]);
    }

    #[tokio::test]
    async fn test_non_partial_status_is_an_error() {
        let (remote, store, _temp) = setup(1024, 1 << 20);
        remote.add_file("/file.bin", patterned_bytes(10));
        remote.set_range_status(Some(StatusCode::OK));

        let err = store.get_chunk("/file.bin", 0).await.unwrap_err();
        assert!(matches!(
            err,
            ChunkError::UnexpectedStatus {
                status: StatusCode::OK,
                ..
            }
        ));
        assert!(!store.is_cached("/file.bin", 0));
    }

    #[tokio::test]
    async fn test_same_basename_does_not_alias() {
        let (remote, store, _temp) = setup(1024, 1 << 20);
        remote.add_file("/a/data.txt", b"first".to_vec());
        remote.add_file("/b/data.txt", b"second".to_vec());

        let a = store.get_chunk("/a/data.txt", 0).await.unwrap();
        let b = store.get_chunk("/b/data.txt", 0).await.unwrap();
        assert_eq!(&a[..], b"first");
        assert_eq!(&b[..], b"second");
    }

    #[tokio::test]
    async fn test_vanished_file_is_refetched() {
        let (remote, store, _temp) = setup(1024, 1 << 20);
        remote.add_file("/file.bin", patterned_bytes(100));

        store.get_chunk("/file.bin", 0).await.unwrap();
        let file = store.dir().join(ChunkKey::new("/file.bin", 0).file_name());
        std::fs::remove_file(file).unwrap();

        let again = store.get_chunk("/file.bin", 0).await.unwrap();
        assert_eq!(&again[..], &patterned_bytes(100)[..]);
        assert_eq!(remote.range_calls(), 2);
    }

    #[tokio::test]
    async fn test_changed_modification_time_drops_chunks() {
        let (remote, store, _temp) = setup(4, 1 << 20);
        remote.add_file_at("/file.bin", b"aaaabbbb".to_vec(), 100);

        store.get_chunk_at("/file.bin", 0, 100).await.unwrap();
        store.get_chunk_at("/file.bin", 1, 100).await.unwrap();

        // Same version is served locally
        let same = store.get_chunk_at("/file.bin", 0, 100).await.unwrap();
        assert_eq!(&same[..], b"aaaa");
        assert_eq!(remote.range_calls(), 2);

        // Unversioned reads accept whatever is cached
        let any = store.get_chunk("/file.bin", 1).await.unwrap();
        assert_eq!(&any[..], b"bbbb");

        remote.add_file_at("/file.bin", b"ccccdddd".to_vec(), 200);
        let fresh = store.get_chunk_at("/file.bin", 1, 200).await.unwrap();
        assert_eq!(&fresh[..], b"dddd");
        assert_eq!(remote.range_calls(), 3);

        // Every chunk of the old version went with it
        assert!(!store.is_cached("/file.bin", 0));
        assert!(store.is_cached("/file.bin", 1));
        assert_eq!(store.cached_chunks(), 1);
    }

    #[test]
    fn test_chunk_size_is_validated() {
        let temp = TempDir::new().unwrap();
        for chunk_size in [0, VfsConfig::MAX_CHUNK_SIZE + 1] {
            let config = VfsConfig {
                chunk_size,
                chunk_dir: temp.path().join("chunks"),
                ..VfsConfig::default()
            };
            let result = ChunkStore::new(Arc::new(MemoryStore::new()), &config);
            assert!(matches!(result, Err(ChunkError::InvalidChunkSize(size)) if size == chunk_size));
        }
    }

    #[tokio::test]
    async fn test_cache_is_bounded() {
        let (remote, store, _temp) = setup(1024, 2048);
        remote.add_file("/big.bin", patterned_bytes(8 * 1024));

        for index in 0..8 {
            let chunk = store.get_chunk("/big.bin", index).await.unwrap();
            assert_eq!(chunk.len(), 1024);
        }

        assert!(store.cached_bytes() <= 2048);
        assert!(chunk_files(store.dir()) <= 2);
    }

    #[tokio::test]
    async fn test_stale_files_purged_on_startup() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("chunks");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(ChunkKey::new("/old", 0).file_name()), b"old").unwrap();
        std::fs::write(dir.join("keep.txt"), b"unrelated").unwrap();

        let config = VfsConfig {
            chunk_dir: dir.clone(),
            ..VfsConfig::default()
        };
        let _store = ChunkStore::new(Arc::new(MemoryStore::new()), &config).unwrap();

        assert_eq!(chunk_files(&dir), 1);
        assert!(dir.join("keep.txt").exists());
    }
}
