//! Filesystem calls answered from caches and the remote store
//!
//! Every call is a short-lived operation against the shared caches. A cache
//! miss suspends the call on a single remote request; nothing else awaits.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use common::remote::{RemoteError, RemoteStore};

use super::attributes::{FileAttributes, Owner};
use super::cache::{AttributeCache, DirectoryCache};
use super::chunk_store::ChunkStore;
use super::config::VfsConfig;
use super::error::FsError;
use super::handles::HandleTable;

pub const ROOT: &str = "/";

pub struct FilesystemProjection {
    remote: Arc<dyn RemoteStore>,
    attributes: AttributeCache,
    directories: DirectoryCache,
    chunks: ChunkStore,
    handles: HandleTable,
    owner: Owner,
}

impl FilesystemProjection {
    /// Build a projection with fresh caches sized from `config`
    pub fn new(remote: Arc<dyn RemoteStore>, config: &VfsConfig) -> Result<Self, FsError> {
        let chunks = ChunkStore::new(remote.clone(), config).map_err(|e| {
            tracing::error!("failed to prepare chunk store in {:?}: {}", config.chunk_dir, e);
            FsError::Io(config.chunk_dir.display().to_string())
        })?;

        Ok(Self::from_parts(
            remote,
            AttributeCache::new(config.attribute_ttl),
            DirectoryCache::new(config.directory_ttl),
            chunks,
        ))
    }

    pub fn from_parts(
        remote: Arc<dyn RemoteStore>,
        attributes: AttributeCache,
        directories: DirectoryCache,
        chunks: ChunkStore,
    ) -> Self {
        Self {
            remote,
            attributes,
            directories,
            chunks,
            handles: HandleTable::new(),
            owner: Owner::current(),
        }
    }

    pub fn attributes(&self) -> &AttributeCache {
        &self.attributes
    }

    pub fn directories(&self) -> &DirectoryCache {
        &self.directories
    }

    pub fn chunks(&self) -> &ChunkStore {
        &self.chunks
    }

    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    /// Entries whose final component starts with a dot are never shown
    fn is_hidden(path: &str) -> bool {
        path.rsplit('/')
            .next()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
    }

    /// Compose the path of `name` inside `dir`
    pub fn child_path(dir: &str, name: &str) -> String {
        if dir == ROOT {
            format!("/{}", name)
        } else {
            format!("{}/{}", dir.trim_end_matches('/'), name)
        }
    }

    fn map_metadata_error(path: &str, err: RemoteError) -> FsError {
        if err.is_not_found() {
            tracing::debug!("{} not found remotely", path);
            FsError::NotFound(path.to_string())
        } else {
            tracing::warn!("metadata fetch for {} failed: {}", path, err);
            FsError::Io(path.to_string())
        }
    }

    /// Attributes of `path`, from cache or the remote
    pub async fn getattr(&self, path: &str) -> Result<FileAttributes, FsError> {
        if Self::is_hidden(path) {
            return Err(FsError::NotFound(path.to_string()));
        }

        if path == ROOT {
            let root = FileAttributes::root(self.owner);
            self.attributes.put(ROOT, root.clone());
            return Ok(root);
        }

        if let Some(attrs) = self.attributes.get(path) {
            return Ok(attrs);
        }

        let metadata = self
            .remote
            .fetch_metadata(path)
            .await
            .map_err(|e| Self::map_metadata_error(path, e))?;
        let attrs = FileAttributes::from_metadata(&metadata, self.owner);
        self.attributes.put(path, attrs.clone());

        Ok(attrs)
    }

    /// Child names of the directory at `path`.
    ///
    /// A remote listing also caches the attributes of every child.
    pub async fn readdir(&self, path: &str) -> Result<Vec<String>, FsError> {
        if let Some(names) = self.directories.get(path) {
            tracing::trace!("listing of {} served from cache", path);
            return Ok(names);
        }

        let entries = self.remote.list_children(path).await.map_err(|e| {
            tracing::warn!("listing {} failed: {}", path, e);
            FsError::NotFound(path.to_string())
        })?;

        let mut names = Vec::with_capacity(entries.len());
        for entry in entries {
            let child = Self::child_path(path, &entry.name);
            let attrs = FileAttributes::from_metadata(&entry.metadata, self.owner);
            self.attributes.put(&child, attrs);
            names.push(entry.name);
        }

        tracing::debug!("listed {} ({} entries)", path, names.len());
        self.directories.put(path, names.clone());
        Ok(names)
    }

    /// Open a regular file for reading
    pub async fn open(&self, path: &str) -> Result<u64, FsError> {
        let attrs = self.getattr(path).await?;
        if attrs.is_directory {
            return Err(FsError::NotFound(path.to_string()));
        }

        let fh = self.handles.allocate(path);
        tracing::debug!("opened {} as handle {}", path, fh);
        Ok(fh)
    }

    /// Read up to `size` bytes at `offset` through handle `fh`.
    ///
    /// An unknown handle falls back to `fallback_path`. The result is short
    /// when the file ends inside the requested window.
    ///
    /// Chunks cached under an older modification time than the current
    /// attributes are fetched again. When the attributes cannot be
    /// refreshed, cached chunks are served as they are and the window is
    /// bounded by the data itself.
    pub async fn read(
        &self,
        fh: u64,
        offset: u64,
        size: u32,
        fallback_path: Option<&str>,
    ) -> Result<Bytes, FsError> {
        let path = match (self.handles.get(fh), fallback_path) {
            (Some(path), _) => path,
            (None, Some(path)) => {
                tracing::debug!("unknown handle {}, reading {} directly", fh, path);
                path.to_string()
            }
            (None, None) => return Err(FsError::NotFound(format!("handle {}", fh))),
        };

        let attrs = match self.getattr(&path).await {
            Ok(attrs) => Some(attrs),
            Err(FsError::Io(_)) => {
                tracing::warn!("attributes of {} unavailable, reading cached chunks", path);
                None
            }
            Err(e) => return Err(e),
        };

        let mut end = offset.saturating_add(size as u64);
        if let Some(attrs) = &attrs {
            if attrs.is_directory {
                return Err(FsError::NotFound(path));
            }
            end = end.min(attrs.size_bytes);
        }
        if offset >= end {
            return Ok(Bytes::new());
        }

        let modified_at = attrs.map(|a| a.modified_at);
        self.read_range(&path, offset, end, modified_at).await
    }

    /// Assemble bytes `[offset, end)` from the chunks covering them.
    ///
    /// Without a known modification time the window may run past end of
    /// file, so a failed fetch after some data was read ends the read.
    async fn read_range(
        &self,
        path: &str,
        offset: u64,
        end: u64,
        modified_at: Option<i64>,
    ) -> Result<Bytes, FsError> {
        let chunk_size = self.chunks.chunk_size();
        let mut result = BytesMut::with_capacity((end - offset) as usize);
        let mut cursor = offset;

        while cursor < end {
            let index = cursor / chunk_size;
            let fetched = match modified_at {
                Some(modified_at) => self.chunks.get_chunk_at(path, index, modified_at).await,
                None => self.chunks.get_chunk(path, index).await,
            };
            let chunk = match fetched {
                Ok(chunk) => chunk,
                Err(e) if modified_at.is_none() && !result.is_empty() => {
                    tracing::debug!("short read of {} at chunk {}: {}", path, index, e);
                    break;
                }
                Err(e) => {
                    tracing::error!("reading chunk {} of {} failed: {}", index, path, e);
                    return Err(FsError::Io(path.to_string()));
                }
            };

            let local = (cursor - index * chunk_size) as usize;
            let needed = (end - cursor) as usize;
            let stop = chunk.len().min(local.saturating_add(needed));
            if local >= stop {
                tracing::debug!("short read of {} at offset {}", path, cursor);
                break;
            }

            result.extend_from_slice(&chunk[local..stop]);
            cursor += (stop - local) as u64;
        }

        Ok(result.freeze())
    }

    /// Forget handle `fh`
    pub fn release(&self, fh: u64) {
        if let Some(path) = self.handles.release(fh) {
            tracing::debug!("released handle {} ({})", fh, path);
        }
    }

    // The projection is read-only: write-family calls never reach the remote.

    /// Accepts and discards the data
    pub fn write(&self, fh: u64, offset: u64, data: &[u8]) -> Result<usize, FsError> {
        tracing::debug!(
            "discarding write of {} bytes at {} on handle {}",
            data.len(),
            offset,
            fh
        );
        Ok(data.len())
    }

    pub fn flush(&self, _fh: u64) -> Result<(), FsError> {
        Ok(())
    }

    /// Hands out a handle whose writes are discarded; nothing is created
    pub fn create(&self, path: &str) -> Result<u64, FsError> {
        let fh = self.handles.allocate(path);
        tracing::debug!("ignoring create of {} (handle {})", path, fh);
        Ok(fh)
    }

    pub fn mkdir(&self, path: &str) -> Result<(), FsError> {
        tracing::debug!("ignoring mkdir of {}", path);
        Ok(())
    }

    pub fn unlink(&self, path: &str) -> Result<(), FsError> {
        Err(FsError::NotFound(path.to_string()))
    }

    pub fn rmdir(&self, _path: &str) -> Result<(), FsError> {
        Ok(())
    }

    pub fn rename(&self, _from: &str, _to: &str) -> Result<(), FsError> {
        Ok(())
    }

    pub fn truncate(&self, _path: &str, _size: u64) -> Result<(), FsError> {
        Ok(())
    }
}
