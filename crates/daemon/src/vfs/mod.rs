//! Read path of the filesystem projection
//!
//! Turns a whole-object, paginated remote storage API into random-access
//! filesystem calls. Attribute and directory lookups are answered from
//! time-bounded caches; file content is assembled from fixed-size chunks
//! fetched with range requests and kept in a bounded on-disk cache.

mod attributes;
mod cache;
mod chunk_store;
mod config;
mod error;
mod handles;
mod projection;

pub use attributes::{FileAttributes, Owner};
pub use cache::{AttributeCache, DirectoryCache};
pub use chunk_store::{ChunkError, ChunkKey, ChunkStore};
pub use config::VfsConfig;
pub use error::FsError;
pub use handles::HandleTable;
pub use projection::{FilesystemProjection, ROOT};
