/// In-memory remote store for exercising the read path
///
/// `MemoryStore` keeps a tree of files and directories keyed by absolute
/// path, counts every call made against it, and can be told to fail.
///
/// # Example
///
/// ```rust,ignore
/// use common::testkit::MemoryStore;
///
/// let store = MemoryStore::new();
/// store.add_file("/docs/readme.txt", b"hello".to_vec());
///
/// let meta = store.fetch_metadata("/docs/readme.txt").await?;
/// assert_eq!(meta.size, 5);
/// assert_eq!(store.metadata_calls(), 1);
/// ```
mod memory;

pub use memory::{patterned_bytes, MemoryStore, DEFAULT_MODIFIED_AT};
