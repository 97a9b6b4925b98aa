use std::path::PathBuf;
use std::time::Duration;

/// Tuning knobs for the projection caches
#[derive(Debug, Clone)]
pub struct VfsConfig {
    /// Size of one chunk, the unit of range-fetching (default: 1 MiB)
    pub chunk_size: u64,
    /// How long resolved attributes stay valid (default: 30 min)
    pub attribute_ttl: Duration,
    /// How long a directory listing stays valid (default: 30 min)
    pub directory_ttl: Duration,
    /// Idle-independent lifetime of a cached chunk, `None` keeps chunks until evicted
    pub chunk_ttl: Option<Duration>,
    /// Upper bound on bytes held in the chunk directory (default: 1 GiB)
    pub max_cache_bytes: u64,
    /// Directory holding chunk files
    pub chunk_dir: PathBuf,
}

impl VfsConfig {
    pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;
    /// Largest chunk the size-weighted index can account for exactly
    pub const MAX_CHUNK_SIZE: u64 = u32::MAX as u64;
    pub const DEFAULT_TTL: Duration = Duration::from_secs(1800);
    pub const DEFAULT_MAX_CACHE_BYTES: u64 = 1024 * 1024 * 1024;

    /// Default location of the chunk directory
    pub fn default_chunk_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("diskfs")
            .join("chunks")
    }
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
            attribute_ttl: Self::DEFAULT_TTL,
            directory_ttl: Self::DEFAULT_TTL,
            chunk_ttl: Some(Self::DEFAULT_TTL),
            max_cache_bytes: Self::DEFAULT_MAX_CACHE_BYTES,
            chunk_dir: Self::default_chunk_dir(),
        }
    }
}
