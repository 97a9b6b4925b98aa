//! Remote storage capability
//!
//! The projection never speaks HTTP itself. Everything it needs from the
//! remote account is expressed by [`RemoteStore`]: object metadata, directory
//! listings, and byte-range downloads.

mod client;
mod error;
mod resource;

use bytes::Bytes;
use http::StatusCode;

pub use client::DiskClient;
pub use error::RemoteError;
pub use resource::{ApiErrorBody, DownloadLink, Embedded, Resource};

/// Metadata of a single remote object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteMetadata {
    pub name: String,
    pub is_directory: bool,
    /// Size in bytes, 0 for directories
    pub size: u64,
    /// Unix seconds
    pub created_at: i64,
    /// Unix seconds
    pub modified_at: i64,
}

/// One child returned by a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub metadata: RemoteMetadata,
}

/// Raw outcome of a range download.
///
/// The status is passed through untouched; callers decide which
/// statuses count as success.
#[derive(Debug, Clone)]
pub struct RangeResponse {
    pub status: StatusCode,
    pub data: Bytes,
}

impl RangeResponse {
    pub fn is_partial_content(&self) -> bool {
        self.status == StatusCode::PARTIAL_CONTENT
    }
}

/// Access to a remote object-storage account.
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch metadata for the object at `path`.
    async fn fetch_metadata(&self, path: &str) -> Result<RemoteMetadata, RemoteError>;

    /// List the children of the directory at `path`, in remote order.
    async fn list_children(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError>;

    /// Download bytes `start..=end` of the object at `path`.
    async fn fetch_range(&self, path: &str, start: u64, end: u64)
        -> Result<RangeResponse, RemoteError>;
}
