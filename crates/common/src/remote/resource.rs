//! Wire types of the disk REST API

use chrono::DateTime;
use serde::Deserialize;

use super::{RemoteEntry, RemoteMetadata};

const DIR_TYPE: &str = "dir";

/// A file or directory as described by the `resources` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct Resource {
    pub name: String,
    #[serde(default)]
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub modified: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub md5: Option<String>,
    /// Present on directories when the listing was requested
    #[serde(default, rename = "_embedded")]
    pub embedded: Option<Embedded>,
}

/// One page of a directory listing.
#[derive(Debug, Clone, Deserialize)]
pub struct Embedded {
    #[serde(default)]
    pub items: Vec<Resource>,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub total: u64,
}

/// Response of `resources/download`.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadLink {
    #[serde(default)]
    pub href: Option<String>,
}

/// Error document returned with non-success statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl std::fmt::Display for ApiErrorBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({})",
            self.message.as_deref().unwrap_or("no message"),
            self.error.as_deref().unwrap_or("unknown error")
        )?;
        if let Some(description) = &self.description {
            write!(f, ": {}", description)?;
        }
        Ok(())
    }
}

/// Parse an RFC 3339 timestamp into Unix seconds, 0 when absent or malformed.
fn unix_seconds(timestamp: Option<&str>) -> i64 {
    timestamp
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.timestamp())
        .unwrap_or(0)
}

impl Resource {
    pub fn is_dir(&self) -> bool {
        self.kind == DIR_TYPE
    }

    pub fn to_metadata(&self) -> RemoteMetadata {
        let is_directory = self.is_dir();
        RemoteMetadata {
            name: self.name.clone(),
            is_directory,
            size: if is_directory { 0 } else { self.size.unwrap_or(0) },
            created_at: unix_seconds(self.created.as_deref()),
            modified_at: unix_seconds(self.modified.as_deref()),
        }
    }

    pub fn to_entry(&self) -> RemoteEntry {
        RemoteEntry {
            name: self.name.clone(),
            metadata: self.to_metadata(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"{
        "name": "photos",
        "path": "disk:/photos",
        "type": "dir",
        "created": "2023-01-02T03:04:05+00:00",
        "modified": "2023-01-02T03:04:05+00:00",
        "_embedded": {
            "items": [
                {
                    "name": "mountains.jpg",
                    "path": "disk:/photos/mountains.jpg",
                    "type": "file",
                    "created": "2023-01-02T03:04:05Z",
                    "modified": "2023-02-01T00:00:00+03:00",
                    "size": 2500,
                    "mime_type": "image/jpeg"
                },
                {
                    "name": "raw",
                    "path": "disk:/photos/raw",
                    "type": "dir",
                    "created": "2023-01-02T03:04:05+00:00",
                    "modified": "2023-01-02T03:04:05+00:00"
                }
            ],
            "limit": 100,
            "offset": 0,
            "total": 2
        }
    }"#;

    #[test]
    fn test_parse_listing() {
        let resource: Resource = serde_json::from_str(LISTING).unwrap();
        assert!(resource.is_dir());

        let embedded = resource.embedded.unwrap();
        assert_eq!(embedded.total, 2);
        assert_eq!(embedded.items.len(), 2);

        let file = embedded.items[0].to_entry();
        assert_eq!(file.name, "mountains.jpg");
        assert!(!file.metadata.is_directory);
        assert_eq!(file.metadata.size, 2500);
        assert_eq!(file.metadata.created_at, 1672628645);
        // +03:00 offset is normalized to UTC
        assert_eq!(file.metadata.modified_at, 1675198800);

        let dir = embedded.items[1].to_metadata();
        assert!(dir.is_directory);
        assert_eq!(dir.size, 0);
    }

    #[test]
    fn test_missing_timestamps_default_to_epoch() {
        let resource: Resource =
            serde_json::from_str(r#"{"name": "a.txt", "type": "file", "modified": "garbage"}"#)
                .unwrap();
        let metadata = resource.to_metadata();
        assert_eq!(metadata.created_at, 0);
        assert_eq!(metadata.modified_at, 0);
        assert_eq!(metadata.size, 0);
    }

    #[test]
    fn test_error_body_display() {
        let body: ApiErrorBody = serde_json::from_str(
            r#"{"message": "Resource not found.", "description": "Resource not found.", "error": "DiskNotFoundError"}"#,
        )
        .unwrap();
        assert_eq!(
            body.to_string(),
            "Resource not found. (DiskNotFoundError): Resource not found."
        );
    }
}
