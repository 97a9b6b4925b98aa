use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use bytes::Bytes;
use http::StatusCode;
use parking_lot::{Mutex, RwLock};

use crate::remote::{RangeResponse, RemoteEntry, RemoteError, RemoteMetadata, RemoteStore};

/// Modification time given to entries added without an explicit one
pub const DEFAULT_MODIFIED_AT: i64 = 1_700_000_000;

#[derive(Debug, Clone)]
enum Node {
    Dir { modified_at: i64 },
    File { data: Bytes, modified_at: i64 },
}

impl Node {
    fn metadata(&self, name: &str) -> RemoteMetadata {
        match self {
            Node::Dir { modified_at } => RemoteMetadata {
                name: name.to_string(),
                is_directory: true,
                size: 0,
                created_at: *modified_at,
                modified_at: *modified_at,
            },
            Node::File { data, modified_at } => RemoteMetadata {
                name: name.to_string(),
                is_directory: false,
                size: data.len() as u64,
                created_at: *modified_at,
                modified_at: *modified_at,
            },
        }
    }
}

fn parent_of(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) | None => "/",
        Some((parent, _)) => parent,
    }
}

fn name_of(path: &str) -> &str {
    path.rsplit_once('/').map(|(_, name)| name).unwrap_or(path)
}

/// Bytes `0, 1, .. 250, 0, 1, ..` of the given length; distinct enough
/// that misplaced slices show up in comparisons.
pub fn patterned_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

/// Remote store backed by a map of absolute paths.
#[derive(Debug)]
pub struct MemoryStore {
    nodes: RwLock<BTreeMap<String, Node>>,
    metadata_calls: AtomicUsize,
    list_calls: AtomicUsize,
    range_calls: AtomicUsize,
    failing: AtomicBool,
    range_status: Mutex<Option<StatusCode>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a store holding only the root directory
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "/".to_string(),
            Node::Dir {
                modified_at: DEFAULT_MODIFIED_AT,
            },
        );
        Self {
            nodes: RwLock::new(nodes),
            metadata_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            range_calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            range_status: Mutex::new(None),
        }
    }

    /// Add a directory, creating missing ancestors
    pub fn add_dir(&self, path: &str) {
        let mut nodes = self.nodes.write();
        Self::insert_with_parents(
            &mut nodes,
            path,
            Node::Dir {
                modified_at: DEFAULT_MODIFIED_AT,
            },
        );
    }

    /// Add (or replace) a file, creating missing ancestors
    pub fn add_file(&self, path: &str, data: impl Into<Bytes>) {
        self.add_file_at(path, data, DEFAULT_MODIFIED_AT);
    }

    /// Add (or replace) a file with an explicit modification time
    pub fn add_file_at(&self, path: &str, data: impl Into<Bytes>, modified_at: i64) {
        let mut nodes = self.nodes.write();
        Self::insert_with_parents(
            &mut nodes,
            path,
            Node::File {
                data: data.into(),
                modified_at,
            },
        );
    }

    fn insert_with_parents(nodes: &mut BTreeMap<String, Node>, path: &str, node: Node) {
        let mut parent = parent_of(path);
        while parent != "/" && !nodes.contains_key(parent) {
            nodes.insert(
                parent.to_string(),
                Node::Dir {
                    modified_at: DEFAULT_MODIFIED_AT,
                },
            );
            parent = parent_of(parent);
        }
        nodes.insert(path.to_string(), node);
    }

    /// Make every subsequent call fail with a server error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Force range downloads to answer with the given status
    pub fn set_range_status(&self, status: Option<StatusCode>) {
        *self.range_status.lock() = status;
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn range_calls(&self) -> usize {
        self.range_calls.load(Ordering::SeqCst)
    }

    /// Total number of remote calls of any kind
    pub fn total_calls(&self) -> usize {
        self.metadata_calls() + self.list_calls() + self.range_calls()
    }

    fn check_failing(&self) -> Result<(), RemoteError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RemoteError::HttpStatus(
                StatusCode::INTERNAL_SERVER_ERROR,
                "injected failure".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RemoteStore for MemoryStore {
    async fn fetch_metadata(&self, path: &str) -> Result<RemoteMetadata, RemoteError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failing()?;

        let nodes = self.nodes.read();
        nodes
            .get(path)
            .map(|node| node.metadata(name_of(path)))
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))
    }

    async fn list_children(&self, path: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failing()?;

        let nodes = self.nodes.read();
        match nodes.get(path) {
            Some(Node::Dir { .. }) => {}
            Some(Node::File { .. }) => return Err(RemoteError::NotADirectory(path.to_string())),
            None => return Err(RemoteError::NotFound(path.to_string())),
        }

        Ok(nodes
            .iter()
            .filter(|(child, _)| child.as_str() != "/" && parent_of(child) == path)
            .map(|(child, node)| {
                let name = name_of(child);
                RemoteEntry {
                    name: name.to_string(),
                    metadata: node.metadata(name),
                }
            })
            .collect())
    }

    async fn fetch_range(
        &self,
        path: &str,
        start: u64,
        end: u64,
    ) -> Result<RangeResponse, RemoteError> {
        self.range_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failing()?;

        if let Some(status) = *self.range_status.lock() {
            return Ok(RangeResponse {
                status,
                data: Bytes::new(),
            });
        }

        let nodes = self.nodes.read();
        let data = match nodes.get(path) {
            Some(Node::File { data, .. }) => data.clone(),
            Some(Node::Dir { .. }) => {
                return Err(RemoteError::HttpStatus(
                    StatusCode::BAD_REQUEST,
                    format!("{} is a directory", path),
                ))
            }
            None => return Err(RemoteError::NotFound(path.to_string())),
        };

        let len = data.len() as u64;
        if start >= len || end < start {
            return Ok(RangeResponse {
                status: StatusCode::RANGE_NOT_SATISFIABLE,
                data: Bytes::new(),
            });
        }
        let stop = end.min(len - 1) + 1;

        Ok(RangeResponse {
            status: StatusCode::PARTIAL_CONTENT,
            data: data.slice(start as usize..stop as usize),
        })
    }
}
