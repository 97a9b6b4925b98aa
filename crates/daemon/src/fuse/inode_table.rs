//! Inode to path mapping for the FUSE bridge
//!
//! The kernel names entries by inode; the projection names them by remote
//! path. Inodes are handed out on first sight and stay stable for the life
//! of the mount.

use std::collections::HashMap;

/// Bidirectional mapping between inodes and remote paths
pub struct InodeTable {
    path_to_inode: HashMap<String, u64>,
    inode_to_path: HashMap<u64, String>,
    next_inode: u64,
}

impl InodeTable {
    pub const ROOT_INODE: u64 = 1;

    pub fn new() -> Self {
        let mut table = Self {
            path_to_inode: HashMap::new(),
            inode_to_path: HashMap::new(),
            next_inode: Self::ROOT_INODE + 1,
        };

        table.path_to_inode.insert("/".to_string(), Self::ROOT_INODE);
        table.inode_to_path.insert(Self::ROOT_INODE, "/".to_string());

        table
    }

    /// Get inode for a path, creating one if it doesn't exist
    pub fn get_or_create(&mut self, path: &str) -> u64 {
        if let Some(&ino) = self.path_to_inode.get(path) {
            return ino;
        }

        let ino = self.next_inode;
        self.next_inode += 1;
        self.path_to_inode.insert(path.to_string(), ino);
        self.inode_to_path.insert(ino, path.to_string());
        ino
    }

    pub fn get_path(&self, inode: u64) -> Option<&str> {
        self.inode_to_path.get(&inode).map(String::as_str)
    }

    /// Parent directory of `path`, `/` for top-level entries
    pub fn parent_path(path: &str) -> String {
        match path.trim_end_matches('/').rfind('/') {
            Some(0) | None => "/".to_string(),
            Some(idx) => path[..idx].to_string(),
        }
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}
