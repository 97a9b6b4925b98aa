//! Stat-equivalent attributes of projected entries

use common::remote::RemoteMetadata;

/// Owner reported for every entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
}

impl Owner {
    /// The uid/gid of the running process
    pub fn current() -> Self {
        Self {
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
        }
    }
}

/// Attributes of one file or directory.
///
/// Directories always report size 0 and a link count of 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttributes {
    pub is_directory: bool,
    pub size_bytes: u64,
    /// Unix seconds
    pub created_at: i64,
    pub modified_at: i64,
    pub accessed_at: i64,
    pub link_count: u32,
    pub owner_uid: u32,
    pub owner_gid: u32,
}

impl FileAttributes {
    pub const DIR_PERM: u16 = 0o755;
    pub const FILE_PERM: u16 = 0o644;

    /// The permanent synthetic entry for `/`
    pub fn root(owner: Owner) -> Self {
        Self::synthetic(true, owner)
    }

    /// An empty entry that exists only on this side of the mount
    pub fn synthetic(is_directory: bool, owner: Owner) -> Self {
        Self {
            is_directory,
            size_bytes: 0,
            created_at: 0,
            modified_at: 0,
            accessed_at: 0,
            link_count: if is_directory { 2 } else { 1 },
            owner_uid: owner.uid,
            owner_gid: owner.gid,
        }
    }

    pub fn from_metadata(metadata: &RemoteMetadata, owner: Owner) -> Self {
        let is_directory = metadata.is_directory;
        Self {
            is_directory,
            size_bytes: if is_directory { 0 } else { metadata.size },
            created_at: metadata.created_at,
            modified_at: metadata.modified_at,
            // The remote keeps no access time
            accessed_at: metadata.modified_at,
            link_count: if is_directory { 2 } else { 1 },
            owner_uid: owner.uid,
            owner_gid: owner.gid,
        }
    }

    pub fn perm(&self) -> u16 {
        if self.is_directory {
            Self::DIR_PERM
        } else {
            Self::FILE_PERM
        }
    }

    /// Full `st_mode` including the file type bits
    pub fn mode(&self) -> u32 {
        let kind = if self.is_directory {
            libc::S_IFDIR
        } else {
            libc::S_IFREG
        };
        kind as u32 | self.perm() as u32
    }
}
