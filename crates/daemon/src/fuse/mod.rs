//! Kernel bridge: exposes a [`FilesystemProjection`](crate::vfs::FilesystemProjection)
//! through FUSE.

mod disk_fs;
mod inode_table;

pub use disk_fs::DiskFs;
pub use inode_table::InodeTable;
