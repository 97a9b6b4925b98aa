//! FUSE filesystem backed by a remote storage account
//!
//! Implements the fuser::Filesystem trait on top of the projection. Each
//! callback resolves its inode to a path and blocks on the projection.

use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory, ReplyEmpty,
    ReplyEntry, ReplyOpen, ReplyWrite, Request, TimeOrNow,
};
use parking_lot::RwLock;
use tokio::runtime::Handle;

use super::inode_table::InodeTable;
use crate::vfs::{FileAttributes, FilesystemProjection, FsError, Owner};

pub struct DiskFs {
    /// Tokio runtime handle for async operations
    rt: Handle,
    projection: Arc<FilesystemProjection>,
    inodes: RwLock<InodeTable>,
}

impl DiskFs {
    /// How long the kernel may cache what we reply with
    const ATTR_TTL: Duration = Duration::from_secs(1);

    const BLOCK_SIZE: u32 = 512;

    pub fn new(rt: Handle, projection: Arc<FilesystemProjection>) -> Self {
        Self {
            rt,
            projection,
            inodes: RwLock::new(InodeTable::new()),
        }
    }

    fn system_time(secs: i64) -> SystemTime {
        if secs <= 0 {
            UNIX_EPOCH
        } else {
            UNIX_EPOCH + Duration::from_secs(secs as u64)
        }
    }

    fn kind(attrs: &FileAttributes) -> FileType {
        if attrs.is_directory {
            FileType::Directory
        } else {
            FileType::RegularFile
        }
    }

    fn make_attr(inode: u64, attrs: &FileAttributes) -> FileAttr {
        FileAttr {
            ino: inode,
            size: attrs.size_bytes,
            blocks: attrs.size_bytes.div_ceil(Self::BLOCK_SIZE as u64),
            atime: Self::system_time(attrs.accessed_at),
            mtime: Self::system_time(attrs.modified_at),
            ctime: Self::system_time(attrs.modified_at),
            crtime: Self::system_time(attrs.created_at),
            kind: Self::kind(attrs),
            perm: attrs.perm(),
            nlink: attrs.link_count,
            uid: attrs.owner_uid,
            gid: attrs.owner_gid,
            rdev: 0,
            blksize: Self::BLOCK_SIZE,
            flags: 0,
        }
    }

    fn path_of(&self, ino: u64) -> Result<String, libc::c_int> {
        self.inodes
            .read()
            .get_path(ino)
            .map(str::to_string)
            .ok_or(libc::ENOENT)
    }

    fn child_of(&self, parent: u64, name: &OsStr) -> Result<String, libc::c_int> {
        let name = name.to_str().ok_or(libc::EINVAL)?;
        let parent_path = self.path_of(parent)?;
        Ok(FilesystemProjection::child_path(&parent_path, name))
    }

    fn getattr_path(&self, path: &str) -> Result<FileAttributes, FsError> {
        self.rt.block_on(self.projection.getattr(path))
    }
}

impl Filesystem for DiskFs {
    fn init(
        &mut self,
        _req: &Request<'_>,
        _config: &mut fuser::KernelConfig,
    ) -> Result<(), libc::c_int> {
        tracing::info!("FUSE filesystem initialized");
        Ok(())
    }

    fn destroy(&mut self) {
        tracing::info!(
            "FUSE filesystem destroyed ({} handles still open)",
            self.projection.handles().len()
        );
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let path = match self.child_of(parent, name) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };

        match self.getattr_path(&path) {
            Ok(attrs) => {
                let inode = self.inodes.write().get_or_create(&path);
                reply.entry(&Self::ATTR_TTL, &Self::make_attr(inode, &attrs), 0);
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let path = match self.path_of(ino) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };

        match self.getattr_path(&path) {
            Ok(attrs) => reply.attr(&Self::ATTR_TTL, &Self::make_attr(ino, &attrs)),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let path = match self.path_of(ino) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };

        if let Some(new_size) = size {
            if let Err(e) = self.projection.truncate(&path, new_size) {
                reply.error(e.errno());
                return;
            }
        }

        match self.getattr_path(&path) {
            Ok(attrs) => reply.attr(&Self::ATTR_TTL, &Self::make_attr(ino, &attrs)),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let path = match self.path_of(ino) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };

        let names = match self.rt.block_on(self.projection.readdir(&path)) {
            Ok(names) => names,
            Err(e) => {
                reply.error(e.errno());
                return;
            }
        };

        let parent_ino = if ino == InodeTable::ROOT_INODE {
            ino
        } else {
            let parent_path = InodeTable::parent_path(&path);
            self.inodes.write().get_or_create(&parent_path)
        };

        let mut all_entries: Vec<(u64, FileType, String)> = vec![
            (ino, FileType::Directory, ".".to_string()),
            (parent_ino, FileType::Directory, "..".to_string()),
        ];

        for name in names {
            let entry_path = FilesystemProjection::child_path(&path, &name);
            // Hidden or vanished entries are left out
            let attrs = match self.getattr_path(&entry_path) {
                Ok(attrs) => attrs,
                Err(_) => continue,
            };
            let entry_ino = self.inodes.write().get_or_create(&entry_path);
            all_entries.push((entry_ino, Self::kind(&attrs), name));
        }

        for (i, (ino, kind, name)) in all_entries.into_iter().enumerate().skip(offset as usize) {
            if reply.add(ino, (i + 1) as i64, kind, &name) {
                break;
            }
        }

        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        let path = match self.path_of(ino) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };

        match self.rt.block_on(self.projection.open(&path)) {
            Ok(fh) => reply.opened(fh, 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        if offset < 0 {
            reply.error(libc::EINVAL);
            return;
        }

        let fallback = self.path_of(ino).ok();
        let result = self.rt.block_on(self.projection.read(
            fh,
            offset as u64,
            size,
            fallback.as_deref(),
        ));

        match result {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        match self.projection.write(fh, offset.max(0) as u64, data) {
            Ok(written) => reply.written(written as u32),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn flush(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _lock_owner: u64,
        reply: ReplyEmpty,
    ) {
        match self.projection.flush(fh) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        self.projection.release(fh);
        reply.ok();
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let path = match self.child_of(parent, name) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };

        match self.projection.create(&path) {
            Ok(fh) => {
                let attrs = FileAttributes::synthetic(false, Owner::current());
                let inode = self.inodes.write().get_or_create(&path);
                reply.created(&Self::ATTR_TTL, &Self::make_attr(inode, &attrs), 0, fh, 0);
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let path = match self.child_of(parent, name) {
            Ok(p) => p,
            Err(e) => {
                reply.error(e);
                return;
            }
        };

        match self.projection.mkdir(&path) {
            Ok(()) => {
                let attrs = FileAttributes::synthetic(true, Owner::current());
                let inode = self.inodes.write().get_or_create(&path);
                reply.entry(&Self::ATTR_TTL, &Self::make_attr(inode, &attrs), 0);
            }
            Err(e) => reply.error(e.errno()),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let result = self
            .child_of(parent, name)
            .and_then(|path| self.projection.unlink(&path).map_err(|e| e.errno()));
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let result = self
            .child_of(parent, name)
            .and_then(|path| self.projection.rmdir(&path).map_err(|e| e.errno()));
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e),
        }
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        let result = self.child_of(parent, name).and_then(|from| {
            let to = self.child_of(newparent, newname)?;
            self.projection.rename(&from, &to).map_err(|e| e.errno())
        });
        match result {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e),
        }
    }
}
