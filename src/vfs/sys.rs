//! `/sys`: an empty directory reserved for future attributes.

use super::inode::{Inode, InodeType, InodeOps, DirEntry};
use crate::lib::error::Errno;
use alloc::boxed::Box;
use alloc::string::ToString;
use alloc::sync::Arc;
use alloc::vec::Vec;

pub struct SysRoot;

impl InodeOps for SysRoot {
    fn lookup(&self, _name: &str) -> Result<Arc<Inode>, Errno> {
        Err(Errno::ENOENT)
    }

    fn create(&self, _name: &str, _mode: u32) -> Result<Arc<Inode>, Errno> {
        Err(Errno::EACCES)
    }

    fn read(&self, _offset: u64, _buf: &mut [u8]) -> Result<usize, Errno> {
        Err(Errno::EISDIR)
    }

    fn write(&self, _offset: u64, _buf: &[u8]) -> Result<usize, Errno> {
        Err(Errno::EISDIR)
    }

    fn readdir(&self) -> Result<Vec<DirEntry>, Errno> {
        Ok(alloc::vec![
            DirEntry { ino: 1, name: ".".to_string(), itype: InodeType::Directory },
            DirEntry { ino: 1, name: "..".to_string(), itype: InodeType::Directory },
        ])
    }

    fn getattr(&self) -> Result<super::inode::InodeMeta, Errno> {
        Ok(super::inode::InodeMeta {
            ino: 1,
            itype: InodeType::Directory,
            mode: crate::vfs::S_IFDIR | 0o555,
            uid: 0,
            gid: 0,
            nlink: 2,
            size: 0,
            atime: 0,
            mtime: 0,
            ctime: 0,
        })
    }
}

/// Mount the (empty) `/sys` directory.
pub fn mount_sys() -> Result<Arc<Inode>, Errno> {
    Ok(Arc::new(Inode::new(
        InodeType::Directory,
        0o555,
        Box::leak(Box::new(SysRoot)) as &'static dyn InodeOps,
    )))
}
