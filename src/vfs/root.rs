//! `/`: lists `.`, `..`, and every active top-level mount. There is
//! nothing writable at the root itself -- each mountpoint is its own
//! backend with its own rules.

use super::inode::{Inode, InodeType, InodeOps, DirEntry};
use super::mount;
use crate::lib::error::Errno;
use alloc::boxed::Box;
use alloc::string::ToString;
use alloc::sync::Arc;
use alloc::vec::Vec;

pub struct RootDir;

impl InodeOps for RootDir {
    fn lookup(&self, _name: &str) -> Result<Arc<Inode>, Errno> {
        // Real lookups on mounted subtrees go through `resolve_mount`, not
        // through this inode's own children: the root has none of its own.
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
        let mut entries = alloc::vec![
            DirEntry { ino: 1, name: ".".to_string(), itype: InodeType::Directory },
            DirEntry { ino: 1, name: "..".to_string(), itype: InodeType::Directory },
        ];
        for m in mount::get_mounts() {
            let mp = m.mountpoint.as_str();
            if mp == "/" {
                continue;
            }
            // Exactly one '/' separator: a direct child of root.
            if mp.matches('/').count() == 1 {
                entries.push(DirEntry {
                    ino: m.root.ino(),
                    name: mp.trim_start_matches('/').to_string(),
                    itype: InodeType::Directory,
                });
            }
        }
        Ok(entries)
    }

    fn getattr(&self) -> Result<super::inode::InodeMeta, Errno> {
        Ok(super::inode::InodeMeta {
            ino: 1,
            itype: InodeType::Directory,
            mode: crate::vfs::S_IFDIR | 0o755,
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

/// Mount the root directory backend at `/`.
pub fn mount_root() -> Result<Arc<Inode>, Errno> {
    let ops: &'static RootDir = Box::leak(Box::new(RootDir));
    Ok(Arc::new(Inode::new(InodeType::Directory, 0o755, ops as &'static dyn InodeOps)))
}
