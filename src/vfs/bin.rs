//! `/bin`: a read-only listing of the embedded program table. There is no
//! cross toolchain in this build environment to produce ELF32 payloads,
//! so `process::exec::EMBEDDED_APPS` is empty for now -- `/bin` still
//! resolves and lists correctly, just with nothing in it.

use super::inode::{Inode, InodeType, InodeOps, DirEntry};
use crate::lib::error::Errno;
use crate::process::exec;
use alloc::boxed::Box;
use alloc::string::ToString;
use alloc::sync::Arc;
use alloc::vec::Vec;

pub struct BinRoot;

impl InodeOps for BinRoot {
    fn lookup(&self, name: &str) -> Result<Arc<Inode>, Errno> {
        let app = exec::find_app(name).ok_or(Errno::ENOENT)?;
        Ok(Arc::new(Inode::new(
            InodeType::Regular,
            0o555,
            Box::leak(Box::new(BinImage { image: app.image })) as &'static dyn InodeOps,
        )))
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
        for (i, app) in exec::EMBEDDED_APPS.iter().enumerate() {
            entries.push(DirEntry {
                ino: 10 + i as u64,
                name: app.name.to_string(),
                itype: InodeType::Regular,
            });
        }
        Ok(entries)
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

/// A single embedded program's raw image bytes.
struct BinImage {
    image: &'static [u8],
}

impl InodeOps for BinImage {
    fn lookup(&self, _name: &str) -> Result<Arc<Inode>, Errno> {
        Err(Errno::ENOTDIR)
    }

    fn create(&self, _name: &str, _mode: u32) -> Result<Arc<Inode>, Errno> {
        Err(Errno::ENOTDIR)
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize, Errno> {
        if offset >= self.image.len() as u64 {
            return Ok(0);
        }
        let start = offset as usize;
        let n = (self.image.len() - start).min(buf.len());
        buf[..n].copy_from_slice(&self.image[start..start + n]);
        Ok(n)
    }

    fn write(&self, _offset: u64, _buf: &[u8]) -> Result<usize, Errno> {
        Err(Errno::EACCES)
    }

    fn readdir(&self) -> Result<Vec<DirEntry>, Errno> {
        Err(Errno::ENOTDIR)
    }

    fn getattr(&self) -> Result<super::inode::InodeMeta, Errno> {
        Ok(super::inode::InodeMeta {
            ino: alloc_ino_for(self.image),
            itype: InodeType::Regular,
            mode: crate::vfs::S_IFREG | 0o555,
            uid: 0,
            gid: 0,
            nlink: 1,
            size: self.image.len() as u64,
            atime: 0,
            mtime: 0,
            ctime: 0,
        })
    }
}

/// Stable per-image inode number derived from the image's address, since
/// these are `'static` slices baked into the kernel binary rather than
/// allocated objects with their own identity.
fn alloc_ino_for(image: &'static [u8]) -> super::inode::Ino {
    image.as_ptr() as u64
}

/// Mount the embedded-program listing at `/bin`.
pub fn mount_bin() -> Result<Arc<Inode>, Errno> {
    Ok(Arc::new(Inode::new(
        InodeType::Directory,
        0o555,
        Box::leak(Box::new(BinRoot)) as &'static dyn InodeOps,
    )))
}
