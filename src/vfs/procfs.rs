//! `/proc`: `/proc/stat`, and `/proc/<pid>/{comm,cmdline,stat}`. Every
//! entry is read-only and every directory listing is synthesized on the
//! fly from the live task table -- there is nothing to keep in sync.

use super::inode::{Inode, InodeType, InodeOps, DirEntry};
use crate::lib::error::Errno;
use crate::process::{self, Pid, PID_NONE};
use alloc::boxed::Box;
use alloc::format;
use alloc::string::ToString;
use alloc::sync::Arc;
use alloc::vec::Vec;
use spin::Mutex;

pub const MAX_PROCESS_CNT: usize = 64;

fn copy_out(content: &[u8], offset: u64, buf: &mut [u8]) -> Result<usize, Errno> {
    if offset >= content.len() as u64 {
        return Ok(0);
    }
    let start = offset as usize;
    let n = (content.len() - start).min(buf.len());
    buf[..n].copy_from_slice(&content[start..start + n]);
    Ok(n)
}

/// `/proc/<pid>/*` nodes don't carry their own `pid` field -- that would
/// mean heap-allocating (and leaking) a fresh `InodeOps` impl on every
/// lookup. Instead each node is one of `MAX_PROCESS_CNT` static slots,
/// indexed the same way `task_table` indexes a pid to its table slot, and
/// the slot's current occupant is tracked here. A lookup "binds" the slot
/// for the pid it resolved; every later call re-checks occupancy against
/// the live task table so a stale fd from a since-reaped pid reports
/// ESRCH instead of silently reading whatever task now sits in that slot.
static SLOT_PIDS: Mutex<[Pid; MAX_PROCESS_CNT]> = Mutex::new([PID_NONE; MAX_PROCESS_CNT]);

fn slot_index(pid: Pid) -> usize {
    (pid as u32 as usize) & (MAX_PROCESS_CNT - 1)
}

fn bind_slot(pid: Pid) -> usize {
    let idx = slot_index(pid);
    SLOT_PIDS.lock()[idx] = pid;
    idx
}

fn slot_pid(idx: usize) -> Result<Pid, Errno> {
    let pid = SLOT_PIDS.lock()[idx];
    if pid == PID_NONE {
        return Err(Errno::ESRCH);
    }
    process::with_task(pid, |_| ()).ok_or(Errno::ESRCH)?;
    Ok(pid)
}

/// `/proc` itself.
pub struct ProcfsRoot;

impl InodeOps for ProcfsRoot {
    fn lookup(&self, name: &str) -> Result<Arc<Inode>, Errno> {
        if name == "stat" {
            return Ok(Arc::new(Inode::new(InodeType::Regular, 0o444, &PROC_STAT as &'static dyn InodeOps)));
        }
        let pid: Pid = name.parse().map_err(|_| Errno::ENOENT)?;
        if !process::list_pids().contains(&pid) {
            return Err(Errno::ENOENT);
        }
        let idx = bind_slot(pid);
        Ok(Arc::new(Inode::new(InodeType::Directory, 0o555, pid_dir_ops(idx))))
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
            DirEntry { ino: 2, name: "stat".to_string(), itype: InodeType::Regular },
        ];
        for pid in process::list_pids() {
            entries.push(DirEntry {
                ino: 100 + pid as u64,
                name: pid.to_string(),
                itype: InodeType::Directory,
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

/// `/proc/stat`: just the `ctxt` line. Stateless, so one static instance
/// serves every open.
struct ProcStat;

static PROC_STAT: ProcStat = ProcStat;

impl InodeOps for ProcStat {
    fn lookup(&self, _name: &str) -> Result<Arc<Inode>, Errno> {
        Err(Errno::ENOTDIR)
    }

    fn create(&self, _name: &str, _mode: u32) -> Result<Arc<Inode>, Errno> {
        Err(Errno::ENOTDIR)
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize, Errno> {
        let content = format!("ctxt = {}\n", process::scheduler::ctxt());
        copy_out(content.as_bytes(), offset, buf)
    }

    fn write(&self, _offset: u64, _buf: &[u8]) -> Result<usize, Errno> {
        Err(Errno::EACCES)
    }

    fn readdir(&self) -> Result<Vec<DirEntry>, Errno> {
        Err(Errno::ENOTDIR)
    }

    fn getattr(&self) -> Result<super::inode::InodeMeta, Errno> {
        Ok(super::inode::InodeMeta {
            ino: 2,
            itype: InodeType::Regular,
            mode: crate::vfs::S_IFREG | 0o444,
            uid: 0,
            gid: 0,
            nlink: 1,
            size: 0,
            atime: 0,
            mtime: 0,
            ctime: 0,
        })
    }
}

/// `/proc/<pid>`, bound to slot `idx`.
struct ProcPidDir {
    idx: usize,
}

impl InodeOps for ProcPidDir {
    fn lookup(&self, name: &str) -> Result<Arc<Inode>, Errno> {
        let pid = slot_pid(self.idx)?;
        let idx = bind_slot(pid);
        match name {
            "comm" => Ok(Arc::new(Inode::new(InodeType::Regular, 0o444, pid_comm_ops(idx)))),
            "cmdline" => Ok(Arc::new(Inode::new(InodeType::Regular, 0o444, pid_cmdline_ops(idx)))),
            "stat" => Ok(Arc::new(Inode::new(InodeType::Regular, 0o444, pid_stat_ops(idx)))),
            _ => Err(Errno::ENOENT),
        }
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
        let pid = slot_pid(self.idx)?;
        let ino = 100 + pid as u64;
        Ok(alloc::vec![
            DirEntry { ino, name: ".".to_string(), itype: InodeType::Directory },
            DirEntry { ino: 1, name: "..".to_string(), itype: InodeType::Directory },
            DirEntry { ino: ino + 1, name: "comm".to_string(), itype: InodeType::Regular },
            DirEntry { ino: ino + 2, name: "cmdline".to_string(), itype: InodeType::Regular },
            DirEntry { ino: ino + 3, name: "stat".to_string(), itype: InodeType::Regular },
        ])
    }

    fn getattr(&self) -> Result<super::inode::InodeMeta, Errno> {
        let pid = slot_pid(self.idx)?;
        Ok(super::inode::InodeMeta {
            ino: 100 + pid as u64,
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

/// `/proc/<pid>/comm`: task name + `\n`.
struct ProcPidComm {
    idx: usize,
}

impl InodeOps for ProcPidComm {
    fn lookup(&self, _name: &str) -> Result<Arc<Inode>, Errno> {
        Err(Errno::ENOTDIR)
    }

    fn create(&self, _name: &str, _mode: u32) -> Result<Arc<Inode>, Errno> {
        Err(Errno::ENOTDIR)
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize, Errno> {
        let pid = slot_pid(self.idx)?;
        let content = process::with_task(pid, |t| format!("{}\n", t.name.as_str())).ok_or(Errno::ESRCH)?;
        copy_out(content.as_bytes(), offset, buf)
    }

    fn write(&self, _offset: u64, _buf: &[u8]) -> Result<usize, Errno> {
        Err(Errno::EACCES)
    }

    fn readdir(&self) -> Result<Vec<DirEntry>, Errno> {
        Err(Errno::ENOTDIR)
    }

    fn getattr(&self) -> Result<super::inode::InodeMeta, Errno> {
        let pid = slot_pid(self.idx)?;
        Ok(super::inode::InodeMeta {
            ino: 101 + pid as u64,
            itype: InodeType::Regular,
            mode: crate::vfs::S_IFREG | 0o444,
            uid: 0,
            gid: 0,
            nlink: 1,
            size: 0,
            atime: 0,
            mtime: 0,
            ctime: 0,
        })
    }
}

/// `/proc/<pid>/cmdline`: task name, no trailing newline.
struct ProcPidCmdline {
    idx: usize,
}

impl InodeOps for ProcPidCmdline {
    fn lookup(&self, _name: &str) -> Result<Arc<Inode>, Errno> {
        Err(Errno::ENOTDIR)
    }

    fn create(&self, _name: &str, _mode: u32) -> Result<Arc<Inode>, Errno> {
        Err(Errno::ENOTDIR)
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize, Errno> {
        let pid = slot_pid(self.idx)?;
        let content = process::with_task(pid, |t| t.name.as_str().to_string()).ok_or(Errno::ESRCH)?;
        copy_out(content.as_bytes(), offset, buf)
    }

    fn write(&self, _offset: u64, _buf: &[u8]) -> Result<usize, Errno> {
        Err(Errno::EACCES)
    }

    fn readdir(&self) -> Result<Vec<DirEntry>, Errno> {
        Err(Errno::ENOTDIR)
    }

    fn getattr(&self) -> Result<super::inode::InodeMeta, Errno> {
        let pid = slot_pid(self.idx)?;
        Ok(super::inode::InodeMeta {
            ino: 102 + pid as u64,
            itype: InodeType::Regular,
            mode: crate::vfs::S_IFREG | 0o444,
            uid: 0,
            gid: 0,
            nlink: 1,
            size: 0,
            atime: 0,
            mtime: 0,
            ctime: 0,
        })
    }
}

/// `/proc/<pid>/stat`: the task's own `ctxt` as decimal + `\n`.
struct ProcPidStat {
    idx: usize,
}

impl InodeOps for ProcPidStat {
    fn lookup(&self, _name: &str) -> Result<Arc<Inode>, Errno> {
        Err(Errno::ENOTDIR)
    }

    fn create(&self, _name: &str, _mode: u32) -> Result<Arc<Inode>, Errno> {
        Err(Errno::ENOTDIR)
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<usize, Errno> {
        let pid = slot_pid(self.idx)?;
        let content = process::with_task(pid, |t| format!("{}\n", t.ctxt)).ok_or(Errno::ESRCH)?;
        copy_out(content.as_bytes(), offset, buf)
    }

    fn write(&self, _offset: u64, _buf: &[u8]) -> Result<usize, Errno> {
        Err(Errno::EACCES)
    }

    fn readdir(&self) -> Result<Vec<DirEntry>, Errno> {
        Err(Errno::ENOTDIR)
    }

    fn getattr(&self) -> Result<super::inode::InodeMeta, Errno> {
        let pid = slot_pid(self.idx)?;
        Ok(super::inode::InodeMeta {
            ino: 103 + pid as u64,
            itype: InodeType::Regular,
            mode: crate::vfs::S_IFREG | 0o444,
            uid: 0,
            gid: 0,
            nlink: 1,
            size: 0,
            atime: 0,
            mtime: 0,
            ctime: 0,
        })
    }
}

/// Lazily builds the `idx`-th kind's static table once and hands back
/// `'static` references into it, so a lookup binds a slot instead of
/// leaking a fresh `InodeOps` per call.
macro_rules! slot_table {
    ($fn_name:ident, $ty:ident) => {
        fn $fn_name(idx: usize) -> &'static dyn InodeOps {
            static TABLE: Mutex<Option<&'static [$ty]>> = Mutex::new(None);
            let mut guard = TABLE.lock();
            if guard.is_none() {
                let v: Vec<$ty> = (0..MAX_PROCESS_CNT).map(|idx| $ty { idx }).collect();
                *guard = Some(Box::leak(v.into_boxed_slice()));
            }
            &guard.unwrap()[idx]
        }
    };
}

slot_table!(pid_dir_ops, ProcPidDir);
slot_table!(pid_comm_ops, ProcPidComm);
slot_table!(pid_cmdline_ops, ProcPidCmdline);
slot_table!(pid_stat_ops, ProcPidStat);

/// Mount procfs at `/proc`.
pub fn mount_procfs() -> Result<Arc<Inode>, Errno> {
    Ok(Arc::new(Inode::new(
        InodeType::Directory,
        0o555,
        Box::leak(Box::new(ProcfsRoot)) as &'static dyn InodeOps,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proc_stat_reports_ctxt_line() {
        let stat = ProcStat;
        let mut buf = [0u8; 64];
        let n = stat.read(0, &mut buf).unwrap();
        let text = core::str::from_utf8(&buf[..n]).unwrap();
        assert!(text.starts_with("ctxt = "));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn proc_stat_eof_after_full_read() {
        let stat = ProcStat;
        let mut buf = [0u8; 64];
        let n = stat.read(0, &mut buf).unwrap();
        assert_eq!(stat.read(n as u64, &mut buf).unwrap(), 0);
    }

    #[test]
    fn slot_index_wraps_into_table_bounds() {
        assert!(slot_index(0) < MAX_PROCESS_CNT);
        assert!(slot_index(12345) < MAX_PROCESS_CNT);
    }

    #[test]
    fn unbound_slot_reports_esrch() {
        // A slot that has never been bound (or was reset) has no live pid.
        let idx = MAX_PROCESS_CNT - 1;
        SLOT_PIDS.lock()[idx] = PID_NONE;
        assert_eq!(slot_pid(idx), Err(Errno::ESRCH));
    }
}
