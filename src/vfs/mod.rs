//! Virtual File System layer: path normalization and resolution, the open
//! file pool (one `File` per fd, shared across `fork` via `Arc`), and the
//! backends mounted under it (`root`, `devfs`, `procfs`, `bin`, `sys`).

pub mod inode;
pub mod file;
pub mod file_pool;
pub mod mount;
pub mod devfs;
pub mod procfs;
pub mod bin;
pub mod root;
pub mod sys;

pub use inode::{Inode, InodeType, InodeOps, DirEntry, Ino, alloc_ino};
pub use file::{File, FileOps, OpenFlags};
pub use mount::{Mount, MountTable, init_vfs, mount, get_root, get_mounts};

use crate::lib::error::Errno;
use crate::process::{self, Pid};
use alloc::format;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;

/// File mode bits
pub const S_IFMT: u32 = 0o170000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFCHR: u32 = 0o020000;
pub const S_IFBLK: u32 = 0o060000;
pub const S_IRUSR: u32 = 0o000400;
pub const S_IWUSR: u32 = 0o000200;
pub const S_IXUSR: u32 = 0o000100;

const MAX_PATH_SEGMENTS: usize = 64;

/// Normalize a path: ensure a leading `/`, drop empty and `.` components,
/// pop the previous component on `..` (root stays root), collapse
/// duplicate slashes, strip a trailing slash except on the root itself.
/// Segment count is bounded; anything past `MAX_PATH_SEGMENTS` is dropped.
pub fn normalize(path: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for component in path.split('/') {
        if component.is_empty() || component == "." {
            continue;
        }
        if component == ".." {
            stack.pop();
            continue;
        }
        if stack.len() >= MAX_PATH_SEGMENTS {
            break;
        }
        stack.push(component);
    }
    if stack.is_empty() {
        return String::from("/");
    }
    let mut out = String::new();
    for component in stack {
        out.push('/');
        out.push_str(component);
    }
    out
}

/// Resolve a path against a task's cwd: absolute paths normalize directly,
/// relative paths are joined onto `cwd` first.
pub fn resolve(path: &str, cwd: &str) -> String {
    if path.starts_with('/') {
        normalize(path)
    } else {
        normalize(&format!("{}/{}", cwd, path))
    }
}

/// The calling task's pid. Every entry point here is reached from the
/// syscall gate, which always has a current task; `ESRCH` only fires if
/// that invariant is somehow broken.
fn current_pid() -> Result<Pid, Errno> {
    process::current_pid().ok_or(Errno::ESRCH)
}

fn current_cwd() -> String {
    current_pid()
        .ok()
        .and_then(|pid| process::with_task(pid, |t| t.cwd.as_str().to_string()))
        .unwrap_or_else(|| String::from("/"))
}

/// Walk the remaining path components under a mount's root inode.
fn path_walk(mut current: Arc<Inode>, relative: &str) -> Result<Arc<Inode>, Errno> {
    for component in relative.split('/').filter(|s| !s.is_empty()) {
        current = current.lookup(component)?;
    }
    Ok(current)
}

/// Split a normalized absolute path into `(parent, name)`. `/` itself has
/// no parent.
fn split_path(path: &str) -> Result<(&str, &str), Errno> {
    if path == "/" {
        return Err(Errno::EISDIR);
    }
    let pos = path.rfind('/').ok_or(Errno::EINVAL)?;
    let parent = if pos == 0 { "/" } else { &path[..pos] };
    let name = &path[pos + 1..];
    if name.is_empty() {
        return Err(Errno::EINVAL);
    }
    Ok((parent, name))
}

/// Resolve a normalized absolute path to its inode via the mount table's
/// longest-prefix match.
fn lookup_path(normalized: &str) -> Result<Arc<Inode>, Errno> {
    let m = mount::resolve_mount(normalized).ok_or(Errno::ENOENT)?;
    let relative = &normalized[m.mountpoint.len()..];
    if relative.is_empty() || relative == "/" {
        Ok(m.root)
    } else {
        path_walk(m.root, relative)
    }
}

/// `true` for the handful of paths under `/dev` that resolve to a TTY's
/// input/output rings instead of a generic inode: `/dev/tty*`, `/dev/tty`,
/// `/dev/stdin`, `/dev/stdout`, `/dev/stderr`.
fn resolve_tty_path(normalized: &str, pid: Pid) -> Option<&'static crate::tty::Tty> {
    let ctty_or_active = || {
        process::with_task(pid, |t| t.ctty)
            .flatten()
            .and_then(crate::tty::get)
            .unwrap_or_else(crate::tty::active)
    };
    match normalized {
        "/dev/tty" | "/dev/stdin" | "/dev/stdout" | "/dev/stderr" => Some(ctty_or_active()),
        _ => {
            let suffix = normalized.strip_prefix("/dev/tty")?;
            let index: usize = suffix.parse().ok()?;
            crate::tty::get(index)
        }
    }
}

/// Open `path` for the calling task, returning the newly allocated fd.
pub fn open(path: &str, flags: OpenFlags, mode: u32) -> Result<i32, Errno> {
    let pid = current_pid()?;
    let cwd = current_cwd();
    let normalized = resolve(path, &cwd);

    let file = if let Some(tty) = resolve_tty_path(&normalized, pid) {
        File::from_tty(tty, flags)
    } else {
        let inode = match lookup_path(&normalized) {
            Ok(inode) => inode,
            Err(Errno::ENOENT) if flags.contains(OpenFlags::O_CREAT) => {
                let (parent_path, name) = split_path(&normalized)?;
                let parent = lookup_path(parent_path)?;
                parent.create(name, mode)?
            }
            Err(e) => return Err(e),
        };
        File::new(inode, flags)
    };
    let token = file_pool::reserve()?;
    let file = file.with_pool_token(token);

    process::with_task(pid, |t| t.files.alloc_fd(Arc::new(file))).ok_or(Errno::ESRCH)?
}

/// Close `fd` for the calling task.
pub fn close(fd: i32) -> Result<(), Errno> {
    let pid = current_pid()?;
    process::with_task(pid, |t| t.files.close(fd)).ok_or(Errno::ESRCH)??;
    Ok(())
}

fn with_open_file<R>(fd: i32, f: impl FnOnce(&Arc<File>) -> R) -> Result<R, Errno> {
    let pid = current_pid()?;
    let file = process::with_task(pid, |t| t.files.get(fd)).ok_or(Errno::ESRCH)??;
    Ok(f(&file))
}

/// Read from `fd` into `buf`.
pub fn read(fd: i32, buf: &mut [u8]) -> Result<usize, Errno> {
    process::sched_schedule();
    with_open_file(fd, |file| file.read(buf))?
}

/// Write `buf` to `fd`.
pub fn write(fd: i32, buf: &[u8]) -> Result<usize, Errno> {
    process::sched_schedule();
    with_open_file(fd, |file| file.write(buf))?
}

/// Wire format for one directory entry: `{ino:u32, reclen:u16, type:u8,
/// name:[256]}`, 263 bytes. `type` follows the ABI's own enumeration, not
/// libc's `DT_*` values.
const DIRENT_SIZE: usize = 4 + 2 + 1 + 256;

fn dirent_type(itype: InodeType) -> u8 {
    match itype {
        InodeType::Regular => 1,
        InodeType::Directory => 2,
        InodeType::CharDevice => 3,
        InodeType::BlockDevice => 4,
        InodeType::Symlink => 7,
    }
}

fn encode_dirent(entry: &DirEntry, out: &mut [u8; DIRENT_SIZE]) {
    out.fill(0);
    out[0..4].copy_from_slice(&(entry.ino as u32).to_ne_bytes());
    out[4..6].copy_from_slice(&(DIRENT_SIZE as u16).to_ne_bytes());
    out[6] = dirent_type(entry.itype);
    let name_bytes = entry.name.as_bytes();
    let n = name_bytes.len().min(255);
    out[7..7 + n].copy_from_slice(&name_bytes[..n]);
}

/// Read directory entries from `fd` into `buf` as a run of fixed-size
/// records. Entries that don't fit are dropped for this call (there is no
/// cursor beyond the file's own EOF latch); a second call on the same open
/// file returns 0.
pub fn getdents(fd: i32, buf: &mut [u8]) -> Result<usize, Errno> {
    let pid = current_pid()?;
    let file = process::with_task(pid, |t| t.files.get(fd)).ok_or(Errno::ESRCH)??;
    if file.offset() > 0 {
        return Ok(0);
    }
    let inode = file.inode.as_ref().ok_or(Errno::ENOTDIR)?;
    let entries = inode.readdir()?;

    let mut written = 0;
    let mut record = [0u8; DIRENT_SIZE];
    for entry in &entries {
        if written + DIRENT_SIZE > buf.len() {
            break;
        }
        encode_dirent(entry, &mut record);
        buf[written..written + DIRENT_SIZE].copy_from_slice(&record);
        written += DIRENT_SIZE;
    }
    file.advance_offset(written.max(1));
    Ok(written)
}

/// Resolve `path`, verify it names a directory, and make it the calling
/// task's cwd.
pub fn chdir(path: &str) -> Result<(), Errno> {
    let pid = current_pid()?;
    let cwd = current_cwd();
    let normalized = resolve(path, &cwd);
    let inode = lookup_path(&normalized)?;
    if !inode.is_dir() {
        return Err(Errno::ENOTDIR);
    }
    process::with_task(pid, |t| t.cwd.set(&normalized)).ok_or(Errno::ESRCH)
}

/// Copy the calling task's cwd into `buf`. `EINVAL` if it doesn't fit.
pub fn getcwd(buf: &mut [u8]) -> Result<usize, Errno> {
    let cwd = current_cwd();
    let bytes = cwd.as_bytes();
    if bytes.len() >= buf.len() {
        return Err(Errno::EINVAL);
    }
    buf[..bytes.len()].copy_from_slice(bytes);
    Ok(bytes.len())
}

/// Assign the calling task's controlling terminal.
pub fn setctty(tty_id: i32) -> Result<(), Errno> {
    if tty_id < 0 || tty_id as usize >= crate::tty::TTY_COUNT {
        return Err(Errno::EINVAL);
    }
    let pid = current_pid()?;
    process::with_task(pid, |t| t.ctty = Some(tty_id as usize)).ok_or(Errno::ESRCH)
}

/// Mount every filesystem backend at boot: root at `/`, then `/dev`,
/// `/proc`, `/bin`, `/sys` as top-level mounts under it.
pub fn init() {
    init_vfs();
    let root_inode = root::mount_root().expect("root backend mount");
    mount::mount("rootfs", root_inode, "/").expect("mount /");
    mount::mount("devfs", devfs::mount_devfs().expect("devfs mount"), "/dev").expect("mount /dev");
    mount::mount("procfs", procfs::mount_procfs().expect("procfs mount"), "/proc").expect("mount /proc");
    mount::mount("binfs", bin::mount_bin().expect("bin mount"), "/bin").expect("mount /bin");
    mount::mount("sysfs", sys::mount_sys().expect("sys mount"), "/sys").expect("mount /sys");
    crate::info!("vfs: mounted / /dev /proc /bin /sys");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_dot_and_dotdot() {
        assert_eq!(normalize("/a/./b/../c"), "/a/c");
    }

    #[test]
    fn normalize_collapses_duplicate_slashes() {
        assert_eq!(normalize("//a///b/"), "/a/b");
    }

    #[test]
    fn normalize_root_stays_root_on_excess_dotdot() {
        assert_eq!(normalize("/../../a"), "/a");
        assert_eq!(normalize("/.."), "/");
    }

    #[test]
    fn normalize_empty_is_root() {
        assert_eq!(normalize(""), "/");
        assert_eq!(normalize("/"), "/");
    }

    #[test]
    fn resolve_joins_relative_against_cwd() {
        assert_eq!(resolve("b", "/a"), "/a/b");
        assert_eq!(resolve("/b", "/a"), "/b");
    }

    #[test]
    fn split_path_splits_parent_and_name() {
        assert_eq!(split_path("/a/b").unwrap(), ("/a", "b"));
        assert_eq!(split_path("/a").unwrap(), ("/", "a"));
        assert!(split_path("/").is_err());
    }

    #[test]
    fn dirent_encodes_fixed_size_record() {
        let entry = DirEntry { ino: 7, name: "foo".to_string(), itype: InodeType::Regular };
        let mut record = [0u8; DIRENT_SIZE];
        encode_dirent(&entry, &mut record);
        assert_eq!(u32::from_ne_bytes(record[0..4].try_into().unwrap()), 7);
        assert_eq!(u16::from_ne_bytes(record[4..6].try_into().unwrap()), DIRENT_SIZE as u16);
        assert_eq!(record[6], 1);
        assert_eq!(&record[7..10], b"foo");
    }
}
