//! Syscall gate and dispatcher.
//!
//! There is no `int 0x80`-style trap gate on this kernel (see
//! `arch::x86::idt`): a "syscall" is a direct call into [`dispatch`] with
//! the register ABI's shape already laid out by the caller -- number in
//! the first argument, up to four further arguments, result returned in
//! the primary register with the POSIX `-errno` convention (never bare
//! `-1`). `dispatch` is the one thing a trap handler would call once a
//! gate exists; until then it's the gate.

pub mod uaccess;
pub mod validation;

use crate::lib::error::{Errno, Result};
use crate::process::task::MAX_PATH_LEN;
use crate::process::{self, task::Pid};
use crate::vfs::{self, OpenFlags};
use crate::{arch, mm};
use alloc::string::String;
use alloc::vec::{self, Vec};
use validation::SyscallValidator;

/// Closed set of syscall numbers. Abstract: these do not correspond to any
/// OS's vendor ABI. `fork` and `execve` are reserved -- `process::fork`
/// implements the mechanism, but nothing in this dispatcher exposes it as
/// a callable number, matching the closed syscall set's design.
pub mod nr {
    pub const EXIT: u32 = 0;
    pub const WAITPID: u32 = 1;
    pub const KILL: u32 = 2;
    pub const GETPID: u32 = 3;
    pub const SCHED_YIELD: u32 = 4;
    pub const NICE: u32 = 5;
    pub const BRK: u32 = 6;
    pub const READ: u32 = 7;
    pub const WRITE: u32 = 8;
    pub const OPEN: u32 = 9;
    pub const CLOSE: u32 = 10;
    pub const GETDENTS: u32 = 11;
    pub const ADD_TASK: u32 = 12;
    pub const CHDIR: u32 = 13;
    pub const GETCWD: u32 = 14;
    pub const CLOCK_GETTIME: u32 = 15;
    pub const SETCTTY: u32 = 16;
}

/// Clock ids `clock_gettime` understands. `BOOTTIME` and `MONOTONIC`
/// coincide on this kernel: there's no suspend/resume to make them diverge.
pub mod clock_id {
    pub const REALTIME: u32 = 0;
    pub const MONOTONIC: u32 = 1;
    pub const BOOTTIME: u32 = 2;
}

/// Longest `argv`/`envp` vector `add_task` will copy in, and the longest
/// single string in one.
const MAX_ARGV_ENTRIES: usize = 32;
const MAX_ARG_LEN: usize = 256;

/// The syscall gate. `a0..a3` are the four argument registers; unused ones
/// are ignored by handlers that don't need them.
pub fn dispatch(nr: u32, a0: usize, a1: usize, a2: usize, a3: usize) -> isize {
    let result = match nr {
        nr::EXIT => sys_exit(a0 as i32),
        nr::WAITPID => sys_waitpid(a0 as i32, a1 as *mut i32, a2 as u32),
        nr::KILL => sys_kill(a0 as i32, a1 as u32),
        nr::GETPID => sys_getpid(),
        nr::SCHED_YIELD => sys_sched_yield(),
        nr::NICE => sys_nice(a0 as i32),
        nr::BRK => sys_brk(a0 as u32),
        nr::READ => sys_read(a0 as i32, a1 as *mut u8, a2),
        nr::WRITE => sys_write(a0 as i32, a1 as *const u8, a2),
        nr::OPEN => sys_open(a0 as *const u8, a1 as u32, a2 as u32),
        nr::CLOSE => sys_close(a0 as i32),
        nr::GETDENTS => sys_getdents(a0 as i32, a1 as *mut u8, a2),
        nr::ADD_TASK => sys_add_task(a0 as *const u8, a1 as i32, a2 as *const *const u8, a3 as *const *const u8),
        nr::CHDIR => sys_chdir(a0 as *const u8),
        nr::GETCWD => sys_getcwd(a0 as *mut u8, a1),
        nr::CLOCK_GETTIME => sys_clock_gettime(a0 as u32, a1 as *mut u8),
        nr::SETCTTY => sys_setctty(a0 as i32),
        _ => {
            crate::warn!("syscall: unknown number {}", nr);
            Err(Errno::ENOSYS)
        }
    };

    match result {
        Ok(ret) => ret,
        Err(e) => e.as_isize(),
    }
}

fn current_pid() -> Result<Pid> {
    process::current_pid().ok_or(Errno::ESRCH)
}

fn sys_exit(status: i32) -> ! {
    process::sched_exit(status)
}

fn sys_waitpid(pid: i32, status_ptr: *mut i32, options: u32) -> Result<isize> {
    process::sched_schedule();
    let pid = SyscallValidator::validate_pid(pid)?;
    let options = SyscallValidator::validate_waitpid_options(options)?;

    let (child_pid, status) = process::sched_waitpid(pid, options)?;

    if !status_ptr.is_null() {
        // POSIX wait status: exit code lives in bits 8-15, read back via
        // `(status >> 8) & 0xff`.
        uaccess::copy_to_user(status_ptr, &[status << 8])?;
    }
    Ok(child_pid as isize)
}

fn sys_kill(pid: i32, sig: u32) -> Result<isize> {
    process::sched_schedule();
    let sig = SyscallValidator::validate_signal(sig)?;
    process::sched_kill(pid, sig)?;
    Ok(0)
}

fn sys_getpid() -> Result<isize> {
    Ok(current_pid()? as isize)
}

fn sys_sched_yield() -> Result<isize> {
    process::sched_schedule();
    Ok(0)
}

/// `nice` is accepted for ABI compatibility and ignored: this scheduler has
/// no priority concept, just a FIFO run queue.
fn sys_nice(inc: i32) -> Result<isize> {
    let _ = inc;
    Ok(0)
}

fn sys_brk(addr: u32) -> Result<isize> {
    process::sched_schedule();
    let pid = current_pid()?;
    let new_brk = process::with_task(pid, |t| t.mm.do_brk(addr, mm::alloc_frame))
        .ok_or(Errno::ESRCH)??;
    Ok(new_brk as isize)
}

fn sys_read(fd: i32, buf_ptr: *mut u8, count: usize) -> Result<isize> {
    SyscallValidator::validate_fd(fd)?;
    let count = SyscallValidator::validate_count(count)?;
    uaccess::validate_user_write(buf_ptr, count)?;

    let mut buf = vec![0u8; count];
    let n = vfs::read(fd, &mut buf)?;
    uaccess::copy_to_user(buf_ptr, &buf[..n])?;
    Ok(n as isize)
}

fn sys_write(fd: i32, buf_ptr: *const u8, count: usize) -> Result<isize> {
    SyscallValidator::validate_fd(fd)?;
    let count = SyscallValidator::validate_count(count)?;
    uaccess::validate_user_read(buf_ptr, count)?;

    let buf = uaccess::copy_from_user(buf_ptr, count)?;
    let n = vfs::write(fd, &buf)?;
    Ok(n as isize)
}

fn sys_open(path_ptr: *const u8, flags: u32, mode: u32) -> Result<isize> {
    process::sched_schedule();
    let path = uaccess::copy_string_from_user(path_ptr, MAX_PATH_LEN)?;
    let mode = SyscallValidator::validate_mode(mode)?;
    let fd = vfs::open(&path, OpenFlags::from_bits_truncate(flags), mode)?;
    Ok(fd as isize)
}

fn sys_close(fd: i32) -> Result<isize> {
    process::sched_schedule();
    SyscallValidator::validate_fd(fd)?;
    vfs::close(fd)?;
    Ok(0)
}

fn sys_getdents(fd: i32, buf_ptr: *mut u8, count: usize) -> Result<isize> {
    process::sched_schedule();
    SyscallValidator::validate_fd(fd)?;
    let count = SyscallValidator::validate_count(count)?;
    uaccess::validate_user_write(buf_ptr, count)?;

    let mut buf = vec![0u8; count];
    let n = vfs::getdents(fd, &mut buf)?;
    uaccess::copy_to_user(buf_ptr, &buf[..n])?;
    Ok(n as isize)
}

/// `add_task(path, tty_id, argv, envp)`: resolve `path` in the embedded
/// program table and start it as a new task. `tty_id < 0` inherits the
/// caller's controlling terminal.
fn sys_add_task(
    path_ptr: *const u8,
    tty_id: i32,
    argv_ptr: *const *const u8,
    envp_ptr: *const *const u8,
) -> Result<isize> {
    process::sched_schedule();
    let path = uaccess::copy_string_from_user(path_ptr, MAX_PATH_LEN)?;
    let argv = uaccess::copy_str_array_from_user(argv_ptr, MAX_ARGV_ENTRIES, MAX_ARG_LEN)?;
    let envp = uaccess::copy_str_array_from_user(envp_ptr, MAX_ARGV_ENTRIES, MAX_ARG_LEN)?;

    let tty = if tty_id < 0 { None } else { Some(tty_id as usize) };
    let argv_refs: Vec<&str> = argv.iter().map(String::as_str).collect();
    let envp_refs: Vec<&str> = envp.iter().map(String::as_str).collect();

    let pid = process::spawn(&path, tty, &argv_refs, &envp_refs, crate::init::mm_init::kernel_dir())?;
    process::sched_enqueue(pid);
    Ok(pid as isize)
}

fn sys_chdir(path_ptr: *const u8) -> Result<isize> {
    process::sched_schedule();
    let path = uaccess::copy_string_from_user(path_ptr, MAX_PATH_LEN)?;
    vfs::chdir(&path)?;
    Ok(0)
}

fn sys_getcwd(buf_ptr: *mut u8, size: usize) -> Result<isize> {
    process::sched_schedule();
    let size = SyscallValidator::validate_count(size)?;
    uaccess::validate_user_write(buf_ptr, size)?;

    let mut buf = vec![0u8; size];
    let n = vfs::getcwd(&mut buf)?;
    uaccess::copy_to_user(buf_ptr, &buf[..n])?;
    Ok(n as isize)
}

/// Writes a 12-byte `{sec: u64, nsec: u32}` record, native-endian, with no
/// implicit alignment padding -- the ABI's struct, not Rust's.
fn encode_timespec(sec: u64, nsec: u32) -> [u8; 12] {
    let mut out = [0u8; 12];
    out[0..8].copy_from_slice(&sec.to_ne_bytes());
    out[8..12].copy_from_slice(&nsec.to_ne_bytes());
    out
}

fn sys_clock_gettime(clk_id: u32, ts_ptr: *mut u8) -> Result<isize> {
    let (sec, nsec) = match clk_id {
        clock_id::REALTIME => arch::x86::clock::realtime(),
        clock_id::MONOTONIC | clock_id::BOOTTIME => arch::x86::clock::monotonic(),
        _ => return Err(Errno::EINVAL),
    };

    uaccess::validate_user_write(ts_ptr, 12)?;
    let record = encode_timespec(sec, nsec);
    uaccess::copy_to_user(ts_ptr, &record)?;
    Ok(0)
}

fn sys_setctty(tty_id: i32) -> Result<isize> {
    vfs::setctty(tty_id)?;
    Ok(0)
}
