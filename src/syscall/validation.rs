//! Argument validation shared by the syscall handlers in `syscall::mod`.
//!
//! Kept to the checks this kernel's actual model calls for: there is no
//! Linux-style user/kernel address split to validate against (see
//! `uaccess`), no sockets, no mmap. What's here is what's left once those
//! are gone.

use crate::lib::error::{Errno, Result};
use crate::process::task::{MAX_SIGNALS, RLIMIT_NOFILE};

/// Largest single `read`/`write` this kernel will attempt in one syscall.
/// Generous relative to `PROCESS_HEAP_SIZE` (64 KiB): a task simply can't
/// address a buffer larger than its own window anyway, this just rejects
/// the call before `uaccess` walks an absurd byte count.
pub const MAX_IO_SIZE: usize = 0x0010_0000;

pub struct SyscallValidator;

impl SyscallValidator {
    #[inline]
    pub fn validate_fd(fd: i32) -> Result<i32> {
        if fd < 0 || fd as usize >= RLIMIT_NOFILE {
            return Err(Errno::EBADF);
        }
        Ok(fd)
    }

    #[inline]
    pub fn validate_count(count: usize) -> Result<usize> {
        if count > MAX_IO_SIZE {
            return Err(Errno::EINVAL);
        }
        Ok(count)
    }

    #[inline]
    pub fn validate_mode(mode: u32) -> Result<u32> {
        const VALID_MODE_MASK: u32 = 0o7777;
        if mode & !VALID_MODE_MASK != 0 {
            return Err(Errno::EINVAL);
        }
        Ok(mode)
    }

    #[inline]
    pub fn validate_signal(sig: u32) -> Result<u32> {
        if sig < 1 || sig > MAX_SIGNALS {
            return Err(Errno::EINVAL);
        }
        Ok(sig)
    }

    /// `pid >= -1`; `-1` means "any child" to `waitpid`, `0` is reserved for
    /// a future process-group sense this kernel doesn't implement, `>0` is
    /// an ordinary pid.
    #[inline]
    pub fn validate_pid(pid: i32) -> Result<i32> {
        if pid < -1 {
            return Err(Errno::EINVAL);
        }
        Ok(pid)
    }

    #[inline]
    pub fn validate_waitpid_options(options: u32) -> Result<u32> {
        if options & !crate::process::scheduler::WNOHANG != 0 {
            return Err(Errno::EINVAL);
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fd_bounds_match_rlimit_nofile() {
        assert!(SyscallValidator::validate_fd(0).is_ok());
        assert!(SyscallValidator::validate_fd(RLIMIT_NOFILE as i32 - 1).is_ok());
        assert!(SyscallValidator::validate_fd(-1).is_err());
        assert!(SyscallValidator::validate_fd(RLIMIT_NOFILE as i32).is_err());
    }

    #[test]
    fn signal_bounds_match_max_signals() {
        assert!(SyscallValidator::validate_signal(1).is_ok());
        assert!(SyscallValidator::validate_signal(MAX_SIGNALS).is_ok());
        assert!(SyscallValidator::validate_signal(0).is_err());
        assert!(SyscallValidator::validate_signal(MAX_SIGNALS + 1).is_err());
    }

    #[test]
    fn pid_rejects_below_negative_one() {
        assert!(SyscallValidator::validate_pid(-1).is_ok());
        assert!(SyscallValidator::validate_pid(0).is_ok());
        assert!(SyscallValidator::validate_pid(-2).is_err());
    }
}
