//! Pointer validation for syscall arguments.
//!
//! There is no ring-3/ring-0 split on this kernel (every task runs at ring
//! 0, flat segmentation) and no separate user/kernel virtual address
//! range: a task's pointers are just addresses inside its own fixed
//! `PROCESS_BASE + slot * PROCESS_SIZE` window, and that window is exactly
//! what's mapped by the page directory `cr3` already points at while the
//! task is running. So validation here isn't about crossing a privilege
//! boundary (there isn't one) -- it's a bounds check against the calling
//! task's window, so a syscall given a garbage or out-of-range pointer
//! returns `EFAULT` to its caller instead of touching memory it doesn't
//! own. A pointer that passes this check but isn't actually backed by a
//! mapped page (e.g. past `brk`) still faults, and this kernel's
//! page-fault policy is to panic, not recover: see `mm::fault`.

use crate::lib::error::{Errno, Result};
use crate::mm::PROCESS_SIZE;
use crate::process;
use alloc::string::String;
use alloc::vec::Vec;
use core::ptr;

fn current_window() -> Result<(usize, usize)> {
    let pid = process::current_pid().ok_or(Errno::EFAULT)?;
    process::with_task(pid, |t| {
        let base = crate::mm::slot_base(t.mm.slot) as usize;
        (base, base + PROCESS_SIZE as usize)
    })
    .ok_or(Errno::EFAULT)
}

/// Bounds-check `[ptr, ptr+len)` against the calling task's address
/// window. Zero-length ranges at a non-null pointer are allowed.
pub fn validate_user_range(ptr: usize, len: usize) -> Result<()> {
    if ptr == 0 {
        return Err(Errno::EFAULT);
    }
    let end = ptr.checked_add(len).ok_or(Errno::EFAULT)?;
    let (base, limit) = current_window()?;
    if ptr < base || end > limit {
        return Err(Errno::EFAULT);
    }
    Ok(())
}

pub fn validate_user_read(ptr: *const u8, len: usize) -> Result<()> {
    validate_user_range(ptr as usize, len)
}

pub fn validate_user_write(ptr: *mut u8, len: usize) -> Result<()> {
    validate_user_range(ptr as usize, len)
}

/// Copy `count` elements of `T` out of the calling task's window.
pub fn copy_from_user<T: Copy>(user_ptr: *const T, count: usize) -> Result<Vec<T>> {
    let total_size = count.checked_mul(core::mem::size_of::<T>()).ok_or(Errno::EINVAL)?;
    validate_user_range(user_ptr as usize, total_size)?;

    if count == 0 {
        return Ok(Vec::new());
    }

    let mut buf = Vec::with_capacity(count);
    unsafe {
        ptr::copy_nonoverlapping(user_ptr, buf.as_mut_ptr(), count);
        buf.set_len(count);
    }
    Ok(buf)
}

/// Copy `data` into the calling task's window at `user_ptr`.
pub fn copy_to_user<T: Copy>(user_ptr: *mut T, data: &[T]) -> Result<()> {
    let total_size = data.len() * core::mem::size_of::<T>();
    validate_user_range(user_ptr as usize, total_size)?;

    if data.is_empty() {
        return Ok(());
    }

    unsafe { ptr::copy_nonoverlapping(data.as_ptr(), user_ptr, data.len()) };
    Ok(())
}

/// Read a NUL-terminated string out of the calling task's window, up to
/// `max_len` bytes.
pub fn copy_string_from_user(user_ptr: *const u8, max_len: usize) -> Result<String> {
    validate_user_range(user_ptr as usize, max_len)?;

    let mut bytes = Vec::new();
    unsafe {
        for i in 0..max_len {
            let byte = ptr::read(user_ptr.add(i));
            if byte == 0 {
                break;
            }
            bytes.push(byte);
        }
    }

    String::from_utf8(bytes).map_err(|_| Errno::EINVAL)
}

/// Read a NULL-terminated array of NUL-terminated strings (an `argv` or
/// `envp` vector) out of the calling task's window. `max_entries` bounds
/// the array length and `max_str_len` bounds each string, the same way
/// `copy_string_from_user` bounds a single one.
pub fn copy_str_array_from_user(
    array_ptr: *const *const u8,
    max_entries: usize,
    max_str_len: usize,
) -> Result<Vec<String>> {
    if array_ptr.is_null() {
        return Ok(Vec::new());
    }

    let ptr_size = core::mem::size_of::<*const u8>();
    let mut strings = Vec::new();
    for i in 0..max_entries {
        validate_user_range(array_ptr as usize + i * ptr_size, ptr_size)?;
        let entry = unsafe { ptr::read(array_ptr.add(i)) };
        if entry.is_null() {
            return Ok(strings);
        }
        strings.push(copy_string_from_user(entry, max_str_len)?);
    }
    Err(Errno::EINVAL)
}
