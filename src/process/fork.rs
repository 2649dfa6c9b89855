//! `fork`: eager duplication, no copy-on-write.
//!
//! Everything the child needs is copied up front: address space, kernel
//! stack, open files, cwd. What this does NOT decide is the child's
//! `fork()` return value (0) versus the parent's (child pid) — which
//! register that lands in is a syscall-ABI concern that belongs to the
//! syscall dispatcher, not here. This only guarantees the child resumes
//! with the same saved registers and instruction pointer the parent had
//! at the moment of the call; the dispatcher patches the return value
//! once it takes over the trap frame.

use alloc::vec::Vec;
use crate::arch::x86::context::Context;
use crate::lib::error::Errno;
use crate::mm::{self, AddressSpace, PageTable};
use super::scheduler;
use super::task::{Pid, Task, TaskState, KERNEL_STACK_SIZE};
use super::wait::WaitQueue;

pub fn do_fork(parent_pid: Pid, kernel_dir: &PageTable) -> Result<Pid, Errno> {
    let child_pid = scheduler::spawn_child(parent_pid, |child_pid, parent| {
        let mm = AddressSpace::fork_from(&parent.mm, Task::slot_of(child_pid), kernel_dir, mm::alloc_frame)?;

        let mut kstack = alloc::boxed::Box::new([0u8; KERNEL_STACK_SIZE]);
        kstack.copy_from_slice(&parent.kstack[..]);
        let parent_base = parent.kstack.as_ptr() as u32;
        let child_base = kstack.as_ptr() as u32;
        let esp_offset = parent.cpu_context.esp.wrapping_sub(parent_base);
        let cpu_context = Context { esp: child_base.wrapping_add(esp_offset) };

        Ok(Task {
            pid: child_pid,
            ppid: parent.pid,
            state: TaskState::Pooled,
            exit_status: 0,
            mm,
            files: parent.files.fork_share(),
            name: parent.name.clone(),
            cwd: parent.cwd.clone(),
            ctty: parent.ctty,
            children: Vec::new(),
            wait_exit: WaitQueue::new(),
            pending_signals: 0,
            ctxt: 0,
            cpu_context,
            kstack,
            next: None,
        })
    })
    .map_err(Errno::from)?;

    scheduler::sched_enqueue(child_pid);
    Ok(child_pid)
}

/// `execve`: not yet implemented. Replacing the current task's image in
/// place needs the ELF32 loader (argv/envp heap layout, program lookup),
/// which is a separate, not-yet-built piece of the process subsystem.
pub fn do_execve(_pid: Pid, _path: &str, _argv: &[&str], _envp: &[&str]) -> Result<(), Errno> {
    Err(Errno::ENOSYS)
}
