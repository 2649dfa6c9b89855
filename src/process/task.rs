//! The task: one process. There is no separate thread concept in this
//! kernel, a task is both.

use crate::lib::bounded_string::BoundedString;
use crate::lib::error::{Errno, KernelError};
use crate::mm::{AddressSpace, PageTable};
use crate::arch::x86::context::Context;
use super::task_table::MAX_PROCESS_CNT;
use super::wait::WaitQueue;
use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

pub type Pid = i32;
pub const PID_NONE: Pid = -1;

pub const MAX_PROCESS_NAME_LEN: usize = 64;
pub const MAX_PATH_LEN: usize = 256;
pub const MAX_SIGNALS: u32 = 32;
pub const RLIMIT_NOFILE: usize = 32;
pub const KERNEL_STACK_SIZE: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Exists but inactive: not runnable, not queued. The state a freed slot
    /// sits in until it's reallocated.
    Pooled,
    /// Runnable, waiting in the run queue.
    Queued,
    /// Currently the scheduler's `current`.
    Running,
    /// Sleeping; a pending signal on wake causes `sched_exit(-1)`.
    Interruptible,
    /// Sleeping; signals are not observed on wake.
    Uninterruptible,
    /// Exited, not yet reaped by the parent's `waitpid`. The slot stays
    /// resident -- `sched_exit` runs on the exiting task's own kernel stack
    /// and switches away without freeing it -- until `sched_waitpid` matches
    /// it against its recorded exit status and frees the slot and address
    /// space there.
    Zombie,
}

/// Per-task open file descriptor table. Fixed capacity, lowest-available-fd
/// allocation (POSIX requires the lowest free fd, not just any free one).
pub struct FileTable {
    slots: [Option<Arc<crate::vfs::File>>; RLIMIT_NOFILE],
}

impl FileTable {
    pub fn new() -> Self {
        Self { slots: core::array::from_fn(|_| None) }
    }

    pub fn alloc_fd(&mut self, file: Arc<crate::vfs::File>) -> Result<i32, Errno> {
        for (fd, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(file);
                return Ok(fd as i32);
            }
        }
        Err(Errno::EMFILE)
    }

    pub fn get(&self, fd: i32) -> Result<Arc<crate::vfs::File>, Errno> {
        if fd < 0 || fd as usize >= self.slots.len() {
            return Err(Errno::EBADF);
        }
        self.slots[fd as usize].clone().ok_or(Errno::EBADF)
    }

    /// Release `fd`, returning the file object so the caller can invoke its
    /// `close` op (VFS's responsibility, not the file table's).
    pub fn close(&mut self, fd: i32) -> Result<Arc<crate::vfs::File>, Errno> {
        if fd < 0 || fd as usize >= self.slots.len() {
            return Err(Errno::EBADF);
        }
        self.slots[fd as usize].take().ok_or(Errno::EBADF)
    }

    /// Duplicate every occupied slot (Arc clone, not a deep copy): the
    /// POSIX `fork` contract shares open files between parent and child.
    pub fn fork_share(&self) -> Self {
        let mut child = Self::new();
        for (fd, slot) in self.slots.iter().enumerate() {
            child.slots[fd] = slot.clone();
        }
        child
    }
}

impl Default for FileTable {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Task {
    pub pid: Pid,
    /// Never PID_NONE: the first task in the system is its own parent.
    pub ppid: Pid,
    pub state: TaskState,
    pub exit_status: i32,
    pub mm: AddressSpace,
    pub files: FileTable,
    pub name: BoundedString<MAX_PROCESS_NAME_LEN>,
    pub cwd: BoundedString<MAX_PATH_LEN>,
    /// Index into the TTY table, if this task has a controlling terminal.
    pub ctty: Option<usize>,
    pub children: Vec<Pid>,
    pub wait_exit: WaitQueue,
    pub pending_signals: u32,
    /// Number of times this task has been scheduled in.
    pub ctxt: u64,
    pub cpu_context: Context,
    pub kstack: Box<[u8; KERNEL_STACK_SIZE]>,
    /// Linked into the run queue by the scheduler; `None` when not queued.
    pub(super) next: Option<Pid>,
}

impl Task {
    /// Resolve the task-table slot a pid belongs to. Matches
    /// `task_table`'s own masking so a task can locate its fixed address
    /// window without the table handing the slot index back separately.
    pub fn slot_of(pid: Pid) -> usize {
        (pid as u32 & (MAX_PROCESS_CNT as u32 - 1)) as usize
    }

    pub fn new(
        pid: Pid,
        ppid: Pid,
        kernel_dir: &PageTable,
        mut alloc_frame: impl FnMut() -> Option<u32>,
    ) -> Result<Self, KernelError> {
        let slot = Self::slot_of(pid);
        let mm = AddressSpace::new(slot, kernel_dir, &mut alloc_frame)?;
        let kstack = Box::new([0u8; KERNEL_STACK_SIZE]);

        Ok(Self {
            pid,
            ppid,
            state: TaskState::Pooled,
            exit_status: 0,
            mm,
            files: FileTable::new(),
            name: BoundedString::new(),
            cwd: BoundedString::from("/"),
            ctty: None,
            children: Vec::new(),
            wait_exit: WaitQueue::new(),
            pending_signals: 0,
            ctxt: 0,
            cpu_context: Context::new(),
            kstack,
            next: None,
        })
    }

    pub fn kstack_top(&self) -> u32 {
        let base = self.kstack.as_ptr() as u32;
        base + KERNEL_STACK_SIZE as u32
    }

    pub fn set_pending_signal(&mut self, sig: u32) {
        if sig >= 1 && sig <= MAX_SIGNALS {
            self.pending_signals |= 1 << (sig - 1);
        }
    }

    pub fn has_pending_signals(&self) -> bool {
        self.pending_signals != 0
    }

    pub fn is_sleeping(&self) -> bool {
        matches!(self.state, TaskState::Interruptible | TaskState::Uninterruptible)
    }
}

impl core::fmt::Debug for Task {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Task")
            .field("pid", &self.pid)
            .field("ppid", &self.ppid)
            .field("state", &self.state)
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
impl Task {
    /// Builds a task without a real address space, for task-table unit
    /// tests that only exercise allocation/generation bookkeeping.
    pub fn new_for_test(pid: Pid) -> Self {
        Self {
            pid,
            ppid: pid,
            state: TaskState::Pooled,
            exit_status: 0,
            mm: AddressSpace::new_for_test(Self::slot_of(pid)),
            files: FileTable::new(),
            name: BoundedString::new(),
            cwd: BoundedString::from("/"),
            ctty: None,
            children: Vec::new(),
            wait_exit: WaitQueue::new(),
            pending_signals: 0,
            ctxt: 0,
            cpu_context: Context::new(),
            kstack: Box::new([0u8; KERNEL_STACK_SIZE]),
            next: None,
        }
    }
}
