//! The scheduler: a FIFO run queue threaded through the task table, plus
//! the swapper idle task the queue falls back to when empty.
//!
//! There is no timer preemption in this build (see the non-goals list):
//! a task only gives up the CPU by blocking in `wait_event` or by calling
//! `sched_exit`. `sched_schedule` itself is otherwise a direct port of the
//! original's run-queue-poll-then-switch loop.

use alloc::vec::Vec;
use spin::Mutex;
use crate::arch::x86::context::{self, Context};
use crate::lib::error::{Errno, KernelError};
use crate::mm::{self, PageTable};
use super::task::{Pid, Task, TaskState, MAX_SIGNALS};
use super::task_table::TaskTable;
use super::wait::{self, WaitMode, WaitQueue};

pub const WNOHANG: u32 = 1;

struct RunQueue {
    head: Option<Pid>,
    tail: Option<Pid>,
}

impl RunQueue {
    const fn new() -> Self {
        Self { head: None, tail: None }
    }
}

fn run_queue_push(table: &mut TaskTable, rq: &mut RunQueue, pid: Pid) {
    if let Some(task) = table.find_by_pid_mut(pid) {
        task.next = None;
    }
    match rq.tail {
        Some(tail_pid) => {
            if let Some(tail_task) = table.find_by_pid_mut(tail_pid) {
                tail_task.next = Some(pid);
            }
        }
        None => rq.head = Some(pid),
    }
    rq.tail = Some(pid);
}

fn run_queue_poll(table: &mut TaskTable, rq: &mut RunQueue) -> Option<Pid> {
    let pid = rq.head?;
    let next = table.find_by_pid_mut(pid).and_then(|task| task.next.take());
    rq.head = next;
    if next.is_none() {
        rq.tail = None;
    }
    Some(pid)
}

struct Scheduler {
    table: TaskTable,
    run_queue: RunQueue,
    current: Option<Pid>,
    swapper: Pid,
    /// Pid, parent pid, and exit status of every task that has run
    /// `sched_exit` but not yet been reaped by its parent's `sched_waitpid`.
    /// The task itself stays resident in the table as `TaskState::Zombie`
    /// until reaped -- `sched_exit` runs on the exiting task's own kernel
    /// stack, so its slot and address space cannot be freed until control
    /// has switched away from it; `sched_waitpid` does that teardown once
    /// it matches an entry here.
    exited: Vec<(Pid, Pid, i32)>,
    /// Total context switches, surfaced at `/proc/stat`'s `ctxt` line.
    ctxt: u64,
}

static SCHED: Mutex<Option<Scheduler>> = Mutex::new(None);

extern "C" fn swapper_entry(_entry: u32, _argc: i32, _argv: u32) -> ! {
    loop {
        unsafe { core::arch::asm!("sti", "hlt", options(nomem, nostack)) };
    }
}

fn with_sched<R>(f: impl FnOnce(&mut Scheduler) -> R) -> R {
    crate::arch::x86::without_interrupts(|| {
        let mut guard = SCHED.lock();
        let sched = guard.as_mut().expect("scheduler used before init()");
        f(sched)
    })
}

/// Bring up the scheduler: build the task table and allocate the swapper,
/// the idle task the run queue falls back to whenever it is empty. Must
/// run once, after paging and the buddy allocator are both initialized.
pub fn init(kernel_dir: &PageTable) {
    let mut table = TaskTable::new();
    let swapper = table
        .alloc(|pid| {
            let mut task = Task::new(pid, pid, kernel_dir, mm::alloc_frame)?;
            task.name.set("swapper");
            task.state = TaskState::Running;
            let stack_top = task.kstack_top();
            task.cpu_context = context::init_context(stack_top, swapper_entry, 0, 0, 0);
            Ok(task)
        })
        .expect("failed to allocate the swapper task")
        .expect("an empty task table has room for its first allocation");

    *SCHED.lock() = Some(Scheduler {
        table,
        run_queue: RunQueue::new(),
        current: Some(swapper),
        swapper,
        exited: Vec::new(),
        ctxt: 0,
    });
}

/// The currently running task's pid, or `None` if nothing is running yet
/// or the swapper itself is current (the swapper is not a schedulable
/// task from any caller's point of view, only the fallback idle loop).
pub fn current_pid() -> Option<Pid> {
    with_sched(|sched| sched.current.filter(|&pid| pid != sched.swapper))
}

pub fn set_state(pid: Pid, state: TaskState) {
    with_sched(|sched| {
        if let Some(task) = sched.table.find_by_pid_mut(pid) {
            task.state = state;
        }
    });
}

pub fn is_sleeping(pid: Pid) -> bool {
    with_sched(|sched| sched.table.find_by_pid(pid).map(Task::is_sleeping).unwrap_or(false))
}

/// Run `f` against `pid`'s task, e.g. to read or update its cwd or
/// controlling tty. `None` if the pid no longer resolves.
pub fn with_task<R>(pid: Pid, f: impl FnOnce(&mut Task) -> R) -> Option<R> {
    with_sched(|sched| sched.table.find_by_pid_mut(pid).map(f))
}

/// Every pid currently occupying a task-table slot, swapper excluded --
/// `/proc`'s directory listing.
pub fn list_pids() -> Vec<Pid> {
    with_sched(|sched| {
        sched
            .table
            .iter()
            .map(|t| t.pid)
            .filter(|&pid| pid != sched.swapper)
            .collect()
    })
}

pub fn current_has_pending_signals() -> bool {
    with_sched(|sched| {
        sched
            .current
            .and_then(|pid| sched.table.find_by_pid(pid))
            .map(Task::has_pending_signals)
            .unwrap_or(false)
    })
}

/// Move `pid` onto the run queue, marking it `Queued`. Used both by
/// `wait::wakeup` and by `sched_kill` re-enqueuing a signalled sleeper.
pub fn sched_enqueue(pid: Pid) {
    with_sched(|sched| {
        if let Some(task) = sched.table.find_by_pid_mut(pid) {
            task.state = TaskState::Queued;
        }
        run_queue_push(&mut sched.table, &mut sched.run_queue, pid);
    });
}

pub fn sched_kill(pid: Pid, sig: u32) -> Result<(), Errno> {
    if sig < 1 || sig > MAX_SIGNALS {
        return Err(Errno::EINVAL);
    }

    let was_sleeping = with_sched(|sched| {
        let task = sched.table.find_by_pid_mut(pid).ok_or(Errno::ESRCH)?;
        task.set_pending_signal(sig);
        Ok::<bool, Errno>(task.is_sleeping())
    })?;

    if was_sleeping {
        sched_enqueue(pid);
    }
    Ok(())
}

/// Pick the next task to run and switch to it. Falls back to the swapper
/// when the run queue is empty, and skips the switch entirely if the
/// swapper is already current (nothing would change).
pub fn sched_schedule() {
    struct SwitchPlan {
        prev_ctx: *mut Context,
        next_ctx: *const Context,
        next_cr3: u32,
    }

    let plan = with_sched(|sched| -> Option<SwitchPlan> {
        let prev_pid = sched.current.expect("sched_schedule called with no current task");
        let next_pid = run_queue_poll(&mut sched.table, &mut sched.run_queue).unwrap_or(sched.swapper);

        if next_pid == sched.swapper && prev_pid == sched.swapper {
            let still_running = sched.table.find_by_pid(prev_pid).map(|t| t.state) == Some(TaskState::Running);
            if still_running {
                return None;
            }
        }

        if let Some(prev_task) = sched.table.find_by_pid_mut(prev_pid) {
            if prev_task.state == TaskState::Running {
                prev_task.state = TaskState::Queued;
            }
        }
        let prev_queued = sched.table.find_by_pid(prev_pid).map(|t| t.state) == Some(TaskState::Queued);
        if prev_pid != sched.swapper && prev_queued {
            run_queue_push(&mut sched.table, &mut sched.run_queue, prev_pid);
        }

        if let Some(next_task) = sched.table.find_by_pid_mut(next_pid) {
            next_task.state = TaskState::Running;
            next_task.ctxt += 1;
        }
        sched.current = Some(next_pid);
        sched.ctxt += 1;

        let prev_ctx = sched.table.find_by_pid_mut(prev_pid).map(|t| &mut t.cpu_context as *mut Context)?;
        let next = sched.table.find_by_pid(next_pid).expect("next task vanished mid-switch");
        Some(SwitchPlan { prev_ctx, next_ctx: &next.cpu_context as *const Context, next_cr3: next.mm.page_dir })
    });

    if let Some(plan) = plan {
        unsafe {
            core::arch::asm!("mov cr3, {}", in(reg) plan.next_cr3, options(nostack, preserves_flags));
            context::switch_to(&mut *plan.prev_ctx, &*plan.next_ctx);
        }
    }
}

/// Tear down the current task and never return. Marks it a zombie, records
/// its exit status for a parent's `sched_waitpid` to pick up, and switches
/// away -- the slot and address space are freed later, by the reaper, since
/// this call runs on the exiting task's own kernel stack and can't free
/// either out from under itself.
pub fn sched_exit(status: i32) -> ! {
    let (swapper, pid, ppid) = with_sched(|sched| {
        let pid = sched.current.expect("sched_exit called with no current task");
        let ppid = sched.table.find_by_pid(pid).map(|t| t.ppid).unwrap_or(pid);
        (sched.swapper, pid, ppid)
    });

    if pid != swapper {
        // Wake this task's waiters (a parent blocked in sched_waitpid)
        // while it is still resident: freeing it first would drop the
        // wait queue wakeup needs to walk.
        let wait_ptr: *mut WaitQueue = with_sched(|sched| {
            let task = sched.table.find_by_pid_mut(pid).expect("current task vanished");
            task.exit_status = status;
            task.state = TaskState::Zombie;
            &mut task.wait_exit as *mut _
        });
        unsafe { wait::wakeup(&mut *wait_ptr) };

        with_sched(|sched| sched.exited.push((pid, ppid, status)));
    }

    // `current` stays pointing at this (now-zombie) task: `sched_schedule`
    // reads it as `prev` to save the outgoing context into, which is safe
    // because a zombie's saved context is never resumed.
    sched_schedule();
    unreachable!("sched_schedule never returns into an exited task");
}

/// `waitpid`: `target > 0` waits for that specific child; `target == -1`
/// waits for any child of the calling task. Returns the reaped child's
/// pid and exit status, or `(0, 0)` for a `WNOHANG` call that found
/// nothing ready yet.
pub fn sched_waitpid(target: Pid, options: u32) -> Result<(Pid, i32), Errno> {
    if options & !WNOHANG != 0 {
        return Err(Errno::EINVAL);
    }
    if target < -1 {
        return Err(Errno::EINVAL); // process groups are not implemented
    }

    loop {
        let reaped = with_sched(|sched| {
            let caller = sched.current;
            let idx = sched.exited.iter().position(|&(pid, ppid, _)| {
                if target == -1 {
                    caller == Some(ppid)
                } else {
                    pid == target
                }
            })?;
            Some(sched.exited.remove(idx))
        });
        if let Some((pid, _, status)) = reaped {
            with_sched(|sched| {
                let freed = sched.table.free(pid);
                mm::free_user_mappings(freed.mm.dir(), mm::free_frame);
                mm::free_frame(freed.mm.page_dir);
            });
            return Ok((pid, status));
        }

        if options & WNOHANG != 0 {
            let child_alive = with_sched(|sched| {
                let caller = sched.current;
                if target == -1 {
                    caller.map(|c| sched.table.iter().any(|t| t.ppid == c && t.pid != c)).unwrap_or(false)
                } else {
                    sched.table.find_by_pid(target).is_some()
                }
            });
            return Ok((if child_alive { 0 } else { target.max(0) }, 0));
        }

        if target == -1 {
            // No single wait queue represents "any child"; yield and
            // re-check rather than pick one child's queue arbitrarily.
            sched_schedule();
            continue;
        }

        let wait_ptr = with_sched(|sched| sched.table.find_by_pid_mut(target).map(|t| &mut t.wait_exit as *mut WaitQueue));
        match wait_ptr {
            Some(ptr) => unsafe {
                wait::wait_event(&mut *ptr, WaitMode::Interruptible, || {
                    with_sched(|sched| sched.exited.iter().any(|&(pid, _, _)| pid == target))
                });
            },
            None => return Ok((target, 0)),
        }
    }
}

pub fn ctxt() -> u64 {
    with_sched(|sched| sched.ctxt)
}

/// Allocate a new task row linked as a child of `parent_pid`. `build`
/// receives the freshly assigned child pid and a read-only view of the
/// parent to copy whatever the caller needs (address space, open files,
/// cwd, controlling tty) from. The child is left `Pooled`, not queued;
/// the caller enqueues it with `sched_enqueue` once it's fully built.
pub fn spawn_child(
    parent_pid: Pid,
    build: impl FnOnce(Pid, &Task) -> Result<Task, KernelError>,
) -> Result<Pid, KernelError> {
    with_sched(|sched| {
        let parent_ptr: *const Task =
            sched.table.find_by_pid(parent_pid).ok_or(KernelError::NoProcess)?;
        // SAFETY: `build` only reads through `parent`; `alloc` below only
        // mutates the free ring and the freshly assigned child slot, never
        // the parent's.
        let parent = unsafe { &*parent_ptr };
        let child_pid = sched
            .table
            .alloc(|pid| build(pid, parent))?
            .ok_or(KernelError::TableFull)?;

        if let Some(parent_task) = sched.table.find_by_pid_mut(parent_pid) {
            parent_task.children.push(child_pid);
        }

        Ok(child_pid)
    })
}

/// Allocate a new, unrelated task row (`process::exec::spawn`'s use case,
/// as opposed to `spawn_child`'s fork). `build` sees `None` for the very
/// first task the system ever creates (nothing is current yet beyond the
/// swapper) and `Some(&current task)` otherwise; a task spawned with a
/// live parent is linked into that parent's `children`, one spawned with
/// none is its own parent, same as `spawn_child`'s fork ancestor.
pub fn spawn_new(
    build: impl FnOnce(Pid, Option<&Task>) -> Result<Task, KernelError>,
) -> Result<Pid, KernelError> {
    with_sched(|sched| {
        let parent_pid = sched.current.filter(|&pid| pid != sched.swapper);
        // SAFETY: same justification as `spawn_child` — `build` only reads
        // through `parent`, and `alloc` below never touches the parent's slot.
        let parent = unsafe { parent_pid.and_then(|pid| sched.table.find_by_pid(pid)).map(|t| &*(t as *const Task)) };

        let child_pid = sched.table.alloc(|pid| build(pid, parent))?.ok_or(KernelError::TableFull)?;

        if let Some(ppid) = parent_pid {
            if let Some(parent_task) = sched.table.find_by_pid_mut(ppid) {
                parent_task.children.push(child_pid);
            }
        }

        Ok(child_pid)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn(table: &mut TaskTable) -> Pid {
        table.alloc(|pid| Ok(Task::new_for_test(pid))).unwrap().unwrap()
    }

    #[test]
    fn run_queue_is_fifo() {
        let mut table = TaskTable::new();
        let mut rq = RunQueue::new();
        let a = spawn(&mut table);
        let b = spawn(&mut table);
        let c = spawn(&mut table);

        run_queue_push(&mut table, &mut rq, a);
        run_queue_push(&mut table, &mut rq, b);
        run_queue_push(&mut table, &mut rq, c);

        assert_eq!(run_queue_poll(&mut table, &mut rq), Some(a));
        assert_eq!(run_queue_poll(&mut table, &mut rq), Some(b));
        assert_eq!(run_queue_poll(&mut table, &mut rq), Some(c));
        assert_eq!(run_queue_poll(&mut table, &mut rq), None);
    }

    #[test]
    fn poll_on_empty_queue_is_none() {
        let mut table = TaskTable::new();
        let mut rq = RunQueue::new();
        assert_eq!(run_queue_poll(&mut table, &mut rq), None);
    }

    #[test]
    fn requeuing_nulls_the_previous_tail_link() {
        let mut table = TaskTable::new();
        let mut rq = RunQueue::new();
        let a = spawn(&mut table);
        run_queue_push(&mut table, &mut rq, a);
        assert_eq!(run_queue_poll(&mut table, &mut rq), Some(a));
        // a was unlinked; pushing it again must not resurrect a stale `next`.
        run_queue_push(&mut table, &mut rq, a);
        assert_eq!(table.find_by_pid(a).unwrap().next, None);
    }
}
