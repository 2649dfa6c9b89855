//! Wait queues: a task blocks on one until some condition it cares about
//! (child exit, bytes available, a lock released) becomes true.
//!
//! The original links waiters through an intrusive doubly-linked list on
//! `struct task`. A plain `Vec<Pid>` is simpler here and the queues involved
//! (one per task's exit, one per TTY, one per pipe) are never large enough
//! for the O(n) remove to matter.

use alloc::vec::Vec;
use spin::Mutex;
use super::scheduler;
use super::task::{Pid, TaskState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// Wakes early (before `cond` is true) if a signal becomes pending,
    /// exiting the waiter with status -1.
    Interruptible,
    /// Ignores pending signals; only `cond` can end the wait.
    Uninterruptible,
}

#[derive(Default)]
pub struct WaitQueue {
    waiters: Vec<Pid>,
}

impl WaitQueue {
    pub const fn new() -> Self {
        Self { waiters: Vec::new() }
    }

    /// Idempotent: adding an already-queued pid is a no-op.
    fn add(&mut self, pid: Pid) {
        if !self.waiters.contains(&pid) {
            self.waiters.push(pid);
        }
    }

    fn remove(&mut self, pid: Pid) {
        self.waiters.retain(|&p| p != pid);
    }

    pub fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}

/// Block the current task until `cond()` holds, using `add`/`remove` to
/// attach and detach it from whatever queue backs the wakeup. Neither is
/// called while parked in `sched_schedule`, only immediately before and
/// after -- so a caller whose queue sits behind its own lock (e.g. a TTY's
/// `in_wait`, which an interrupt handler's `wakeup` also needs) can take
/// that lock just for the `add`/`remove` calls and must not hold it across
/// this function, or across `sched_schedule` in particular: doing so would
/// deadlock against a `wakeup` from interrupt context.
///
/// Detaches itself from the queue on every wakeup to re-check `cond`, so a
/// spurious wakeup (another waiter's event firing first) just loops back
/// to sleep instead of returning early. Under `Interruptible`, a pending
/// signal observed after a wakeup ends the wait via `sched_exit(-1)`
/// instead of returning to the caller at all.
pub fn wait_event_with(
    mode: WaitMode,
    mut cond: impl FnMut() -> bool,
    mut add: impl FnMut(Pid),
    mut remove: impl FnMut(Pid),
) {
    loop {
        if cond() {
            return;
        }

        let pid = match scheduler::current_pid() {
            Some(pid) => pid,
            None => return,
        };

        let state = match mode {
            WaitMode::Interruptible => TaskState::Interruptible,
            WaitMode::Uninterruptible => TaskState::Uninterruptible,
        };
        scheduler::set_state(pid, state);
        add(pid);

        scheduler::sched_schedule();

        remove(pid);

        if mode == WaitMode::Interruptible && scheduler::current_has_pending_signals() {
            scheduler::sched_exit(-1);
        }
    }
}

/// `wait_event_with` for a queue the caller already holds exclusively
/// (e.g. one reached through a raw pointer under the scheduler's own
/// lock, which already disables interrupts for the whole critical
/// section). Not for a queue any interrupt handler also locks on its own
/// -- see `wait_event_with`'s doc comment.
pub fn wait_event(queue: &mut WaitQueue, mode: WaitMode, cond: impl FnMut() -> bool) {
    let queue = queue as *mut WaitQueue;
    // SAFETY: `add` and `remove` below never overlap (this function runs
    // them strictly in sequence), so the two closures never alias the
    // pointee at the same time despite both capturing the raw pointer.
    wait_event_with(mode, cond, |pid| unsafe { (*queue).add(pid) }, |pid| unsafe { (*queue).remove(pid) });
}

/// `wait_event_with` for a queue behind its own `Mutex`, locking only
/// around `add`/`remove` and never across `sched_schedule`, so a `wakeup`
/// from interrupt context can always take the lock.
pub fn wait_event_locked(queue: &Mutex<WaitQueue>, mode: WaitMode, cond: impl FnMut() -> bool) {
    wait_event_with(mode, cond, |pid| queue.lock().add(pid), |pid| queue.lock().remove(pid));
}

/// Move every still-sleeping waiter on `queue` onto the run queue.
///
/// Detaches the whole list up front before walking it: a waiter added
/// concurrently by an interrupt handler mid-walk (e.g. a second byte
/// arriving on a TTY while its read queue is being drained) lands in the
/// next `wakeup`, not this one, which keeps this pass's iteration count
/// bounded by what it observed at entry.
pub fn wakeup(queue: &mut WaitQueue) {
    let waiters = core::mem::take(&mut queue.waiters);
    for pid in waiters {
        if scheduler::is_sleeping(pid) {
            scheduler::sched_enqueue(pid);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent() {
        let mut q = WaitQueue::new();
        q.add(7);
        q.add(7);
        assert_eq!(q.waiters.len(), 1);
    }

    #[test]
    fn remove_drops_only_the_matching_pid() {
        let mut q = WaitQueue::new();
        q.add(1);
        q.add(2);
        q.remove(1);
        assert_eq!(q.waiters, alloc::vec![2]);
    }

    #[test]
    fn wakeup_detaches_everyone_even_if_none_are_sleeping() {
        let mut q = WaitQueue::new();
        q.add(1);
        q.add(2);
        wakeup(&mut q);
        assert!(q.is_empty());
    }
}
