//! Task table: fixed-capacity slot array with generation-tagged PIDs.
//!
//! A PID's low bits are the slot index; the high bits are a per-slot
//! generation counter that increments every time the slot is reused, so a
//! PID captured before a `free` never resolves to whatever task later moves
//! into that slot. `MAX_PROCESS_CNT` must stay a power of two: slot lookup is
//! `pid & (MAX_PROCESS_CNT - 1)`, not a modulo.

use super::task::{Pid, Task, PID_NONE};
use crate::lib::error::KernelError;
use alloc::boxed::Box;
use alloc::vec::Vec;

pub const MAX_PROCESS_CNT: usize = 64;
const PID_MASK: u32 = (MAX_PROCESS_CNT - 1) as u32;
const MAX_GENERATION: u32 = (i32::MAX as u32) / MAX_PROCESS_CNT as u32;

struct Slot {
    task: Option<Box<Task>>,
    generation: u32,
}

pub struct TaskTable {
    free_ring: [u32; MAX_PROCESS_CNT],
    free_head: u32,
    free_tail: u32,
    slots: Vec<Slot>,
}

impl TaskTable {
    pub fn new() -> Self {
        let mut free_ring = [0u32; MAX_PROCESS_CNT];
        let mut slots = Vec::with_capacity(MAX_PROCESS_CNT);
        for i in 0..MAX_PROCESS_CNT {
            free_ring[i] = i as u32;
            slots.push(Slot { task: None, generation: 0 });
        }
        Self { free_ring, free_head: 0, free_tail: MAX_PROCESS_CNT as u32, slots }
    }

    /// Allocate a free slot and construct its task via `build(pid)`.
    ///
    /// Returns `Ok(None)` if the free ring is empty (table is at capacity).
    /// If `build` fails, the free-ring slot is left untouched: a failed
    /// construction (e.g. `AddressSpace::new` hitting `OutOfMemory`) must
    /// not burn a slot that was never actually handed out.
    pub fn alloc(
        &mut self,
        build: impl FnOnce(Pid) -> Result<Task, KernelError>,
    ) -> Result<Option<Pid>, KernelError> {
        if self.free_head == self.free_tail {
            return Ok(None);
        }

        let free_ring_idx = (self.free_head & PID_MASK) as usize;
        let slot_idx = self.free_ring[free_ring_idx] as usize;
        let generation = self.slots[slot_idx].generation;
        let pid = (generation * MAX_PROCESS_CNT as u32 + slot_idx as u32) as Pid;

        let task = build(pid)?;

        let slot = &mut self.slots[slot_idx];
        slot.generation = (generation + 1) & MAX_GENERATION;
        slot.task = Some(Box::new(task));
        self.free_head += 1;

        Ok(Some(pid))
    }

    pub fn find_by_pid(&self, pid: Pid) -> Option<&Task> {
        if pid < 0 {
            return None;
        }
        let slot_idx = (pid as u32 & PID_MASK) as usize;
        match &self.slots[slot_idx].task {
            Some(task) if task.pid == pid => Some(task),
            _ => None,
        }
    }

    pub fn find_by_pid_mut(&mut self, pid: Pid) -> Option<&mut Task> {
        if pid < 0 {
            return None;
        }
        let slot_idx = (pid as u32 & PID_MASK) as usize;
        match &mut self.slots[slot_idx].task {
            Some(task) if task.pid == pid => Some(task),
            _ => None,
        }
    }

    /// Release `pid`'s slot back to the free ring and hand back its task for
    /// the caller to tear down (free its address space, wake its waiters).
    ///
    /// Panics on double-free (ring already full) or if `pid` does not
    /// resolve to an occupied slot, matching the original's fatal-on-
    /// corruption policy: these conditions mean a kernel bug, not a
    /// reportable error.
    pub fn free(&mut self, pid: Pid) -> Box<Task> {
        if self.free_tail - self.free_head == MAX_PROCESS_CNT as u32 {
            panic!("task_table: free on an already-full free ring (double free)");
        }
        if pid < 0 {
            panic!("task_table: free called with a negative pid");
        }

        let slot_idx = (pid as u32 & PID_MASK) as usize;
        let free_ring_idx = (self.free_tail & PID_MASK) as usize;
        let slot = &mut self.slots[slot_idx];

        let task = match slot.task.take() {
            Some(task) if task.pid == pid => task,
            Some(task) => {
                slot.task = Some(task);
                panic!("task_table: pid {} does not match its slot's occupant", pid);
            }
            None => panic!("task_table: pid {} resolves to an empty slot", pid),
        };

        self.free_ring[free_ring_idx] = slot_idx as u32;
        self.free_tail += 1;

        task
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.slots.iter().filter_map(|slot| slot.task.as_deref())
    }
}

#[allow(dead_code)]
const _: Pid = PID_NONE;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::task::TaskState;

    fn make(pid: Pid) -> Result<Task, KernelError> {
        Ok(Task::new_for_test(pid))
    }

    fn alloc_ok(table: &mut TaskTable) -> Option<Pid> {
        table.alloc(make).expect("make() is infallible")
    }

    #[test]
    fn alloc_assigns_increasing_generations_on_reuse() {
        let mut table = TaskTable::new();
        let p0 = alloc_ok(&mut table).unwrap();
        table.free(p0);
        let p1 = alloc_ok(&mut table).unwrap();
        assert_ne!(p0, p1, "reused slot must carry a bumped generation");
        assert!(table.find_by_pid(p0).is_none());
        assert!(table.find_by_pid(p1).is_some());
    }

    #[test]
    fn alloc_fails_once_capacity_is_exhausted() {
        let mut table = TaskTable::new();
        for _ in 0..MAX_PROCESS_CNT {
            assert!(alloc_ok(&mut table).is_some());
        }
        assert!(alloc_ok(&mut table).is_none());
    }

    #[test]
    fn alloc_leaves_the_slot_unconsumed_when_build_fails() {
        let mut table = TaskTable::new();
        let before = table.alloc(make).unwrap();
        table.free(before.unwrap());

        let result = table.alloc(|_pid| Err(KernelError::OutOfMemory));
        assert!(result.is_err());

        // The slot that the failed build would have used is still free.
        let pid = alloc_ok(&mut table);
        assert!(pid.is_some());
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn freeing_past_capacity_panics() {
        let mut table = TaskTable::new();
        let pid = alloc_ok(&mut table).unwrap();
        let task = table.free(pid);
        let _ = task;
        table.free(pid);
    }

    #[test]
    fn pid_recycling_scenario_capacity_four() {
        // Mirrors spec scenario 3: capacity 4, free P1, realloc differs in
        // generation and the stale pid no longer resolves. MAX_PROCESS_CNT is
        // fixed at compile time here, so this just exercises the same table
        // at its real capacity instead of a toy one.
        let mut table = TaskTable::new();
        let pids: Vec<Pid> = (0..4).map(|_| alloc_ok(&mut table).unwrap()).collect();
        table.free(pids[1]);
        let new_pid = alloc_ok(&mut table).unwrap();
        assert_ne!(new_pid, pids[1]);
        assert!(table.find_by_pid(pids[1]).is_none());
        let _ = TaskState::Pooled;
    }
}
