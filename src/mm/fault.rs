/// Page fault policy: always fatal.
///
/// There is no demand paging, no copy-on-write and no stack growth in this
/// build. A page fault means either a kernel bug or a process touching
/// memory outside its task slot; either way the right response is to kill
/// the faulting task, not to patch up the mapping and resume it.

use crate::process::scheduler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    NotPresent,
    Protection,
}

pub fn fault_kind(error_code: u32) -> FaultKind {
    if error_code & 0x1 != 0 {
        FaultKind::Protection
    } else {
        FaultKind::NotPresent
    }
}

pub fn is_write_fault(error_code: u32) -> bool {
    error_code & 0x2 != 0
}

/// Called from the IDT's page-fault gate. Never returns to the faulting
/// context: either the current task is a user task and gets killed with
/// `sched_exit(-1)`, or there is no current task (a boot-time or kernel-
/// thread fault) and the kernel panics outright.
pub fn handle_page_fault(fault_addr: u32, error_code: u32) -> ! {
    let kind = fault_kind(error_code);
    let write = is_write_fault(error_code);

    crate::error!(
        "page fault: addr={:#x} kind={:?} write={}",
        fault_addr, kind, write
    );

    if scheduler::current_pid().is_some() {
        scheduler::sched_exit(-1);
    }

    panic!("unrecoverable page fault at {:#x} with no running task", fault_addr);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_bit0_selects_protection_vs_not_present() {
        assert_eq!(fault_kind(0), FaultKind::NotPresent);
        assert_eq!(fault_kind(1), FaultKind::Protection);
    }

    #[test]
    fn error_code_bit1_selects_write() {
        assert!(!is_write_fault(0));
        assert!(is_write_fault(0b10));
    }
}
