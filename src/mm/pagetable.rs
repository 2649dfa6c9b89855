/// Eager address-space duplication for `fork`.
///
/// No copy-on-write: every present user page directory entry is copied to
/// a freshly allocated page table, and every present page table entry to a
/// freshly allocated, byte-for-byte-copied physical page. The kernel's own
/// PDE (identity-mapped low 4 MiB) is shared, never duplicated.

use crate::lib::error::KernelError;
use super::paging::{PageTable, Pte, PteFlags, PAGE_SIZE};

/// Duplicate `parent`'s user mappings into a fresh page directory.
///
/// `alloc_frame` must return a physical address of a free, page-aligned
/// frame each time it's called (backed by `mm::buddy::alloc_page`).
pub fn clone_address_space_eager(
    parent: &PageTable,
    mut alloc_frame: impl FnMut() -> Option<u32>,
) -> Result<u32, KernelError> {
    let child_dir_phys = alloc_frame().ok_or(KernelError::OutOfMemory)?;
    unsafe { core::ptr::write_bytes(child_dir_phys as *mut u8, 0, PAGE_SIZE) };
    let child_dir = unsafe { &mut *(child_dir_phys as *mut PageTable) };

    // PDE 0 (kernel identity map) is shared, not copied.
    child_dir.entries[0] = parent.entries[0];

    for pd_idx in 1..parent.entries.len() {
        let pde = parent.entries[pd_idx];
        if !pde.is_present() {
            continue;
        }

        let parent_table = unsafe { &*(pde.phys_addr() as *const PageTable) };
        let child_table_phys = alloc_frame().ok_or(KernelError::OutOfMemory)?;
        unsafe { core::ptr::write_bytes(child_table_phys as *mut u8, 0, PAGE_SIZE) };
        let child_table = unsafe { &mut *(child_table_phys as *mut PageTable) };

        for pt_idx in 0..parent_table.entries.len() {
            let pte = parent_table.entries[pt_idx];
            if !pte.is_present() {
                continue;
            }

            let child_page_phys = alloc_frame().ok_or(KernelError::OutOfMemory)?;
            unsafe {
                core::ptr::copy_nonoverlapping(
                    pte.phys_addr() as *const u8,
                    child_page_phys as *mut u8,
                    PAGE_SIZE,
                );
            }
            child_table.entries[pt_idx] = Pte::new(child_page_phys, pte.flags());
        }

        child_dir.entries[pd_idx] = Pte::new(child_table_phys, pde.flags());
    }

    Ok(child_dir_phys)
}

/// Free every user page table and mapped page under `dir` (not the
/// directory frame itself, and not the shared kernel PDE at index 0).
/// Used when a task exits.
pub fn free_user_mappings(dir: &PageTable, mut free_frame: impl FnMut(u32)) {
    for pd_idx in 1..dir.entries.len() {
        let pde = dir.entries[pd_idx];
        if !pde.is_present() {
            continue;
        }
        let table = unsafe { &*(pde.phys_addr() as *const PageTable) };
        for pte in table.entries.iter() {
            if pte.is_present() {
                free_frame(pte.phys_addr());
            }
        }
        free_frame(pde.phys_addr());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;

    #[test]
    fn clone_copies_present_entries_only() {
        let mut parent = PageTable::new();
        parent.entries[0] = Pte::new(0x1000, PteFlags::kernel_rw());
        // no user entries set: clone should just carry PDE 0 through.

        let frames: RefCell<alloc::vec::Vec<u32>> = RefCell::new(alloc::vec::Vec::new());
        let alloc = || -> Option<u32> {
            let addr = 0x9000_0000u32;
            frames.borrow_mut().push(addr);
            Some(addr)
        };
        let child = clone_address_space_eager(&parent, alloc);
        assert!(child.is_ok());
    }
}
