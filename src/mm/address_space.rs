/// Per-task address space.
///
/// No VMAs, no mmap/munmap: each task gets a fixed-size window of the
/// virtual address space (`PROCESS_BASE + slot * PROCESS_SIZE`), sized by
/// its task table slot, not negotiated at runtime. The only thing a task
/// can grow is its heap, via `brk`, up to `brk_limit`.

use crate::lib::error::{Errno, KernelError};
use super::paging::{self, PageTable, Pte, PteFlags, PAGE_SIZE};

pub const PROCESS_BASE: u32 = 0x0020_0000;
pub const PROCESS_SIZE: u32 = 0x0010_0000; // 1 MiB per task slot
pub const PROCESS_HEAP_SIZE: u32 = 0x0001_0000; // 64 KiB

/// The fixed virtual window a task table slot owns.
pub fn slot_base(slot: usize) -> u32 {
    PROCESS_BASE + (slot as u32) * PROCESS_SIZE
}

pub struct AddressSpace {
    /// Physical address of this task's page directory.
    pub page_dir: u32,
    pub slot: usize,
    /// Current break (end of the heap).
    pub brk: u32,
    /// Start of the heap, set once the loader finishes placing the image.
    pub brk_start: u32,
    /// Hard ceiling on `brk`.
    pub brk_limit: u32,
}

impl AddressSpace {
    /// Allocate a fresh page directory for `slot`, seeded with the kernel's
    /// identity-mapped low 4 MiB (PDE 0). `PROCESS_BASE` falls inside that
    /// same 4 MiB PDE, so PDE 0's underlying page table is deep-copied here
    /// rather than shared by pointer: every task's own process pages land
    /// in PTEs of that table alongside the kernel's identity map, and a
    /// shared physical table would make one task's mappings visible (and
    /// corruptible) through every other task's directory.
    pub fn new(
        slot: usize,
        kernel_dir: &PageTable,
        mut alloc_frame: impl FnMut() -> Option<u32>,
    ) -> Result<Self, KernelError> {
        let dir_phys = alloc_frame().ok_or(KernelError::OutOfMemory)?;
        unsafe { core::ptr::write_bytes(dir_phys as *mut u8, 0, PAGE_SIZE) };
        let dir = unsafe { &mut *(dir_phys as *mut PageTable) };

        let kernel_pde0 = kernel_dir.entries[0];
        if kernel_pde0.is_present() {
            let kernel_table_phys = kernel_pde0.phys_addr();
            let table_phys = alloc_frame().ok_or(KernelError::OutOfMemory)?;
            unsafe {
                core::ptr::copy_nonoverlapping(kernel_table_phys as *const u8, table_phys as *mut u8, PAGE_SIZE);
            }
            dir.entries[0] = Pte::new(table_phys, kernel_pde0.flags());
        }

        let base = slot_base(slot);
        Ok(Self {
            page_dir: dir_phys,
            slot,
            brk: base,
            brk_start: base,
            brk_limit: base.saturating_add(PROCESS_HEAP_SIZE).min(base + PROCESS_SIZE),
        })
    }

    pub fn dir(&self) -> &mut PageTable {
        unsafe { &mut *(self.page_dir as *mut PageTable) }
    }

    /// Duplicate `parent`'s mapped pages into a fresh address space for
    /// `child_slot`. Every task keeps its own page directory, but every
    /// task's user image lives at `slot_base(its own slot)`, so a plain
    /// directory-for-directory copy (like `pagetable::clone_address_space_eager`)
    /// would leave the data at the parent's window instead of the child's:
    /// this walks the parent's window page by page and re-bases each
    /// mapping onto the child's.
    pub fn fork_from(
        parent: &AddressSpace,
        child_slot: usize,
        kernel_dir: &PageTable,
        mut alloc_frame: impl FnMut() -> Option<u32>,
    ) -> Result<Self, KernelError> {
        let mut child = Self::new(child_slot, kernel_dir, &mut alloc_frame)?;

        let parent_base = slot_base(parent.slot);
        let child_base = slot_base(child_slot);
        let parent_dir = parent.dir();

        let mut offset = 0u32;
        while offset < PROCESS_SIZE {
            if let Some(phys) = paging::translate(parent_dir, parent_base + offset) {
                let phys_page = phys & !(PAGE_SIZE as u32 - 1);
                let new_frame = alloc_frame().ok_or(KernelError::OutOfMemory)?;
                unsafe {
                    core::ptr::copy_nonoverlapping(phys_page as *const u8, new_frame as *mut u8, PAGE_SIZE);
                }
                let child_dir = child.dir();
                paging::map_page(child_dir, child_base + offset, new_frame, PteFlags::user_rw(), || alloc_frame())?;
                paging::flush_tlb(child_base + offset);
            }
            offset += PAGE_SIZE as u32;
        }

        child.brk = child_base + (parent.brk - parent_base);
        child.brk_start = child_base + (parent.brk_start - parent_base);
        child.brk_limit = child_base + (parent.brk_limit - parent_base);

        Ok(child)
    }

    /// A slotted address space with no backing page directory, for tests
    /// that only care about slot/brk bookkeeping and never dereference
    /// `page_dir`.
    #[cfg(test)]
    pub fn new_for_test(slot: usize) -> Self {
        let base = slot_base(slot);
        Self {
            page_dir: 0,
            slot,
            brk: base,
            brk_start: base,
            brk_limit: base.saturating_add(PROCESS_HEAP_SIZE).min(base + PROCESS_SIZE),
        }
    }

    /// Place the loaded image's heap start (just past the highest mapped
    /// address the loader used) and recompute `brk_limit` from it.
    pub fn set_heap_start(&mut self, heap_start: u32) {
        self.brk = heap_start;
        self.brk_start = heap_start;
        let end = slot_base(self.slot) + PROCESS_SIZE;
        self.brk_limit = (heap_start.saturating_add(PROCESS_HEAP_SIZE)).min(end);
    }

    /// `brk` syscall: grow or shrink the heap, mapping freshly exposed
    /// pages on demand (never lazily; everything returned here is backed).
    pub fn do_brk(
        &mut self,
        new_brk: u32,
        mut alloc_frame: impl FnMut() -> Option<u32>,
    ) -> Result<u32, Errno> {
        if new_brk < self.brk_start || new_brk > self.brk_limit {
            return Err(Errno::EINVAL);
        }

        if new_brk > self.brk {
            let old_page = self.brk & !(PAGE_SIZE as u32 - 1);
            let new_page = (new_brk + PAGE_SIZE as u32 - 1) & !(PAGE_SIZE as u32 - 1);
            let mut addr = if self.brk == self.brk_start { old_page } else { old_page + PAGE_SIZE as u32 };
            if self.brk == self.brk_start {
                addr = old_page;
            }
            while addr < new_page {
                let frame = alloc_frame().ok_or(Errno::ENOMEM)?;
                unsafe { core::ptr::write_bytes(frame as *mut u8, 0, PAGE_SIZE) };
                let dir = self.dir();
                paging::map_page(dir, addr, frame, PteFlags::user_rw(), || alloc_frame())
                    .map_err(Errno::from)?;
                paging::flush_tlb(addr);
                addr += PAGE_SIZE as u32;
            }
        }

        self.brk = new_brk;
        Ok(self.brk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_base_is_spaced_by_process_size() {
        assert_eq!(slot_base(0), PROCESS_BASE);
        assert_eq!(slot_base(1), PROCESS_BASE + PROCESS_SIZE);
    }

    #[test]
    fn brk_limit_never_exceeds_heap_size() {
        let base = slot_base(3);
        assert!(base + PROCESS_HEAP_SIZE <= base + PROCESS_SIZE);
    }
}
