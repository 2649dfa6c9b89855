//! Memory subsystem bring-up: build the kernel's identity-mapped page
//! directory, hand the rest of that window to the buddy allocator, and
//! switch paging on.
//!
//! Everything this kernel manages — kernel code/data, the heap arena, and
//! every physical frame `mm::buddy` ever hands out — lives inside the same
//! `KERNEL_SIZE` (4 MiB) identity-mapped window. A frame address is always
//! safe to cast to a pointer and dereference directly, under any task's
//! page directory, because that window is present (and, since
//! `AddressSpace::new`, deep-copied) in every one of them.

use crate::arch::x86::boot;
use crate::mm::paging::{self, ENTRIES_PER_TABLE, KERNEL_SIZE, PAGE_SIZE, PageTable, Pte, PteFlags};
use super::error::{InitError, InitResult};

static mut KERNEL_DIR: PageTable = PageTable::new();
static mut KERNEL_IDENT_TABLE: PageTable = PageTable::new();

/// Physical address of the kernel's page directory, needed by every task's
/// `AddressSpace::new` to seed its own copy of the identity map.
pub fn kernel_dir() -> &'static PageTable {
    unsafe { &*core::ptr::addr_of!(KERNEL_DIR) }
}

/// Build the identity map, carve the free tail of the 4 MiB window out for
/// the buddy allocator, and enable paging. Must run after `heap::init` (the
/// buddy allocator's free lists are `Vec`s) and before anything creates a
/// task.
pub fn init() -> InitResult<()> {
    let dir_phys = core::ptr::addr_of_mut!(KERNEL_DIR) as u32;
    let table_phys = core::ptr::addr_of_mut!(KERNEL_IDENT_TABLE) as u32;

    unsafe {
        let table = &mut *(table_phys as *mut PageTable);
        for i in 0..ENTRIES_PER_TABLE {
            let phys = (i as u32) * PAGE_SIZE as u32;
            table.entries[i] = Pte::new(phys, PteFlags::kernel_rw());
        }

        let dir = &mut *(dir_phys as *mut PageTable);
        dir.entries[0] = Pte::new(table_phys, PteFlags::kernel_rw());
    }

    let heap_end = crate::heap::arena_end();
    let pool_start = page_align_up(heap_end.max(boot::kernel_end()));
    if pool_start >= KERNEL_SIZE {
        return Err(InitError::Memory("no room left for the buddy pool inside the identity map"));
    }
    let pool_size = (KERNEL_SIZE - pool_start) as usize;

    crate::mm::init_buddy(&[(pool_start as u64, pool_size)])
        .map_err(|_| InitError::Memory("buddy allocator init failed"))?;

    crate::info!(
        "mm: identity-mapped 0..{:#x}, buddy pool {:#x}..{:#x} ({} KiB)",
        KERNEL_SIZE, pool_start, KERNEL_SIZE, pool_size / 1024
    );

    unsafe { paging::enable(dir_phys) };
    crate::info!("mm: paging enabled, cr3={:#x}", dir_phys);

    Ok(())
}

fn page_align_up(addr: u32) -> u32 {
    (addr + PAGE_SIZE as u32 - 1) & !(PAGE_SIZE as u32 - 1)
}
