/// Memory management subsystem.
///
/// x86 2-level paging, a buddy physical allocator, fixed-window per-task
/// address spaces (no mmap, no VMAs), eager fork duplication (no COW), and
/// a fatal page-fault policy.

pub mod page;
pub mod buddy;
pub mod paging;
pub mod pagetable;
pub mod address_space;
pub mod fault;

pub use page::{
    PhysAddr, Pfn, Page, PageFlags,
    pa_to_pfn, pfn_to_pa,
    page_align_down, page_align_up,
};

pub use buddy::{
    init_buddy, alloc_page, alloc_pages,
    free_page, free_pages, get_stats,
    MAX_ORDER, AllocStats,
};

pub use paging::{
    PAGE_SIZE, PAGE_SHIFT, KERNEL_BASE,
    PteFlags, Pte, PageTable,
    map_page, unmap_page, translate,
    flush_tlb, flush_tlb_all,
};

pub use pagetable::{clone_address_space_eager, free_user_mappings};

pub use address_space::{
    AddressSpace, PROCESS_BASE, PROCESS_SIZE, PROCESS_HEAP_SIZE, slot_base,
};

pub use fault::{handle_page_fault, FaultKind, fault_kind, is_write_fault};

/// Allocate one physical frame for paging structures or process pages.
/// The buddy allocator tracks frames as `u64`; every address it hands back
/// fits in 32 bits on this platform; narrowed here once instead of at
/// every paging call site.
pub fn alloc_frame() -> Option<u32> {
    buddy::alloc_page().map(|pa| pa as u32)
}

pub fn free_frame(pa: u32) {
    buddy::free_page(pa as u64);
}
