//! Kernel heap: a single static arena handed to `linked_list_allocator`.
//!
//! This backs every `Box`/`Vec`/`BTreeMap` the kernel itself allocates
//! (task table rows, wait queues, the buddy allocator's own free lists).
//! It is deliberately separate from `mm::buddy`, which hands out physical
//! page frames for process address spaces: the two allocators serve
//! different lifetimes and neither is built on the other.

use core::alloc::Layout;
use linked_list_allocator::LockedHeap;

// Kept well under `mm::paging::KERNEL_SIZE` (4 MiB): the kernel image, this
// arena, and the buddy allocator's own pool all share that one
// identity-mapped window (see `init::mm_init`).
const HEAP_SIZE: usize = 1024 * 1024; // 1 MiB

#[repr(align(4096))]
struct HeapArena([u8; HEAP_SIZE]);

static mut HEAP_ARENA: HeapArena = HeapArena([0; HEAP_SIZE]);

#[global_allocator]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

/// Hand the allocator its backing arena. Must run once, after the UART is
/// up (so `init::phases` can log around it) and before anything that
/// touches `alloc::` does.
pub fn init() {
    unsafe {
        let base = core::ptr::addr_of_mut!(HEAP_ARENA.0) as *mut u8;
        ALLOCATOR.lock().init(base, HEAP_SIZE);
    }
}

/// Linear address just past the heap arena, where `init::mm_init` starts
/// carving out the buddy allocator's pool.
pub fn arena_end() -> u32 {
    unsafe { (core::ptr::addr_of!(HEAP_ARENA) as *const u8).add(HEAP_SIZE) as u32 }
}

#[alloc_error_handler]
fn alloc_error_handler(layout: Layout) -> ! {
    crate::error!("heap exhausted: requested {} bytes, align {}", layout.size(), layout.align());
    loop {
        core::hint::spin_loop();
    }
}
