//! Global Descriptor Table — flat, ring-0-only.
//!
//! There is no ring 3 in this build (spec Non-goal: no privilege
//! separation), so the table is the minimum x86 protected mode requires:
//! a null descriptor plus one flat code and one flat data segment, both
//! base 0 / limit 4 GiB / DPL 0. No TSS: task switches are done in
//! software (see `context.rs`), not via the CPU's hardware task-switch
//! mechanism, so there is nothing to point a `tr` selector at.

use core::mem::size_of;
use x86::dtables::{lgdt, DescriptorTablePointer};
use x86::segmentation::{
    load_cs, load_ds, load_es, load_fs, load_gs, load_ss, SegmentSelector,
};
use x86::Ring;

const GDT_ENTRIES: usize = 3;

#[repr(transparent)]
#[derive(Clone, Copy)]
struct GdtEntry(u64);

impl GdtEntry {
    const fn null() -> Self {
        GdtEntry(0)
    }

    /// `executable`: true for a code segment, false for data.
    const fn flat(executable: bool) -> Self {
        let limit_low = 0xFFFFu64;
        let base = 0u64;
        // access byte: present(1) dpl(00) S(1) type(code/data) rw(1) accessed(0)
        let access: u64 = if executable {
            0b1_00_1_1_0_1_0
        } else {
            0b1_00_1_0_0_1_0
        };
        // flags: granularity(4KiB)=1, size(32-bit)=1, long(0), avl(0) -> upper nibble of limit_high byte
        let flags_limit_high: u64 = 0b1100_1111;

        GdtEntry(
            limit_low
                | (base & 0xFFFFFF) << 16
                | access << 40
                | flags_limit_high << 48
                | ((base >> 24) & 0xFF) << 56,
        )
    }
}

#[repr(C, align(8))]
struct Gdt {
    entries: [GdtEntry; GDT_ENTRIES],
}

static mut GDT: Gdt = Gdt {
    entries: [GdtEntry::null(), GdtEntry::flat(true), GdtEntry::flat(false)],
};

pub const KERNEL_CODE_SELECTOR: SegmentSelector = SegmentSelector::new(1, Ring::Ring0);
pub const KERNEL_DATA_SELECTOR: SegmentSelector = SegmentSelector::new(2, Ring::Ring0);

/// Load the GDT and reload every segment register to the flat kernel
/// segments. Must run once during early boot with interrupts disabled.
///
/// # Safety
/// Caller must guarantee this runs before any other code touches segment
/// registers, and exactly once.
pub unsafe fn init() {
    let gdt_ptr = &raw const GDT;
    let pointer = DescriptorTablePointer {
        limit: (size_of::<Gdt>() - 1) as u16,
        base: gdt_ptr,
    };
    lgdt(&pointer);

    load_cs(KERNEL_CODE_SELECTOR);
    load_ds(KERNEL_DATA_SELECTOR);
    load_es(KERNEL_DATA_SELECTOR);
    load_fs(KERNEL_DATA_SELECTOR);
    load_gs(KERNEL_DATA_SELECTOR);
    load_ss(KERNEL_DATA_SELECTOR);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_code_segment_is_executable_and_present() {
        let entry = GdtEntry::flat(true).0;
        let access = (entry >> 40) & 0xFF;
        assert_eq!(access & 0x80, 0x80, "present bit must be set");
        assert_eq!(access & 0x08, 0x08, "executable bit must be set for code");
    }

    #[test]
    fn flat_data_segment_is_not_executable() {
        let entry = GdtEntry::flat(false).0;
        let access = (entry >> 40) & 0xFF;
        assert_eq!(access & 0x08, 0, "data segment must not be executable");
    }

    #[test]
    fn selectors_are_ring0() {
        assert_eq!(KERNEL_CODE_SELECTOR.rpl(), Ring::Ring0);
        assert_eq!(KERNEL_DATA_SELECTOR.rpl(), Ring::Ring0);
    }
}
