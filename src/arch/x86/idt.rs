//! Interrupt Descriptor Table — CPU exceptions (0-31) plus the two legacy
//! PIC IRQs this kernel actually uses (timer for clock calibration only,
//! keyboard for TTY input). No user mode means no `int 0x80`-style gate is
//! needed; the syscall gate is a direct kernel call (see `syscall` module).
//!
//! Every exception handler here is fatal: this build's page-fault and
//! general-protection policy is "panic with the faulting state", not
//! recovery, matching the Non-goals around demand paging / COW / signal
//! delivery on fault.

use core::mem::size_of;
use x86::dtables::{lidt, DescriptorTablePointer};

use crate::arch::x86::gdt::KERNEL_CODE_SELECTOR;
use crate::arch::x86::pic;

const IDT_ENTRIES: usize = 48; // exceptions 0-31 + IRQ0-IRQ15 at vectors 32-47

#[repr(C, packed)]
#[derive(Clone, Copy)]
struct IdtEntry {
    offset_low: u16,
    selector: u16,
    zero: u8,
    type_attr: u8,
    offset_high: u16,
}

impl IdtEntry {
    const fn missing() -> Self {
        IdtEntry { offset_low: 0, selector: 0, zero: 0, type_attr: 0, offset_high: 0 }
    }

    fn new(handler: u32, selector: u16) -> Self {
        IdtEntry {
            offset_low: (handler & 0xFFFF) as u16,
            selector,
            zero: 0,
            type_attr: 0x8E, // present, DPL0, 32-bit interrupt gate
            offset_high: ((handler >> 16) & 0xFFFF) as u16,
        }
    }
}

#[repr(C, align(8))]
struct Idt([IdtEntry; IDT_ENTRIES]);

static mut IDT: Idt = Idt([IdtEntry::missing(); IDT_ENTRIES]);

macro_rules! set_handler {
    ($idx:expr, $handler:expr) => {
        IDT.0[$idx] = IdtEntry::new($handler as u32, KERNEL_CODE_SELECTOR.bits());
    };
}

/// Build and load the IDT. Must run after the GDT is loaded.
///
/// # Safety
/// Must run once, during early boot, with interrupts disabled.
pub unsafe fn init() {
    set_handler!(0, divide_error);
    set_handler!(3, breakpoint);
    set_handler!(6, invalid_opcode);
    set_handler!(8, double_fault);
    set_handler!(13, general_protection_fault);
    set_handler!(14, page_fault);

    set_handler!(32, timer_interrupt);
    set_handler!(33, keyboard_interrupt);

    let idt_ptr = &raw const IDT;
    let pointer = DescriptorTablePointer {
        limit: (size_of::<Idt>() - 1) as u16,
        base: idt_ptr,
    };
    lidt(&pointer);
}

extern "x86-interrupt" fn divide_error() {
    panic!("EXCEPTION: divide error");
}

extern "x86-interrupt" fn breakpoint() {
    crate::warn!("breakpoint trap");
}

extern "x86-interrupt" fn invalid_opcode() {
    panic!("EXCEPTION: invalid opcode");
}

extern "x86-interrupt" fn double_fault(_error_code: u32) -> ! {
    panic!("EXCEPTION: double fault");
}

extern "x86-interrupt" fn general_protection_fault(error_code: u32) {
    panic!("EXCEPTION: general protection fault, error_code={:#x}", error_code);
}

/// Page fault is always fatal in this build: no demand paging, no COW, no
/// stack growth. `cr2` holds the faulting linear address; classification and
/// the kill-vs-panic decision live in `mm::fault`.
extern "x86-interrupt" fn page_fault(error_code: u32) {
    let fault_addr: u32;
    unsafe {
        core::arch::asm!("mov {}, cr2", out(reg) fault_addr, options(nomem, nostack, preserves_flags));
    }
    crate::mm::fault::handle_page_fault(fault_addr, error_code);
}

/// Timer IRQ (IRQ0). Not used for preemption: scheduling happens only at
/// explicit reschedule points. The handler exists so the PIT can be left
/// running during boot-time TSC calibration without an unhandled vector.
extern "x86-interrupt" fn timer_interrupt() {
    unsafe { pic::end_of_interrupt(32) };
}

extern "x86-interrupt" fn keyboard_interrupt() {
    let scancode = unsafe { x86::io::inb(0x60) };
    crate::arch::x86::ps2_keyboard::handle_scancode(scancode);
    unsafe { pic::end_of_interrupt(33) };
}
