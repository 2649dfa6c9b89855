//! x86 (32-bit, protected mode) architecture support.

pub mod port;
pub mod gdt;
pub mod idt;
pub mod pic;
pub mod ps2_keyboard;
pub mod context;
pub mod clock;
pub mod boot;

/// Run `f` with interrupts disabled, restoring the previous `IF` flag
/// afterward. The only asynchronous writer in this kernel is the keyboard
/// ISR, so this is the one tool needed to keep it from racing a run-queue
/// or wait-queue mutation.
pub fn without_interrupts<F: FnOnce() -> R, R>(f: F) -> R {
    let flags: u32;
    unsafe {
        core::arch::asm!("pushfd; pop {}", out(reg) flags, options(nomem, preserves_flags));
        core::arch::asm!("cli", options(nomem, nostack));
    }
    let result = f();
    if flags & (1 << 9) != 0 {
        unsafe { core::arch::asm!("sti", options(nomem, nostack)) };
    }
    result
}

/// Bring up the CPU-facing parts of the architecture: segmentation,
/// interrupt/exception vectors, the PIC and the PS/2 keyboard. Must run
/// once, in this order, before enabling interrupts.
pub unsafe fn init() {
    gdt::init();
    idt::init();
    pic::init();
    pic::enable_irq(0); // timer
    pic::enable_irq(1); // keyboard
}
