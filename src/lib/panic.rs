//! Panic handler: register dump, uptime, and a halt. There is no crash
//! dump device and no symbolized stack trace on this target, so this
//! stays a flat report over the UART rather than the layered diagnostics
//! a multi-arch build can afford.

use core::panic::PanicInfo;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

static PANICKING: AtomicBool = AtomicBool::new(false);
static PANIC_COUNT: AtomicU64 = AtomicU64::new(0);

pub fn panic_handler(info: &PanicInfo) -> ! {
    if PANICKING.swap(true, Ordering::SeqCst) {
        unsafe { crate::uart_print(b"\n!!! RECURSIVE PANIC !!!\n") };
        halt();
    }

    let panic_num = PANIC_COUNT.fetch_add(1, Ordering::SeqCst) + 1;
    unsafe { core::arch::asm!("cli", options(nomem, nostack)) };

    print_header(panic_num);
    print_info(info);
    print_registers();
    print_uptime();

    halt();
}

fn print_header(panic_num: u64) {
    unsafe {
        crate::uart_print(b"\n================================================================\n");
        crate::uart_print(b"!!!                        KERNEL PANIC                     !!!\n");
        crate::uart_print(b"================================================================\n");
        if panic_num > 1 {
            let msg = alloc::format!("panic #{}\n", panic_num);
            crate::uart_print(msg.as_bytes());
        }
    }
}

fn print_info(info: &PanicInfo) {
    unsafe {
        if let Some(location) = info.location() {
            let msg = alloc::format!("  at {}:{}:{}\n", location.file(), location.line(), location.column());
            crate::uart_print(msg.as_bytes());
        }
        if let Some(payload) = info.payload().downcast_ref::<&str>() {
            let msg = alloc::format!("  {}\n", payload);
            crate::uart_print(msg.as_bytes());
        } else if let Some(payload) = info.payload().downcast_ref::<alloc::string::String>() {
            let msg = alloc::format!("  {}\n", payload);
            crate::uart_print(msg.as_bytes());
        }
    }
}

fn print_registers() {
    unsafe {
        let (eax, ebx, ecx, edx): (u32, u32, u32, u32);
        let (esi, edi, ebp, esp): (u32, u32, u32, u32);
        core::arch::asm!(
            "mov {0}, eax", "mov {1}, ebx", "mov {2}, ecx", "mov {3}, edx",
            out(reg) eax, out(reg) ebx, out(reg) ecx, out(reg) edx,
            options(nomem, nostack, preserves_flags),
        );
        core::arch::asm!(
            "mov {0}, esi", "mov {1}, edi", "mov {2}, ebp", "mov {3}, esp",
            out(reg) esi, out(reg) edi, out(reg) ebp, out(reg) esp,
            options(nomem, nostack, preserves_flags),
        );
        let msg = alloc::format!(
            "  eax={:08x} ebx={:08x} ecx={:08x} edx={:08x}\n  esi={:08x} edi={:08x} ebp={:08x} esp={:08x}\n",
            eax, ebx, ecx, edx, esi, edi, ebp, esp,
        );
        crate::uart_print(msg.as_bytes());
    }
}

fn print_uptime() {
    let (secs, _) = crate::arch::x86::clock::monotonic();
    unsafe {
        let msg = alloc::format!("  uptime: {} s\n", secs);
        crate::uart_print(msg.as_bytes());
    }
}

fn halt() -> ! {
    unsafe {
        crate::uart_print(b"================================================================\n");
        crate::uart_print(b"system halted.\n");
    }
    crate::arch::x86::boot::halt()
}

pub fn get_panic_count() -> u64 {
    PANIC_COUNT.load(Ordering::Relaxed)
}

pub fn is_panicking() -> bool {
    PANICKING.load(Ordering::Relaxed)
}
