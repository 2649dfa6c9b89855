//! Boot orchestration: the one path from `kernel_main` to a running
//! system.
//!
//! There is no device tree and no platform autodetection on this target:
//! the only board this kernel runs on is QEMU's `pc` machine via
//! Multiboot2, so every phase below runs unconditionally in a fixed
//! order, the way the original booted on its one supported machine.

use multiboot2::BootInformation;
use crate::arch;
use crate::heap;
use crate::process::{self, exec, scheduler};
use super::mm_init;

/// Sequence every subsystem into existence and fall into the scheduler
/// loop. Never returns: the boot thread becomes the swapper task the
/// instant `scheduler::init` runs, and from there on this function's own
/// stack frame is just whatever the swapper was last doing.
pub fn run(boot_info: BootInformation) -> ! {
    unsafe { arch::x86::init() };
    crate::info!("arch: gdt/idt/pic ready");

    if let Some(cmdline) = boot_info.command_line_tag().and_then(|t| t.cmdline().ok()) {
        crate::info!("boot: cmdline = {:?}", cmdline);
    }

    heap::init();
    crate::info!("heap: arena ready");

    if let Err(e) = mm_init::init() {
        crate::error!("mm init failed: {}", e);
        arch::x86::boot::halt();
    }

    scheduler::init(mm_init::kernel_dir());
    crate::info!("scheduler: swapper installed");

    crate::tty::init();
    crate::info!("tty: {} terminals ready, keyboard routed", crate::tty::TTY_COUNT);

    crate::vfs::init();

    unsafe { core::arch::asm!("sti", options(nomem, nostack)) };

    spawn_init_process();

    loop {
        scheduler::sched_schedule();
        unsafe { core::arch::asm!("hlt", options(nomem, nostack)) };
    }
}

/// Launch the first user task, if this build has one baked in. With no
/// cross toolchain available to produce ELF32 payloads,
/// `exec::EMBEDDED_APPS` is empty for now, so this is a no-op: the
/// system idles in the swapper loop above, still useful for exercising
/// the keyboard/UART/paging bring-up on its own.
fn spawn_init_process() {
    let Some(app) = exec::EMBEDDED_APPS.first() else {
        crate::warn!("init: no embedded app to spawn, idling as swapper");
        return;
    };

    match exec::spawn(app.name, None, &[app.name], &[], mm_init::kernel_dir()) {
        Ok(pid) => {
            process::sched_enqueue(pid);
            crate::info!("init: spawned {:?} as pid {}", app.name, pid);
        }
        Err(e) => crate::error!("init: failed to spawn {:?}: {:?}", app.name, e),
    }
}
