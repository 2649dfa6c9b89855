//! Process loader: the embedded-program table, argv/envp placement on a
//! freshly loaded program's heap, and the trampoline every loaded task
//! starts at.
//!
//! Image and argv/envp placement never activate the new task's page
//! directory: everything is written through freshly mapped or `brk`-grown
//! physical frames, the same way `AddressSpace::fork_from` populates a
//! child's window without a transient `cr3` switch.

pub mod elf;

use alloc::vec::Vec;
use crate::arch::x86::context;
use crate::lib::bounded_string::BoundedString;
use crate::lib::error::{Errno, KernelError};
use crate::mm::{self, AddressSpace, PageTable};
use super::scheduler;
use super::task::{Pid, Task};
use elf::ElfError;

/// One statically linked program baked into the kernel image.
pub struct EmbeddedApp {
    pub name: &'static str,
    pub image: &'static [u8],
}

/// Programs this kernel can run, looked up by `spawn` and (once C7's
/// `/bin` backend is rewritten) listed from the same table. Empty until
/// real ELF32 payloads exist to `include_bytes!` in: producing them needs
/// a cross toolchain this environment doesn't have, so this only wires
/// the lookup shape, not a workload to run.
pub static EMBEDDED_APPS: &[EmbeddedApp] = &[];

pub fn find_app(name: &str) -> Option<&'static EmbeddedApp> {
    EMBEDDED_APPS.iter().find(|app| app.name == name)
}

impl From<ElfError> for KernelError {
    fn from(e: ElfError) -> Self {
        match e {
            ElfError::OutOfMemory => KernelError::OutOfMemory,
            ElfError::Truncated | ElfError::InvalidMagic | ElfError::NotExecutable => KernelError::InvalidArgument,
        }
    }
}

fn write_process_bytes(dir: &PageTable, addr: u32, bytes: &[u8]) -> Result<(), KernelError> {
    for (i, &b) in bytes.iter().enumerate() {
        let phys = mm::translate(dir, addr + i as u32).ok_or(KernelError::BadAddress)?;
        unsafe { *(phys as *mut u8) = b };
    }
    Ok(())
}

fn write_process_u32(dir: &PageTable, addr: u32, value: u32) -> Result<(), KernelError> {
    write_process_bytes(dir, addr, &value.to_ne_bytes())
}

/// Lay `strs` out on the process heap as a NULL-terminated pointer array
/// followed by the strings themselves (`task_init_args`/`task_init_env`'s
/// shape), bumping `mm.brk` as it grows. Returns the heap address of the
/// pointer array.
fn write_string_vector(
    mm: &mut AddressSpace,
    strs: &[&str],
    mut alloc_frame: impl FnMut() -> Option<u32>,
) -> Result<u32, KernelError> {
    let array_addr = mm.brk;
    let array_bytes = (strs.len() as u32 + 1) * 4;
    mm.do_brk(mm.brk + array_bytes, &mut alloc_frame).map_err(|_| KernelError::OutOfMemory)?;

    let mut ptrs = Vec::with_capacity(strs.len());
    for s in strs {
        let dst = mm.brk;
        let len = s.len() as u32 + 1;
        mm.do_brk(mm.brk + len, &mut alloc_frame).map_err(|_| KernelError::OutOfMemory)?;
        write_process_bytes(mm.dir(), dst, s.as_bytes())?;
        write_process_bytes(mm.dir(), dst + s.len() as u32, &[0])?;
        ptrs.push(dst);
    }

    for (i, &ptr) in ptrs.iter().enumerate() {
        write_process_u32(mm.dir(), array_addr + (i as u32) * 4, ptr)?;
    }
    write_process_u32(mm.dir(), array_addr + (ptrs.len() as u32) * 4, 0)?;

    Ok(array_addr)
}

fn align_up(value: u32, align: u32) -> u32 {
    (value + align - 1) & !(align - 1)
}

/// `task_new`: resolve `path` in the embedded-program table, build a fresh
/// task, load its image, lay argv/envp out on its heap, and enqueue it.
/// `tty_id` pins a controlling terminal; `None` inherits the caller's (the
/// very first task the system spawns has no caller to inherit from, and
/// is expected to pass an explicit id — which TTY is "active" before any
/// task exists is a policy call for whoever starts that first task, not
/// this loader).
pub fn spawn(
    path: &str,
    tty_id: Option<usize>,
    argv: &[&str],
    envp: &[&str],
    kernel_dir: &PageTable,
) -> Result<Pid, Errno> {
    let app = find_app(path).ok_or(Errno::ENOENT)?;

    let child_pid = scheduler::spawn_new(|pid, parent| {
        let ppid = parent.map(|p| p.pid).unwrap_or(pid);
        let mut task = Task::new(pid, ppid, kernel_dir, mm::alloc_frame)?;

        task.name = BoundedString::from(path.rsplit('/').next().unwrap_or(path));
        task.cwd = match parent {
            Some(p) => p.cwd.clone(),
            None => BoundedString::from("/"),
        };
        task.ctty = match tty_id {
            Some(id) => Some(id),
            None => parent.and_then(|p| p.ctty),
        };

        let load_base = mm::slot_base(task.mm.slot);
        let info = elf::load_image(task.mm.dir(), load_base, app.image, mm::alloc_frame)?;
        task.mm.set_heap_start(align_up(info.max_end, 16));

        let heap_argv = write_string_vector(&mut task.mm, argv, mm::alloc_frame)?;
        // envp is placed on the heap for layout parity with punix, but not
        // patched into a program's `environ` symbol: that needs symbol
        // table parsing this loader doesn't do.
        let _heap_envp = write_string_vector(&mut task.mm, envp, mm::alloc_frame)?;

        let stack_top = task.kstack_top();
        task.cpu_context = context::init_context(stack_top, task_trampoline, info.entry, argv.len() as i32, heap_argv);

        Ok(task)
    })
    .map_err(Errno::from)?;

    scheduler::sched_enqueue(child_pid);
    Ok(child_pid)
}

/// Every loaded task's first instruction: opens `/dev/stdin`, `/dev/stdout`,
/// `/dev/stderr` as fds 0, 1, 2 in POSIX order, then calls into the loaded
/// program.
extern "C" fn task_trampoline(entry: u32, argc: i32, argv: u32) -> ! {
    open_stdio();

    let main_fn: extern "C" fn(i32, u32) -> i32 = unsafe { core::mem::transmute(entry as usize) };
    let exit_code = main_fn(argc, argv);
    scheduler::sched_exit(exit_code)
}

/// Best-effort: a program missing a controlling TTY (or hitting some other
/// `open` failure) still runs, just with no usable fds 0/1/2.
fn open_stdio() {
    use crate::vfs::{self, OpenFlags};
    for (path, flags) in [
        ("/dev/stdin", OpenFlags::O_RDONLY),
        ("/dev/stdout", OpenFlags::O_WRONLY),
        ("/dev/stderr", OpenFlags::O_WRONLY),
    ] {
        if let Err(e) = vfs::open(path, flags, 0) {
            crate::warn!("exec: failed to open {} for new task: {:?}", path, e);
        }
    }
}
