//! Software task context switch.
//!
//! No hardware task-switch mechanism is used (no TSS busy bit dance): a
//! switch is just swapping the kernel stack pointer. Everything else
//! (callee-saved registers, return address) lives on the stack itself and
//! is pushed/popped by `ctx_switch`, so `Context` only needs to remember
//! where that stack currently is.

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Context {
    pub esp: u32,
}

impl Context {
    pub const fn new() -> Self {
        Context { esp: 0 }
    }
}

core::arch::global_asm!(
    r#"
.global ctx_switch
ctx_switch:
    push ebp
    push ebx
    push esi
    push edi
    pushfd

    mov eax, [esp + 24]
    mov [eax], esp

    mov eax, [esp + 28]
    mov esp, [eax]

    popfd
    pop edi
    pop esi
    pop ebx
    pop ebp
    ret
"#
);

extern "C" {
    fn ctx_switch(prev: *mut Context, next: *const Context);
}

/// Switch from `prev`'s kernel stack onto `next`'s. Returns (on `prev`'s
/// stack) whenever some later switch brings `prev` back in.
///
/// # Safety
/// Both contexts must have a live kernel stack: either set up by
/// `init_context` and never yet switched to, or previously saved by this
/// same function.
pub unsafe fn switch_to(prev: &mut Context, next: &Context) {
    ctx_switch(prev, next);
}

/// Signature task entry points are launched with: program entry point,
/// argc, pointer to the heap-resident argv array.
pub type TaskEntry = extern "C" fn(u32, i32, u32) -> !;

/// Lay down a fake `ctx_switch` stack frame so the first switch into this
/// task starts `trampoline(entry, argc, argv)` instead of returning into
/// whatever called `switch_to`.
pub fn init_context(stack_top: u32, trampoline: TaskEntry, entry: u32, argc: i32, argv: u32) -> Context {
    unsafe {
        let mut sp = stack_top & !0xF;

        // cdecl argument area for `trampoline(entry, argc, argv)`, laid out
        // as if it had just been `call`ed: args high-to-low with `entry`
        // (the first parameter) directly above the jump target below.
        sp -= 4;
        *(sp as *mut u32) = argv;
        sp -= 4;
        *(sp as *mut u32) = argc as u32;
        sp -= 4;
        *(sp as *mut u32) = entry;

        sp -= 4;
        *(sp as *mut u32) = trampoline as u32; // popped by ctx_switch's ret

        for _ in 0..5 {
            // ebp, ebx, esi, edi, eflags restored to 0 on first entry
            sp -= 4;
            *(sp as *mut u32) = 0;
        }

        Context { esp: sp }
    }
}
