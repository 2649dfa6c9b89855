//! Boot-phase errors. Distinct from `lib::error::KernelError` (the syscall
//! gate's error type): a phase failure here is always fatal, there's no
//! errno to hand back to anyone.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitError {
    Heap(&'static str),
    Memory(&'static str),
    Process(&'static str),
}

impl core::fmt::Display for InitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Heap(msg) => write!(f, "heap init failed: {}", msg),
            Self::Memory(msg) => write!(f, "memory init failed: {}", msg),
            Self::Process(msg) => write!(f, "process init failed: {}", msg),
        }
    }
}

pub type InitResult<T> = core::result::Result<T, InitError>;
