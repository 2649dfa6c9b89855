//! Architecture support. This build targets 32-bit x86 protected mode only;
//! the other subtrees here are inactive reference material.

pub mod x86;
