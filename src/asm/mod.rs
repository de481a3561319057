//! Assembler and disassembler for machine programs.
//!
//! This module provides:
//! - A two-pass assembler (text → program image)
//! - A disassembler (memory → readable text)

pub mod assembler;
pub mod disasm;

pub use assembler::{assemble, AssemblerError};
pub use disasm::{disassemble, disassemble_at, listing, Line};
