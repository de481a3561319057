//! # Synacor VM
//!
//! A virtual machine for the 15-bit architecture of the Synacor challenge:
//! 32768 words of memory, eight registers, a call/data stack and
//! 22 instructions.
//!
//! Besides the execution engine the crate carries the tooling used to take
//! the challenge apart: an assembler and disassembler, the image decryption
//! and teleporter patches, checkpoints, solvers for the in-game puzzles and
//! a terminal debugger.

pub mod asm;
pub mod config;
pub mod cpu;
pub mod image;
pub mod puzzles;
pub mod word;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export commonly used types
pub use asm::{assemble, disassemble, disassemble_at, AssemblerError};
pub use config::{BootError, RunConfig};
pub use cpu::{
    BufferConsole, Console, Cpu, CpuError, CpuState, Fault, FaultKind, IoConsole, MachineSummary,
    Memory, Opcode, Registers,
};
pub use image::{load_image, save_image, CheckpointError, LoadError};
pub use word::Word;

#[cfg(feature = "tui")]
pub use tui::run_debugger;
