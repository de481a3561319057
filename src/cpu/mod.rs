//! The virtual machine.
//!
//! This module implements the complete machine:
//! - 32768 sixteen-bit memory cells
//! - 8 registers (R0-R7) plus the instruction pointer
//! - a word stack capped at 65536 entries
//! - 22 instructions with literal or register operands

pub mod console;
pub mod decode;
pub mod execute;
pub mod fault;
pub mod memory;
pub mod registers;
pub mod stack;

pub use console::{BufferConsole, Console, IoConsole};
pub use decode::{DecodeError, Instruction, Opcode, Operand};
pub use execute::{Cpu, CpuError, CpuState, MachineSummary};
pub use fault::{Fault, FaultKind};
pub use memory::{Memory, MemoryError, MEMORY_SIZE};
pub use registers::{Register, Registers};
pub use stack::{Stack, STACK_CAPACITY};
