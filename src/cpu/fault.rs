//! Execution faults.
//!
//! A fault is terminal: the machine moves to [`CpuState::Faulted`] and never
//! executes another instruction. The fault records what went wrong and the
//! address of the instruction that caused it; deciding whether that ends
//! the process is left to the caller.
//!
//! [`CpuState::Faulted`]: crate::cpu::CpuState::Faulted

use crate::cpu::decode::{DecodeError, Opcode};
use std::fmt;
use thiserror::Error;

/// The invariant an instruction violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FaultKind {
    #[error("invalid operand value {0:#06x}")]
    InvalidOperand(u16),

    #[error("invalid register operand {0:#06x}")]
    InvalidRegister(u16),

    #[error("invalid jump target {0:#06x}")]
    InvalidJumpTarget(u16),

    #[error("instruction pointer {0:#06x} out of range")]
    InstructionPointerOutOfRange(u16),

    #[error("memory address {0:#06x} out of range")]
    MemoryOutOfRange(u16),

    #[error("stack overflow")]
    StackOverflow,

    #[error("stack underflow")]
    StackUnderflow,

    #[error("unknown opcode {0:#06x}")]
    UnknownOpcode(u16),

    #[error("division by zero")]
    DivisionByZero,

    #[error("console I/O error: {0}")]
    Io(String),
}

impl From<DecodeError> for FaultKind {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::UnknownOpcode(raw) => FaultKind::UnknownOpcode(raw),
            DecodeError::InvalidOperand(raw) => FaultKind::InvalidOperand(raw),
            DecodeError::InvalidRegister(raw) => FaultKind::InvalidRegister(raw),
            DecodeError::Truncated { addr } => {
                FaultKind::InstructionPointerOutOfRange(addr.min(u16::MAX as usize) as u16)
            }
            DecodeError::OperandCount { opcode, .. } => FaultKind::UnknownOpcode(opcode.code()),
        }
    }
}

/// A fault together with where it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub kind: FaultKind,
    /// Address of the faulting instruction's opcode word.
    pub ip: u16,
    /// The instruction being executed, if its opcode decoded.
    pub opcode: Option<Opcode>,
}

impl Fault {
    pub fn new(kind: FaultKind, ip: u16, opcode: Option<Opcode>) -> Self {
        Self { kind, ip, opcode }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.opcode {
            Some(op) => write!(f, "{} at ip {:04X} ({})", self.kind, self.ip, op),
            None => write!(f, "{} at ip {:04X}", self.kind, self.ip),
        }
    }
}

impl std::error::Error for Fault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_display_names_cause_and_ip() {
        let fault = Fault::new(FaultKind::StackUnderflow, 0x17a1, Some(Opcode::Pop));
        assert_eq!(fault.to_string(), "stack underflow at ip 17A1 (pop)");

        let fault = Fault::new(FaultKind::UnknownOpcode(0x1234), 0x0010, None);
        assert_eq!(fault.to_string(), "unknown opcode 0x1234 at ip 0010");
    }

    #[test]
    fn test_decode_error_mapping() {
        assert_eq!(
            FaultKind::from(DecodeError::InvalidRegister(7)),
            FaultKind::InvalidRegister(7)
        );
        assert_eq!(
            FaultKind::from(DecodeError::InvalidOperand(40000)),
            FaultKind::InvalidOperand(40000)
        );
    }
}
