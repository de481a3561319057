//! Instruction decoder.
//!
//! An instruction is an opcode word followed by 0-3 operand words.
//! Each operand word is either:
//! - a literal, `0..32768`
//! - a register reference, `32768..32776` (R0-R7)
//!
//! Any other operand word is invalid.

use crate::cpu::memory::Memory;
use crate::cpu::registers::Register;
use crate::word::Word;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The 22 machine opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Opcode {
    /// Stop execution
    Halt,
    /// `set a b`: a := b
    Set,
    /// `push a`
    Push,
    /// `pop a`: a := top of stack
    Pop,
    /// `eq a b c`: a := (b == c)
    Eq,
    /// `gt a b c`: a := (b > c)
    Gt,
    /// `jmp a`
    Jmp,
    /// `jt a b`: jump to b if a is non-zero
    Jt,
    /// `jf a b`: jump to b if a is zero
    Jf,
    /// `add a b c`: a := (b + c) mod 32768
    Add,
    /// `mult a b c`: a := (b * c) mod 32768
    Mult,
    /// `mod a b c`: a := b mod c
    Mod,
    /// `and a b c`
    And,
    /// `or a b c`
    Or,
    /// `not a b`: a := 15-bit complement of b
    Not,
    /// `rmem a b`: a := memory[b]
    Rmem,
    /// `wmem a b`: memory[a] := b
    Wmem,
    /// `call a`: push return address, jump to a
    Call,
    /// `ret`: pop return address and jump, halting on an empty stack
    Ret,
    /// `out a`: write a character
    Out,
    /// `in a`: read a character
    In,
    /// No operation
    Nop,
}

impl Opcode {
    /// All opcodes in encoding order.
    pub const ALL: [Opcode; 22] = [
        Opcode::Halt,
        Opcode::Set,
        Opcode::Push,
        Opcode::Pop,
        Opcode::Eq,
        Opcode::Gt,
        Opcode::Jmp,
        Opcode::Jt,
        Opcode::Jf,
        Opcode::Add,
        Opcode::Mult,
        Opcode::Mod,
        Opcode::And,
        Opcode::Or,
        Opcode::Not,
        Opcode::Rmem,
        Opcode::Wmem,
        Opcode::Call,
        Opcode::Ret,
        Opcode::Out,
        Opcode::In,
        Opcode::Nop,
    ];

    /// Decode an opcode word.
    pub fn from_word(raw: u16) -> Result<Self, DecodeError> {
        Self::ALL
            .get(raw as usize)
            .copied()
            .ok_or(DecodeError::UnknownOpcode(raw))
    }

    /// The encoded opcode word.
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Number of operand words following the opcode.
    pub const fn operand_count(self) -> usize {
        match self {
            Opcode::Halt | Opcode::Ret | Opcode::Nop => 0,
            Opcode::Push | Opcode::Pop | Opcode::Jmp | Opcode::Call | Opcode::Out | Opcode::In => 1,
            Opcode::Set | Opcode::Jt | Opcode::Jf | Opcode::Not | Opcode::Rmem | Opcode::Wmem => 2,
            Opcode::Eq
            | Opcode::Gt
            | Opcode::Add
            | Opcode::Mult
            | Opcode::Mod
            | Opcode::And
            | Opcode::Or => 3,
        }
    }

    /// Whether the first operand names a destination register.
    pub const fn writes_register(self) -> bool {
        matches!(
            self,
            Opcode::Set
                | Opcode::Pop
                | Opcode::Eq
                | Opcode::Gt
                | Opcode::Add
                | Opcode::Mult
                | Opcode::Mod
                | Opcode::And
                | Opcode::Or
                | Opcode::Not
                | Opcode::Rmem
                | Opcode::In
        )
    }

    /// Total instruction length in words.
    pub const fn len(self) -> usize {
        1 + self.operand_count()
    }

    /// Assembly mnemonic.
    pub const fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Halt => "halt",
            Opcode::Set => "set",
            Opcode::Push => "push",
            Opcode::Pop => "pop",
            Opcode::Eq => "eq",
            Opcode::Gt => "gt",
            Opcode::Jmp => "jmp",
            Opcode::Jt => "jt",
            Opcode::Jf => "jf",
            Opcode::Add => "add",
            Opcode::Mult => "mult",
            Opcode::Mod => "mod",
            Opcode::And => "and",
            Opcode::Or => "or",
            Opcode::Not => "not",
            Opcode::Rmem => "rmem",
            Opcode::Wmem => "wmem",
            Opcode::Call => "call",
            Opcode::Ret => "ret",
            Opcode::Out => "out",
            Opcode::In => "in",
            Opcode::Nop => "nop",
        }
    }

    /// Look up an opcode by mnemonic (case-insensitive).
    pub fn from_mnemonic(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// A decoded operand word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    /// A value used as-is.
    Literal(Word),
    /// A reference to one of R0-R7.
    Register(Register),
}

impl Operand {
    /// Classify a raw operand word.
    pub fn decode(raw: u16) -> Result<Self, DecodeError> {
        if let Some(value) = Word::new(raw) {
            Ok(Operand::Literal(value))
        } else if let Some(reg) = Register::from_raw(raw) {
            Ok(Operand::Register(reg))
        } else {
            Err(DecodeError::InvalidOperand(raw))
        }
    }

    /// Encode back to a raw operand word.
    pub const fn encode(self) -> u16 {
        match self {
            Operand::Literal(value) => value.get(),
            Operand::Register(reg) => reg.to_raw(),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(value) => write!(f, "{:04X}", value),
            Operand::Register(reg) => write!(f, "{}", reg),
        }
    }
}

/// Decode a raw operand word that must name a register.
pub fn decode_register(raw: u16) -> Result<Register, DecodeError> {
    Register::from_raw(raw).ok_or(DecodeError::InvalidRegister(raw))
}

/// A statically decoded instruction: opcode plus its raw operand words.
///
/// Operands are kept raw so an invalid operand can still be displayed;
/// execution classifies them one at a time as it consumes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub operands: Vec<u16>,
}

impl Instruction {
    /// Build an instruction from typed operands.
    pub fn new(opcode: Opcode, operands: &[Operand]) -> Result<Self, DecodeError> {
        if operands.len() != opcode.operand_count() {
            return Err(DecodeError::OperandCount {
                opcode,
                expected: opcode.operand_count(),
                found: operands.len(),
            });
        }
        Ok(Self {
            opcode,
            operands: operands.iter().map(|op| op.encode()).collect(),
        })
    }

    /// Length in words.
    pub fn len(&self) -> usize {
        self.opcode.len()
    }

    /// Encode to memory words.
    pub fn encode(&self) -> Vec<u16> {
        let mut words = Vec::with_capacity(self.len());
        words.push(self.opcode.code());
        words.extend_from_slice(&self.operands);
        words
    }
}

/// Decode the instruction stored at `addr`.
pub fn decode_at(mem: &Memory, addr: usize) -> Result<Instruction, DecodeError> {
    let raw = mem.peek(addr).ok_or(DecodeError::Truncated { addr })?;
    let opcode = Opcode::from_word(raw)?;
    let operands = (1..=opcode.operand_count())
        .map(|offset| {
            mem.peek(addr + offset)
                .ok_or(DecodeError::Truncated { addr: addr + offset })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Instruction { opcode, operands })
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown opcode {0:#06x}")]
    UnknownOpcode(u16),

    #[error("invalid operand value {0:#06x}")]
    InvalidOperand(u16),

    #[error("invalid register operand {0:#06x}")]
    InvalidRegister(u16),

    #[error("instruction runs past the end of memory at {addr:#06x}")]
    Truncated { addr: usize },

    #[error("{opcode} takes {expected} operands, found {found}")]
    OperandCount {
        opcode: Opcode,
        expected: usize,
        found: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_opcode_codes_are_dense() {
        for (code, op) in Opcode::ALL.iter().enumerate() {
            assert_eq!(op.code() as usize, code);
            assert_eq!(Opcode::from_word(code as u16).unwrap(), *op);
        }
        assert_eq!(Opcode::from_word(22), Err(DecodeError::UnknownOpcode(22)));
    }

    #[test]
    fn test_operand_counts() {
        assert_eq!(Opcode::Halt.operand_count(), 0);
        assert_eq!(Opcode::Set.operand_count(), 2);
        assert_eq!(Opcode::Eq.operand_count(), 3);
        assert_eq!(Opcode::Not.operand_count(), 2);
        assert_eq!(Opcode::Out.operand_count(), 1);
        assert_eq!(Opcode::Nop.operand_count(), 0);
    }

    #[test]
    fn test_writes_register() {
        assert!(Opcode::Set.writes_register());
        assert!(Opcode::In.writes_register());
        assert!(!Opcode::Wmem.writes_register());
        assert!(!Opcode::Push.writes_register());
        assert!(!Opcode::Jt.writes_register());
    }

    #[test]
    fn test_mnemonic_lookup() {
        assert_eq!(Opcode::from_mnemonic("MULT"), Some(Opcode::Mult));
        assert_eq!(Opcode::from_mnemonic("wmem"), Some(Opcode::Wmem));
        assert_eq!(Opcode::from_mnemonic("div"), None);
    }

    #[test]
    fn test_operand_classification() {
        assert_eq!(Operand::decode(0), Ok(Operand::Literal(Word::ZERO)));
        assert_eq!(
            Operand::decode(32767),
            Ok(Operand::Literal(Word::masked(32767)))
        );
        assert_eq!(
            Operand::decode(32768),
            Ok(Operand::Register(Register::new(0).unwrap()))
        );
        assert_eq!(
            Operand::decode(32775),
            Ok(Operand::Register(Register::new(7).unwrap()))
        );
        assert_eq!(Operand::decode(32776), Err(DecodeError::InvalidOperand(32776)));
    }

    #[test]
    fn test_decode_register_rejects_literals() {
        assert_eq!(decode_register(5), Err(DecodeError::InvalidRegister(5)));
        assert_eq!(decode_register(32776), Err(DecodeError::InvalidRegister(32776)));
        assert_eq!(decode_register(32770).map(Register::index), Ok(2));
    }

    #[test]
    fn test_decode_at() {
        let mem = Memory::from_image(&[9, 32768, 32769, 4]).unwrap();
        let instr = decode_at(&mem, 0).unwrap();
        assert_eq!(instr.opcode, Opcode::Add);
        assert_eq!(instr.operands, vec![32768, 32769, 4]);
        assert_eq!(instr.len(), 4);
    }

    #[test]
    fn test_decode_at_end_of_memory() {
        let mut mem = Memory::new();
        mem.write(crate::cpu::memory::MEMORY_SIZE - 1, Opcode::Out.code())
            .unwrap();
        let err = decode_at(&mem, crate::cpu::memory::MEMORY_SIZE - 1).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { .. }));
    }

    #[test]
    fn test_instruction_operand_count_checked() {
        let err = Instruction::new(Opcode::Set, &[Operand::Literal(Word::ZERO)]).unwrap_err();
        assert!(matches!(err, DecodeError::OperandCount { expected: 2, found: 1, .. }));
    }

    proptest! {
        #[test]
        fn prop_operand_decode_is_total(raw in any::<u16>()) {
            match Operand::decode(raw) {
                Ok(op) => prop_assert_eq!(op.encode(), raw),
                Err(DecodeError::InvalidOperand(bad)) => prop_assert!(bad >= 32776),
                Err(other) => prop_assert!(false, "unexpected error {other}"),
            }
        }
    }
}
