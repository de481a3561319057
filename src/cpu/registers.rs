//! Machine registers.
//!
//! The machine has:
//! - R0-R7: eight general purpose 15-bit registers
//! - IP: the instruction pointer (address of the next word to fetch)
//!
//! The stack pointer is implied by the stack length, see [`crate::cpu::stack`].

use crate::word::{Word, REGISTER_BASE, REGISTER_COUNT};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated register index (0-7).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Register(u8);

impl Register {
    /// All eight registers in order.
    pub const ALL: [Register; REGISTER_COUNT] = [
        Register(0),
        Register(1),
        Register(2),
        Register(3),
        Register(4),
        Register(5),
        Register(6),
        Register(7),
    ];

    /// Create from an index, rejecting values above 7.
    pub const fn new(index: usize) -> Option<Self> {
        if index < REGISTER_COUNT {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    /// Decode a raw operand word in `32768..32776`.
    pub const fn from_raw(raw: u16) -> Option<Self> {
        if raw >= REGISTER_BASE && raw < REGISTER_BASE + REGISTER_COUNT as u16 {
            Some(Self((raw - REGISTER_BASE) as u8))
        } else {
            None
        }
    }

    /// Encode as a raw operand word.
    pub const fn to_raw(self) -> u16 {
        REGISTER_BASE + self.0 as u16
    }

    /// The register number.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// The register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// R0-R7
    pub r: [Word; REGISTER_COUNT],

    /// Instruction pointer. May equal 32768 after fetching the last cell,
    /// in which case the next fetch faults.
    pub ip: u16,
}

impl Registers {
    /// Create a new register file with all values zeroed.
    pub fn new() -> Self {
        Self {
            r: [Word::ZERO; REGISTER_COUNT],
            ip: 0,
        }
    }

    /// Reset all registers to zero.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Read a general purpose register.
    #[inline]
    pub fn get(&self, reg: Register) -> Word {
        self.r[reg.index()]
    }

    /// Write a general purpose register.
    #[inline]
    pub fn set(&mut self, reg: Register, value: Word) {
        self.r[reg.index()] = value;
    }

    /// Increment the instruction pointer by 1.
    /// Returns the old value.
    pub fn advance_ip(&mut self) -> u16 {
        let old = self.ip;
        self.ip = self.ip.saturating_add(1);
        old
    }

    /// Set the instruction pointer to an absolute address.
    pub fn jump(&mut self, addr: Word) {
        self.ip = addr.get();
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_decoding() {
        assert_eq!(Register::from_raw(32768), Register::new(0));
        assert_eq!(Register::from_raw(32775), Register::new(7));
        assert_eq!(Register::from_raw(32776), None);
        assert_eq!(Register::from_raw(32767), None);
        assert_eq!(Register::from_raw(0), None);
    }

    #[test]
    fn test_register_raw_roundtrip() {
        for reg in Register::ALL {
            assert_eq!(Register::from_raw(reg.to_raw()), Some(reg));
        }
    }

    #[test]
    fn test_get_set() {
        let mut regs = Registers::new();
        let r3 = Register::new(3).unwrap();
        regs.set(r3, Word::masked(1234));
        assert_eq!(regs.get(r3).get(), 1234);
        assert_eq!(regs.r[3].get(), 1234);
    }

    #[test]
    fn test_advance_ip() {
        let mut regs = Registers::new();
        regs.ip = 10;

        let old = regs.advance_ip();
        assert_eq!(old, 10);
        assert_eq!(regs.ip, 11);
    }

    #[test]
    fn test_jump() {
        let mut regs = Registers::new();
        regs.jump(Word::masked(0x17a1));
        assert_eq!(regs.ip, 0x17a1);
    }
}
