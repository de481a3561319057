//! The 15-bit word used throughout the machine.
//!
//! This module provides the core numeric type:
//! - [`Word`] - a value in `0..=32767`, used for registers, stack entries
//!   and resolved operands
//! - [`arith`] - modular arithmetic over the word ring (mod 32768)
//!
//! Memory cells are stored as raw `u16` because a program image may carry
//! any 16-bit pattern; only decoded values are guaranteed to be words.

pub mod arith;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use arith::{add, and, mul, not, or, rem};

/// Number of distinct word values (the arithmetic modulus).
pub const MODULUS: u32 = 32_768;

/// Number of general purpose registers.
pub const REGISTER_COUNT: usize = 8;

/// First raw value that encodes a register reference.
pub const REGISTER_BASE: u16 = 32_768;

/// A 15-bit machine word.
///
/// Value range: 0 to 32767
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Word(u16);

impl Word {
    /// Maximum value: 32767 (0x7FFF).
    pub const MAX: u16 = 0x7FFF;

    /// Mask selecting the 15 value bits.
    pub const MASK: u16 = 0x7FFF;

    /// The zero word.
    pub const ZERO: Word = Word(0);

    /// Create a word, rejecting values above [`Word::MAX`].
    #[inline]
    pub const fn new(value: u16) -> Option<Self> {
        if value <= Self::MAX {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Create a word by discarding the 16th bit.
    #[inline]
    pub const fn masked(raw: u16) -> Self {
        Self(raw & Self::MASK)
    }

    /// Create a word from a boolean (1 for true, 0 for false).
    #[inline]
    pub const fn from_bool(flag: bool) -> Self {
        Self(flag as u16)
    }

    /// Get the underlying value.
    #[inline]
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Check if this word is zero.
    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Use this word as a memory address.
    #[inline]
    pub const fn as_addr(self) -> usize {
        self.0 as usize
    }
}

impl From<Word> for u16 {
    fn from(word: Word) -> Self {
        word.0
    }
}

impl TryFrom<u16> for Word {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Word::new(value).ok_or(value)
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Word({:#06x})", self.0)
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::UpperHex for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperHex::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_bounds() {
        assert_eq!(Word::new(0), Some(Word::ZERO));
        assert_eq!(Word::new(32767).map(Word::get), Some(32767));
        assert_eq!(Word::new(32768), None);
        assert_eq!(Word::new(u16::MAX), None);
    }

    #[test]
    fn test_masked_drops_high_bit() {
        assert_eq!(Word::masked(0x8001).get(), 1);
        assert_eq!(Word::masked(0xFFFF).get(), 0x7FFF);
        assert_eq!(Word::masked(0x1234).get(), 0x1234);
    }

    #[test]
    fn test_from_bool() {
        assert_eq!(Word::from_bool(true).get(), 1);
        assert_eq!(Word::from_bool(false).get(), 0);
    }

    #[test]
    fn test_hex_format() {
        assert_eq!(format!("{:04X}", Word::masked(0x17a1)), "17A1");
    }
}
