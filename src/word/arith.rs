//! Modular arithmetic over the word ring.
//!
//! Every result is reduced modulo 32768, so the output of any operation
//! is again a valid [`Word`].

use crate::word::{Word, MODULUS};

/// Add two words: `(a + b) mod 32768`.
#[inline]
pub fn add(a: Word, b: Word) -> Word {
    let sum = (a.get() as u32 + b.get() as u32) % MODULUS;
    Word::masked(sum as u16)
}

/// Multiply two words: `(a * b) mod 32768`.
#[inline]
pub fn mul(a: Word, b: Word) -> Word {
    let product = (a.get() as u32 * b.get() as u32) % MODULUS;
    Word::masked(product as u16)
}

/// Remainder of `a / b`, or `None` when `b` is zero.
#[inline]
pub fn rem(a: Word, b: Word) -> Option<Word> {
    a.get().checked_rem(b.get()).map(Word::masked)
}

/// Bitwise AND.
#[inline]
pub fn and(a: Word, b: Word) -> Word {
    Word::masked(a.get() & b.get())
}

/// Bitwise OR.
#[inline]
pub fn or(a: Word, b: Word) -> Word {
    Word::masked(a.get() | b.get())
}

/// Bitwise complement within the 15-bit domain.
#[inline]
pub fn not(a: Word) -> Word {
    Word::masked(!a.get())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn w(value: u16) -> Word {
        Word::new(value).unwrap()
    }

    #[test]
    fn test_add_wraps() {
        assert_eq!(add(w(32767), w(2)).get(), 1);
        assert_eq!(add(w(32758), w(15)).get(), 5);
        assert_eq!(add(w(4), w(1)).get(), 5);
    }

    #[test]
    fn test_mul_wraps() {
        assert_eq!(mul(w(32767), w(2)).get(), 32766);
        assert_eq!(mul(w(32767), w(32767)).get(), 1);
        assert_eq!(mul(w(123), w(456)).get(), 56088 % 32768);
    }

    #[test]
    fn test_rem() {
        assert_eq!(rem(w(17), w(5)).map(Word::get), Some(2));
        assert_eq!(rem(w(5), w(17)).map(Word::get), Some(5));
        assert_eq!(rem(w(5), w(0)), None);
    }

    #[test]
    fn test_not_stays_in_domain() {
        assert_eq!(not(w(0)).get(), 32767);
        assert_eq!(not(w(32767)).get(), 0);
        assert_eq!(not(w(0x5555)).get(), 0x2AAA);
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(and(w(0b1100), w(0b1010)).get(), 0b1000);
        assert_eq!(or(w(0b1100), w(0b1010)).get(), 0b1110);
    }

    proptest! {
        #[test]
        fn prop_results_are_words(a in 0u16..=0x7FFF, b in 0u16..=0x7FFF) {
            let (a, b) = (w(a), w(b));
            for result in [add(a, b), mul(a, b), and(a, b), or(a, b), not(a)] {
                prop_assert!(result.get() <= Word::MAX);
            }
        }

        #[test]
        fn prop_add_matches_integer_ring(a in 0u16..=0x7FFF, b in 0u16..=0x7FFF) {
            let expected = (a as u32 + b as u32) % 32768;
            prop_assert_eq!(add(w(a), w(b)).get() as u32, expected);
        }

        #[test]
        fn prop_not_is_involution(a in 0u16..=0x7FFF) {
            prop_assert_eq!(not(not(w(a))), w(a));
        }

        #[test]
        fn prop_rem_below_divisor(a in 0u16..=0x7FFF, b in 1u16..=0x7FFF) {
            let r = rem(w(a), w(b)).unwrap();
            prop_assert!(r.get() < b);
        }
    }
}
