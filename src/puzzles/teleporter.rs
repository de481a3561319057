//! The teleporter confirmation routine.
//!
//! The routine at 0x17A1 evaluates a three-argument Ackermann-style
//! function, with every value taken modulo 32768:
//!
//! ```text
//! f(0, n) = n + 1
//! f(m, 0) = f(m - 1, k)
//! f(m, n) = f(m - 1, f(m, n - 1))
//! ```
//!
//! where `k` is the eighth register. The teleporter accepts `k` when
//! `f(4, 1) == 6`. Run natively the routine would take far too long, so
//! this module evaluates it with a memo table filled row by row.

use crate::word::{Word, MODULUS};
use tracing::debug;

/// Value `f(4, 1)` must produce.
pub const EXPECTED: u16 = 6;

const SIZE: usize = MODULUS as usize;

/// Memoized values of `f(m, ·)` for one `k`.
pub struct Confirmation {
    k: u16,
    /// `rows[i]` holds `f(i + 3, n)` for every `n`.
    rows: Vec<Vec<u16>>,
}

impl Confirmation {
    pub fn new(k: u16) -> Self {
        Self {
            k: Word::masked(k).get(),
            rows: Vec::new(),
        }
    }

    /// Evaluate `f(m, n)`.
    pub fn eval(&mut self, m: u16, n: u16) -> u16 {
        let n = Word::masked(n).get() as u32;
        let k = self.k as u32;
        let wrap = |v: u32| (v % MODULUS) as u16;

        // Rows 0-2 have closed forms.
        match m {
            0 => wrap(n + 1),
            1 => wrap(n + k + 1),
            2 => wrap(2 * k + 1 + n * (k + 1)),
            _ => {
                self.fill_to(m);
                self.rows[(m - 3) as usize][n as usize]
            }
        }
    }

    fn fill_to(&mut self, m: u16) {
        while self.rows.len() < (m - 2) as usize {
            let level = self.rows.len() as u16 + 3;
            let mut row = vec![0u16; SIZE];
            row[0] = self.eval(level - 1, self.k);
            for n in 1..SIZE {
                row[n] = self.eval(level - 1, row[n - 1]);
            }
            self.rows.push(row);
        }
    }
}

/// Compute `f(4, 1)` for a candidate eighth-register value.
pub fn confirm(k: u16) -> u16 {
    // f(4, 1) = f(3, f(4, 0)) = f(3, f(3, k))
    let mut table = Confirmation::new(k);
    let k = table.k;
    let inner = table.eval(3, k);
    table.eval(3, inner)
}

/// Search `candidates` for the first value the teleporter accepts.
pub fn find_r7_in(candidates: impl IntoIterator<Item = u16>) -> Option<u16> {
    candidates.into_iter().find(|&k| {
        let result = confirm(k);
        if k % 1024 == 0 {
            debug!(k, result, "teleporter search");
        }
        result == EXPECTED
    })
}

/// Search the whole register range.
pub fn find_r7() -> Option<u16> {
    find_r7_in(0..=Word::MAX)
}
