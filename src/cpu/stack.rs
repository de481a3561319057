//! The machine stack.
//!
//! A LIFO of words, capped at [`STACK_CAPACITY`] entries. Pushing onto a
//! full stack is a fault.

use crate::word::Word;
use serde::{Deserialize, Serialize};

/// Maximum number of stack entries.
pub const STACK_CAPACITY: usize = 65_536;

/// LIFO stack of words.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stack {
    entries: Vec<Word>,
}

impl Stack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a word. Returns `false` when the stack is full.
    #[must_use]
    pub fn push(&mut self, value: Word) -> bool {
        if self.entries.len() >= STACK_CAPACITY {
            return false;
        }
        self.entries.push(value);
        true
    }

    /// Pop the top word.
    pub fn pop(&mut self) -> Option<Word> {
        self.entries.pop()
    }

    /// Peek at the top word.
    pub fn top(&self) -> Option<Word> {
        self.entries.last().copied()
    }

    /// Number of entries (the stack pointer).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries from bottom to top.
    pub fn as_slice(&self) -> &[Word] {
        &self.entries
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl FromIterator<Word> for Stack {
    fn from_iter<I: IntoIterator<Item = Word>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
