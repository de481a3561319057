//! Machine memory subsystem.
//!
//! Memory is a flat array of 32768 sixteen-bit cells addressed 0-32767.
//! Cells hold raw image data, so values above the word range are allowed
//! here and only rejected when decoded as operands.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The number of memory cells.
pub const MEMORY_SIZE: usize = 32_768;

/// Machine memory: 32768 raw 16-bit cells.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    cells: Vec<u16>,
}

impl Memory {
    /// Create a new memory with all cells zeroed.
    pub fn new() -> Self {
        Self {
            cells: vec![0; MEMORY_SIZE],
        }
    }

    /// Build memory from an image, zero-filling the tail.
    pub fn from_image(image: &[u16]) -> Result<Self, MemoryError> {
        let mut mem = Self::new();
        mem.load_program(0, image)?;
        Ok(mem)
    }

    /// Read a cell by address (0-32767).
    #[inline]
    pub fn read(&self, addr: usize) -> Result<u16, MemoryError> {
        self.cells
            .get(addr)
            .copied()
            .ok_or(MemoryError::AddressOutOfRange(addr))
    }

    /// Write a cell by address (0-32767).
    #[inline]
    pub fn write(&mut self, addr: usize, value: u16) -> Result<(), MemoryError> {
        let cell = self
            .cells
            .get_mut(addr)
            .ok_or(MemoryError::AddressOutOfRange(addr))?;
        *cell = value;
        Ok(())
    }

    /// Read a cell, or `None` past the end of memory.
    #[inline]
    pub fn peek(&self, addr: usize) -> Option<u16> {
        self.cells.get(addr).copied()
    }

    /// All cells in address order.
    pub fn cells(&self) -> &[u16] {
        &self.cells
    }

    /// Mutable access to all cells, for whole-image transforms.
    pub fn cells_mut(&mut self) -> &mut [u16] {
        &mut self.cells
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Load a program into memory starting at the given address.
    pub fn load_program(&mut self, start_addr: usize, program: &[u16]) -> Result<(), MemoryError> {
        let available = MEMORY_SIZE.saturating_sub(start_addr);
        if program.len() > available {
            return Err(MemoryError::ProgramTooLarge {
                size: program.len(),
                available,
            });
        }

        self.cells[start_addr..start_addr + program.len()].copy_from_slice(program);
        Ok(())
    }

    /// Dump memory contents (for debugging).
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, u16)> {
        let end = start.saturating_add(count).min(MEMORY_SIZE);
        (start.min(end)..end).map(|i| (i, self.cells[i])).collect()
    }

    /// Number of non-zero cells.
    pub fn used_cells(&self) -> usize {
        self.cells.iter().filter(|&&cell| cell != 0).count()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memory")
            .field("non_zero_cells", &self.used_cells())
            .field("total_cells", &MEMORY_SIZE)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Address is outside valid memory range.
    #[error("memory address {0:#06x} out of range (0x0000-0x7fff)")]
    AddressOutOfRange(usize),

    /// Program is too large to fit in memory.
    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_read_write() {
        let mut mem = Memory::new();
        mem.write(10, 42).unwrap();
        assert_eq!(mem.read(10).unwrap(), 42);
    }

    #[test]
    fn test_memory_bounds() {
        let mut mem = Memory::new();

        assert!(mem.read(0).is_ok());
        assert!(mem.read(32767).is_ok());

        assert_eq!(mem.read(32768), Err(MemoryError::AddressOutOfRange(32768)));
        assert!(mem.write(32768, 1).is_err());
        assert_eq!(mem.peek(40000), None);
    }

    #[test]
    fn test_load_program() {
        let mut mem = Memory::new();
        mem.load_program(0, &[1, 2, 3]).unwrap();

        assert_eq!(mem.read(0).unwrap(), 1);
        assert_eq!(mem.read(1).unwrap(), 2);
        assert_eq!(mem.read(2).unwrap(), 3);
        assert_eq!(mem.read(3).unwrap(), 0);
    }

    #[test]
    fn test_load_program_too_large() {
        let mut mem = Memory::new();
        let program = vec![7u16; 10];
        let err = mem.load_program(MEMORY_SIZE - 5, &program).unwrap_err();
        assert_eq!(err, MemoryError::ProgramTooLarge { size: 10, available: 5 });
    }

    #[test]
    fn test_dump_clamps_to_end() {
        let mut mem = Memory::new();
        mem.write(MEMORY_SIZE - 1, 9).unwrap();
        let dump = mem.dump(MEMORY_SIZE - 2, 10);
        assert_eq!(dump, vec![(MEMORY_SIZE - 2, 0), (MEMORY_SIZE - 1, 9)]);
    }
}
