//! Offline image transforms.
//!
//! The shipped challenge image carries an encrypted region that the program
//! decrypts itself at startup. [`decrypt`] applies the same transform ahead
//! of time and removes the call to the in-image routine, producing a clean
//! image for disassembly.
//!
//! [`patch_teleporter`] bypasses the slow confirmation check guarding the
//! teleporter by loading the known eighth-register value and removing the
//! check.

use crate::cpu::decode::Opcode;
use crate::cpu::memory::Memory;
use crate::cpu::Cpu;
use crate::word::Word;
use std::ops::{Range, RangeInclusive};
use tracing::debug;

/// Addresses covered by the XOR transform.
pub const ENCRYPTED_RANGE: Range<u16> = 0x17CA..0x7505;

/// Constant mixed into every transformed cell.
pub const XOR_KEY: u16 = 0x4154;

/// The two words of the call to the in-image decryption routine.
pub const DECRYPT_CALL: [usize; 2] = [0x038B, 0x038C];

/// Eighth-register value accepted by the teleporter confirmation.
pub const TELEPORTER_R7: u16 = 25_734;

/// The confirmation check replaced by no-ops.
pub const TELEPORTER_CHECK: RangeInclusive<usize> = 0x1587..=0x158F;

/// XOR each cell in [`ENCRYPTED_RANGE`] with `addr² ^ XOR_KEY`.
///
/// The transform is its own inverse.
pub fn xor_transform(mem: &mut Memory) {
    let cells = mem.cells_mut();
    for addr in ENCRYPTED_RANGE {
        cells[addr as usize] ^= addr.wrapping_mul(addr) ^ XOR_KEY;
    }
}

/// Replace the call to the in-image decryption routine with no-ops.
pub fn patch_decrypt_call(mem: &mut Memory) {
    let cells = mem.cells_mut();
    for addr in DECRYPT_CALL {
        cells[addr] = Opcode::Nop.code();
    }
}

/// Decrypt an image in place and disable its own decryption step.
pub fn decrypt(mem: &mut Memory) {
    xor_transform(mem);
    patch_decrypt_call(mem);
    debug!(
        start = ENCRYPTED_RANGE.start,
        end = ENCRYPTED_RANGE.end,
        "decrypted image"
    );
}

/// Set R7 to the accepted value and no-op the confirmation check.
pub fn patch_teleporter(cpu: &mut Cpu) {
    cpu.regs.r[7] = Word::masked(TELEPORTER_R7);
    cpu.mem.cells_mut()[TELEPORTER_CHECK].fill(Opcode::Nop.code());
    debug!(r7 = TELEPORTER_R7, "patched teleporter check");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xor_transform_is_involution() {
        let image: Vec<u16> = (0..0x7600u16).map(|i| i.wrapping_mul(31)).collect();
        let mut mem = Memory::from_image(&image).unwrap();

        xor_transform(&mut mem);
        assert_ne!(&mem.cells()[..image.len()], &image[..]);
        xor_transform(&mut mem);
        assert_eq!(&mem.cells()[..image.len()], &image[..]);
    }

    #[test]
    fn test_xor_transform_bounds() {
        let mut mem = Memory::new();
        xor_transform(&mut mem);

        let start = ENCRYPTED_RANGE.start;
        assert_eq!(mem.read(start as usize - 1).unwrap(), 0);
        assert_eq!(
            mem.read(start as usize).unwrap(),
            start.wrapping_mul(start) ^ XOR_KEY
        );
        assert_eq!(mem.read(ENCRYPTED_RANGE.end as usize).unwrap(), 0);
    }

    #[test]
    fn test_decrypt_patches_call() {
        let mut mem = Memory::new();
        mem.write(0x038B, Opcode::Call.code()).unwrap();
        mem.write(0x038C, 0x06D1).unwrap();

        decrypt(&mut mem);
        assert_eq!(mem.read(0x038B).unwrap(), Opcode::Nop.code());
        assert_eq!(mem.read(0x038C).unwrap(), Opcode::Nop.code());
    }

    #[test]
    fn test_patch_teleporter() {
        let mut cpu = Cpu::new();
        patch_teleporter(&mut cpu);
        assert_eq!(cpu.regs.r[7].get(), 25734);
        for addr in TELEPORTER_CHECK {
            assert_eq!(cpu.mem.read(addr).unwrap(), Opcode::Nop.code());
        }
        assert_eq!(cpu.mem.read(0x1590).unwrap(), 0);
    }
}
