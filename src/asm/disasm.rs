//! Disassembler.
//!
//! Converts memory back to readable assembly, one instruction per line:
//!
//! ```text
//! 0000: nop
//! 0001: out 'H'
//! 0003: add R0 R1 0001
//! 0007: 7FFF
//! ```
//!
//! Literals print as four hex digits, registers as `R0`-`R7`, operand words
//! outside both ranges as `INVALID`. Words that are not opcodes print raw
//! and advance by one.

use crate::cpu::decode::{decode_at, DecodeError, Opcode, Operand};
use crate::cpu::memory::{Memory, MemoryError, MEMORY_SIZE};

/// One disassembled instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub addr: usize,
    /// Words consumed, at least 1.
    pub len: usize,
    pub text: String,
}

impl std::fmt::Display for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04X}: {}", self.addr, self.text)
    }
}

/// Disassemble the instruction at `addr`.
///
/// Returns the text and the number of words consumed.
pub fn disassemble_at(mem: &Memory, addr: usize) -> (String, usize) {
    let Some(raw) = mem.peek(addr) else {
        return ("<out of range>".to_string(), 1);
    };

    match decode_at(mem, addr) {
        Ok(instr) => {
            let mut text = instr.opcode.mnemonic().to_string();
            for &operand in &instr.operands {
                text.push(' ');
                if instr.opcode == Opcode::Out {
                    text.push_str(&format_char_operand(operand));
                } else {
                    text.push_str(&format_operand(operand));
                }
            }
            (text, instr.len())
        }
        Err(DecodeError::Truncated { .. }) => {
            let opcode = Opcode::from_word(raw).map(Opcode::mnemonic).unwrap_or("???");
            (format!("{} <truncated>", opcode), MEMORY_SIZE - addr)
        }
        Err(_) => (format!("{:04X}", raw), 1),
    }
}

/// Disassemble a linear sweep of `start..end`.
pub fn listing(mem: &Memory, start: usize, end: usize) -> Vec<Line> {
    let end = end.min(MEMORY_SIZE);
    let mut lines = Vec::new();
    let mut addr = start;

    while addr < end {
        let (text, len) = disassemble_at(mem, addr);
        lines.push(Line { addr, len, text });
        addr += len;
    }

    lines
}

/// Disassemble a program image.
pub fn disassemble(image: &[u16]) -> Result<String, MemoryError> {
    let mem = Memory::from_image(image)?;
    let mut output = String::new();
    for line in listing(&mem, 0, image.len()) {
        output.push_str(&line.to_string());
        output.push('\n');
    }
    Ok(output)
}

/// Format an operand word.
pub fn format_operand(raw: u16) -> String {
    match Operand::decode(raw) {
        Ok(op) => op.to_string(),
        Err(_) => "INVALID".to_string(),
    }
}

/// Format an `out` operand, showing printable literals as characters.
fn format_char_operand(raw: u16) -> String {
    match raw {
        0x0A => "'\\n'".to_string(),
        0x20..=0x7E => format!("'{}'", raw as u8 as char),
        _ => format_operand(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem(words: &[u16]) -> Memory {
        Memory::from_image(words).unwrap()
    }

    #[test]
    fn test_disassemble_halt() {
        let (text, len) = disassemble_at(&mem(&[0]), 0);
        assert_eq!(text, "halt");
        assert_eq!(len, 1);
    }

    #[test]
    fn test_disassemble_operands() {
        let (text, len) = disassemble_at(&mem(&[9, 32768, 32769, 1]), 0);
        assert_eq!(text, "add R0 R1 0001");
        assert_eq!(len, 4);
    }

    #[test]
    fn test_length_matches_operand_count() {
        for op in Opcode::ALL {
            let (text, len) = disassemble_at(&mem(&[op.code(), 1, 2, 3]), 0);
            assert_eq!(len, 1 + op.operand_count());
            assert!(text.starts_with(op.mnemonic()));
        }
    }

    #[test]
    fn test_out_renders_characters() {
        assert_eq!(disassemble_at(&mem(&[19, 72]), 0).0, "out 'H'");
        assert_eq!(disassemble_at(&mem(&[19, 10]), 0).0, "out '\\n'");
        assert_eq!(disassemble_at(&mem(&[19, 32770]), 0).0, "out R2");
        assert_eq!(disassemble_at(&mem(&[19, 7]), 0).0, "out 0007");
    }

    #[test]
    fn test_unknown_opcode_advances_by_one() {
        let (text, len) = disassemble_at(&mem(&[0x7FFF, 0]), 0);
        assert_eq!(text, "7FFF");
        assert_eq!(len, 1);
    }

    #[test]
    fn test_invalid_operand() {
        let (text, _) = disassemble_at(&mem(&[2, 40000]), 0);
        assert_eq!(text, "push INVALID");
    }

    #[test]
    fn test_truncated_at_end_of_memory() {
        let mut m = Memory::new();
        m.write(MEMORY_SIZE - 2, Opcode::Add.code()).unwrap();
        let (text, len) = disassemble_at(&m, MEMORY_SIZE - 2);
        assert_eq!(text, "add <truncated>");
        assert_eq!(len, 2);
    }

    #[test]
    fn test_listing() {
        let output = disassemble(&[19, 72, 19, 105, 0]).unwrap();
        assert_eq!(output, "0000: out 'H'\n0002: out 'i'\n0004: halt\n");
    }
}
