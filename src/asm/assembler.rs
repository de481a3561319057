//! Two-pass assembler for machine programs.
//!
//! Syntax:
//! ```text
//! ; Comment
//! start:              ; Define a label
//!     set r0 'A'      ; Registers are r0-r7
//!     out r0
//!     add r1 r1 0x10  ; Decimal, hex and character literals
//!     jt r1 start     ; Labels resolve to addresses
//!     halt
//!
//!     .word 1 2 32775 ; Raw words, any 16-bit value
//!     .string "abc"   ; One word per byte
//!     .print "Hi\n"   ; Expands to one `out` per byte
//! ```
//!
//! Operands may be separated by spaces or commas. Mnemonics are
//! case-insensitive; labels are not.

use crate::cpu::decode::Opcode;
use crate::cpu::registers::Register;
use crate::word::{Word, MODULUS};
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to a program image.
pub fn assemble(source: &str) -> Result<Vec<u16>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// A source token.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Bare(String),
    Char(u8),
    Str(Vec<u8>),
}

/// An operand awaiting label resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Raw(u16),
    Label(String),
}

/// The assembler state.
struct Assembler {
    /// Symbol table (label -> address).
    symbols: HashMap<String, u16>,
    /// Pending references (output index, label, source line).
    pending: Vec<(usize, String, usize)>,
    /// Output words.
    output: Vec<u16>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            pending: Vec::new(),
            output: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<u16>, AssemblerError> {
        // Pass 1: emit code, recording labels and forward references
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: patch references
        self.resolve_references()?;

        Ok(std::mem::take(&mut self.output))
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let mut tokens = tokenize(line).map_err(|message| AssemblerError::SyntaxError {
            line: line_num,
            message,
        })?;

        // Leading `name:` tokens define labels
        while let Some(Token::Bare(head)) = tokens.first() {
            let Some(label) = head.strip_suffix(':') else {
                break;
            };
            self.define_label(label.to_string(), line_num)?;
            tokens.remove(0);
        }

        let Some((head, operands)) = tokens.split_first() else {
            return Ok(());
        };
        let Token::Bare(head) = head else {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: "expected a mnemonic or directive".into(),
            });
        };

        match head.to_ascii_lowercase().as_str() {
            ".word" => {
                for operand in operands {
                    let value = self.parse_value(operand, line_num)?;
                    self.emit(value, line_num)?;
                }
            }
            ".string" => {
                let text = single_string(operands, ".string", line_num)?;
                for byte in text {
                    self.emit(Value::Raw(byte as u16), line_num)?;
                }
            }
            ".print" => {
                let text = single_string(operands, ".print", line_num)?;
                for byte in text {
                    self.emit(Value::Raw(Opcode::Out.code()), line_num)?;
                    self.emit(Value::Raw(byte as u16), line_num)?;
                }
            }
            mnemonic => {
                let opcode = Opcode::from_mnemonic(mnemonic).ok_or_else(|| {
                    AssemblerError::UnknownMnemonic {
                        line: line_num,
                        mnemonic: head.clone(),
                    }
                })?;
                self.process_instruction(opcode, operands, line_num)?;
            }
        }

        Ok(())
    }

    fn process_instruction(
        &mut self,
        opcode: Opcode,
        operands: &[Token],
        line_num: usize,
    ) -> Result<(), AssemblerError> {
        if operands.len() != opcode.operand_count() {
            return Err(AssemblerError::OperandCount {
                line: line_num,
                mnemonic: opcode.mnemonic(),
                expected: opcode.operand_count(),
                found: operands.len(),
            });
        }

        self.emit(Value::Raw(opcode.code()), line_num)?;
        for (index, operand) in operands.iter().enumerate() {
            let value = self.parse_value(operand, line_num)?;
            if index == 0 && opcode.writes_register() {
                let is_register = matches!(value, Value::Raw(raw) if Register::from_raw(raw).is_some());
                if !is_register {
                    return Err(AssemblerError::ExpectedRegister {
                        line: line_num,
                        mnemonic: opcode.mnemonic(),
                    });
                }
            } else if let Value::Raw(raw) = value {
                if Word::new(raw).is_none() && Register::from_raw(raw).is_none() {
                    return Err(AssemblerError::ValueOutOfRange {
                        line: line_num,
                        value: raw as u32,
                    });
                }
            }
            self.emit(value, line_num)?;
        }

        Ok(())
    }

    fn define_label(&mut self, label: String, line_num: usize) -> Result<(), AssemblerError> {
        if label.is_empty()
            || parse_register(&label).is_some()
            || !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("invalid label name '{}'", label),
            });
        }
        let addr = self.here(line_num)?;
        if self.symbols.insert(label.clone(), addr).is_some() {
            return Err(AssemblerError::DuplicateLabel { line: line_num, label });
        }
        Ok(())
    }

    fn parse_value(&self, token: &Token, line_num: usize) -> Result<Value, AssemblerError> {
        let text = match token {
            Token::Char(byte) => return Ok(Value::Raw(*byte as u16)),
            Token::Str(_) => {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: "string literal not allowed here".into(),
                })
            }
            Token::Bare(text) => text,
        };

        if let Some(reg) = parse_register(text) {
            return Ok(Value::Raw(reg.to_raw()));
        }

        let number = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(u32::from_str_radix(hex, 16))
        } else if text.starts_with(|c: char| c.is_ascii_digit()) {
            Some(text.parse::<u32>())
        } else {
            None
        };

        match number {
            Some(Ok(value)) => u16::try_from(value)
                .map(Value::Raw)
                .map_err(|_| AssemblerError::ValueOutOfRange { line: line_num, value }),
            Some(Err(_)) => Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("invalid number '{}'", text),
            }),
            None => Ok(Value::Label(text.clone())),
        }
    }

    /// Address of the next emitted word.
    fn here(&self, line_num: usize) -> Result<u16, AssemblerError> {
        u16::try_from(self.output.len())
            .ok()
            .filter(|&addr| (addr as u32) < MODULUS)
            .ok_or(AssemblerError::ProgramTooLarge { line: line_num })
    }

    fn emit(&mut self, value: Value, line_num: usize) -> Result<(), AssemblerError> {
        self.here(line_num)?;
        match value {
            Value::Raw(raw) => self.output.push(raw),
            Value::Label(label) => {
                self.pending.push((self.output.len(), label, line_num));
                self.output.push(0);
            }
        }
        Ok(())
    }

    fn resolve_references(&mut self) -> Result<(), AssemblerError> {
        for (out_idx, label, line_num) in &self.pending {
            let addr = self
                .symbols
                .get(label)
                .ok_or_else(|| AssemblerError::UndefinedLabel {
                    line: *line_num,
                    label: label.clone(),
                })?;
            self.output[*out_idx] = *addr;
        }
        Ok(())
    }
}

/// Parse `r0`-`r7` (either case).
fn parse_register(text: &str) -> Option<Register> {
    let digits = text.strip_prefix('r').or_else(|| text.strip_prefix('R'))?;
    if digits.len() != 1 {
        return None;
    }
    Register::new(digits.parse().ok()?)
}

fn single_string(
    operands: &[Token],
    directive: &str,
    line_num: usize,
) -> Result<Vec<u8>, AssemblerError> {
    match operands {
        [Token::Str(text)] => Ok(text.clone()),
        _ => Err(AssemblerError::SyntaxError {
            line: line_num,
            message: format!("{} takes one string literal", directive),
        }),
    }
}

/// Split a line into tokens, dropping any `;` comment.
fn tokenize(line: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ';' => break,
            c if c.is_whitespace() || c == ',' => {
                chars.next();
            }
            '\'' => {
                chars.next();
                let bytes = read_quoted(&mut chars, '\'')?;
                match bytes.as_slice() {
                    [byte] => tokens.push(Token::Char(*byte)),
                    _ => return Err("character literal must hold one character".into()),
                }
            }
            '"' => {
                chars.next();
                tokens.push(Token::Str(read_quoted(&mut chars, '"')?));
            }
            _ => {
                let mut text = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || c == ',' || c == ';' {
                        break;
                    }
                    text.push(c);
                    chars.next();
                }
                tokens.push(Token::Bare(text));
            }
        }
    }

    Ok(tokens)
}

fn read_quoted(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    quote: char,
) -> Result<Vec<u8>, String> {
    let mut bytes = Vec::new();
    loop {
        let c = chars.next().ok_or("unterminated literal")?;
        let c = match c {
            c if c == quote => return Ok(bytes),
            '\\' => match chars.next().ok_or("unterminated escape")? {
                'n' => '\n',
                't' => '\t',
                '0' => '\0',
                '\\' => '\\',
                '\'' => '\'',
                '"' => '"',
                other => return Err(format!("unknown escape '\\{}'", other)),
            },
            c => c,
        };
        if !c.is_ascii() {
            return Err(format!("non-ASCII character '{}'", c));
        }
        bytes.push(c as u8);
    }
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: u32 },

    #[error("line {line}: {mnemonic} takes {expected} operands, found {found}")]
    OperandCount {
        line: usize,
        mnemonic: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: first operand of {mnemonic} must be a register")]
    ExpectedRegister { line: usize, mnemonic: &'static str },

    #[error("line {line}: program exceeds 32768 words")]
    ProgramTooLarge { line: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_simple() {
        let source = r#"
            ; Simple test program
            set r0 4
            add r1 r0 1
            out 'A'
            halt
        "#;

        let result = assemble(source).unwrap();
        assert_eq!(
            result,
            vec![1, 32768, 4, 9, 32769, 32768, 1, 19, 65, 0]
        );
    }

    #[test]
    fn test_assemble_with_labels() {
        let source = r#"
        start:
            jmp end
            nop
        end: halt
            jmp start
        "#;

        let result = assemble(source).unwrap();
        assert_eq!(result, vec![6, 3, 21, 0, 6, 0]);
    }

    #[test]
    fn test_commas_and_case() {
        let result = assemble("SET R3, 0x10 ; comment").unwrap();
        assert_eq!(result, vec![1, 32771, 16]);
    }

    #[test]
    fn test_char_literals() {
        let result = assemble(r"out ' '
out '\n'
out ';'").unwrap();
        assert_eq!(result, vec![19, 32, 19, 10, 19, 59]);
    }

    #[test]
    fn test_word_directive_accepts_raw_values() {
        let result = assemble(".word 1 32775 65535 here\nhere:").unwrap();
        assert_eq!(result, vec![1, 32775, 65535, 4]);
    }

    #[test]
    fn test_string_and_print() {
        assert_eq!(assemble(".string \"ab\"").unwrap(), vec![97, 98]);
        assert_eq!(assemble(".print \"a\\n\"").unwrap(), vec![19, 97, 19, 10]);
    }

    #[test]
    fn test_operand_count_checked() {
        let err = assemble("add r0 1").unwrap_err();
        assert_eq!(
            err,
            AssemblerError::OperandCount {
                line: 1,
                mnemonic: "add",
                expected: 3,
                found: 2
            }
        );
    }

    #[test]
    fn test_destination_must_be_register() {
        let err = assemble("nop\nset 5 1").unwrap_err();
        assert_eq!(
            err,
            AssemblerError::ExpectedRegister {
                line: 2,
                mnemonic: "set"
            }
        );
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            assemble("frob r0"),
            Err(AssemblerError::UnknownMnemonic { line: 1, .. })
        ));
        assert!(matches!(
            assemble("jmp nowhere"),
            Err(AssemblerError::UndefinedLabel { line: 1, .. })
        ));
        assert!(matches!(
            assemble("a:\na:"),
            Err(AssemblerError::DuplicateLabel { line: 2, .. })
        ));
        assert!(matches!(
            assemble("push 40000"),
            Err(AssemblerError::ValueOutOfRange { line: 1, value: 40000 })
        ));
        assert!(matches!(
            assemble(".word 70000"),
            Err(AssemblerError::ValueOutOfRange { value: 70000, .. })
        ));
        assert!(matches!(
            assemble("out 'ab'"),
            Err(AssemblerError::SyntaxError { .. })
        ));
    }
}
