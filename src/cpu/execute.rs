//! Execution engine.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use crate::asm::disasm::disassemble_at;
use crate::cpu::console::Console;
use crate::cpu::decode::{decode_register, Opcode, Operand};
use crate::cpu::fault::{Fault, FaultKind};
use crate::cpu::memory::{MemoryError, MEMORY_SIZE};
use crate::cpu::registers::Register;
use crate::cpu::{Memory, Registers, Stack};
use crate::image::checkpoint;
use crate::word::{self, Word};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Machine execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuState {
    /// Executing instructions.
    Running,
    /// Stopped normally (`halt`, `ret` on an empty stack, or end of input).
    Halted,
    /// Stopped by a fault.
    Faulted,
}

/// The virtual machine.
#[derive(Clone)]
pub struct Cpu {
    /// Registers and instruction pointer.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Call/data stack.
    pub stack: Stack,
    /// Current execution state.
    pub state: CpuState,
    /// Instructions executed (for profiling).
    pub steps: u64,
    /// Last executed opcode (for debugging).
    last_opcode: Option<Opcode>,
    /// Fault that stopped the machine, if any.
    last_fault: Option<Fault>,
    /// Where to write a checkpoint after each input line.
    checkpoint_path: Option<PathBuf>,
}

impl Cpu {
    /// Create a new machine with zeroed state.
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            stack: Stack::new(),
            state: CpuState::Running,
            steps: 0,
            last_opcode: None,
            last_fault: None,
            checkpoint_path: None,
        }
    }

    /// Create a machine with a program loaded at address 0.
    pub fn with_program(program: &[u16]) -> Result<Self, MemoryError> {
        let mut cpu = Self::new();
        cpu.load_program(program)?;
        Ok(cpu)
    }

    /// Reset registers, memory and stack to the initial state.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.stack.clear();
        self.state = CpuState::Running;
        self.steps = 0;
        self.last_opcode = None;
        self.last_fault = None;
    }

    /// Load a program into memory at address 0.
    pub fn load_program(&mut self, program: &[u16]) -> Result<(), MemoryError> {
        self.mem.load_program(0, program)
    }

    /// Write a checkpoint to `path` after every newline read by `in`.
    pub fn set_checkpoint_path(&mut self, path: Option<PathBuf>) {
        self.checkpoint_path = path;
    }

    pub fn checkpoint_path(&self) -> Option<&Path> {
        self.checkpoint_path.as_deref()
    }

    /// Execute a single instruction.
    ///
    /// Returns the opcode that was executed, or the fault that stopped the
    /// machine.
    pub fn step<C: Console + ?Sized>(&mut self, console: &mut C) -> Result<Opcode, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        let start_ip = self.regs.ip;
        if tracing::enabled!(tracing::Level::TRACE) {
            let (text, _) = disassemble_at(&self.mem, start_ip as usize);
            trace!(ip = start_ip, regs = ?self.regs.r, sp = self.stack.len(), "{}", text);
        }

        // Fetch and decode
        let opcode = match self.fetch().and_then(|raw| Opcode::from_word(raw).map_err(FaultKind::from)) {
            Ok(op) => op,
            Err(kind) => return Err(self.fault(kind, start_ip, None)),
        };

        // Execute
        if let Err(kind) = self.execute(opcode, console) {
            return Err(self.fault(kind, start_ip, Some(opcode)));
        }

        self.steps += 1;
        self.last_opcode = Some(opcode);

        Ok(opcode)
    }

    /// Run until halt or fault.
    ///
    /// Returns the number of instructions executed.
    pub fn run<C: Console + ?Sized>(&mut self, console: &mut C) -> Result<u64, CpuError> {
        let start_steps = self.steps;

        while self.state == CpuState::Running {
            self.step(console)?;
        }

        Ok(self.steps - start_steps)
    }

    /// Run for at most `max_steps` instructions.
    pub fn run_limited<C: Console + ?Sized>(
        &mut self,
        console: &mut C,
        max_steps: u64,
    ) -> Result<u64, CpuError> {
        let start_steps = self.steps;
        let limit = self.steps.saturating_add(max_steps);

        while self.state == CpuState::Running && self.steps < limit {
            self.step(console)?;
        }

        Ok(self.steps - start_steps)
    }

    /// Execute a decoded opcode. Operands are consumed here, in encoding
    /// order, because each fetch advances the instruction pointer.
    fn execute<C: Console + ?Sized>(
        &mut self,
        opcode: Opcode,
        console: &mut C,
    ) -> Result<(), FaultKind> {
        match opcode {
            Opcode::Halt => {
                self.state = CpuState::Halted;
            }

            // ==================== Data Transfer ====================
            Opcode::Set => {
                let dst = self.fetch_register()?;
                let value = self.fetch_value()?;
                self.regs.set(dst, value);
            }

            Opcode::Push => {
                let value = self.fetch_value()?;
                self.push(value)?;
            }

            Opcode::Pop => {
                let dst = self.fetch_register()?;
                let value = self.pop()?;
                self.regs.set(dst, value);
            }

            Opcode::Rmem => {
                let dst = self.fetch_register()?;
                let addr = self.fetch_value()?;
                let raw = self
                    .mem
                    .read(addr.as_addr())
                    .map_err(|_| FaultKind::MemoryOutOfRange(addr.get()))?;
                self.regs.set(dst, Word::masked(raw));
            }

            Opcode::Wmem => {
                let addr = self.fetch_value()?;
                let value = self.fetch_value()?;
                self.mem
                    .write(addr.as_addr(), value.get())
                    .map_err(|_| FaultKind::MemoryOutOfRange(addr.get()))?;
            }

            // ==================== Comparison ====================
            Opcode::Eq => {
                let dst = self.fetch_register()?;
                let a = self.fetch_value()?;
                let b = self.fetch_value()?;
                self.regs.set(dst, Word::from_bool(a == b));
            }

            Opcode::Gt => {
                let dst = self.fetch_register()?;
                let a = self.fetch_value()?;
                let b = self.fetch_value()?;
                self.regs.set(dst, Word::from_bool(a > b));
            }

            // ==================== Control Flow ====================
            Opcode::Jmp => {
                let target = self.fetch_value()?;
                self.jump(target)?;
            }

            Opcode::Jt => {
                let cond = self.fetch_value()?;
                let target = self.fetch_value()?;
                if !cond.is_zero() {
                    self.jump(target)?;
                }
            }

            Opcode::Jf => {
                let cond = self.fetch_value()?;
                let target = self.fetch_value()?;
                if cond.is_zero() {
                    self.jump(target)?;
                }
            }

            Opcode::Call => {
                let target = self.fetch_value()?;
                let ret = Word::new(self.regs.ip)
                    .ok_or(FaultKind::InstructionPointerOutOfRange(self.regs.ip))?;
                self.push(ret)?;
                self.jump(target)?;
            }

            Opcode::Ret => match self.stack.pop() {
                Some(target) => self.jump(target)?,
                None => self.state = CpuState::Halted,
            },

            // ==================== Arithmetic ====================
            Opcode::Add => self.binary(word::add)?,
            Opcode::Mult => self.binary(word::mul)?,
            Opcode::And => self.binary(word::and)?,
            Opcode::Or => self.binary(word::or)?,

            Opcode::Mod => {
                let dst = self.fetch_register()?;
                let a = self.fetch_value()?;
                let b = self.fetch_value()?;
                let result = word::rem(a, b).ok_or(FaultKind::DivisionByZero)?;
                self.regs.set(dst, result);
            }

            Opcode::Not => {
                let dst = self.fetch_register()?;
                let value = self.fetch_value()?;
                self.regs.set(dst, word::not(value));
            }

            // ==================== I/O ====================
            Opcode::Out => {
                let value = self.fetch_value()?;
                console
                    .write_byte(value.get() as u8)
                    .map_err(|e| FaultKind::Io(e.to_string()))?;
            }

            Opcode::In => {
                let dst = self.fetch_register()?;
                let byte = console
                    .read_byte()
                    .map_err(|e| FaultKind::Io(e.to_string()))?;
                match byte {
                    Some(byte) => {
                        self.regs.set(dst, Word::masked(byte as u16));
                        if byte == b'\n' {
                            self.write_checkpoint();
                        }
                    }
                    None => {
                        debug!(ip = self.regs.ip, "end of input, halting");
                        self.state = CpuState::Halted;
                    }
                }
            }

            Opcode::Nop => {}
        }

        Ok(())
    }

    /// Shared body of the three-operand arithmetic instructions.
    fn binary(&mut self, op: fn(Word, Word) -> Word) -> Result<(), FaultKind> {
        let dst = self.fetch_register()?;
        let a = self.fetch_value()?;
        let b = self.fetch_value()?;
        self.regs.set(dst, op(a, b));
        Ok(())
    }

    /// Fetch the word at the instruction pointer and advance past it.
    fn fetch(&mut self) -> Result<u16, FaultKind> {
        let ip = self.regs.ip;
        let raw = self
            .mem
            .read(ip as usize)
            .map_err(|_| FaultKind::InstructionPointerOutOfRange(ip))?;
        self.regs.advance_ip();
        Ok(raw)
    }

    /// Fetch an operand and resolve it to a value.
    ///
    /// Register operands yield the register's current contents.
    fn fetch_value(&mut self) -> Result<Word, FaultKind> {
        let raw = self.fetch()?;
        match Operand::decode(raw)? {
            Operand::Literal(value) => Ok(value),
            Operand::Register(reg) => Ok(self.regs.get(reg)),
        }
    }

    /// Fetch an operand that must name a register.
    fn fetch_register(&mut self) -> Result<Register, FaultKind> {
        let raw = self.fetch()?;
        Ok(decode_register(raw)?)
    }

    fn jump(&mut self, target: Word) -> Result<(), FaultKind> {
        if target.as_addr() >= MEMORY_SIZE {
            return Err(FaultKind::InvalidJumpTarget(target.get()));
        }
        self.regs.jump(target);
        Ok(())
    }

    fn push(&mut self, value: Word) -> Result<(), FaultKind> {
        if self.stack.push(value) {
            Ok(())
        } else {
            Err(FaultKind::StackOverflow)
        }
    }

    fn pop(&mut self) -> Result<Word, FaultKind> {
        self.stack.pop().ok_or(FaultKind::StackUnderflow)
    }

    /// Move to the faulted state and build the error describing why.
    fn fault(&mut self, kind: FaultKind, ip: u16, opcode: Option<Opcode>) -> CpuError {
        let fault = Fault::new(kind, ip, opcode);
        debug!(%fault, steps = self.steps, "machine faulted");
        self.state = CpuState::Faulted;
        self.last_fault = Some(fault.clone());
        CpuError::Fault(fault)
    }

    /// Save a checkpoint if a path is configured. Failures are logged and
    /// execution continues.
    fn write_checkpoint(&self) {
        let Some(path) = self.checkpoint_path.as_deref() else {
            return;
        };
        match checkpoint::save(path, self) {
            Ok(()) => debug!(path = %path.display(), ip = self.regs.ip, "checkpoint written"),
            Err(e) => warn!(path = %path.display(), error = %e, "failed to write checkpoint"),
        }
    }

    /// Get the last executed opcode.
    pub fn last_opcode(&self) -> Option<Opcode> {
        self.last_opcode
    }

    /// Get the fault that stopped the machine, if any.
    pub fn last_fault(&self) -> Option<&Fault> {
        self.last_fault.as_ref()
    }

    /// Check if the machine is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the machine is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }

    /// Check if the machine stopped on a fault.
    pub fn is_faulted(&self) -> bool {
        self.state == CpuState::Faulted
    }

    /// Serializable view of the machine state, without memory.
    pub fn summary(&self) -> MachineSummary {
        MachineSummary {
            state: self.state,
            ip: self.regs.ip,
            registers: self.regs.r.map(Word::get),
            stack: self.stack.as_slice().iter().map(|w| w.get()).collect(),
            steps: self.steps,
            fault: self.last_fault.as_ref().map(|f| f.to_string()),
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("steps", &self.steps)
            .field("regs", &self.regs)
            .field("stack_len", &self.stack.len())
            .finish()
    }
}

/// Machine state as reported by `inspect` and `run --json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSummary {
    pub state: CpuState,
    pub ip: u16,
    pub registers: [u16; 8],
    pub stack: Vec<u16>,
    pub steps: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault: Option<String>,
}

/// Errors returned by [`Cpu::step`] and friends.
#[derive(Debug, Clone, Error)]
pub enum CpuError {
    #[error("machine not running: {0:?}")]
    NotRunning(CpuState),

    #[error(transparent)]
    Fault(#[from] Fault),
}

impl CpuError {
    /// The fault, if this error is one.
    pub fn fault(&self) -> Option<&Fault> {
        match self {
            CpuError::Fault(fault) => Some(fault),
            CpuError::NotRunning(_) => None,
        }
    }
}
