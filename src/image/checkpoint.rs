//! Whole-machine checkpoints.
//!
//! A checkpoint is a versioned little-endian record of the full machine
//! state, written after each line of input so an interactive session can be
//! resumed later.
//!
//! Layout (version 1):
//!
//! ```text
//! offset  size            field
//! 0       8               magic "SYNVMCK\0"
//! 8       2               version
//! 10      2               instruction pointer
//! 12      1               state (0 running, 1 halted, 2 faulted)
//! 13      16              registers R0-R7
//! 29      4               stack length n
//! 33      2n              stack, bottom first
//! 33+2n   65536           memory, address 0 first
//! ```

use crate::cpu::memory::MEMORY_SIZE;
use crate::cpu::stack::STACK_CAPACITY;
use crate::cpu::{Cpu, CpuState, Memory, Stack};
use crate::word::{Word, REGISTER_COUNT};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// File magic.
pub const CHECKPOINT_MAGIC: [u8; 8] = *b"SYNVMCK\0";

/// Current layout version.
pub const CHECKPOINT_VERSION: u16 = 1;

const HEADER_LEN: usize = 8 + 2 + 2 + 1 + REGISTER_COUNT * 2 + 4;

/// Serialize the machine state.
pub fn encode(cpu: &Cpu) -> Vec<u8> {
    let stack = cpu.stack.as_slice();
    let mut buf = Vec::with_capacity(HEADER_LEN + stack.len() * 2 + MEMORY_SIZE * 2);

    buf.extend_from_slice(&CHECKPOINT_MAGIC);
    buf.extend_from_slice(&CHECKPOINT_VERSION.to_le_bytes());
    buf.extend_from_slice(&cpu.regs.ip.to_le_bytes());
    buf.push(state_tag(cpu.state));
    for value in cpu.regs.r {
        buf.extend_from_slice(&value.get().to_le_bytes());
    }
    buf.extend_from_slice(&(stack.len() as u32).to_le_bytes());
    for value in stack {
        buf.extend_from_slice(&value.get().to_le_bytes());
    }
    for cell in cpu.mem.cells() {
        buf.extend_from_slice(&cell.to_le_bytes());
    }

    buf
}

/// Deserialize a machine state.
pub fn decode(bytes: &[u8]) -> Result<Cpu, CheckpointError> {
    let mut reader = Reader { bytes, pos: 0 };

    if reader.take(8)? != CHECKPOINT_MAGIC {
        return Err(CheckpointError::BadMagic);
    }
    let version = reader.u16()?;
    if version != CHECKPOINT_VERSION {
        return Err(CheckpointError::UnsupportedVersion(version));
    }

    let ip = reader.u16()?;
    if ip as usize > MEMORY_SIZE {
        return Err(CheckpointError::InvalidField("instruction pointer"));
    }
    let state = match reader.u8()? {
        0 => CpuState::Running,
        1 => CpuState::Halted,
        2 => CpuState::Faulted,
        other => return Err(CheckpointError::InvalidState(other)),
    };

    let mut cpu = Cpu::new();
    cpu.regs.ip = ip;
    cpu.state = state;
    for slot in cpu.regs.r.iter_mut() {
        *slot = Word::new(reader.u16()?).ok_or(CheckpointError::InvalidField("register"))?;
    }

    let stack_len = reader.u32()? as usize;
    if stack_len > STACK_CAPACITY {
        return Err(CheckpointError::InvalidField("stack length"));
    }
    cpu.stack = (0..stack_len)
        .map(|_| {
            let raw = reader.u16()?;
            Word::new(raw).ok_or(CheckpointError::InvalidField("stack entry"))
        })
        .collect::<Result<Stack, _>>()?;

    let cells = (0..MEMORY_SIZE)
        .map(|_| reader.u16())
        .collect::<Result<Vec<_>, _>>()?;
    cpu.mem = Memory::from_image(&cells).map_err(|_| CheckpointError::InvalidField("memory"))?;

    if reader.pos != bytes.len() {
        return Err(CheckpointError::TrailingBytes(bytes.len() - reader.pos));
    }

    Ok(cpu)
}

/// Write a checkpoint file.
pub fn save<P: AsRef<Path>>(path: P, cpu: &Cpu) -> Result<(), CheckpointError> {
    let path = path.as_ref();
    std::fs::write(path, encode(cpu)).map_err(|source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a checkpoint file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Cpu, CheckpointError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| CheckpointError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let cpu = decode(&bytes)?;
    debug!(path = %path.display(), ip = cpu.regs.ip, stack = cpu.stack.len(), "loaded checkpoint");
    Ok(cpu)
}

/// Read a checkpoint file if it exists.
pub fn load_if_present<P: AsRef<Path>>(path: P) -> Result<Option<Cpu>, CheckpointError> {
    let path = path.as_ref();
    if !path.exists() {
        debug!(path = %path.display(), "no checkpoint to resume from");
        return Ok(None);
    }
    load(path).map(Some)
}

fn state_tag(state: CpuState) -> u8 {
    match state {
        CpuState::Running => 0,
        CpuState::Halted => 1,
        CpuState::Faulted => 2,
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], CheckpointError> {
        let end = self.pos + len;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or(CheckpointError::Truncated { offset: self.pos })?;
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, CheckpointError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, CheckpointError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, CheckpointError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Errors that can occur reading or writing checkpoints.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("not a checkpoint file (bad magic)")]
    BadMagic,

    #[error("unsupported checkpoint version {0}")]
    UnsupportedVersion(u16),

    #[error("checkpoint truncated at offset {offset}")]
    Truncated { offset: usize },

    #[error("invalid machine state tag {0}")]
    InvalidState(u8),

    #[error("invalid {0} in checkpoint")]
    InvalidField(&'static str),

    #[error("{0} unexpected bytes after checkpoint")]
    TrailingBytes(usize),
}
