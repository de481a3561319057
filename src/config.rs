//! Run configuration and machine boot.

use crate::cpu::{Cpu, MemoryError};
use crate::image::checkpoint::{self, CheckpointError};
use crate::image::patch;
use crate::image::program::{load_image, LoadError};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

/// Checkpoint written after each input line unless overridden.
pub const DEFAULT_SAVE_PATH: &str = "save.dat";
/// Checkpoint resumed from at startup unless overridden.
pub const DEFAULT_LOAD_PATH: &str = "load.dat";

pub const SAVE_PATH_ENV: &str = "SYNACOR_SAVE";
pub const LOAD_PATH_ENV: &str = "SYNACOR_LOAD";

/// Settings for one machine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Program image to load.
    pub program: PathBuf,
    /// Where to write checkpoints; `None` disables saving.
    pub save_path: Option<PathBuf>,
    /// Checkpoint to resume from if it exists; `None` disables resuming.
    pub load_path: Option<PathBuf>,
    /// Stop after this many instructions.
    pub max_steps: Option<u64>,
    /// Apply the teleporter patch after loading.
    pub patch_teleporter: bool,
}

impl RunConfig {
    /// Default settings for `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            save_path: Some(PathBuf::from(DEFAULT_SAVE_PATH)),
            load_path: Some(PathBuf::from(DEFAULT_LOAD_PATH)),
            max_steps: None,
            patch_teleporter: false,
        }
    }

    /// Disable both checkpoint save and resume.
    pub fn without_checkpoints(mut self) -> Self {
        self.save_path = None;
        self.load_path = None;
        self
    }

    /// Build a machine ready to run.
    ///
    /// The program image is always read, so a missing image is reported
    /// even when a checkpoint would replace it.
    pub fn boot(&self) -> Result<Cpu, BootError> {
        let image = load_image(&self.program)?;

        let mut cpu = match self.resume()? {
            Some(cpu) => cpu,
            None => Cpu::with_program(&image)?,
        };

        if self.patch_teleporter {
            patch::patch_teleporter(&mut cpu);
        }
        cpu.set_checkpoint_path(self.save_path.clone());
        Ok(cpu)
    }

    fn resume(&self) -> Result<Option<Cpu>, BootError> {
        let Some(path) = self.load_path.as_deref() else {
            return Ok(None);
        };
        let resumed = checkpoint::load_if_present(path)?;
        if let Some(cpu) = &resumed {
            if cpu.is_faulted() {
                return Err(BootError::FaultedCheckpoint {
                    path: path.to_path_buf(),
                    ip: cpu.regs.ip,
                });
            }
            if cpu.is_running() {
                info!(path = %path.display(), ip = cpu.regs.ip, "resuming from checkpoint");
            } else {
                warn!(path = %path.display(), state = ?cpu.state, "checkpoint is not runnable");
            }
        }
        Ok(resumed)
    }
}

/// Errors that prevent a machine from starting.
#[derive(Debug, Error)]
pub enum BootError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error("checkpoint {} was saved after a fault at {ip:04X}", path.display())]
    FaultedCheckpoint { path: PathBuf, ip: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;
    use crate::image::program::save_image;

    fn write_program(dir: &std::path::Path, source: &str) -> PathBuf {
        let path = dir.join("challenge.bin");
        save_image(&path, &assemble(source).unwrap()).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = RunConfig::new("challenge.bin");
        assert_eq!(config.save_path.as_deref(), Some(std::path::Path::new("save.dat")));
        assert_eq!(config.load_path.as_deref(), Some(std::path::Path::new("load.dat")));

        let config = config.without_checkpoints();
        assert_eq!(config.save_path, None);
        assert_eq!(config.load_path, None);
    }

    #[test]
    fn test_boot_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RunConfig::new(write_program(dir.path(), "out 'A'\nhalt"));
        config.load_path = Some(dir.path().join("load.dat"));
        config.save_path = Some(dir.path().join("save.dat"));

        let cpu = config.boot().unwrap();
        assert_eq!(cpu.mem.read(0).unwrap(), 19);
        assert_eq!(cpu.regs.ip, 0);
        assert_eq!(cpu.checkpoint_path(), Some(dir.path().join("save.dat").as_path()));
    }

    #[test]
    fn test_boot_resumes_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let load = dir.path().join("load.dat");

        let mut saved = Cpu::with_program(&[21, 21, 0]).unwrap();
        saved.regs.ip = 2;
        checkpoint::save(&load, &saved).unwrap();

        let mut config = RunConfig::new(write_program(dir.path(), "halt")).without_checkpoints();
        config.load_path = Some(load);

        let cpu = config.boot().unwrap();
        assert_eq!(cpu.regs.ip, 2);
        assert_eq!(cpu.mem.read(1).unwrap(), 21);
        assert_eq!(cpu.checkpoint_path(), None);
    }

    #[test]
    fn test_boot_rejects_faulted_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let load = dir.path().join("load.dat");

        let mut saved = Cpu::with_program(&assemble("pop r0\nhalt").unwrap()).unwrap();
        let mut console = crate::cpu::BufferConsole::new();
        assert!(saved.run(&mut console).is_err());
        assert!(saved.is_faulted());
        checkpoint::save(&load, &saved).unwrap();

        let mut config = RunConfig::new(write_program(dir.path(), "halt")).without_checkpoints();
        config.load_path = Some(load.clone());

        match config.boot() {
            Err(BootError::FaultedCheckpoint { path, .. }) => assert_eq!(path, load),
            other => panic!("expected a faulted checkpoint error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_boot_resumes_halted_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let load = dir.path().join("load.dat");

        let mut saved = Cpu::with_program(&[0]).unwrap();
        saved.run(&mut crate::cpu::BufferConsole::new()).unwrap();
        checkpoint::save(&load, &saved).unwrap();

        let mut config = RunConfig::new(write_program(dir.path(), "halt")).without_checkpoints();
        config.load_path = Some(load);
        assert!(config.boot().unwrap().is_halted());
    }

    #[test]
    fn test_boot_applies_teleporter_patch() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RunConfig::new(write_program(dir.path(), "halt")).without_checkpoints();
        config.patch_teleporter = true;

        let cpu = config.boot().unwrap();
        assert_eq!(cpu.regs.r[7].get(), patch::TELEPORTER_R7);
    }

    #[test]
    fn test_boot_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig::new(dir.path().join("missing.bin")).without_checkpoints();
        assert!(matches!(config.boot(), Err(BootError::Load(_))));
    }
}
