//! Files the machine reads and writes.
//!
//! This module provides:
//! - Program images (little-endian word streams) - [`program`]
//! - Whole-machine checkpoints - [`checkpoint`]
//! - Offline image transforms (decryption, patches) - [`patch`]

pub mod checkpoint;
pub mod patch;
pub mod program;

pub use checkpoint::CheckpointError;
pub use program::{load_image, parse_image, save_image, LoadError};
