//! Program image files.
//!
//! An image is a headerless sequence of little-endian 16-bit words, loaded
//! starting at address 0. Its length in words is the file size divided by 2.

use crate::cpu::memory::MEMORY_SIZE;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Load a program image from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Vec<u16>, LoadError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let words = parse_image(&bytes)?;
    debug!(path = %path.display(), words = words.len(), "loaded program image");
    Ok(words)
}

/// Read a program image from any byte source.
pub fn read_image<R: Read>(mut reader: R) -> Result<Vec<u16>, LoadError> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    parse_image(&bytes)
}

/// Decode image bytes into words.
///
/// Rejects a trailing odd byte and images longer than memory.
pub fn parse_image(bytes: &[u8]) -> Result<Vec<u16>, LoadError> {
    if bytes.len() % 2 != 0 {
        return Err(LoadError::TruncatedWord { len: bytes.len() });
    }

    let words = bytes.len() / 2;
    if words > MEMORY_SIZE {
        return Err(LoadError::ImageTooLarge { words });
    }

    Ok(bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Encode words as image bytes.
pub fn image_bytes(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

/// Write a program image to disk.
pub fn save_image<P: AsRef<Path>>(path: P, words: &[u16]) -> Result<(), LoadError> {
    let path = path.as_ref();
    std::fs::write(path, image_bytes(words)).map_err(|source| LoadError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), words = words.len(), "wrote program image");
    Ok(())
}

/// Errors that can occur while reading or writing images.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("cannot write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("image has an odd number of bytes ({len}); the last word is incomplete")]
    TruncatedWord { len: usize },

    #[error("image has {words} words, more than the 32768 memory cells")]
    ImageTooLarge { words: usize },
}
