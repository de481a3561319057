//! Character I/O for the `in` and `out` instructions.
//!
//! The engine talks to a [`Console`] one byte at a time. [`IoConsole`]
//! adapts any reader/writer pair (stdin/stdout for the CLI), while
//! [`BufferConsole`] keeps everything in memory for tests and the debugger.

use std::collections::VecDeque;
use std::io::{self, Read, Write};

/// A byte-at-a-time input/output device.
pub trait Console {
    /// Block until one input byte is available. `Ok(None)` means end of input.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;

    /// Emit one output byte.
    fn write_byte(&mut self, byte: u8) -> io::Result<()>;
}

impl<C: Console + ?Sized> Console for &mut C {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        (**self).read_byte()
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        (**self).write_byte(byte)
    }
}

/// Console backed by a reader and a writer.
///
/// Output is flushed before every blocking read so prompts appear before
/// the program waits for input.
pub struct IoConsole<R, W> {
    input: R,
    output: W,
}

impl<R: Read, W: Write> IoConsole<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Recover the writer (for inspecting captured output).
    pub fn into_output(self) -> W {
        self.output
    }
}

impl IoConsole<io::Stdin, io::Stdout> {
    /// Console attached to the process standard streams.
    pub fn stdio() -> Self {
        Self::new(io::stdin(), io::stdout())
    }
}

impl<R: Read, W: Write> Console for IoConsole<R, W> {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        self.output.flush()?;
        let mut buf = [0u8; 1];
        loop {
            match self.input.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.output.write_all(&[byte])
    }
}

/// In-memory console: queued input, captured output.
#[derive(Debug, Clone, Default)]
pub struct BufferConsole {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Console with pre-queued input.
    pub fn with_input(input: &str) -> Self {
        let mut console = Self::new();
        console.push_input(input);
        console
    }

    /// Queue more input bytes.
    pub fn push_input(&mut self, input: &str) {
        self.input.extend(input.bytes());
    }

    /// Bytes of input not yet consumed.
    pub fn pending_input(&self) -> usize {
        self.input.len()
    }

    /// Everything written so far.
    pub fn output(&self) -> &[u8] {
        &self.output
    }

    /// Output decoded lossily as text.
    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    /// Take the captured output, leaving the buffer empty.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }
}

impl Console for BufferConsole {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        Ok(self.input.pop_front())
    }

    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.output.push(byte);
        Ok(())
    }
}
