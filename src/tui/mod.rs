//! Terminal debugger.
//!
//! Provides an interactive terminal-based debugger with:
//! - Program output pane and line input
//! - Registers, stack and memory views
//! - Step/run/breakpoint controls
//! - Disassembly from the current instruction

mod app;
mod ui;

pub use app::{run_debugger, DebuggerApp};
