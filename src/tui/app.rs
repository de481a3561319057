//! Debugger application state and logic.

use crate::asm::disasm::disassemble_at;
use crate::cpu::decode::Opcode;
use crate::cpu::memory::MEMORY_SIZE;
use crate::cpu::{BufferConsole, Cpu};
use crate::image::checkpoint;
use std::collections::HashSet;
use std::path::PathBuf;

/// Memory words shown per row.
pub const WORDS_PER_ROW: usize = 8;

/// Instructions executed per UI tick while running.
const TICK_BUDGET: usize = 2_000;

/// Output kept for the console pane.
const OUTPUT_LIMIT: usize = 16 * 1024;

/// Debugger application state.
pub struct DebuggerApp {
    /// The machine being debugged.
    pub cpu: Cpu,
    /// State to return to on reset.
    initial: Cpu,
    /// Console wired to the machine.
    pub console: BufferConsole,
    /// Program output so far.
    pub output: String,
    /// Breakpoints (by address).
    pub breakpoints: HashSet<u16>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// Memory view scroll offset, in rows.
    pub mem_scroll: usize,
    /// Line being typed, when in input mode.
    pub input_line: Option<String>,
}

impl DebuggerApp {
    /// Create a debugger for a booted machine.
    pub fn new(cpu: Cpu) -> Self {
        Self {
            initial: cpu.clone(),
            cpu,
            console: BufferConsole::new(),
            output: String::new(),
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status: "Ready. Press 's' to step, 'r' to run, 'i' to type input, 'q' to quit.".into(),
            mem_scroll: 0,
            input_line: None,
        }
    }

    /// True when the next instruction is `in` and no input is queued.
    pub fn needs_input(&self) -> bool {
        self.cpu.is_running()
            && self.console.pending_input() == 0
            && self.cpu.mem.peek(self.cpu.regs.ip as usize) == Some(Opcode::In.code())
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        if !self.cpu.is_running() {
            self.status = match self.cpu.last_fault() {
                Some(fault) => format!("Faulted: {}", fault),
                None => format!("Machine stopped: {:?}", self.cpu.state),
            };
            self.running = false;
            return;
        }
        if self.needs_input() {
            self.status = "Waiting for input. Press 'i' to type a line.".into();
            self.running = false;
            return;
        }

        let ip = self.cpu.regs.ip;
        let (text, _) = disassemble_at(&self.cpu.mem, ip as usize);
        let result = self.cpu.step(&mut self.console);
        self.collect_output();

        match result {
            Ok(_) => self.status = format!("{:04X}: {}", ip, text),
            Err(e) => {
                self.status = format!("Error: {}", e);
                self.running = false;
            }
        }
    }

    /// Run until halt, breakpoint, input, or error.
    pub fn run(&mut self) {
        self.running = true;
        self.status = "Running...".into();
    }

    /// Run one batch of continuous execution.
    pub fn tick(&mut self) {
        for _ in 0..TICK_BUDGET {
            if !self.running {
                return;
            }

            if !self.cpu.is_running() {
                self.running = false;
                self.status = format!("Stopped after {} steps: {:?}", self.cpu.steps, self.cpu.state);
                return;
            }

            let ip = self.cpu.regs.ip;
            if self.breakpoints.contains(&ip) {
                self.running = false;
                self.status = format!("Breakpoint at {:04X}", ip);
                return;
            }

            self.step();
        }
    }

    /// Continue past a breakpoint at the current address.
    pub fn resume(&mut self) {
        if self.breakpoints.contains(&self.cpu.regs.ip) {
            self.step();
        }
        self.run();
    }

    /// Toggle breakpoint at the current instruction.
    pub fn toggle_breakpoint(&mut self) {
        let ip = self.cpu.regs.ip;
        if self.breakpoints.remove(&ip) {
            self.status = format!("Removed breakpoint at {:04X}", ip);
        } else {
            self.breakpoints.insert(ip);
            self.status = format!("Set breakpoint at {:04X}", ip);
        }
    }

    /// Return the machine to the state it was loaded in.
    pub fn reset(&mut self) {
        self.cpu = self.initial.clone();
        self.console = BufferConsole::new();
        self.output.clear();
        self.running = false;
        self.status = "Reset. Ready.".into();
    }

    /// Queue a line of input, adding the newline.
    pub fn submit_input(&mut self, line: &str) {
        self.console.push_input(line);
        self.console.push_input("\n");
        self.status = format!("Queued {} bytes of input", line.len() + 1);
    }

    /// Write a checkpoint to the machine's save path, or `save.dat`.
    pub fn save_checkpoint(&mut self) {
        let path = self
            .cpu
            .checkpoint_path()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(crate::config::DEFAULT_SAVE_PATH));
        self.status = match checkpoint::save(&path, &self.cpu) {
            Ok(()) => format!("Checkpoint written to {}", path.display()),
            Err(e) => format!("Error: {}", e),
        };
    }

    /// Scroll the memory view by `rows`, clamped to memory.
    pub fn scroll_memory(&mut self, rows: isize) {
        let max = MEMORY_SIZE / WORDS_PER_ROW - 1;
        self.mem_scroll = self.mem_scroll.saturating_add_signed(rows).min(max);
    }

    /// Point the memory view at the current instruction.
    pub fn follow_ip(&mut self) {
        self.mem_scroll = self.cpu.regs.ip as usize / WORDS_PER_ROW;
    }

    /// Disassembly starting at the current instruction.
    ///
    /// Instructions have variable length, so the listing only runs forward.
    pub fn disassembly(&self, lines: usize) -> Vec<(u16, String, bool)> {
        let ip = self.cpu.regs.ip;
        let mut addr = ip as usize;
        let mut out = Vec::with_capacity(lines);

        while out.len() < lines && addr < MEMORY_SIZE {
            let (text, len) = disassemble_at(&self.cpu.mem, addr);
            out.push((addr as u16, text, addr == ip as usize));
            addr += len;
        }

        out
    }

    fn collect_output(&mut self) {
        let bytes = self.console.take_output();
        if bytes.is_empty() {
            return;
        }
        self.output.push_str(&String::from_utf8_lossy(&bytes));
        if self.output.len() > OUTPUT_LIMIT {
            let mut cut = self.output.len() - OUTPUT_LIMIT;
            while !self.output.is_char_boundary(cut) {
                cut += 1;
            }
            self.output.drain(..cut);
        }
    }
}

/// Run the debugger on a booted machine.
pub fn run_debugger(cpu: Cpu) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = DebuggerApp::new(cpu);

    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(20))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(line) = app.input_line.as_mut() {
                        match key.code {
                            KeyCode::Enter => {
                                let line = std::mem::take(line);
                                app.input_line = None;
                                app.submit_input(&line);
                            }
                            KeyCode::Esc => app.input_line = None,
                            KeyCode::Backspace => {
                                line.pop();
                            }
                            KeyCode::Char(c) if c.is_ascii() => line.push(c),
                            _ => {}
                        }
                    } else {
                        match key.code {
                            KeyCode::Char('q') => app.should_quit = true,
                            KeyCode::Char('s') => {
                                app.running = false;
                                app.step();
                            }
                            KeyCode::Char('r') => app.resume(),
                            KeyCode::Char('p') => {
                                app.running = false;
                                app.status = "Paused.".into();
                            }
                            KeyCode::Char('b') => app.toggle_breakpoint(),
                            KeyCode::Char('x') => app.reset(),
                            KeyCode::Char('i') => app.input_line = Some(String::new()),
                            KeyCode::Char('w') => app.save_checkpoint(),
                            KeyCode::Char('f') => app.follow_ip(),
                            KeyCode::Up => app.scroll_memory(-1),
                            KeyCode::Down => app.scroll_memory(1),
                            KeyCode::PageUp => app.scroll_memory(-16),
                            KeyCode::PageDown => app.scroll_memory(16),
                            _ => {}
                        }
                    }
                }
            }
        }

        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;

    fn app(source: &str) -> DebuggerApp {
        DebuggerApp::new(Cpu::with_program(&assemble(source).unwrap()).unwrap())
    }

    #[test]
    fn test_step_collects_output() {
        let mut app = app("out 'H'\nout 'i'\nhalt");
        app.step();
        app.step();
        assert_eq!(app.output, "Hi");
        assert_eq!(app.cpu.regs.ip, 4);
    }

    #[test]
    fn test_waits_for_input_instead_of_halting() {
        let mut app = app("in r0\nout r0\nhalt");
        app.run();
        app.tick();
        assert!(app.cpu.is_running());
        assert!(!app.running);
        assert!(app.needs_input());

        app.submit_input("z");
        app.run();
        app.tick();
        assert!(app.cpu.is_halted());
        assert!(app.output.starts_with('z'));
    }

    #[test]
    fn test_breakpoint_stops_run() {
        let mut app = app("nop\nnop\nout 'x'\nhalt");
        app.cpu.regs.ip = 2;
        app.toggle_breakpoint();
        app.reset();

        app.run();
        app.tick();
        assert_eq!(app.cpu.regs.ip, 2);
        assert!(app.output.is_empty());

        app.resume();
        app.tick();
        assert_eq!(app.output, "x");
        assert!(app.cpu.is_halted());
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut app = app("set r0 9\nhalt");
        app.step();
        assert_eq!(app.cpu.regs.r[0].get(), 9);
        app.reset();
        assert_eq!(app.cpu.regs.r[0].get(), 0);
        assert_eq!(app.cpu.regs.ip, 0);
    }

    #[test]
    fn test_disassembly_starts_at_ip() {
        let app = app("set r0 1\nout 'a'\nhalt");
        let lines = app.disassembly(3);
        assert_eq!(lines[0], (0, "set R0 0001".to_string(), true));
        assert_eq!(lines[1], (3, "out 'a'".to_string(), false));
        assert_eq!(lines[2], (5, "halt".to_string(), false));
    }

    #[test]
    fn test_scroll_clamps() {
        let mut app = app("halt");
        app.scroll_memory(-5);
        assert_eq!(app.mem_scroll, 0);
        app.scroll_memory(100_000);
        assert_eq!(app.mem_scroll, MEMORY_SIZE / WORDS_PER_ROW - 1);
    }
}
