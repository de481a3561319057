//! UI rendering for the debugger.

use super::app::{DebuggerApp, WORDS_PER_ROW};
use crate::cpu::memory::MEMORY_SIZE;
use ratatui::{
    prelude::*,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DebuggerApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(frame.area());

    // Left side: program output, code and status
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(50),
            Constraint::Min(8),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    draw_output(frame, left_chunks[0], app);
    draw_disassembly(frame, left_chunks[1], app);
    draw_status(frame, left_chunks[2], app);

    // Right side: registers, stack, memory and help
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7),
            Constraint::Length(5),
            Constraint::Min(6),
            Constraint::Length(4),
        ])
        .split(chunks[1]);

    draw_registers(frame, right_chunks[0], app);
    draw_stack(frame, right_chunks[1], app);
    draw_memory(frame, right_chunks[2], app);
    draw_help(frame, right_chunks[3]);
}

/// Draw the program's console output, newest lines at the bottom.
fn draw_output(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let visible = (area.height as usize).saturating_sub(2);
    let lines: Vec<&str> = app.output.lines().collect();
    let tail = lines[lines.len().saturating_sub(visible)..].join("\n");

    let paragraph = Paragraph::new(tail)
        .wrap(Wrap { trim: false })
        .block(panel(" Output ", Color::Blue));

    frame.render_widget(paragraph, area);
}

/// Draw disassembly from the current instruction.
fn draw_disassembly(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let disasm = app.disassembly((area.height as usize).saturating_sub(2));

    let items: Vec<ListItem> = disasm
        .iter()
        .map(|(addr, instr, is_current)| {
            let prefix = if *is_current { "▶ " } else { "  " };
            let bp = if app.breakpoints.contains(addr) { "●" } else { " " };
            let text = format!("{}{:04X}: {}", prefix, addr, instr);

            let style = if *is_current {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if app.breakpoints.contains(addr) {
                Style::default().fg(Color::Red)
            } else {
                Style::default()
            };

            ListItem::new(format!("{} {}", bp, text)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(panel(" Disassembly ", Color::Cyan));

    frame.render_widget(list, area);
}

/// Draw register state.
fn draw_registers(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let regs = &app.cpu.regs;
    let reg_line = |range: std::ops::Range<usize>| {
        let mut spans = Vec::new();
        for i in range {
            spans.push(Span::raw(format!("R{}: ", i)));
            spans.push(Span::styled(
                format!("{:>5}  ", regs.r[i].get()),
                Style::default().fg(Color::White),
            ));
        }
        Line::from(spans)
    };

    let state_style = if app.cpu.is_running() {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::Red)
    };

    let content = vec![
        reg_line(0..4),
        reg_line(4..8),
        Line::from(vec![
            Span::raw("IP: "),
            Span::styled(format!("{:04X}", regs.ip), Style::default().fg(Color::Yellow)),
            Span::raw("   Steps: "),
            Span::styled(format!("{}", app.cpu.steps), Style::default().fg(Color::Cyan)),
            Span::raw("   Last: "),
            Span::raw(app.cpu.last_opcode().map_or("-", |op| op.mnemonic())),
        ]),
        Line::from(vec![
            Span::raw("State: "),
            Span::styled(format!("{:?}", app.cpu.state), state_style),
            Span::raw("   Input queued: "),
            Span::raw(format!("{}", app.console.pending_input())),
        ]),
    ];

    let paragraph = Paragraph::new(content)
        .block(panel(" Registers ", Color::Green));

    frame.render_widget(paragraph, area);
}

/// Draw the top of the stack.
fn draw_stack(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let entries = app.cpu.stack.as_slice();
    let width = (area.width as usize).saturating_sub(2) / 6;
    let shown: Vec<String> = entries
        .iter()
        .rev()
        .take(width.max(1) * 2)
        .map(|w| format!("{:04X}", w.get()))
        .collect();

    let paragraph = Paragraph::new(shown.join(" "))
        .wrap(Wrap { trim: true })
        .block(panel(format!(" Stack ({}) ", entries.len()), Color::Yellow));

    frame.render_widget(paragraph, area);
}

/// Draw memory view.
fn draw_memory(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let visible_rows = (area.height as usize).saturating_sub(2);
    let start = app.mem_scroll;
    let end = (start + visible_rows).min(MEMORY_SIZE / WORDS_PER_ROW);
    let ip = app.cpu.regs.ip as usize;

    let items: Vec<ListItem> = (start..end)
        .map(|row| {
            let base = row * WORDS_PER_ROW;
            let words = app
                .cpu
                .mem
                .dump(base, WORDS_PER_ROW)
                .iter()
                .map(|(_, value)| format!("{:04X}", value))
                .collect::<Vec<_>>()
                .join(" ");
            let text = format!("{:04X}: {}", base, words);

            let style = if (base..base + WORDS_PER_ROW).contains(&ip) {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };

            ListItem::new(text).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(panel(" Memory ", Color::Magenta));

    frame.render_widget(list, area);
}

/// Draw status bar, or the input line while typing.
fn draw_status(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let (title, text) = match &app.input_line {
        Some(line) => (" Input (Enter to send, Esc to cancel) ", format!("> {}_", line)),
        None => (" Status ", app.status.clone()),
    };

    let status = Paragraph::new(text)
        .style(Style::default().fg(Color::White))
        .block(panel(title, Color::White));

    frame.render_widget(status, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("s: Step  r: Run  p: Pause  b: Breakpoint  i: Input"),
        Line::from("x: Reset  w: Save  f: Follow IP  ↑↓/PgUp/PgDn: Memory  q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(panel(" Help ", Color::DarkGray));

    frame.render_widget(help, area);
}

/// A bordered pane with a coloured frame.
fn panel<'a>(title: impl Into<Line<'a>>, color: Color) -> Block<'a> {
    let title: Line<'a> = title.into();
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
}
