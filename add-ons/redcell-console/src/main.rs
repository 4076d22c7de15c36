//! redcell-console: TUI with Ratatui. Tails Coordinator events, keyboard-driven.
//! Tool execution: redcell_core::Coordinator::execute().

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    prelude::*,
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};
use redcell_console::{build_coordinator, demo_intents};
use std::io::stdout;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let storage = std::env::current_dir().unwrap_or_else(|_| std::path::PathBuf::from("."));
    let storage = storage.join("data").join("knowledge.sled");
    let coordinator = build_coordinator(&storage)?;
    let intents = demo_intents();
    let mut next_intent = 0usize;

    let mut log_lines: Vec<String> = vec![
        "[redcell-console] TUI started. Keys: R = run next demo intent, Q = quit.".to_string(),
        "[stream] Ready for tool output / entity events.".to_string(),
    ];
    let mut scroll = 0;
    let mut scroll_state = ScrollbarState::default();

    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    loop {
        scroll_state = scroll_state.content_length(log_lines.len()).position(scroll);
        terminal.draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .margin(1)
                .constraints([
                    Constraint::Length(3),
                    Constraint::Min(10),
                    Constraint::Length(1),
                ])
                .split(f.area());

            let header = Paragraph::new("redcell console — [R] Run next intent  [Q] Quit")
                .block(Block::default().borders(Borders::ALL).title(" Header "));
            f.render_widget(header, chunks[0]);

            let log_text = log_lines.join("\n");
            let para = Paragraph::new(log_text)
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(" Tool output / entity events "),
                )
                .scroll((scroll as u16, 0));
            f.render_widget(para, chunks[1]);
            f.render_stateful_widget(
                Scrollbar::new(ScrollbarOrientation::VerticalRight)
                    .thumb_symbol("█")
                    .track_symbol(Some("│")),
                chunks[1],
                &mut scroll_state,
            );

            let help = Paragraph::new("keyboard-driven: R=run, Up/Down=scroll, Q=quit");
            f.render_widget(help, chunks[2]);
        })?;

        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match key.code {
                    KeyCode::Char('q') | KeyCode::Char('Q') => break,
                    KeyCode::Char('r') | KeyCode::Char('R') => {
                        let intent = intents[next_intent % intents.len()].clone();
                        next_intent += 1;
                        log_lines.push(format!(
                            "[dispatch] executing {:?} against {}...",
                            intent.kind, intent.target
                        ));
                        let coordinator = coordinator.clone();
                        let lines = tokio::runtime::Runtime::new()?.block_on(run_and_collect(coordinator, intent));
                        log_lines.extend(lines);
                        scroll = log_lines.len().saturating_sub(10);
                    }
                    KeyCode::Up => scroll = scroll.saturating_sub(1),
                    KeyCode::Down => scroll = (scroll + 1).min(log_lines.len().saturating_sub(1)),
                    _ => {}
                }
            }
        }
    }

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

async fn run_and_collect(
    coordinator: std::sync::Arc<redcell_core::Coordinator>,
    intent: redcell_core::Intent,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut rx = match coordinator.execute(intent, false).await {
        Ok(rx) => rx,
        Err(e) => {
            lines.push(format!("[error] {e}"));
            return lines;
        }
    };

    while let Some(event) = rx.recv().await {
        lines.push(format_event(&event));
    }
    lines
}

fn format_event(event: &redcell_core::EngineEvent) -> String {
    use redcell_core::EngineEvent::*;
    match event {
        ToolStarted { tool_id, argv, .. } => format!("[started] {tool_id} {}", argv.join(" ")),
        ToolOutputChunk { text, .. } => format!("  {text}"),
        InputRequested { kind, .. } => format!("[input-requested] {kind:?}"),
        ApprovalRequired { intent_target, risk, reason } => {
            format!("[approval-required] {intent_target} risk={risk:?}: {reason}")
        }
        ToolCompleted { status, entities_created, duration_ms, .. } => format!(
            "[completed] status={status:?} entities={entities_created} duration_ms={duration_ms}"
        ),
        ToolError { kind, message, .. } => format!("[tool-error] {kind}: {message}"),
        ParseOutcome { status, .. } => format!("[parse] {status:?}"),
    }
}
