use std::{
    io,
    sync::mpsc::{Receiver, Sender},
    time::{Duration, Instant},
};

use anyhow::{anyhow, Result};
use chrono::Utc;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};

use crate::app::{App, Phase, StopOutcome, TrackerRequest, TrackerResult, TICK};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut app: App,
    request_tx: Sender<TrackerRequest>,
    result_rx: Receiver<TrackerResult>,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        while let Ok(message) = result_rx.try_recv() {
            if let Some(request) = app.ingest(message) {
                send(&request_tx, request)?;
            }
        }

        while last_tick.elapsed() >= TICK {
            app.tick();
            last_tick += TICK;
        }

        terminal.draw(|frame| draw_ui(frame, &app))?;

        if event::poll(POLL_INTERVAL)? {
            let Event::Key(key) = event::read()? else {
                continue;
            };

            if key.kind != KeyEventKind::Press {
                continue;
            }

            let was_running = app.is_running();
            if handle_key_event(&mut app, key, &request_tx)? {
                break;
            }
            if !was_running && app.is_running() {
                last_tick = Instant::now();
            }
        }
    }

    Ok(())
}

/// Returns `true` when the app should exit.
fn handle_key_event(
    app: &mut App,
    key: KeyEvent,
    request_tx: &Sender<TrackerRequest>,
) -> Result<bool> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Ok(true);
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => match app.phase() {
            Phase::Running { .. } => {
                app.status_line = "Stop the timer before quitting (Ctrl-C forces)".to_string();
            }
            Phase::Submitting => {
                app.status_line = "Waiting for the worklog submission".to_string();
            }
            Phase::Idle | Phase::Loading => return Ok(true),
        },
        KeyCode::Char('j') | KeyCode::Down => app.next(),
        KeyCode::Char('k') | KeyCode::Up => app.prev(),
        KeyCode::Char('r') => {
            if let Some(request) = app.refresh() {
                send(request_tx, request)?;
            }
        }
        KeyCode::Char('s') | KeyCode::Enter => {
            if let Err(error) = app.start(Utc::now()) {
                app.status_line = error.to_string();
            }
        }
        KeyCode::Char('x') => match app.stop() {
            Ok(StopOutcome::Submit(submission)) => {
                send(request_tx, TrackerRequest::Submit(submission))?;
            }
            Ok(StopOutcome::NotRunning) => {
                app.status_line = "Timer is not running".to_string();
            }
            Ok(StopOutcome::TooShort) => {}
            Err(error) => app.status_line = error.to_string(),
        },
        _ => {}
    }

    Ok(false)
}

fn send(request_tx: &Sender<TrackerRequest>, request: TrackerRequest) -> Result<()> {
    request_tx
        .send(request)
        .map_err(|_| anyhow!("tracker worker stopped unexpectedly"))
}

fn draw_ui(frame: &mut Frame, app: &App) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let (title, clock_style) = match app.phase() {
        Phase::Running { issue, .. } => (
            format!("Tracking {}", issue.key),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Phase::Submitting => ("Submitting".to_string(), Style::default()),
        Phase::Loading => ("Loading".to_string(), Style::default()),
        Phase::Idle => ("Idle".to_string(), Style::default()),
    };
    let clock = Paragraph::new(app.elapsed_display())
        .style(clock_style)
        .alignment(Alignment::Center)
        .block(Block::default().title(title).borders(Borders::ALL));
    frame.render_widget(clock, vertical[0]);

    let running_id = match app.phase() {
        Phase::Running { issue, .. } => Some(issue.id.as_str()),
        _ => None,
    };
    let rows: Vec<Row> = app
        .issues
        .iter()
        .map(|issue| {
            let marker = if running_id == Some(issue.id.as_str()) {
                "*"
            } else {
                ""
            };
            Row::new(vec![
                Cell::from(marker),
                Cell::from(issue.key.clone()),
                Cell::from(issue.summary.clone()),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(1),
            Constraint::Length(12),
            Constraint::Min(10),
        ],
    )
    .header(Row::new(vec!["", "Key", "Summary"]))
    .block(
        Block::default()
            .title(format!("Tasks ({})", app.issues.len()))
            .borders(Borders::ALL),
    )
    .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED))
    .highlight_symbol(">> ");

    let mut state = TableState::default();
    if !app.issues.is_empty() {
        state.select(Some(app.selected));
    }
    frame.render_stateful_widget(table, vertical[1], &mut state);

    let footer = format!(
        "j/k move | s start | x stop | r refresh | q quit | {}",
        app.status_line
    );
    frame.render_widget(Paragraph::new(footer), vertical[2]);
}
