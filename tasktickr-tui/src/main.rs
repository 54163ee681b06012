mod app;
mod cli_args;
mod telemetry;
mod tui;
mod work_log;
mod worker;

use std::{io, sync::Arc};

use anyhow::Result;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tasktickr_config::{Configuration, SettingsLoader};
use tasktickr_domain::SupportLog;
use tasktickr_jira::{IssueTracker, JiraClient};

use crate::{
    app::App,
    cli_args::{parse_cli_action, print_help, resolve_base_dir, CliAction},
    telemetry::{init_tracing, TracingSupportLog, LOG_DIR_NAME},
    tui::run_app,
    work_log::CsvWorkLog,
    worker::{start_tracker_worker, Connector, TrackerBackend},
};

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn jira_connector(log: Arc<dyn SupportLog>) -> Connector {
    Box::new(move |config: &Configuration| {
        JiraClient::new(config, log.clone())
            .map(|client| Box::new(client) as Box<dyn IssueTracker>)
            .map_err(|error| error.to_string())
    })
}

fn main() -> Result<()> {
    let base_dir = match parse_cli_action()? {
        CliAction::Help => {
            print_help();
            return Ok(());
        }
        CliAction::Run { base_dir } => resolve_base_dir(base_dir)?,
    };

    let _log_guard = init_tracing(&base_dir)?;
    tracing::info!(base_dir = %base_dir.display(), "tasktickr starting");

    let support_log: Arc<dyn SupportLog> = Arc::new(TracingSupportLog);
    let work_log = Arc::new(CsvWorkLog::new(&base_dir.join(LOG_DIR_NAME)));
    let settings = SettingsLoader::new(&base_dir, support_log.clone());
    tracing::debug!(
        settings = %settings.path().display(),
        work_log = %work_log.path().display(),
        "resolved file locations"
    );
    let backend = TrackerBackend::new(settings, jira_connector(support_log.clone()));
    let (request_tx, result_rx) = start_tracker_worker(backend);

    let mut app = App::new(support_log, work_log);
    if let Some(request) = app.refresh() {
        request_tx.send(request)?;
    }

    let mut terminal = setup_terminal()?;
    let run_result = run_app(&mut terminal, app, request_tx, result_rx);
    let restore_result = restore_terminal(&mut terminal);

    if let Err(error) = restore_result {
        return Err(error);
    }
    run_result
}
