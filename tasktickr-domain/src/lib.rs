use std::{
    fmt,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use chrono::{DateTime, Utc};

/// Minimum amount of tracked time accepted as a worklog.
pub const MIN_WORKLOG: Duration = Duration::from_secs(60);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Issue {
    pub id: String,
    pub key: String,
    pub summary: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Information,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Information => "INFO",
            Severity::Warning => "WARN",
            Severity::Error => "ERROR",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorklogSubmission {
    pub issue_id: u64,
    pub issue_name: String,
    pub elapsed: Duration,
    pub started_at: DateTime<Utc>,
}

/// Renders a duration as `hh:mm:ss`; hours keep counting past 24.
pub fn format_clock(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// Sink for operational messages (settings loaded, request failed, ...).
pub trait SupportLog: Send + Sync {
    fn add_log(&self, message: &str, severity: Severity);
}

/// Sink for locally recorded work: one entry per stopped timer.
pub trait WorkRecorder: Send + Sync {
    fn log_work(&self, task_name: &str, elapsed: Duration) -> std::io::Result<()>;
}

/// Keeps every entry in memory. Handy for tests and for headless runs.
#[derive(Debug, Default)]
pub struct MemorySupportLog {
    entries: Mutex<Vec<(Severity, String)>>,
}

impl MemorySupportLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(Severity, String)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries()
            .iter()
            .filter(|(entry_severity, _)| *entry_severity == severity)
            .count()
    }
}

impl SupportLog for MemorySupportLog {
    fn add_log(&self, message: &str, severity: Severity) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((severity, message.to_string()));
    }
}
