use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use tasktickr_domain::{
    format_clock, Issue, Severity, SupportLog, WorkRecorder, WorklogSubmission, MIN_WORKLOG,
};

pub const TICK: Duration = Duration::from_secs(1);

const STATUS_LIMIT: usize = 96;

#[derive(Debug, PartialEq, Eq)]
pub enum TrackerRequest {
    Refresh,
    Submit(WorklogSubmission),
}

#[derive(Debug)]
pub enum TrackerResult {
    Refreshed(std::result::Result<Vec<Issue>, String>),
    Submitted {
        issue_name: String,
        result: std::result::Result<(), String>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Running {
        issue: Issue,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    },
    Submitting,
}

#[derive(Debug, PartialEq, Eq)]
pub enum StopOutcome {
    NotRunning,
    TooShort,
    Submit(WorklogSubmission),
}

/// Timer session: task list, selection and the start/stop clock.
pub struct App {
    pub(crate) issues: Vec<Issue>,
    pub(crate) selected: usize,
    pub(crate) status_line: String,
    phase: Phase,
    last_elapsed: Duration,
    support_log: Arc<dyn SupportLog>,
    work_log: Arc<dyn WorkRecorder>,
}

impl App {
    pub fn new(support_log: Arc<dyn SupportLog>, work_log: Arc<dyn WorkRecorder>) -> Self {
        support_log.add_log("Starting TaskTickr", Severity::Information);
        Self {
            issues: Vec::new(),
            selected: 0,
            status_line: "Press r to load tasks".to_string(),
            phase: Phase::Idle,
            last_elapsed: Duration::ZERO,
            support_log,
            work_log,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, Phase::Running { .. })
    }

    pub fn selected_issue(&self) -> Option<&Issue> {
        self.issues.get(self.selected)
    }

    pub fn elapsed(&self) -> Duration {
        match &self.phase {
            Phase::Running { elapsed, .. } => *elapsed,
            _ => self.last_elapsed,
        }
    }

    pub fn elapsed_display(&self) -> String {
        format_clock(self.elapsed())
    }

    pub fn refresh(&mut self) -> Option<TrackerRequest> {
        match self.phase {
            Phase::Idle => {
                self.phase = Phase::Loading;
                self.status_line = "Loading tasks...".to_string();
                Some(TrackerRequest::Refresh)
            }
            Phase::Loading => None,
            Phase::Running { .. } => {
                self.status_line = "Stop the timer before refreshing".to_string();
                None
            }
            Phase::Submitting => {
                self.status_line = "Waiting for the worklog submission".to_string();
                None
            }
        }
    }

    pub fn ingest(&mut self, result: TrackerResult) -> Option<TrackerRequest> {
        match result {
            TrackerResult::Refreshed(result) => {
                self.ingest_refresh(result);
                None
            }
            TrackerResult::Submitted { issue_name, result } => {
                self.ingest_submission(&issue_name, result)
            }
        }
    }

    pub fn ingest_refresh(&mut self, result: std::result::Result<Vec<Issue>, String>) {
        if self.phase != Phase::Loading {
            return;
        }
        self.phase = Phase::Idle;

        match result {
            Ok(mut issues) => {
                let preferred_id = self.selected_issue().map(|issue| issue.id.clone());
                issues.sort_by(|left, right| left.summary.cmp(&right.summary));
                self.issues = issues;
                self.selected = preferred_id
                    .and_then(|id| self.issues.iter().position(|issue| issue.id == id))
                    .unwrap_or(0);
                self.status_line = format!("Loaded {} tasks", self.issues.len());
            }
            Err(error) => {
                self.status_line = compact_status(&format!("Failed to load tasks: {error}"));
            }
        }
    }

    pub fn next(&mut self) {
        if self.phase != Phase::Idle || self.issues.is_empty() {
            return;
        }
        self.selected = (self.selected + 1) % self.issues.len();
    }

    pub fn prev(&mut self) {
        if self.phase != Phase::Idle || self.issues.is_empty() {
            return;
        }
        self.selected = if self.selected == 0 {
            self.issues.len() - 1
        } else {
            self.selected - 1
        };
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Result<()> {
        match self.phase {
            Phase::Idle => {}
            Phase::Running { .. } => bail!("Timer is already running"),
            Phase::Loading | Phase::Submitting => bail!("Tracker request still in progress"),
        }

        let Some(issue) = self.selected_issue().cloned() else {
            self.status_line = "No task has been selected".to_string();
            bail!("No task has been selected");
        };

        self.support_log.add_log(
            &format!("Timer started for task {}", issue.summary),
            Severity::Information,
        );
        self.status_line = format!("Tracking {}", issue.summary);
        self.last_elapsed = Duration::ZERO;
        self.phase = Phase::Running {
            issue,
            started_at: now,
            elapsed: Duration::ZERO,
        };
        Ok(())
    }

    pub fn tick(&mut self) {
        if let Phase::Running { elapsed, .. } = &mut self.phase {
            *elapsed += TICK;
        }
    }

    /// Ends the running timer. Anything under [`MIN_WORKLOG`] is discarded;
    /// otherwise the work is recorded locally and a submission is returned.
    pub fn stop(&mut self) -> Result<StopOutcome> {
        let Phase::Running {
            issue,
            started_at,
            elapsed,
        } = std::mem::replace(&mut self.phase, Phase::Idle)
        else {
            return Ok(StopOutcome::NotRunning);
        };

        self.support_log.add_log(
            &format!("Timer stopped for task {}", issue.summary),
            Severity::Information,
        );

        if elapsed < MIN_WORKLOG {
            self.last_elapsed = Duration::ZERO;
            self.report_error("Cannot log less than 1 work minute");
            return Ok(StopOutcome::TooShort);
        }
        self.last_elapsed = elapsed;

        let issue_id = issue.id.parse::<u64>().map_err(|_| {
            let message = format!("Task {} has a non-numeric id '{}'", issue.key, issue.id);
            self.report_error(&message);
            anyhow!(message)
        })?;

        if let Err(error) = self.work_log.log_work(&issue.summary, elapsed) {
            self.support_log.add_log(
                &format!("Failed to record work locally: {error}"),
                Severity::Warning,
            );
        }

        self.phase = Phase::Submitting;
        self.status_line = format!("Submitting {} for {}", format_clock(elapsed), issue.summary);
        Ok(StopOutcome::Submit(WorklogSubmission {
            issue_id,
            issue_name: issue.summary,
            elapsed,
            started_at,
        }))
    }

    /// On success the task list is reloaded, so a refresh request is returned.
    pub fn ingest_submission(
        &mut self,
        issue_name: &str,
        result: std::result::Result<(), String>,
    ) -> Option<TrackerRequest> {
        if self.phase != Phase::Submitting {
            return None;
        }
        self.phase = Phase::Idle;
        self.last_elapsed = Duration::ZERO;

        match result {
            Ok(()) => {
                let request = self.refresh();
                self.status_line = format!("Task time logged successfully for {issue_name}");
                request
            }
            Err(error) => {
                self.status_line = compact_status(&format!("Failed to log time: {error}"));
                None
            }
        }
    }

    fn report_error(&mut self, message: &str) {
        self.support_log.add_log(message, Severity::Error);
        self.status_line = compact_status(message);
    }
}

fn compact_status(value: &str) -> String {
    let cleaned = value.replace('\n', " ");
    if cleaned.chars().count() <= STATUS_LIMIT {
        return cleaned;
    }
    let truncated = cleaned.chars().take(STATUS_LIMIT).collect::<String>();
    format!("{truncated}...")
}
