use std::{
    sync::mpsc::{self, Receiver, Sender},
    thread,
};

use tasktickr_config::{Configuration, SettingsLoader};
use tasktickr_domain::{Issue, WorklogSubmission};
use tasktickr_jira::IssueTracker;

use crate::app::{TrackerRequest, TrackerResult};

pub type Connector =
    Box<dyn Fn(&Configuration) -> Result<Box<dyn IssueTracker>, String> + Send>;

/// Owns everything that talks to the tracker. Lives on the worker thread.
pub struct TrackerBackend {
    settings: SettingsLoader,
    connect: Connector,
    tracker: Option<Box<dyn IssueTracker>>,
    worklog_endpoint: Option<String>,
}

impl TrackerBackend {
    pub fn new(settings: SettingsLoader, connect: Connector) -> Self {
        Self {
            settings,
            connect,
            tracker: None,
            worklog_endpoint: None,
        }
    }

    pub fn handle(&mut self, request: TrackerRequest) -> TrackerResult {
        match request {
            TrackerRequest::Refresh => TrackerResult::Refreshed(self.refresh()),
            TrackerRequest::Submit(submission) => {
                let result = self.submit(&submission);
                TrackerResult::Submitted {
                    issue_name: submission.issue_name,
                    result,
                }
            }
        }
    }

    // Settings are re-read on every refresh so edits apply without a restart.
    fn refresh(&mut self) -> Result<Vec<Issue>, String> {
        let config = self.settings.load().map_err(|error| error.to_string())?;
        let endpoints = self
            .settings
            .load_endpoints()
            .map_err(|error| error.to_string())?;
        let tracker = (self.connect)(&config)?;

        let issues = tracker
            .fetch_issues(
                &endpoints.search_endpoint,
                &endpoints.filter_query_for(&config),
            )
            .map_err(|error| error.to_string())?;

        self.tracker = Some(tracker);
        self.worklog_endpoint = Some(endpoints.worklog_endpoint);
        Ok(issues)
    }

    fn submit(&self, submission: &WorklogSubmission) -> Result<(), String> {
        let (Some(tracker), Some(endpoint)) = (&self.tracker, &self.worklog_endpoint) else {
            return Err("Tasks have not been loaded from the tracker yet".to_string());
        };
        tracker
            .submit_worklog(submission, endpoint)
            .map_err(|error| error.to_string())
    }
}

/// Every request is answered in order; submissions are never coalesced away.
pub fn start_tracker_worker(
    mut backend: TrackerBackend,
) -> (Sender<TrackerRequest>, Receiver<TrackerResult>) {
    let (request_tx, request_rx) = mpsc::channel::<TrackerRequest>();
    let (result_tx, result_rx) = mpsc::channel::<TrackerResult>();

    thread::spawn(move || {
        while let Ok(request) = request_rx.recv() {
            if result_tx.send(backend.handle(request)).is_err() {
                break;
            }
        }
    });

    (request_tx, result_rx)
}
