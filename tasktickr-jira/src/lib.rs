use std::{sync::Arc, time::Duration};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use reqwest::{
    blocking::{Client, Response},
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tasktickr_config::{Configuration, TASK_ID_TOKEN};
use tasktickr_domain::{format_clock, Issue, Severity, SupportLog, WorklogSubmission};

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum JiraError {
    #[error("jira request failed: status={status} reason={reason}")]
    Remote { status: u16, reason: String },

    #[error("failed to decode Jira response: {0}")]
    Decode(String),

    #[error("failed to reach Jira: {0}")]
    Transport(String),

    #[error("failed to build Jira HTTP client: {0}")]
    Client(String),
}

pub type Result<T> = std::result::Result<T, JiraError>;

impl From<reqwest::Error> for JiraError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            JiraError::Decode(err.to_string())
        } else if err.is_builder() {
            JiraError::Client(err.to_string())
        } else {
            JiraError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for JiraError {
    fn from(err: serde_json::Error) -> Self {
        JiraError::Decode(err.to_string())
    }
}

/// What the timer session needs from a tracker.
pub trait IssueTracker: Send {
    fn fetch_issues(&self, endpoint_path: &str, filter_query: &str) -> Result<Vec<Issue>>;

    fn submit_worklog(&self, submission: &WorklogSubmission, endpoint_path: &str) -> Result<()>;
}

pub struct JiraClient {
    base_url: String,
    account: String,
    http: Client,
    log: Arc<dyn SupportLog>,
}

#[derive(Deserialize)]
struct SearchPayload {
    issues: Vec<IssuePayload>,
}

#[derive(Deserialize)]
struct IssuePayload {
    id: String,
    key: String,
    #[serde(default)]
    fields: IssueFields,
}

#[derive(Default, Deserialize)]
struct IssueFields {
    summary: Option<String>,
}

#[derive(Debug, PartialEq, Serialize)]
struct WorklogPayload {
    #[serde(rename = "timeSpentSeconds")]
    time_spent_seconds: u64,
    started: String,
}

impl JiraClient {
    /// Builds the client and its Basic-Auth header. Performs no network I/O.
    pub fn new(config: &Configuration, log: Arc<dyn SupportLog>) -> Result<Self> {
        let http = build_http_client(config);
        if let Err(error) = &http {
            log.add_log(&error.to_string(), Severity::Error);
        }

        Ok(Self {
            base_url: normalize_server(&config.endpoint_url),
            account: config.account.clone(),
            http: http?,
            log,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn fetch_issues(&self, endpoint_path: &str, filter_query: &str) -> Result<Vec<Issue>> {
        let result = self
            .get_json::<SearchPayload>(&format!("{endpoint_path}{filter_query}"))
            .map(|payload| payload.issues.into_iter().map(into_issue).collect::<Vec<_>>());

        match &result {
            Ok(issues) => self.log.add_log(
                &format!("Loaded {} tasks for user {}", issues.len(), self.account),
                Severity::Information,
            ),
            Err(error) => self.log.add_log(
                &format!("Failed to get tasks for user {}: {error}", self.account),
                Severity::Error,
            ),
        }
        result
    }

    /// Summaries in ascending ordinal order; equal summaries keep server order.
    pub fn fetch_task_names(&self, endpoint_path: &str, filter_query: &str) -> Result<Vec<String>> {
        let issues = self.fetch_issues(endpoint_path, filter_query)?;
        Ok(sorted_task_names(issues))
    }

    pub fn log_time(
        &self,
        issue_id: u64,
        issue_name: &str,
        elapsed: Duration,
        started_at: DateTime<Utc>,
        endpoint_path: &str,
    ) -> Result<()> {
        let payload = WorklogPayload {
            time_spent_seconds: elapsed.as_secs(),
            started: format_started(started_at),
        };
        let path = endpoint_path.replace(TASK_ID_TOKEN, &issue_id.to_string());
        let result = self.post_json(&path, &payload);

        match &result {
            Ok(()) => self.log.add_log(
                &format!("Logged {} into task {issue_name}", format_clock(elapsed)),
                Severity::Information,
            ),
            Err(error) => self.log.add_log(
                &format!("Failed to log time for task {issue_name}: {error}"),
                Severity::Error,
            ),
        }
        result
    }

    fn get_json<T>(&self, path: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = self.url_for(path);
        tracing::debug!(url = %url, "jira GET");
        let response = self.http.get(url).send()?;
        let body = ensure_success(response)?.text()?;
        Ok(serde_json::from_str(&body)?)
    }

    fn post_json<B>(&self, path: &str, body: &B) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url_for(path);
        tracing::debug!(url = %url, "jira POST");
        let response = self.http.post(url).json(body).send()?;
        ensure_success(response).map(|_| ())
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') || path.is_empty() {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

impl IssueTracker for JiraClient {
    fn fetch_issues(&self, endpoint_path: &str, filter_query: &str) -> Result<Vec<Issue>> {
        JiraClient::fetch_issues(self, endpoint_path, filter_query)
    }

    fn submit_worklog(&self, submission: &WorklogSubmission, endpoint_path: &str) -> Result<()> {
        self.log_time(
            submission.issue_id,
            &submission.issue_name,
            submission.elapsed,
            submission.started_at,
            endpoint_path,
        )
    }
}

/// `Basic base64(account:secret)`.
pub fn basic_auth_value(account: &str, secret: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{account}:{secret}")))
}

/// Worklog start in the `yyyy-MM-ddTHH:mm:ss.SSS+0000` shape Jira accepts,
/// taken from the UTC instant so the offset marker is always accurate.
pub fn format_started(started_at: DateTime<Utc>) -> String {
    started_at.format("%Y-%m-%dT%H:%M:%S%.3f+0000").to_string()
}

pub fn sorted_task_names(issues: Vec<Issue>) -> Vec<String> {
    let mut names = issues
        .into_iter()
        .map(|issue| issue.summary)
        .collect::<Vec<_>>();
    names.sort();
    names
}

fn build_http_client(config: &Configuration) -> Result<Client> {
    let mut auth = HeaderValue::from_str(&basic_auth_value(&config.account, &config.secret))
        .map_err(|err| JiraError::Client(err.to_string()))?;
    auth.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, auth);
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|err| JiraError::Client(err.to_string()))
}

fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    Err(JiraError::Remote {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
    })
}

fn into_issue(payload: IssuePayload) -> Issue {
    Issue {
        id: payload.id,
        key: payload.key,
        summary: payload.fields.summary.unwrap_or_default(),
    }
}

fn normalize_server(value: &str) -> String {
    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use chrono::{TimeZone, Utc};
    use mockito::{Matcher, Server};
    use serde_json::json;
    use tasktickr_config::Configuration;
    use tasktickr_domain::{Issue, MemorySupportLog, Severity, WorklogSubmission};

    use super::{
        basic_auth_value, format_started, normalize_server, sorted_task_names, IssueTracker,
        JiraClient, JiraError, WorklogPayload,
    };

    const SEARCH_PATH: &str = "/rest/api/2/search?jql=";
    const WORKLOG_PATH: &str = "/rest/api/2/issue/TASK_ID/worklog";

    fn config_for(url: &str) -> Configuration {
        Configuration {
            endpoint_url: url.to_string(),
            account: "alice".to_string(),
            secret: "s3cret".to_string(),
            excluded_statuses: "'Done'".to_string(),
        }
    }

    fn client_for(server: &Server) -> (JiraClient, Arc<MemorySupportLog>) {
        let log = Arc::new(MemorySupportLog::new());
        let client = JiraClient::new(&config_for(&server.url()), log.clone()).expect("client");
        (client, log)
    }

    fn issue(id: &str, key: &str, summary: &str) -> Issue {
        Issue {
            id: id.to_string(),
            key: key.to_string(),
            summary: summary.to_string(),
        }
    }

    #[test]
    fn encodes_basic_auth_header() {
        assert_eq!(basic_auth_value("alice", "s3cret"), "Basic YWxpY2U6czNjcmV0");
    }

    #[test]
    fn normalizes_server_url() {
        assert_eq!(
            normalize_server("acme.atlassian.net/"),
            "https://acme.atlassian.net"
        );
        assert_eq!(normalize_server("http://localhost:8080"), "http://localhost:8080");
    }

    #[test]
    fn formats_start_time_in_twenty_four_hour_utc() {
        let afternoon = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        assert_eq!(format_started(afternoon), "2024-03-05T14:07:09.000+0000");
    }

    #[test]
    fn sorts_task_names_stably_by_ordinal() {
        let names = sorted_task_names(vec![
            issue("1", "D-1", "b"),
            issue("2", "D-2", "B"),
            issue("3", "D-3", "A"),
            issue("4", "D-4", "B"),
        ]);
        assert_eq!(names, vec!["A", "B", "B", "b"]);
    }

    #[test]
    fn fetches_issues_with_auth_and_filter_query() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", "/rest/api/2/search")
            .match_header("authorization", "Basic YWxpY2U6czNjcmV0")
            .match_query(Matcher::UrlEncoded(
                "jql".into(),
                "status NOT IN ('Done')".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "issues": [
                        {"id": "10002", "key": "DEMO-2", "fields": {"summary": "B"}},
                        {"id": "10001", "key": "DEMO-1", "fields": {"summary": "A"}}
                    ]
                })
                .to_string(),
            )
            .create();

        let (client, log) = client_for(&server);
        let issues = client
            .fetch_issues(SEARCH_PATH, "status NOT IN ('Done')")
            .expect("issues");

        mock.assert();
        assert_eq!(
            issues,
            vec![issue("10002", "DEMO-2", "B"), issue("10001", "DEMO-1", "A")]
        );
        assert_eq!(log.count(Severity::Information), 1);
    }

    #[test]
    fn task_names_come_back_sorted() {
        let mut server = Server::new();
        server
            .mock("GET", "/rest/api/2/search")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"issues":[{"id":"2","key":"D-2","fields":{"summary":"B"}},{"id":"1","key":"D-1","fields":{"summary":"A"}}]}"#)
            .create();

        let (client, _) = client_for(&server);
        let names = client.fetch_task_names(SEARCH_PATH, "x").expect("names");
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn non_success_fetch_raises_remote_error_and_logs_once() {
        let mut server = Server::new();
        server
            .mock("GET", "/rest/api/2/search")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body("nope")
            .create();

        let (client, log) = client_for(&server);
        let error = client.fetch_task_names(SEARCH_PATH, "x").expect_err("401");

        match error {
            JiraError::Remote { status, reason } => {
                assert_eq!(status, 401);
                assert_eq!(reason, "Unauthorized");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(log.count(Severity::Error), 1);
    }

    #[test]
    fn malformed_search_body_raises_decode_error() {
        let mut server = Server::new();
        server
            .mock("GET", "/rest/api/2/search")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"total": 3}"#)
            .create();

        let (client, log) = client_for(&server);
        let error = client.fetch_issues(SEARCH_PATH, "x").expect_err("decode");

        assert!(matches!(error, JiraError::Decode(_)));
        assert_eq!(log.count(Severity::Error), 1);
    }

    #[test]
    fn logs_time_with_truncated_seconds_and_issue_id() {
        let mut server = Server::new();
        let mock = server
            .mock("POST", "/rest/api/2/issue/10042/worklog")
            .match_header("authorization", "Basic YWxpY2U6czNjcmV0")
            .match_body(Matcher::Json(json!({
                "timeSpentSeconds": 125,
                "started": "2024-03-05T14:07:09.000+0000"
            })))
            .with_status(201)
            .create();

        let (client, log) = client_for(&server);
        client
            .log_time(
                10042,
                "Write docs",
                Duration::from_millis(125_900),
                Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap(),
                WORKLOG_PATH,
            )
            .expect("logged");

        mock.assert();
        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(
            entries[0],
            (
                Severity::Information,
                "Logged 00:02:05 into task Write docs".to_string()
            )
        );
    }

    #[test]
    fn non_success_worklog_raises_remote_error_and_logs_once() {
        let mut server = Server::new();
        server
            .mock("POST", "/rest/api/2/issue/7/worklog")
            .with_status(400)
            .create();

        let (client, log) = client_for(&server);
        let submission = WorklogSubmission {
            issue_id: 7,
            issue_name: "Broken".to_string(),
            elapsed: Duration::from_secs(60),
            started_at: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
        };
        let error = client
            .submit_worklog(&submission, WORKLOG_PATH)
            .expect_err("400");

        assert!(matches!(
            error,
            JiraError::Remote { status: 400, ref reason } if reason == "Bad Request"
        ));
        assert_eq!(log.count(Severity::Error), 1);
    }

    #[test]
    fn unreachable_server_raises_transport_error() {
        let log = Arc::new(MemorySupportLog::new());
        let client =
            JiraClient::new(&config_for("http://127.0.0.1:1"), log.clone()).expect("client");

        let error = client.fetch_issues(SEARCH_PATH, "x").expect_err("transport");
        assert!(matches!(error, JiraError::Transport(_)));
        assert_eq!(log.count(Severity::Error), 1);
    }

    #[test]
    fn worklog_payload_uses_jira_field_names() {
        let payload = WorklogPayload {
            time_spent_seconds: 60,
            started: "2024-01-01T09:00:00.000+0000".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&payload).expect("json"),
            json!({"timeSpentSeconds": 60, "started": "2024-01-01T09:00:00.000+0000"})
        );
    }
}
