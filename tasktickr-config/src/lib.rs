use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use tasktickr_domain::{Severity, SupportLog};

pub const SETTINGS_FILE_NAME: &str = "TaskTickrSettings.ini";

pub const KEY_URL: &str = "TargetInstanceURL";
pub const KEY_USERNAME: &str = "Username";
pub const KEY_API_KEY: &str = "APIKey";
pub const KEY_PASSWORD: &str = "Password";
pub const KEY_EXCLUDED_STATUS: &str = "ExcludedTaskStatus";
pub const KEY_SEARCH_ENDPOINT: &str = "SearchEndpoint";
pub const KEY_FILTER_QUERY: &str = "FilterQuery";
pub const KEY_WORKLOG_ENDPOINT: &str = "WorklogEndpoint";

/// Replaced by the quoted exclusion list in the filter query.
pub const EXCLUDED_STATUSES_TOKEN: &str = "EXCLUDED_STATUSES";
/// Replaced by the numeric issue id in the worklog endpoint.
pub const TASK_ID_TOKEN: &str = "TASK_ID";

const DEFAULT_SEARCH_ENDPOINT: &str = "/rest/api/2/search?jql=";
const DEFAULT_FILTER_QUERY: &str =
    "assignee = currentUser() AND status NOT IN (EXCLUDED_STATUSES) ORDER BY updated DESC";
const DEFAULT_WORKLOG_ENDPOINT: &str = "/rest/api/2/issue/TASK_ID/worklog";

const PLACEHOLDER_URL: &str = "https://instance.atlassian.net";
const PLACEHOLDER_USERNAME: &str = "user@domain.com";
const PLACEHOLDER_API_KEY: &str = "insert_personal_api_token_key_here";
const PLACEHOLDER_EXCLUDED_STATUS: &str = "Done, Closed";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "settings file not found at {}; a template was generated, fill it in and retry",
        .path.display()
    )]
    MissingFile { path: PathBuf },

    #[error("setting '{0}' is missing or empty")]
    MissingKey(&'static str),

    #[error("setting '{0}' still holds its template value")]
    Placeholder(&'static str),

    #[error("settings io error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Configuration {
    pub endpoint_url: String,
    pub account: String,
    pub secret: String,
    /// Already in query form: `'Done', 'Closed'`.
    pub excluded_statuses: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoints {
    pub search_endpoint: String,
    pub filter_query: String,
    pub worklog_endpoint: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            search_endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            filter_query: DEFAULT_FILTER_QUERY.to_string(),
            worklog_endpoint: DEFAULT_WORKLOG_ENDPOINT.to_string(),
        }
    }
}

impl Endpoints {
    pub fn filter_query_for(&self, config: &Configuration) -> String {
        self.filter_query
            .replace(EXCLUDED_STATUSES_TOKEN, &config.excluded_statuses)
    }

    fn from_entries(entries: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        let pick = |key: &str, fallback: String| {
            entries
                .get(key)
                .and_then(|value| non_empty(value))
                .map(str::to_string)
                .unwrap_or(fallback)
        };

        Self {
            search_endpoint: pick(KEY_SEARCH_ENDPOINT, defaults.search_endpoint),
            filter_query: pick(KEY_FILTER_QUERY, defaults.filter_query),
            worklog_endpoint: pick(KEY_WORKLOG_ENDPOINT, defaults.worklog_endpoint),
        }
    }
}

pub struct SettingsLoader {
    path: PathBuf,
    log: Arc<dyn SupportLog>,
}

impl SettingsLoader {
    pub fn new(base_dir: &Path, log: Arc<dyn SupportLog>) -> Self {
        Self::from_path(base_dir.join(SETTINGS_FILE_NAME), log)
    }

    pub fn from_path(path: PathBuf, log: Arc<dyn SupportLog>) -> Self {
        Self { path, log }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Configuration> {
        let result = self
            .read_entries()
            .and_then(|entries| Configuration::from_entries(&entries));

        match &result {
            Ok(_) => self.log.add_log("Loaded settings file", Severity::Information),
            Err(error) => self.log.add_log(&error.to_string(), Severity::Error),
        }
        result
    }

    /// Optional endpoint overrides. A missing file yields the defaults and
    /// leaves template generation to [`SettingsLoader::load`].
    pub fn load_endpoints(&self) -> Result<Endpoints> {
        if !self.path.exists() {
            return Ok(Endpoints::default());
        }
        let payload = fs::read_to_string(&self.path).inspect_err(|error| {
            self.log.add_log(&error.to_string(), Severity::Error);
        })?;
        Ok(Endpoints::from_entries(&parse_settings(&payload)))
    }

    fn read_entries(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            self.write_template()?;
            return Err(ConfigError::MissingFile {
                path: self.path.clone(),
            });
        }

        let payload = fs::read_to_string(&self.path)?;
        Ok(parse_settings(&payload))
    }

    fn write_template(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, settings_template())?;
        self.log.add_log(
            &format!("Created default settings file in {}", self.path.display()),
            Severity::Information,
        );
        Ok(())
    }
}

impl Configuration {
    pub fn from_entries(entries: &HashMap<String, String>) -> Result<Self> {
        let endpoint_url = required(entries, KEY_URL, PLACEHOLDER_URL)?;
        let account = required(entries, KEY_USERNAME, PLACEHOLDER_USERNAME)?;
        let secret = match required(entries, KEY_API_KEY, PLACEHOLDER_API_KEY) {
            Err(ConfigError::MissingKey(_)) => entries
                .get(KEY_PASSWORD)
                .and_then(|value| non_empty(value))
                .map(str::to_string)
                .ok_or(ConfigError::MissingKey(KEY_API_KEY))?,
            other => other?,
        };
        let excluded = entries
            .get(KEY_EXCLUDED_STATUS)
            .and_then(|value| non_empty(value))
            .ok_or(ConfigError::MissingKey(KEY_EXCLUDED_STATUS))?;

        Ok(Self {
            endpoint_url,
            account,
            secret,
            excluded_statuses: parse_exclusion_filter(excluded),
        })
    }
}

/// Splits each line on its first `=`. Later duplicates overwrite earlier ones.
pub fn parse_settings(payload: &str) -> HashMap<String, String> {
    let mut entries = HashMap::new();
    for line in payload.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || is_section_or_comment(trimmed) {
            continue;
        }

        let (key, value) = trimmed.split_once('=').unwrap_or((trimmed, ""));
        entries.insert(key.trim().to_string(), value.trim().to_string());
    }
    entries
}

/// `Done, Closed` becomes `'Done', 'Closed'`.
pub fn parse_exclusion_filter(value: &str) -> String {
    value
        .split(',')
        .map(|status| format!("'{}'", status.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn settings_template() -> String {
    [
        "[Settings]".to_string(),
        format!("{KEY_URL} = {PLACEHOLDER_URL}"),
        format!("{KEY_USERNAME} = {PLACEHOLDER_USERNAME}"),
        format!("{KEY_API_KEY} = {PLACEHOLDER_API_KEY}"),
        format!("{KEY_EXCLUDED_STATUS} = {PLACEHOLDER_EXCLUDED_STATUS}"),
    ]
    .join("\n")
}

fn required(
    entries: &HashMap<String, String>,
    key: &'static str,
    placeholder: &str,
) -> Result<String> {
    let value = entries
        .get(key)
        .and_then(|value| non_empty(value))
        .ok_or(ConfigError::MissingKey(key))?;
    if value == placeholder {
        return Err(ConfigError::Placeholder(key));
    }
    Ok(value.to_string())
}

fn is_section_or_comment(line: &str) -> bool {
    (line.starts_with('[') && line.ends_with(']')) || line.starts_with(';') || line.starts_with('#')
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed)
}
