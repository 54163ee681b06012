use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Mutex,
    time::Duration,
};

use chrono::Local;
use tasktickr_domain::WorkRecorder;

pub const WORK_LOG_FILE: &str = "worklog.csv";

const HEADER: &str = "Timestamp,TaskName,ElapsedTime";

/// Appends one CSV row per recorded stretch of work.
#[derive(Debug)]
pub struct CsvWorkLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl CsvWorkLog {
    pub fn new(log_dir: &Path) -> Self {
        Self {
            path: log_dir.join(WORK_LOG_FILE),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WorkRecorder for CsvWorkLog {
    fn log_work(&self, task_name: &str, elapsed: Duration) -> io::Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let needs_header = fs::metadata(&self.path)
            .map(|meta| meta.len() == 0)
            .unwrap_or(true);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        if needs_header {
            writeln!(file, "{HEADER}")?;
        }
        writeln!(
            file,
            "{},{},{:.2}",
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            csv_field(task_name),
            elapsed.as_secs_f64() / 60.0
        )
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, time::Duration};

    use tasktickr_domain::WorkRecorder;
    use tempfile::tempdir;

    use super::{csv_field, CsvWorkLog};

    #[test]
    fn writes_header_once_and_appends_rows() {
        let dir = tempdir().expect("temp dir");
        let log = CsvWorkLog::new(&dir.path().join("logs"));

        log.log_work("Patch servers", Duration::from_secs(90))
            .expect("first row");
        log.log_work("Rotate keys", Duration::from_secs(3600))
            .expect("second row");

        let content = fs::read_to_string(log.path()).expect("csv");
        let lines = content.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Timestamp,TaskName,ElapsedTime");
        assert!(lines[1].ends_with(",Patch servers,1.50"));
        assert!(lines[2].ends_with(",Rotate keys,60.00"));
    }

    #[test]
    fn quotes_task_names_with_separators() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a, b"), "\"a, b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
