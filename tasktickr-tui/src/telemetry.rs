use std::{fs, path::Path};

use anyhow::{anyhow, Context, Result};
use tasktickr_domain::{Severity, SupportLog};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_DIR_NAME: &str = "logs";
pub const SUPPORT_LOG_FILE: &str = "log.txt";

const DEFAULT_FILTER: &str = "info";

/// Routes all tracing output to `<base>/logs/log.txt`. The terminal belongs to
/// the TUI, so nothing is written to stdout or stderr.
///
/// Keep the returned guard alive until exit or buffered lines are lost.
pub fn init_tracing(base_dir: &Path) -> Result<WorkerGuard> {
    let log_dir = base_dir.join(LOG_DIR_NAME);
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create log directory {}", log_dir.display()))?;

    let appender = tracing_appender::rolling::never(&log_dir, SUPPORT_LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .with(filter)
        .try_init()
        .map_err(|error| anyhow!("failed to install tracing subscriber: {error}"))?;

    Ok(guard)
}

/// Support log backed by `tracing`; each severity maps to its level.
#[derive(Debug, Default)]
pub struct TracingSupportLog;

impl SupportLog for TracingSupportLog {
    fn add_log(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Information => tracing::info!(target: "tasktickr", "{message}"),
            Severity::Warning => tracing::warn!(target: "tasktickr", "{message}"),
            Severity::Error => tracing::error!(target: "tasktickr", "{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    use tasktickr_domain::{Severity, SupportLog};

    use super::TracingSupportLog;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("buffer").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn severities_map_to_tracing_levels() {
        let buffer = SharedBuffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let log = TracingSupportLog;
            log.add_log("Loaded settings file", Severity::Information);
            log.add_log("Failed to record work locally", Severity::Warning);
            log.add_log("Cannot log less than 1 work minute", Severity::Error);
        });

        let output = String::from_utf8(buffer.0.lock().expect("buffer").clone()).expect("utf8");
        let lines = output.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("INFO") && lines[0].contains("Loaded settings file"));
        assert!(lines[1].contains("WARN"));
        assert!(lines[2].contains("ERROR") && lines[2].contains("1 work minute"));
    }
}
