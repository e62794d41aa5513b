use std::{
    fmt,
    fs::OpenOptions,
    io::Write,
    path::PathBuf,
};

use chrono::{DateTime, Utc};

use crate::{
    utils::{iso_timestamp, log_date},
    Result,
};

/// Initialize diagnostic tracing (stderr).
///
/// Independent of the activity log: this is for adapter internals such as
/// connect attempts and flood waits. Override with `RUST_LOG`.
pub fn init(service_name: &str) -> Result<()> {
    use tracing_subscriber::EnvFilter;

    // Default: info for our crates, warn for everything else.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,acb=info,acb_core=info,acb_telegram=info,{service_name}=info"
        ))
    });

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();

    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => f.write_str("INFO"),
            LogLevel::Error => f.write_str("ERROR"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn now(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
        }
    }

    /// `<timestamp> - <LEVEL>: <message>`
    pub fn line(&self) -> String {
        format!(
            "{} - {}: {}",
            iso_timestamp(self.timestamp),
            self.level,
            self.message
        )
    }
}

/// Process-wide activity log shared by every component.
///
/// Implementations must be best-effort: logging never fails the caller.
pub trait ActivityLog: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }
}

/// Console + one append-only file per calendar day (`bot_log_YYYY-MM-DD.log`).
#[derive(Clone, Debug)]
pub struct DailyFileLog {
    dir: PathBuf,
}

impl DailyFileLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, at: DateTime<Utc>) -> PathBuf {
        self.dir.join(format!("bot_log_{}.log", log_date(at)))
    }

    pub fn write(&self, entry: &LogEntry) {
        let line = entry.line();
        println!("{line}");
        if let Err(e) = self.append(entry, &line) {
            eprintln!("Error writing to log file: {e}");
        }
    }

    fn append(&self, entry: &LogEntry, line: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(entry.timestamp))?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

impl ActivityLog for DailyFileLog {
    fn log(&self, level: LogLevel, message: &str) {
        self.write(&LogEntry::now(level, message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::tmp_dir;
    use chrono::TimeZone;

    #[test]
    fn entry_line_format() {
        let entry = LogEntry {
            timestamp: Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap(),
            level: LogLevel::Error,
            message: "boom".to_string(),
        };
        assert_eq!(entry.line(), "2024-02-03T04:05:06.000Z - ERROR: boom");
    }

    #[test]
    fn appends_to_daily_file() {
        let dir = tmp_dir("acb-log-test");
        let log = DailyFileLog::new(&dir);
        let at = Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap();
        for msg in ["one", "two"] {
            log.write(&LogEntry {
                timestamp: at,
                level: LogLevel::Info,
                message: msg.to_string(),
            });
        }

        let path = dir.join("bot_log_2024-02-03.log");
        assert_eq!(log.path_for(at), path);
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "2024-02-03T04:05:06.000Z - INFO: one\n2024-02-03T04:05:06.000Z - INFO: two\n"
        );

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn unwritable_dir_does_not_panic() {
        let log = DailyFileLog::new("/nonexistent/acb/log/dir");
        log.info("still fine");
        log.error("still fine");
    }
}
