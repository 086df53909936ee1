//! File-based debug log for transport diagnostics
//!
//! Off unless `EYAMLDB_DEBUG=1` (or `true`). The minimum level comes from
//! `EYAMLDB_LOG_LEVEL` and defaults to debug. Lines go to
//! `<temp dir>/eyamldb-debug.log`.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::SystemTime;

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
}

impl LogLevel {
    fn from_env_value(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "info" => LogLevel::Info,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Debug,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "TRACE"),
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO "),
            LogLevel::Warn => write!(f, "WARN "),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

struct FileLoggerState {
    file: Option<File>,
    min_level: LogLevel,
}

impl FileLoggerState {
    fn from_env() -> Self {
        let enabled = std::env::var("EYAMLDB_DEBUG")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let min_level = std::env::var("EYAMLDB_LOG_LEVEL")
            .map(|v| LogLevel::from_env_value(&v))
            .unwrap_or(LogLevel::Debug);

        let file = if enabled {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_file_path())
                .ok()
        } else {
            None
        };

        Self { file, min_level }
    }

    fn write(&mut self, level: LogLevel, module: &str, message: &str) {
        if level < self.min_level {
            return;
        }
        let Some(file) = self.file.as_mut() else {
            return;
        };

        let stamp = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| format!("{}.{:03}", d.as_secs(), d.subsec_millis()))
            .unwrap_or_else(|_| "?".to_string());

        let _ = writeln!(file, "[{}] [{}] [{}] {}", stamp, level, module, message);
        let _ = file.flush();
    }
}

static LOGGER: OnceLock<Mutex<FileLoggerState>> = OnceLock::new();

fn state() -> &'static Mutex<FileLoggerState> {
    LOGGER.get_or_init(|| Mutex::new(FileLoggerState::from_env()))
}

/// Log a message at the specified level
pub fn log(level: LogLevel, module: &str, message: &str) {
    if let Ok(mut logger) = state().lock() {
        logger.write(level, module, message);
    }
}

pub fn debug(module: &str, message: &str) {
    log(LogLevel::Debug, module, message);
}

pub fn warn(module: &str, message: &str) {
    log(LogLevel::Warn, module, message);
}

pub fn error(module: &str, message: &str) {
    log(LogLevel::Error, module, message);
}

/// Get the path to the log file
pub fn log_file_path() -> PathBuf {
    std::env::temp_dir().join("eyamldb-debug.log")
}
