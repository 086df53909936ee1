//! Logger that keeps messages in memory

use parking_lot::Mutex;

use super::file_logger::LogLevel;
use super::traits::Logger;

/// Captures log lines instead of printing them
///
/// Used by tests that need to observe diagnostics, e.g. that a collaborator
/// fallback was reported.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured messages at the given level, oldest first
    pub fn messages(&self, level: LogLevel) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Whether any captured message at `level` contains `needle`
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.lines
            .lock()
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }

    fn push(&self, level: LogLevel, message: &str) {
        self.lines.lock().push((level, message.to_string()));
    }
}

impl Logger for MemoryLogger {
    fn debug(&self, message: &str) {
        self.push(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.push(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.push(LogLevel::Warn, message);
    }

    fn error(&self, message: &str) {
        self.push(LogLevel::Error, message);
    }
}
