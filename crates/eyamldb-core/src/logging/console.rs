//! Console logger implementation

use super::traits::Logger;

/// A logger that writes to stderr
///
/// Debug output is only emitted when `verbose` is set, so the CLI can keep
/// lookup results on stdout clean.
#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    prefix: String,
    verbose: bool,
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleLogger {
    /// Create a console logger with the default prefix, debug output off
    pub fn new() -> Self {
        Self {
            prefix: "[eyamldb]".to_string(),
            verbose: false,
        }
    }

    /// Create a console logger with a custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            verbose: false,
        }
    }

    /// Enable or disable debug output
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl Logger for ConsoleLogger {
    fn debug(&self, message: &str) {
        if self.verbose {
            eprintln!("{} DEBUG: {}", self.prefix, message);
        }
    }

    fn info(&self, message: &str) {
        eprintln!("{} INFO: {}", self.prefix, message);
    }

    fn warn(&self, message: &str) {
        eprintln!("{} WARN: {}", self.prefix, message);
    }

    fn error(&self, message: &str) {
        eprintln!("{} ERROR: {}", self.prefix, message);
    }
}
