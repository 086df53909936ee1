//! Logging abstractions
//!
//! The resolver and its collaborators receive a `SharedLogger`; transport-level
//! diagnostics that have no logger at hand go to the global `file_logger`.

mod traits;
mod noop;
mod console;
mod memory;
pub mod file_logger;

pub use traits::{Logger, SharedLogger};
pub use noop::NoOpLogger;
pub use console::ConsoleLogger;
pub use memory::MemoryLogger;

pub use file_logger::{log_file_path, LogLevel};
