//! Backend configuration (`hiera.yaml`)

mod traits;
mod file;

pub use traits::{ConfigError, ConfigResult};
pub use file::{HieraConfig, PuppetDbSettings, DEFAULT_DATADIR, DEFAULT_EXTENSION};
