//! eyamldb Core
//!
//! A Hiera-style lookup backend over eyaml data files.
//! Values found in an ordered hierarchy of sources are resolved (encrypted
//! `ENC[...]` spans decrypted, `puppetdb:` references dereferenced, `%{...}`
//! interpolated) and combined with one of three resolution modes.
//!
//! ## Lookups
//!
//! ```rust,ignore
//! use eyamldb_core::{EyamlResolver, HieraConfig, ResolutionMode, Scope};
//!
//! let config = HieraConfig::load_default()?;
//! let resolver = EyamlResolver::from_config(&config, logger);
//!
//! let scope = Scope::new()
//!     .with("fqdn", "web01.example.com")
//!     .with("environment", "production");
//!
//! // First source containing the key wins
//! let password = resolver.lookup("db::password", &scope, None, ResolutionMode::First)?;
//!
//! // Mappings from every source, deep-merged
//! let users = resolver.lookup("accounts::users", &scope, None, ResolutionMode::Hash)?;
//! ```
//!
//! ## Encryption methods
//!
//! Only `PLAINTEXT` ships built in. Real methods are plugged in through the
//! `Encryptor` trait:
//!
//! ```rust,ignore
//! let mut encryptors = EncryptorRegistry::with_builtins();
//! encryptors.register(Arc::new(MyPkcs7Encryptor::new()));
//! let resolver = EyamlResolver::from_config(&config, logger)
//!     .with_encryptors(Arc::new(encryptors));
//! ```

pub mod value;
pub mod token;
pub mod interpolate;
pub mod logging;
pub mod config;
pub mod cache;
pub mod hierarchy;
pub mod encryption;
pub mod query;
pub mod resolver;

// Re-export commonly used types
pub use value::{Document, Mapping, Value};

pub use token::{is_encrypted, is_query_reference, tokenize, Token};

pub use interpolate::{interpolate, Scope};

pub use logging::{ConsoleLogger, Logger, MemoryLogger, NoOpLogger, SharedLogger};

pub use config::{ConfigError, ConfigResult, HieraConfig, PuppetDbSettings};

pub use cache::{DocumentCache, FileCache};

pub use hierarchy::Hierarchy;

pub use encryption::{
    EncryptionError, EncryptionResult, Encryptor, EncryptorRegistry, EyamlCodec, Options,
    PlaintextEncryptor,
};

pub use query::{
    MemoryQueryClient, PuppetDbClient, Query, QueryClient, QueryDomain, QueryError, QueryResult,
};

pub use resolver::{
    Answer, EyamlResolver, FileSourceReader, LookupError, LookupResult, ResolutionMode,
    SourceReader, ValueError,
};
