//! The eyaml lookup backend
//!
//! Visits the hierarchy's sources in order, resolves each value found for the
//! key, and folds it into the answer:
//!
//! ```text
//! for source in hierarchy:
//!     raw      = reader.read_key(source, key)     (absent -> next source)
//!     resolved = parser.parse(raw)                 (decrypt / dereference / interpolate)
//!     answer.fold(source, resolved)                (first -> stop)
//! ```

use std::sync::Arc;

use super::answer::{Answer, Flow, ResolutionMode};
use super::error::{LookupError, LookupResult};
use super::parse::AnswerParser;
use super::source::{FileSourceReader, SourceReader};
use crate::cache::FileCache;
use crate::config::HieraConfig;
use crate::encryption::{EncryptorRegistry, EyamlCodec, Options};
use crate::hierarchy::Hierarchy;
use crate::interpolate::Scope;
use crate::logging::SharedLogger;
use crate::query::{default_puppetdb_conf, PuppetDbClient, QueryClient};
use crate::value::{Mapping, Value};

/// Resolves keys against an eyaml hierarchy
///
/// Read-only after construction; one instance may serve concurrent lookups.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use eyamldb_core::{ConsoleLogger, EyamlResolver, HieraConfig, ResolutionMode, Scope};
///
/// let config = HieraConfig::load("/etc/puppetlabs/puppet/hiera.yaml").unwrap();
/// let resolver = EyamlResolver::from_config(&config, Arc::new(ConsoleLogger::new()));
///
/// let scope = Scope::new().with("fqdn", "web01.example.com");
/// let servers = resolver
///     .lookup("ntp::servers", &scope, None, ResolutionMode::Array)
///     .unwrap();
/// ```
pub struct EyamlResolver {
    hierarchy: Hierarchy,
    configured_options: Mapping,
    reader: Arc<dyn SourceReader>,
    codec: EyamlCodec,
    query: Arc<dyn QueryClient>,
    logger: SharedLogger,
}

impl EyamlResolver {
    /// Create a resolver from explicitly constructed collaborators
    pub fn new(
        config: &HieraConfig,
        reader: Arc<dyn SourceReader>,
        query: Arc<dyn QueryClient>,
        encryptors: Arc<EncryptorRegistry>,
        logger: SharedLogger,
    ) -> Self {
        crate::log_debug!(logger, "[eyaml_backend]: Hiera eYAML backend starting");
        Self {
            hierarchy: Hierarchy::new(config.hierarchy.clone()),
            configured_options: config.eyaml.clone(),
            reader,
            codec: EyamlCodec::new(encryptors),
            query,
            logger,
        }
    }

    /// Create a resolver with the default collaborators for `config`
    ///
    /// Data files are read from `config.datadir()` through a `FileCache`; the
    /// query client is a `PuppetDbClient` (see `PuppetDbClient::connect` for its
    /// fallback); only the built-in encryptors are registered.
    pub fn from_config(config: &HieraConfig, logger: SharedLogger) -> Self {
        if !config.uses_eyaml() {
            crate::log_warn!(
                logger,
                "[eyaml_backend]: eyaml is not listed in backends ({}); using it anyway",
                config.backends.join(", ")
            );
        }
        let cache = Arc::new(FileCache::with_logger(logger.clone()));
        let reader = Arc::new(FileSourceReader::new(
            config.datadir(),
            config.extension(),
            cache,
            logger.clone(),
        ));
        let query = PuppetDbClient::connect(
            config.puppetdb.as_ref(),
            &default_puppetdb_conf(),
            logger.as_ref(),
        );
        Self::new(
            config,
            reader,
            query,
            Arc::new(EncryptorRegistry::with_builtins()),
            logger,
        )
    }

    /// Replace the query client
    pub fn with_query_client(mut self, query: Arc<dyn QueryClient>) -> Self {
        self.query = query;
        self
    }

    /// Replace the encryptor registry
    pub fn with_encryptors(mut self, encryptors: Arc<EncryptorRegistry>) -> Self {
        self.codec = EyamlCodec::new(encryptors);
        self
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    /// Look up `key`, combining sources according to `mode`
    ///
    /// Returns `Ok(None)` when no source contains the key.
    pub fn lookup(
        &self,
        key: &str,
        scope: &Scope,
        order_override: Option<&str>,
        mode: ResolutionMode,
    ) -> LookupResult<Option<Value>> {
        self.lookup_into(Answer::new(mode), key, scope, order_override)
    }

    /// Look up `key`, folding into a caller-provided (possibly seeded) answer
    pub fn lookup_into(
        &self,
        mut answer: Answer,
        key: &str,
        scope: &Scope,
        order_override: Option<&str>,
    ) -> LookupResult<Option<Value>> {
        let options = self.parse_options(scope);
        crate::log_debug!(self.logger, "[eyaml_backend]: Looking up {} in eYAML backend", key);

        let parser = AnswerParser::new(&self.codec, self.query.as_ref(), &options, self.logger.as_ref());
        let extra = Scope::new();

        for source in self.hierarchy.sources(scope, order_override) {
            crate::log_debug!(self.logger, "[eyaml_backend]: Looking for data source {}", source);

            let Some(raw) = self.reader.read_key(&source, key, scope) else {
                continue;
            };
            // Logged once per contributing source in array/hash lookups.
            crate::log_debug!(self.logger, "[eyaml_backend]: Found {} in {}", key, source);

            let resolved = parser
                .parse(&raw, scope, &extra)
                .map_err(|error| LookupError::Value {
                    datasource: source.clone(),
                    error,
                })?;

            if answer.fold(&source, resolved)? == Flow::Stop {
                break;
            }
        }

        Ok(answer.into_value())
    }

    fn parse_options(&self, scope: &Scope) -> Options {
        let options = Options::from_config(&self.configured_options, scope);
        for (key, value) in options.iter() {
            crate::log_debug!(self.logger, "[eyaml_backend]: Set option: {} = {}", key, value);
        }
        options
    }
}

impl std::fmt::Debug for EyamlResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EyamlResolver")
            .field("hierarchy", &self.hierarchy)
            .field("query", &self.query.name())
            .field("encryptors", self.codec.registry())
            .finish()
    }
}
