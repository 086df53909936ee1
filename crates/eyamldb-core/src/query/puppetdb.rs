//! PuppetDB query API client

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use super::traits::{FactsByNode, NodeRecord, Query, QueryClient, QueryError, QueryResult};
use crate::config::PuppetDbSettings;
use crate::logging::{self, Logger};
use crate::value::Value;

/// Server used when no configuration can be found
pub const FALLBACK_SERVER: &str = "puppetdb";
/// Port used when no configuration can be found
pub const FALLBACK_PORT: u16 = 443;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Location of puppetdb.conf on a standard agent install
pub fn default_puppetdb_conf() -> PathBuf {
    PathBuf::from("/etc/puppetlabs/puppet/puppetdb.conf")
}

/// One row of the facts endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct FactRecord {
    pub certname: String,
    pub name: String,
    pub value: serde_json::Value,
}

/// Client for the PuppetDB v4 query API
pub struct PuppetDbClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl PuppetDbClient {
    /// Create a client for `server:port`
    ///
    /// Port 8080 is PuppetDB's cleartext port; anything else is spoken to over TLS.
    pub fn new(server: &str, port: u16) -> QueryResult<Self> {
        let scheme = if port == 8080 { "http" } else { "https" };
        let http = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: format!("{}://{}:{}", scheme, server, port),
            http,
        })
    }

    /// Build the client the resolver should use, never failing
    ///
    /// Server and port come from `settings`, else from `puppetdb_conf`. If
    /// neither yields a server the client falls back to `puppetdb:443` and logs
    /// a warning. If no HTTP client can be built, an `UnavailableQueryClient`
    /// is returned so that only lookups that use `puppetdb:` references fail.
    pub fn connect(
        settings: Option<&PuppetDbSettings>,
        puppetdb_conf: &Path,
        logger: &dyn Logger,
    ) -> Arc<dyn QueryClient> {
        let (server, port) = match settings.and_then(PuppetDbSettings::server_and_port) {
            Some(found) => found,
            None => match read_puppetdb_conf(puppetdb_conf) {
                Ok(found) => found,
                Err(reason) => {
                    logger.warn(&format!(
                        "[eyaml_backend]: PuppetDB settings unavailable ({}); falling back to {}:{}",
                        reason, FALLBACK_SERVER, FALLBACK_PORT
                    ));
                    (FALLBACK_SERVER.to_string(), FALLBACK_PORT)
                }
            },
        };

        match PuppetDbClient::new(&server, port) {
            Ok(client) => {
                logger.debug(&format!("[eyaml_backend]: PuppetDB client for {}", client.base_url));
                Arc::new(client)
            }
            Err(e) => {
                logger.warn(&format!(
                    "[eyaml_backend]: cannot create PuppetDB client for {}:{}: {}",
                    server, port, e
                ));
                Arc::new(UnavailableQueryClient::new(e.to_string()))
            }
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get<T: DeserializeOwned>(&self, endpoint: &str, ast: Option<&serde_json::Value>) -> QueryResult<T> {
        let url = format!("{}/pdb/query/v4/{}", self.base_url, endpoint);
        logging::file_logger::debug("query::puppetdb", &format!("GET {} query={:?}", url, ast));

        let mut request = self.http.get(&url);
        if let Some(ast) = ast {
            request = request.query(&[("query", serde_json::to_string(ast)?)]);
        }

        let response = request.send().map_err(|e| {
            logging::file_logger::error("query::puppetdb", &format!("request failed: {}", e));
            QueryError::Http(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(QueryError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json()?)
    }
}

impl QueryClient for PuppetDbClient {
    fn name(&self) -> &str {
        "puppetdb"
    }

    fn query_facts(&self, facts: &[String], query: &Query) -> QueryResult<FactsByNode> {
        let ast = facts_query(facts, query);
        let records: Vec<FactRecord> = self.get("facts", Some(&ast))?;
        Ok(facts_by_node(records))
    }

    fn query_nodes(&self, query: &Query) -> QueryResult<Vec<NodeRecord>> {
        self.get("nodes", query.ast.as_ref())
    }
}

impl std::fmt::Debug for PuppetDbClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PuppetDbClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Query client used when no real client could be constructed
#[derive(Debug, Clone)]
pub struct UnavailableQueryClient {
    reason: String,
}

impl UnavailableQueryClient {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl QueryClient for UnavailableQueryClient {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn query_facts(&self, _facts: &[String], _query: &Query) -> QueryResult<FactsByNode> {
        Err(QueryError::Unavailable(self.reason.clone()))
    }

    fn query_nodes(&self, _query: &Query) -> QueryResult<Vec<NodeRecord>> {
        Err(QueryError::Unavailable(self.reason.clone()))
    }
}

/// Restrict `query` to the named facts
fn facts_query(facts: &[String], query: &Query) -> serde_json::Value {
    let names = match facts {
        [single] => json!(["=", "name", single]),
        _ => {
            let mut names = vec![json!("or")];
            names.extend(facts.iter().map(|f| json!(["=", "name", f])));
            serde_json::Value::Array(names)
        }
    };

    match &query.ast {
        Some(ast) => json!(["and", names, ast]),
        None => names,
    }
}

/// Group fact rows per node, keeping first-seen node order
pub fn facts_by_node(records: Vec<FactRecord>) -> FactsByNode {
    let mut grouped = FactsByNode::new();
    for record in records {
        grouped
            .entry(record.certname)
            .or_default()
            .insert(record.name, Value::from(record.value));
    }
    grouped
}

/// Read the first server from a puppetdb.conf `server_urls` entry
fn read_puppetdb_conf(path: &Path) -> Result<(String, u16), String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    parse_server_urls(&content).ok_or_else(|| format!("no server_urls in {}", path.display()))
}

fn parse_server_urls(content: &str) -> Option<(String, u16)> {
    let urls = content.lines().find_map(|line| {
        let (key, value) = line.split_once('=')?;
        (key.trim() == "server_urls").then(|| value.trim().to_string())
    })?;
    let first = urls.split(',').next()?.trim();
    let url = reqwest::Url::parse(first).ok()?;
    let host = url.host_str()?.to_string();
    let port = url.port_or_known_default()?;
    Some((host, port))
}
