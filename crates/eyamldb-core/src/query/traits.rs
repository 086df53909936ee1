//! Query client contract

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;

use super::parser;
use crate::value::Mapping;

/// Errors that can occur while talking to the query service
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Invalid {domain} query '{query}': {message}")]
    Parse {
        domain: QueryDomain,
        query: String,
        message: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("PuppetDB returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Query service unavailable: {0}")]
    Unavailable(String),

    #[error("Query error: {0}")]
    Other(String),
}

pub type QueryResult<T> = Result<T, QueryError>;

/// Which kind of records a query selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryDomain {
    Nodes,
    Facts,
}

impl QueryDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryDomain::Nodes => "nodes",
            QueryDomain::Facts => "facts",
        }
    }
}

impl std::fmt::Display for QueryDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed query: a PuppetDB AST, or `None` to select everything
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub domain: QueryDomain,
    pub ast: Option<serde_json::Value>,
}

impl Query {
    /// Query matching every record
    pub fn all(domain: QueryDomain) -> Self {
        Self { domain, ast: None }
    }

    /// Wrap an AST that is already in PuppetDB form
    pub fn from_ast(domain: QueryDomain, ast: serde_json::Value) -> Self {
        Self {
            domain,
            ast: Some(ast),
        }
    }
}

/// A node returned by a node query
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NodeRecord {
    #[serde(alias = "certname")]
    pub name: String,
}

/// Facts grouped per node: node name -> fact name -> value
pub type FactsByNode = IndexMap<String, Mapping>;

/// Client for the fact/node query service
///
/// Implementations:
/// - `PuppetDbClient`: PuppetDB query API over HTTP
/// - `MemoryQueryClient`: fixed inventory for tests
/// - `UnavailableQueryClient`: installed when no client could be built
pub trait QueryClient: Send + Sync {
    /// Human-readable name of this client
    fn name(&self) -> &str;

    /// Turn query text into a `Query` for the given domain
    fn parse_query(&self, text: &str, domain: QueryDomain) -> QueryResult<Query> {
        parser::parse_query(text, domain)
    }

    /// Values of `facts` for every node matching `query`
    fn query_facts(&self, facts: &[String], query: &Query) -> QueryResult<FactsByNode>;

    /// Nodes matching `query`
    fn query_nodes(&self, query: &Query) -> QueryResult<Vec<NodeRecord>>;
}
