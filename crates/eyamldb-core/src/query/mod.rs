//! Fact and node queries against PuppetDB
//!
//! String values of the form `puppetdb:<query>` are dereferenced through a
//! `QueryClient` into the list of matching node names, or into the sorted
//! values of one fact across the matching nodes.

mod traits;
mod parser;
mod memory;
mod puppetdb;

pub use traits::{
    FactsByNode, NodeRecord, Query, QueryClient, QueryDomain, QueryError, QueryResult,
};
pub use parser::parse_query;
pub use memory::MemoryQueryClient;
pub use puppetdb::{
    default_puppetdb_conf, facts_by_node, FactRecord, PuppetDbClient, UnavailableQueryClient,
    FALLBACK_PORT, FALLBACK_SERVER,
};
