//! In-memory query client

use parking_lot::Mutex;

use super::traits::{FactsByNode, NodeRecord, Query, QueryClient, QueryResult};
use crate::value::{Mapping, Value};

/// Query client backed by a fixed inventory
///
/// Every query matches every node; the queries received are recorded so tests
/// can assert on what the resolver sent.
///
/// # Example
///
/// ```
/// use eyamldb_core::query::{MemoryQueryClient, QueryClient, QueryDomain};
///
/// let client = MemoryQueryClient::new()
///     .with_node("web01", [("ipaddress", "10.0.0.1")]);
/// let query = client.parse_query("role=web", QueryDomain::Nodes).unwrap();
/// assert_eq!(client.query_nodes(&query).unwrap()[0].name, "web01");
/// ```
#[derive(Debug, Default)]
pub struct MemoryQueryClient {
    nodes: Vec<(String, Mapping)>,
    received: Mutex<Vec<Query>>,
}

impl MemoryQueryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with its facts
    pub fn with_node<K, V>(mut self, name: &str, facts: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let facts = facts.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self.nodes.push((name.to_string(), facts));
        self
    }

    /// Queries received so far, oldest first
    pub fn received(&self) -> Vec<Query> {
        self.received.lock().clone()
    }
}

impl QueryClient for MemoryQueryClient {
    fn name(&self) -> &str {
        "memory"
    }

    fn query_facts(&self, facts: &[String], query: &Query) -> QueryResult<FactsByNode> {
        self.received.lock().push(query.clone());
        Ok(self
            .nodes
            .iter()
            .map(|(name, node_facts)| {
                let selected: Mapping = node_facts
                    .iter()
                    .filter(|(fact, _)| facts.contains(fact))
                    .map(|(fact, value)| (fact.clone(), value.clone()))
                    .collect();
                (name.clone(), selected)
            })
            .filter(|(_, selected)| !selected.is_empty())
            .collect())
    }

    fn query_nodes(&self, query: &Query) -> QueryResult<Vec<NodeRecord>> {
        self.received.lock().push(query.clone());
        Ok(self
            .nodes
            .iter()
            .map(|(name, _)| NodeRecord { name: name.clone() })
            .collect())
    }
}
