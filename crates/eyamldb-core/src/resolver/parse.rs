//! Recursive resolution of raw values
//!
//! Strings are decrypted or dereferenced first and interpolated second; mapping
//! keys are only interpolated. Containers are rebuilt, never mutated.

use super::error::ValueError;
use crate::encryption::{EyamlCodec, Options};
use crate::interpolate::{interpolate, Scope};
use crate::logging::Logger;
use crate::query::{Query, QueryClient, QueryDomain, QueryResult};
use crate::token::{is_encrypted, is_query_reference, QUERY_MARKER};
use crate::value::{Mapping, Value};

/// Outcome of decrypt-or-dereference on one string
#[derive(Debug, Clone, PartialEq)]
pub enum Transformed {
    /// Still a string (plaintext, or unchanged)
    Text(String),
    /// A PuppetDB reference replaced by its results
    Value(Value),
}

/// Resolves raw values for one lookup call
pub struct AnswerParser<'a> {
    codec: &'a EyamlCodec,
    query: &'a dyn QueryClient,
    options: &'a Options,
    logger: &'a dyn Logger,
}

impl<'a> AnswerParser<'a> {
    pub fn new(
        codec: &'a EyamlCodec,
        query: &'a dyn QueryClient,
        options: &'a Options,
        logger: &'a dyn Logger,
    ) -> Self {
        Self {
            codec,
            query,
            options,
            logger,
        }
    }

    /// Resolve `data` against `scope` (then `extra`)
    pub fn parse(&self, data: &Value, scope: &Scope, extra: &Scope) -> Result<Value, ValueError> {
        match data {
            Value::Null | Value::Bool(_) | Value::Integer(_) | Value::Float(_) => Ok(data.clone()),
            Value::Text(text) => self.parse_string(text, scope, extra),
            Value::Mapping(map) => {
                let mut answer = Mapping::with_capacity(map.len());
                for (key, value) in map {
                    answer.insert(interpolate(key, scope, extra), self.parse(value, scope, extra)?);
                }
                Ok(Value::Mapping(answer))
            }
            Value::Sequence(items) => items
                .iter()
                .map(|item| self.parse(item, scope, extra))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Sequence),
        }
    }

    fn parse_string(&self, text: &str, scope: &Scope, extra: &Scope) -> Result<Value, ValueError> {
        match self.decrypt_or_dereference(text)? {
            Transformed::Text(plain) => Ok(Value::Text(interpolate(&plain, scope, extra))),
            Transformed::Value(value) => Ok(value),
        }
    }

    /// Decrypt encrypted spans, else dereference a PuppetDB reference, else pass through
    ///
    /// A string carrying both markers is only decrypted.
    pub fn decrypt_or_dereference(&self, text: &str) -> Result<Transformed, ValueError> {
        if is_encrypted(text) {
            self.logger.debug("[eyaml_backend]: Attempting to decrypt");
            return Ok(Transformed::Text(self.codec.decrypt(text, self.options)?));
        }
        if is_query_reference(text) {
            self.logger.debug("[eyaml_backend]: Getting from PuppetDB");
            return Ok(Transformed::Value(self.dereference(text)?));
        }
        Ok(Transformed::Text(text.to_string()))
    }

    fn dereference(&self, text: &str) -> QueryResult<Value> {
        let reference = text.replacen(QUERY_MARKER, "", 1);
        let (query, fact) = split_reference(reference.trim());

        match fact {
            Some(fact) => {
                let query = self.query_for(query, QueryDomain::Facts)?;
                let facts = vec![fact.clone()];
                let mut values: Vec<Value> = self
                    .query
                    .query_facts(&facts, &query)?
                    .into_values()
                    .filter_map(|mut node_facts| node_facts.shift_remove(&fact))
                    .collect();
                values.sort_by(|a, b| a.total_cmp(b));
                Ok(Value::Sequence(values))
            }
            None => {
                let query = self.query_for(query, QueryDomain::Nodes)?;
                let nodes = self.query.query_nodes(&query)?;
                Ok(Value::Sequence(
                    nodes.into_iter().map(|n| Value::Text(n.name)).collect(),
                ))
            }
        }
    }

    fn query_for(&self, clause: QueryClause, domain: QueryDomain) -> QueryResult<Query> {
        match clause {
            QueryClause::Text(text) => self.query.parse_query(&text, domain),
            QueryClause::Ast(ast) => Ok(Query::from_ast(domain, ast)),
        }
    }
}

/// The query part of a reference: text to parse, or an already structured AST
#[derive(Debug, Clone, PartialEq)]
enum QueryClause {
    Text(String),
    Ast(serde_json::Value),
}

impl QueryClause {
    fn from_value(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => QueryClause::Text(String::new()),
            Some(Value::Text(text)) => QueryClause::Text(text.clone()),
            Some(other) => QueryClause::Ast(serde_json::Value::from(other)),
        }
    }
}

/// Split a reference into its query clause and optional fact name
///
/// Accepted forms, after the `puppetdb:` marker:
/// - `{query: "...", fact: "..."}` (flow mapping)
/// - `["<query>", "<fact>"]` (two-element list)
/// - anything else: the whole text is a node query
fn split_reference(reference: &str) -> (QueryClause, Option<String>) {
    let whole = || (QueryClause::Text(reference.to_string()), None);

    if !(reference.starts_with('{') || reference.starts_with('[')) {
        return whole();
    }
    let Ok(parsed) = serde_yaml::from_str::<serde_yaml::Value>(reference) else {
        return whole();
    };

    match Value::from(parsed) {
        Value::Mapping(map) if map.contains_key("query") || map.contains_key("fact") => {
            let fact = map.get("fact").and_then(Value::as_str).map(str::to_string);
            (QueryClause::from_value(map.get("query")), fact)
        }
        Value::Sequence(items) if items.len() == 2 => match &items[1] {
            Value::Text(fact) => (QueryClause::from_value(items.first()), Some(fact.clone())),
            _ => whole(),
        },
        _ => whole(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde_json::json;

    use crate::encryption::EncryptorRegistry;
    use crate::logging::NoOpLogger;
    use crate::query::{parse_query, MemoryQueryClient};

    fn codec() -> EyamlCodec {
        EyamlCodec::new(Arc::new(EncryptorRegistry::with_builtins()))
    }

    fn enc(plain: &str) -> String {
        format!("ENC[PLAINTEXT,{}]", STANDARD.encode(plain))
    }

    fn inventory() -> MemoryQueryClient {
        MemoryQueryClient::new()
            .with_node("web02", [("ipaddress", "10.0.0.2")])
            .with_node("web01", [("ipaddress", "10.0.0.1")])
            .with_node("db01", [("role", "db")])
    }

    fn parse_with(client: &MemoryQueryClient, value: &Value, scope: &Scope) -> Value {
        let codec = codec();
        let options = Options::default();
        let parser = AnswerParser::new(&codec, client, &options, &NoOpLogger);
        parser.parse(value, scope, &Scope::new()).unwrap()
    }

    #[test]
    fn test_scalars_pass_through() {
        let client = inventory();
        for value in [Value::Null, Value::Bool(true), Value::Integer(7), Value::Float(1.5)] {
            assert_eq!(parse_with(&client, &value, &Scope::new()), value);
        }
    }

    #[test]
    fn test_plain_strings_only_interpolated() {
        let client = inventory();
        let scope = Scope::new().with("environment", "production");
        assert_eq!(
            parse_with(&client, &Value::from("plain"), &scope),
            Value::from("plain")
        );
        assert_eq!(
            parse_with(&client, &Value::from("env=%{environment}"), &scope),
            Value::from("env=production")
        );
        assert!(client.received().is_empty());
    }

    #[test]
    fn test_structure_preserved_without_markers() {
        let client = inventory();
        let yaml: serde_yaml::Value =
            serde_yaml::from_str("z: [1, two, {three: 3}]\na: {nested: [true]}\n").unwrap();
        let value = Value::from(yaml);
        assert_eq!(parse_with(&client, &value, &Scope::new()), value);
    }

    #[test]
    fn test_keys_interpolated_values_decrypted() {
        let client = inventory();
        let mut map = Mapping::new();
        map.insert("%{fqdn}_password".into(), Value::from(enc("s3cret\n")));
        map.insert("users".into(), Value::Sequence(vec![Value::from(enc("root"))]));

        let scope = Scope::new().with("fqdn", "web01");
        let resolved = parse_with(&client, &Value::Mapping(map), &scope);
        let resolved = resolved.as_mapping().unwrap();

        assert_eq!(resolved["web01_password"], Value::from("s3cret"));
        assert_eq!(resolved["users"], Value::Sequence(vec![Value::from("root")]));
    }

    #[test]
    fn test_decrypted_text_is_interpolated() {
        let client = inventory();
        let scope = Scope::new().with("environment", "production");
        let value = Value::from(format!("{}-{}", enc("db_%{environment}"), enc("x\n")));
        assert_eq!(parse_with(&client, &value, &scope), Value::from("db_production-x"));
    }

    #[test]
    fn test_node_reference_becomes_sequence() {
        let client = inventory();
        let resolved = parse_with(&client, &Value::from("puppetdb:Class[Nginx]"), &Scope::new());
        assert_eq!(
            resolved,
            Value::Sequence(vec![Value::from("web02"), Value::from("web01"), Value::from("db01")])
        );

        let received = client.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].domain, QueryDomain::Nodes);
        assert!(received[0].ast.is_some());
    }

    #[test]
    fn test_fact_reference_pair_is_sorted() {
        let client = inventory();
        let resolved = parse_with(
            &client,
            &Value::from(r#"puppetdb:["role=web", "ipaddress"]"#),
            &Scope::new(),
        );
        assert_eq!(
            resolved,
            Value::Sequence(vec![Value::from("10.0.0.1"), Value::from("10.0.0.2")])
        );
        assert_eq!(
            client.received(),
            vec![parse_query("role=web", QueryDomain::Facts).unwrap()]
        );
    }

    #[test]
    fn test_fact_reference_mapping_with_structured_query() {
        let client = inventory();
        let resolved = parse_with(
            &client,
            &Value::from(r#"puppetdb:{"query": ["=", "certname", "web01"], "fact": "ipaddress"}"#),
            &Scope::new(),
        );
        assert_eq!(resolved.as_sequence().unwrap().len(), 2);
        assert_eq!(
            client.received(),
            vec![Query::from_ast(QueryDomain::Facts, json!(["=", "certname", "web01"]))]
        );
    }

    #[test]
    fn test_encrypted_wins_over_reference() {
        let client = inventory();
        let value = Value::from(format!("puppetdb:{}", enc("Class[Apache]")));
        assert_eq!(
            parse_with(&client, &value, &Scope::new()),
            Value::from("puppetdb:Class[Apache]")
        );
        assert!(client.received().is_empty());
    }

    #[test]
    fn test_split_reference_forms() {
        assert_eq!(
            split_reference("osfamily=Debian"),
            (QueryClause::Text("osfamily=Debian".into()), None)
        );
        assert_eq!(
            split_reference("{fact: fqdn}"),
            (QueryClause::Text(String::new()), Some("fqdn".into()))
        );
        assert_eq!(
            split_reference(r#"["=", "certname", "x"]"#),
            (QueryClause::Text(r#"["=", "certname", "x"]"#.into()), None)
        );
    }

    #[test]
    fn test_decryption_failure_is_error() {
        let client = inventory();
        let codec = codec();
        let options = Options::default();
        let parser = AnswerParser::new(&codec, &client, &options, &NoOpLogger);
        let err = parser
            .parse(&Value::from("ENC[PKCS7,c2VjcmV0]"), &Scope::new(), &Scope::new())
            .unwrap_err();
        assert!(matches!(err, ValueError::Decryption(_)));
    }
}
