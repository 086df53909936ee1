//! Per-lookup encryption options

use crate::interpolate::{interpolate, Scope};
use crate::value::{Mapping, Value};

/// Options handed to encryptors for one lookup call
///
/// Built from the configured `eyaml` section with every string value
/// interpolated against the lookup scope, plus `source = "hiera"`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    values: Mapping,
}

impl Options {
    /// Interpolate configured options against `scope`
    pub fn from_config(configured: &Mapping, scope: &Scope) -> Self {
        let empty = Scope::new();
        let mut values: Mapping = configured
            .iter()
            .map(|(key, value)| {
                let parsed = match value {
                    Value::Text(text) => Value::Text(interpolate(text, scope, &empty)),
                    other => other.clone(),
                };
                (key.clone(), parsed)
            })
            .collect();
        values.insert("source".to_string(), Value::from("hiera"));
        Self { values }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}
