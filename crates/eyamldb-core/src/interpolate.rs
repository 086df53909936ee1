//! `%{...}` interpolation of scope variables into strings

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::value::Value;

static INTERPOLATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%\{([^}]*)\}").expect("valid interpolation pattern"));

static FUNCTION_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*(scope|literal)\(\s*['"]([^'"]*)['"]\s*\)\s*$"#)
        .expect("valid function pattern")
});

/// Caller context for a lookup: the variables `%{...}` expressions can see
///
/// Typically the node's facts (`fqdn`, `environment`, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    vars: IndexMap<String, Value>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Look up a variable; a leading `::` (top scope) is ignored
    pub fn get(&self, name: &str) -> Option<&Value> {
        let name = name.trim();
        let name = name.strip_prefix("::").unwrap_or(name);
        self.vars.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Scope {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut scope = Scope::new();
        for (k, v) in iter {
            scope.set(k, v);
        }
        scope
    }
}

/// Substitute every `%{...}` expression in `text`
///
/// Supported forms are `%{var}`, `%{::var}`, `%{scope('var')}` and
/// `%{literal('x')}`. Variables resolve from `scope` first, then `extra`.
/// Unknown variables and unsupported functions become the empty string.
pub fn interpolate(text: &str, scope: &Scope, extra: &Scope) -> String {
    if !text.contains("%{") {
        return text.to_string();
    }

    INTERPOLATION
        .replace_all(text, |caps: &Captures<'_>| expand(&caps[1], scope, extra))
        .into_owned()
}

fn expand(expression: &str, scope: &Scope, extra: &Scope) -> String {
    if let Some(call) = FUNCTION_CALL.captures(expression) {
        return match &call[1] {
            "literal" => call[2].to_string(),
            _ => lookup_var(&call[2], scope, extra),
        };
    }
    if expression.contains('(') {
        return String::new();
    }
    lookup_var(expression, scope, extra)
}

fn lookup_var(name: &str, scope: &Scope, extra: &Scope) -> String {
    scope
        .get(name)
        .filter(|v| !matches!(v, Value::Null))
        .or_else(|| extra.get(name))
        .map(Value::to_interpolated)
        .unwrap_or_default()
}
