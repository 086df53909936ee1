//! Expansion of the configured hierarchy into concrete data sources

use std::path::PathBuf;

use crate::interpolate::{interpolate, Scope};

/// The ordered hierarchy levels of a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hierarchy {
    levels: Vec<String>,
}

impl Hierarchy {
    pub fn new(levels: Vec<String>) -> Self {
        Self { levels }
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    /// Sources to visit for one lookup, in order
    ///
    /// `order_override` is visited first. Each level is interpolated against
    /// `scope`; levels that end up empty or would form a bad path (leading or
    /// trailing `/`, or `//`) are skipped.
    pub fn sources(&self, scope: &Scope, order_override: Option<&str>) -> Vec<String> {
        let empty = Scope::new();
        order_override
            .into_iter()
            .chain(self.levels.iter().map(String::as_str))
            .map(|level| interpolate(level, scope, &empty))
            .filter(|source| is_usable(source))
            .collect()
    }
}

fn is_usable(source: &str) -> bool {
    !source.is_empty() && !source.starts_with('/') && !source.ends_with('/') && !source.contains("//")
}

/// Path of the data file for `source`: `<datadir>/<source>.<extension>`
///
/// `datadir` may contain `%{...}` and is interpolated against `scope`.
pub fn datafile(datadir: &str, scope: &Scope, source: &str, extension: &str) -> PathBuf {
    let dir = interpolate(datadir, scope, &Scope::new());
    PathBuf::from(dir).join(format!("{}.{}", source, extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hierarchy() -> Hierarchy {
        Hierarchy::new(vec![
            "nodes/%{fqdn}".to_string(),
            "roles/%{role}".to_string(),
            "%{environment}".to_string(),
            "common".to_string(),
        ])
    }

    #[test]
    fn test_sources_interpolated_in_order() {
        let scope = Scope::new()
            .with("fqdn", "web01")
            .with("role", "web")
            .with("environment", "production");
        assert_eq!(
            hierarchy().sources(&scope, None),
            vec!["nodes/web01", "roles/web", "production", "common"]
        );
    }

    #[test]
    fn test_sources_skip_unresolved_levels() {
        let scope = Scope::new().with("fqdn", "web01");
        assert_eq!(hierarchy().sources(&scope, None), vec!["nodes/web01", "common"]);
    }

    #[test]
    fn test_order_override_comes_first() {
        let scope = Scope::new().with("fqdn", "web01");
        assert_eq!(
            hierarchy().sources(&scope, Some("overrides/%{fqdn}")),
            vec!["overrides/web01", "nodes/web01", "common"]
        );
    }

    #[test]
    fn test_bad_paths_skipped() {
        let hierarchy = Hierarchy::new(vec!["/etc/passwd".into(), "a//b".into(), "ok".into()]);
        assert_eq!(hierarchy.sources(&Scope::new(), None), vec!["ok"]);
    }

    #[test]
    fn test_datafile() {
        let scope = Scope::new().with("environment", "production");
        assert_eq!(
            datafile("/srv/%{environment}/hieradata", &scope, "nodes/web01", "eyaml"),
            PathBuf::from("/srv/production/hieradata/nodes/web01.eyaml")
        );
    }
}
