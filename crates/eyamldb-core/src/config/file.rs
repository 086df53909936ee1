//! File-based backend configuration (YAML)
//!
//! Reads hiera-style configuration. Keys may be written with or without the
//! leading colon (`:hierarchy:` and `hierarchy:` are equivalent):
//!
//! ```yaml
//! :backends: [eyaml]
//! :hierarchy:
//!   - "nodes/%{::fqdn}"
//!   - common
//! :eyaml:
//!   :datadir: /etc/puppetlabs/code/hieradata
//!   :extension: eyaml
//!   :pkcs7_private_key: /etc/puppetlabs/keys/private_key.pkcs7.pem
//! :puppetdb:
//!   :server: puppetdb.example.com
//!   :port: 8081
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::traits::{ConfigError, ConfigResult};
use crate::query::FALLBACK_PORT;
use crate::value::{Mapping, Value};

/// Directory searched for data files when `eyaml.datadir` is unset
pub const DEFAULT_DATADIR: &str = "/var/lib/hiera";

/// Data file extension when `eyaml.extension` is unset
pub const DEFAULT_EXTENSION: &str = "eyaml";

/// Where the PuppetDB query service lives
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PuppetDbSettings {
    #[serde(default)]
    pub server: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

impl PuppetDbSettings {
    /// Configured server and port; `None` when no server is set
    pub fn server_and_port(&self) -> Option<(String, u16)> {
        let server = self.server.as_ref()?.trim();
        if server.is_empty() {
            return None;
        }
        Some((server.to_string(), self.port.unwrap_or(FALLBACK_PORT)))
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    backends: Option<OneOrMany>,
    #[serde(default)]
    hierarchy: Option<OneOrMany>,
    #[serde(default)]
    eyaml: Option<serde_yaml::Value>,
    #[serde(default)]
    puppetdb: Option<PuppetDbSettings>,
}

/// Backend configuration, read-only once loaded
#[derive(Debug, Clone, PartialEq)]
pub struct HieraConfig {
    /// Backends enabled for this hierarchy
    pub backends: Vec<String>,
    /// Hierarchy levels, most specific first, may contain `%{...}`
    pub hierarchy: Vec<String>,
    /// The `eyaml` section: datadir, extension and encryptor options
    pub eyaml: Mapping,
    /// The `puppetdb` section
    pub puppetdb: Option<PuppetDbSettings>,
}

impl Default for HieraConfig {
    fn default() -> Self {
        Self {
            backends: vec!["eyaml".to_string()],
            hierarchy: vec!["common".to_string()],
            eyaml: Mapping::new(),
            puppetdb: None,
        }
    }
}

impl HieraConfig {
    /// Parse configuration from YAML text; `origin` names the source in errors
    pub fn from_yaml_str(content: &str, origin: &str) -> ConfigResult<Self> {
        let parse_error = |e: serde_yaml::Error| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        };

        let raw: serde_yaml::Value = serde_yaml::from_str(content).map_err(parse_error)?;
        if raw.is_null() {
            return Ok(Self::default());
        }
        let raw: RawConfig = serde_yaml::from_value(strip_key_colons(raw)).map_err(parse_error)?;

        let eyaml = match raw.eyaml.map(Value::from) {
            Some(Value::Mapping(map)) => map,
            Some(Value::Null) | None => Mapping::new(),
            Some(other) => {
                return Err(ConfigError::Other(format!(
                    "{}: eyaml section must be a mapping, got {}",
                    origin,
                    other.shape_name()
                )))
            }
        };

        let defaults = Self::default();
        Ok(Self {
            backends: raw.backends.map(OneOrMany::into_vec).unwrap_or(defaults.backends),
            hierarchy: raw.hierarchy.map(OneOrMany::into_vec).unwrap_or(defaults.hierarchy),
            eyaml,
            puppetdb: raw.puppetdb,
        })
    }

    /// Load configuration from a file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content, &path.display().to_string())
    }

    /// Load the first existing default config file, or the defaults
    pub fn load_default() -> ConfigResult<Self> {
        match Self::default_paths().into_iter().find(|p| p.exists()) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Candidate config locations, in order of preference
    ///
    /// User-level `~/.config/eyamldb/hiera.yaml` (XDG config dir), then the
    /// system-wide Puppet location.
    pub fn default_paths() -> Vec<PathBuf> {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".config"));
        vec![
            config_dir.join("eyamldb").join("hiera.yaml"),
            PathBuf::from("/etc/puppetlabs/puppet/hiera.yaml"),
        ]
    }

    /// Whether `eyaml` is among the configured backends
    pub fn uses_eyaml(&self) -> bool {
        self.backends
            .iter()
            .any(|b| b.trim().trim_start_matches(':').eq_ignore_ascii_case("eyaml"))
    }

    /// Data directory template (may contain `%{...}`)
    pub fn datadir(&self) -> &str {
        self.eyaml_str("datadir").unwrap_or(DEFAULT_DATADIR)
    }

    /// Data file extension, without the dot
    pub fn extension(&self) -> &str {
        self.eyaml_str("extension").unwrap_or(DEFAULT_EXTENSION)
    }

    fn eyaml_str(&self, key: &str) -> Option<&str> {
        self.eyaml.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }
}

/// Remove the leading `:` from mapping keys, recursively
fn strip_key_colons(value: serde_yaml::Value) -> serde_yaml::Value {
    match value {
        serde_yaml::Value::Mapping(map) => serde_yaml::Value::Mapping(
            map.into_iter()
                .map(|(k, v)| {
                    let key = match k {
                        serde_yaml::Value::String(s) => {
                            serde_yaml::Value::String(s.strip_prefix(':').unwrap_or(&s).to_string())
                        }
                        other => other,
                    };
                    (key, strip_key_colons(v))
                })
                .collect(),
        ),
        serde_yaml::Value::Sequence(items) => {
            serde_yaml::Value::Sequence(items.into_iter().map(strip_key_colons).collect())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HIERA_YAML: &str = r#"
:backends:
  - eyaml
:hierarchy:
  - "nodes/%{::fqdn}"
  - common
:eyaml:
  :datadir: /srv/hieradata
  :pkcs7_private_key: "/etc/keys/%{environment}.pem"
:puppetdb:
  :server: pdb.example.com
  :port: 8081
"#;

    #[test]
    fn test_parse_colon_keys() {
        let config = HieraConfig::from_yaml_str(HIERA_YAML, "hiera.yaml").unwrap();
        assert_eq!(config.backends, vec!["eyaml"]);
        assert_eq!(config.hierarchy, vec!["nodes/%{::fqdn}", "common"]);
        assert_eq!(config.datadir(), "/srv/hieradata");
        assert_eq!(config.extension(), DEFAULT_EXTENSION);
        assert_eq!(
            config.eyaml.get("pkcs7_private_key"),
            Some(&Value::from("/etc/keys/%{environment}.pem"))
        );
        assert_eq!(
            config.puppetdb.unwrap().server_and_port(),
            Some(("pdb.example.com".to_string(), 8081))
        );
    }

    #[test]
    fn test_plain_keys_and_single_hierarchy() {
        let config = HieraConfig::from_yaml_str(
            "hierarchy: common\neyaml:\n  extension: yaml\n",
            "inline",
        )
        .unwrap();
        assert_eq!(config.hierarchy, vec!["common"]);
        assert_eq!(config.backends, vec!["eyaml"]);
        assert_eq!(config.extension(), "yaml");
        assert_eq!(config.datadir(), DEFAULT_DATADIR);
        assert!(config.puppetdb.is_none());
    }

    #[test]
    fn test_uses_eyaml() {
        assert!(HieraConfig::default().uses_eyaml());
        let config = HieraConfig::from_yaml_str(":backends: [yaml, \":EYAML\"]\n", "inline").unwrap();
        assert!(config.uses_eyaml());
        let config = HieraConfig::from_yaml_str(":backends: yaml\n", "inline").unwrap();
        assert!(!config.uses_eyaml());
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(HieraConfig::from_yaml_str("", "empty").unwrap(), HieraConfig::default());
    }

    #[test]
    fn test_invalid_eyaml_section() {
        let err = HieraConfig::from_yaml_str(":eyaml: [a, b]\n", "bad.yaml").unwrap_err();
        assert!(err.to_string().contains("must be a mapping"));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = HieraConfig::from_yaml_str(":hierarchy: [unclosed\n", "broken.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref path, .. } if path == "broken.yaml"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hiera.yaml");
        std::fs::write(&path, HIERA_YAML).unwrap();

        let config = HieraConfig::load(&path).unwrap();
        assert_eq!(config.datadir(), "/srv/hieradata");

        let missing = HieraConfig::load(dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(missing, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_puppetdb_settings_default_port() {
        let settings = PuppetDbSettings {
            server: Some("pdb".into()),
            port: None,
        };
        assert_eq!(settings.server_and_port(), Some(("pdb".to_string(), FALLBACK_PORT)));
        assert_eq!(PuppetDbSettings::default().server_and_port(), None);
    }
}
