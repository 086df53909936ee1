//! Reading a key's raw value from one data source

use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::{parse_yaml_document, DocumentCache};
use crate::hierarchy::datafile;
use crate::interpolate::Scope;
use crate::logging::SharedLogger;
use crate::value::Value;

/// Yields the raw, unresolved value a source holds for a key
///
/// `None` covers every "nothing here" case: no data file, an unreadable or
/// malformed file, an empty document, or a document without the key.
pub trait SourceReader: Send + Sync {
    fn read_key(&self, source: &str, key: &str, scope: &Scope) -> Option<Value>;
}

/// Reads `<datadir>/<source>.<extension>` through a document cache
pub struct FileSourceReader {
    datadir: String,
    extension: String,
    cache: Arc<dyn DocumentCache>,
    logger: SharedLogger,
}

impl FileSourceReader {
    pub fn new(
        datadir: impl Into<String>,
        extension: impl Into<String>,
        cache: Arc<dyn DocumentCache>,
        logger: SharedLogger,
    ) -> Self {
        Self {
            datadir: datadir.into(),
            extension: extension.into(),
            cache,
            logger,
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Data file for `source`, or `None` when it does not exist
    pub fn datafile(&self, scope: &Scope, source: &str) -> Option<PathBuf> {
        let path = datafile(&self.datadir, scope, source, &self.extension);
        if path.is_file() {
            Some(path)
        } else {
            self.logger.debug(&format!(
                "[eyaml_backend]: Cannot find datafile {}, skipping",
                path.display()
            ));
            None
        }
    }
}

impl SourceReader for FileSourceReader {
    fn read_key(&self, source: &str, key: &str, scope: &Scope) -> Option<Value> {
        let path = self.datafile(scope, source)?;
        let document = self.cache.read(&path, parse_yaml_document);
        document.get(key).cloned()
    }
}

impl std::fmt::Debug for FileSourceReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSourceReader")
            .field("datadir", &self.datadir)
            .field("extension", &self.extension)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::FileCache;
    use crate::logging::NoOpLogger;
    use tempfile::TempDir;

    fn reader(dir: &TempDir) -> FileSourceReader {
        FileSourceReader::new(
            dir.path().join("%{environment}").display().to_string(),
            "eyaml",
            Arc::new(FileCache::new()),
            Arc::new(NoOpLogger::new()),
        )
    }

    #[test]
    fn test_read_key() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("production/nodes")).unwrap();
        std::fs::write(
            dir.path().join("production/nodes/web01.eyaml"),
            "ntp::servers: [a, b]\nempty: ~\n",
        )
        .unwrap();

        let scope = Scope::new().with("environment", "production");
        let reader = reader(&dir);

        assert_eq!(
            reader.read_key("nodes/web01", "ntp::servers", &scope),
            Some(Value::Sequence(vec![Value::from("a"), Value::from("b")]))
        );
        assert_eq!(reader.read_key("nodes/web01", "empty", &scope), Some(Value::Null));
        assert_eq!(reader.read_key("nodes/web01", "missing", &scope), None);
    }

    #[test]
    fn test_missing_and_malformed_files_contribute_nothing() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("production")).unwrap();
        std::fs::write(dir.path().join("production/broken.eyaml"), "key: [oops\n").unwrap();
        std::fs::write(dir.path().join("production/empty.eyaml"), "").unwrap();

        let scope = Scope::new().with("environment", "production");
        let reader = reader(&dir);

        assert_eq!(reader.read_key("absent", "key", &scope), None);
        assert_eq!(reader.read_key("broken", "key", &scope), None);
        assert_eq!(reader.read_key("empty", "key", &scope), None);
    }

    #[test]
    fn test_extension_is_configurable() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("common.yaml"), "key: value\n").unwrap();
        let reader = FileSourceReader::new(
            dir.path().display().to_string(),
            "yaml",
            Arc::new(FileCache::new()),
            Arc::new(NoOpLogger::new()),
        );
        assert_eq!(reader.extension(), "yaml");
        assert_eq!(reader.read_key("common", "key", &Scope::new()), Some(Value::from("value")));
    }
}
