//! Read-through cache of parsed data files

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;
use thiserror::Error;

use crate::logging::{NoOpLogger, SharedLogger};
use crate::value::{Document, Value};

/// Why a data file could not be turned into a document
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Expected a mapping at the top level, got {0}")]
    NotAMapping(&'static str),
}

pub type DocumentResult<T> = Result<T, DocumentError>;

/// Parser turning file contents into a document
pub type ParseFn = fn(&str) -> DocumentResult<Document>;

/// Parse YAML file contents into a document; an empty file is an empty document
pub fn parse_yaml_document(content: &str) -> DocumentResult<Document> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(content)?;
    match Value::from(yaml) {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Document::new()),
        other => Err(DocumentError::NotAMapping(other.shape_name())),
    }
}

/// Read-through cache keyed by file path
///
/// `read` never fails: a missing, unreadable or malformed file yields an empty
/// document.
pub trait DocumentCache: Send + Sync {
    fn read(&self, path: &Path, parse: ParseFn) -> Arc<Document>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

impl FileStamp {
    fn of(path: &Path) -> Option<Self> {
        let meta = fs::metadata(path).ok()?;
        Some(Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

struct CacheEntry {
    stamp: FileStamp,
    document: Arc<Document>,
}

/// Cache that re-reads a file only when its mtime or size changed
///
/// Safe to share between threads; concurrent lookups take the read lock on hits.
pub struct FileCache {
    entries: RwLock<HashMap<PathBuf, CacheEntry>>,
    logger: SharedLogger,
}

impl Default for FileCache {
    fn default() -> Self {
        Self::new()
    }
}

impl FileCache {
    pub fn new() -> Self {
        Self::with_logger(Arc::new(NoOpLogger::new()))
    }

    pub fn with_logger(logger: SharedLogger) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            logger,
        }
    }

    /// Number of cached files
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn load(&self, path: &Path, parse: ParseFn) -> Document {
        let parsed = fs::read_to_string(path)
            .map_err(DocumentError::from)
            .and_then(|content| parse(&content));
        match parsed {
            Ok(document) => document,
            Err(e) => {
                self.logger.debug(&format!(
                    "[eyaml_backend]: treating {} as empty: {}",
                    path.display(),
                    e
                ));
                Document::new()
            }
        }
    }
}

impl DocumentCache for FileCache {
    fn read(&self, path: &Path, parse: ParseFn) -> Arc<Document> {
        let Some(stamp) = FileStamp::of(path) else {
            self.entries.write().remove(path);
            return Arc::new(Document::new());
        };

        if let Some(entry) = self.entries.read().get(path) {
            if entry.stamp == stamp {
                return Arc::clone(&entry.document);
            }
        }

        let document = Arc::new(self.load(path, parse));
        self.entries.write().insert(
            path.to_path_buf(),
            CacheEntry {
                stamp,
                document: Arc::clone(&document),
            },
        );
        document
    }
}

impl std::fmt::Debug for FileCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCache")
            .field("entries", &self.len())
            .finish()
    }
}
