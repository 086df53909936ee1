//! Registry of encryption methods, keyed by method tag

use std::collections::HashMap;
use std::sync::Arc;

use super::plaintext::PlaintextEncryptor;
use super::traits::Encryptor;

/// The set of encryptors a resolver can decrypt with
///
/// # Example
///
/// ```
/// use eyamldb_core::encryption::EncryptorRegistry;
///
/// let registry = EncryptorRegistry::with_builtins();
/// assert!(registry.get("plaintext").is_some());
/// assert!(registry.get("PKCS7").is_none());
/// ```
#[derive(Clone, Default)]
pub struct EncryptorRegistry {
    encryptors: HashMap<String, Arc<dyn Encryptor>>,
}

impl EncryptorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in methods (`PLAINTEXT`)
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PlaintextEncryptor::new()));
        registry
    }

    /// Register an encryptor, replacing any previous one with the same tag
    pub fn register(&mut self, encryptor: Arc<dyn Encryptor>) {
        self.encryptors
            .insert(encryptor.method().to_uppercase(), encryptor);
    }

    /// Find the encryptor for a method tag (case-insensitive)
    pub fn get(&self, method: &str) -> Option<Arc<dyn Encryptor>> {
        self.encryptors.get(&method.to_uppercase()).cloned()
    }

    /// Registered method tags, sorted
    pub fn methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self.encryptors.keys().cloned().collect();
        methods.sort();
        methods
    }
}

impl std::fmt::Debug for EncryptorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptorRegistry")
            .field("methods", &self.methods())
            .finish()
    }
}
