//! Core traits and types for value decryption

use thiserror::Error;

use super::options::Options;

/// Errors that can occur while decrypting a value
#[derive(Error, Debug)]
pub enum EncryptionError {
    #[error("No encryptor registered for method {0}")]
    UnknownMethod(String),

    #[error("Invalid base64 payload for {method}: {message}")]
    InvalidPayload { method: String, message: String },

    #[error("Decrypted {method} value is not valid UTF-8")]
    NotUtf8 { method: String },

    #[error("Missing option for {method}: {option}")]
    MissingOption { method: String, option: String },

    #[error("Decryption failed: {0}")]
    Other(String),
}

pub type EncryptionResult<T> = Result<T, EncryptionError>;

/// An encryption method usable in `ENC[METHOD,...]` spans
///
/// Implementations receive the already base64-decoded ciphertext together with
/// the per-lookup options (key paths and the like, interpolated against scope).
///
/// # Example
///
/// ```
/// use eyamldb_core::encryption::{Encryptor, Options, PlaintextEncryptor};
///
/// let encryptor = PlaintextEncryptor::new();
/// let plain = encryptor.decrypt(b"hello", &Options::default()).unwrap();
/// assert_eq!(plain, "hello");
/// ```
pub trait Encryptor: Send + Sync {
    /// Method tag as written in the span, e.g. `PKCS7`
    fn method(&self) -> &str;

    /// Decrypt raw ciphertext bytes to plaintext
    fn decrypt(&self, ciphertext: &[u8], options: &Options) -> EncryptionResult<String>;
}
