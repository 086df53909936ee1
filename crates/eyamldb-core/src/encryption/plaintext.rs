//! The PLAINTEXT method: payload is base64 of the value itself

use super::options::Options;
use super::traits::{EncryptionError, EncryptionResult, Encryptor};

/// Encryptor whose "ciphertext" is the UTF-8 plaintext
///
/// Useful for fixtures and for verifying a hierarchy without key material.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextEncryptor;

impl PlaintextEncryptor {
    pub const METHOD: &'static str = "PLAINTEXT";

    pub fn new() -> Self {
        Self
    }
}

impl Encryptor for PlaintextEncryptor {
    fn method(&self) -> &str {
        Self::METHOD
    }

    fn decrypt(&self, ciphertext: &[u8], _options: &Options) -> EncryptionResult<String> {
        String::from_utf8(ciphertext.to_vec()).map_err(|_| EncryptionError::NotUtf8 {
            method: Self::METHOD.to_string(),
        })
    }
}
