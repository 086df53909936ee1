//! Decoding of `ENC[...]` spans inside string values

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::options::Options;
use super::registry::EncryptorRegistry;
use super::traits::{EncryptionError, EncryptionResult};
use crate::token::{tokenize, Token};

/// Turns strings with encrypted spans back into plaintext
#[derive(Debug, Clone)]
pub struct EyamlCodec {
    registry: Arc<EncryptorRegistry>,
}

impl EyamlCodec {
    pub fn new(registry: Arc<EncryptorRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &EncryptorRegistry {
        &self.registry
    }

    /// Split a value into literal and encrypted tokens
    pub fn parse(&self, text: &str) -> Vec<Token> {
        tokenize(text)
    }

    /// Plaintext for a single token; literal tokens pass through
    pub fn token_to_plain_text(&self, token: &Token, options: &Options) -> EncryptionResult<String> {
        match token {
            Token::Plain(text) => Ok(text.clone()),
            Token::Encrypted { method, payload } => {
                let encryptor = self
                    .registry
                    .get(method)
                    .ok_or_else(|| EncryptionError::UnknownMethod(method.clone()))?;
                let ciphertext =
                    STANDARD
                        .decode(payload)
                        .map_err(|e| EncryptionError::InvalidPayload {
                            method: method.clone(),
                            message: e.to_string(),
                        })?;
                encryptor.decrypt(&ciphertext, options)
            }
        }
    }

    /// Decrypt every span of `text`, keeping literal text between spans
    ///
    /// A single trailing newline is stripped from the joined result.
    pub fn decrypt(&self, text: &str, options: &Options) -> EncryptionResult<String> {
        let mut plaintext = String::with_capacity(text.len());
        for token in self.parse(text) {
            plaintext.push_str(&self.token_to_plain_text(&token, options)?);
        }
        Ok(chomp(plaintext))
    }
}

fn chomp(mut text: String) -> String {
    if text.ends_with("\r\n") {
        text.truncate(text.len() - 2);
    } else if text.ends_with('\n') || text.ends_with('\r') {
        text.pop();
    }
    text
}
