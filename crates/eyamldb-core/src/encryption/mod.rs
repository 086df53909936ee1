//! Decryption of `ENC[...]` values
//!
//! The cryptography itself is pluggable: an `Encryptor` per method tag,
//! collected in an `EncryptorRegistry` that the `EyamlCodec` consults.

mod traits;
mod options;
mod plaintext;
mod registry;
mod codec;

pub use traits::{Encryptor, EncryptionError, EncryptionResult};
pub use options::Options;
pub use plaintext::PlaintextEncryptor;
pub use registry::EncryptorRegistry;
pub use codec::EyamlCodec;
