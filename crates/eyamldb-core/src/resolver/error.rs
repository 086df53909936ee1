//! Lookup errors

use thiserror::Error;

use super::answer::ResolutionMode;
use crate::encryption::EncryptionError;
use crate::query::QueryError;

/// Failure while resolving a single value
#[derive(Error, Debug)]
pub enum ValueError {
    #[error(transparent)]
    Decryption(#[from] EncryptionError),

    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Errors that abort a lookup call
///
/// A key missing from a source, a missing data file and a malformed data file
/// are not errors; they make the source contribute nothing.
#[derive(Error, Debug)]
pub enum LookupError {
    /// A source's value has the wrong shape for the requested mode
    #[error("Hiera type mismatch in {datasource} ({mode} lookup): expected {expected} and got {actual}")]
    TypeMismatch {
        datasource: String,
        mode: ResolutionMode,
        expected: &'static str,
        actual: &'static str,
    },

    /// A value could not be decrypted or dereferenced
    #[error("Cannot resolve value from {datasource}: {error}")]
    Value {
        datasource: String,
        #[source]
        error: ValueError,
    },
}

impl LookupError {
    pub fn type_mismatch(
        datasource: impl Into<String>,
        mode: ResolutionMode,
        expected: &'static str,
        actual: &'static str,
    ) -> Self {
        Self::TypeMismatch {
            datasource: datasource.into(),
            mode,
            expected,
            actual,
        }
    }

    /// The data source that caused the failure
    pub fn datasource(&self) -> &str {
        match self {
            LookupError::TypeMismatch { datasource, .. } | LookupError::Value { datasource, .. } => {
                datasource
            }
        }
    }
}

pub type LookupResult<T> = Result<T, LookupError>;
