//! Key resolution across the hierarchy
//!
//! `EyamlResolver` is the single entry point: it reads each source's raw value,
//! resolves it through `AnswerParser`, and folds it into an `Answer`.

mod answer;
mod error;
mod lookup;
mod parse;
mod source;

pub use answer::{merge_answer, Answer, Flow, ResolutionMode};
pub use error::{LookupError, LookupResult, ValueError};
pub use lookup::EyamlResolver;
pub use parse::{AnswerParser, Transformed};
pub use source::{FileSourceReader, SourceReader};
