//! Error types for environment merging.

use thiserror::Error;

/// Errors raised when an input document does not match the environment-file
/// shape. Any of these fails the whole merge; no partial result is produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("environment document is not a YAML mapping")]
    NotAMapping,

    #[error("environment keys must be strings")]
    NonStringKey,

    #[error("`{0}` must be a sequence")]
    NotASequence(&'static str),

    #[error("`channels` entries must be strings")]
    NonStringChannel,

    #[error("dependency entry must be a package string or a single-key mapping, got {0}")]
    MalformedDependency(String),

    #[error("nested dependency list under `{0}` must be a sequence of strings")]
    MalformedNestedList(String),
}
