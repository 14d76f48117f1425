//! Error types for the repository layer.
//!
//! Configuration errors are construction-time failures: a mis-declared
//! entity never produces a repository. Everything else is a call-time
//! failure delivered through the same `Result` channel as success.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for all repository operations.
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Entity metadata errors, raised while constructing a descriptor or
    /// building the client. Unrecoverable: no repository is produced.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The entity cannot be indexed as handed in (e.g. unset identifier).
    #[error("invalid entity: {message}")]
    InvalidEntity { message: String },

    /// Document encode/decode/merge failures.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Transport-level failure reaching the engine.
    #[error("transport failure: {message}")]
    Io { message: String },

    /// The engine reported a non-success status for the request.
    #[error("query failed with status {status}: {reason}")]
    Query { status: u16, reason: String },

    /// Point lookup target does not exist.
    #[error("document not found: {index}/{id}")]
    NotFound { index: String, id: String },

    /// A bulk request completed with one or more item-level failures.
    #[error(transparent)]
    Bulk(#[from] BulkFailure),
}

/// Errors in the declarative entity metadata or client configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No field of the entity type is marked as the identifier.
    #[error("entity type '{type_name}' declares no identifier field")]
    MissingIdField { type_name: String },

    /// More than one field of the entity type is marked as the identifier.
    #[error("entity type '{type_name}' declares multiple identifier fields: {fields:?}")]
    AmbiguousIdField {
        type_name: String,
        fields: Vec<String>,
    },

    /// A configured node URL could not be parsed.
    #[error("invalid node URL '{url}': {message}")]
    InvalidNode { url: String, message: String },

    /// The HTTP transport could not be built from the configuration.
    #[error("failed to build transport: {message}")]
    Transport { message: String },
}

/// Errors converting between entities and wire documents.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("failed to encode entity: {message}")]
    Encode { message: String },

    #[error("failed to decode document: {message}")]
    Decode { message: String },

    /// The entity serialized to something other than a JSON object.
    #[error("entity did not serialize to a JSON object")]
    NotAnObject,

    /// A named field does not exist on the entity.
    #[error("no field named '{field}' on the entity")]
    UnknownField { field: String },

    /// A named field exists but cannot hold a string value.
    #[error("field '{field}' is not assignable from a string: {message}")]
    NotAssignable { field: String, message: String },
}

/// Aggregated item-level failures from a bulk request.
///
/// Raised whenever the engine reports `errors: true`, regardless of the
/// overall response status: partial failure is never collapsed into a
/// boolean result.
#[derive(Error, Debug)]
#[error("bulk operation reported {} failed item(s)", .failures.len())]
pub struct BulkFailure {
    pub failures: Vec<BulkItemFailure>,
}

/// Failure detail for a single item of a bulk request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemFailure {
    /// Document id of the failed operation, when the engine reported one.
    pub id: Option<String>,
    /// HTTP-style status for the item.
    pub status: u16,
    /// Engine-supplied failure reason.
    pub reason: String,
}

impl std::fmt::Display for BulkItemFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] status {}: {}",
            self.id.as_deref().unwrap_or("?"),
            self.status,
            self.reason
        )
    }
}

/// Result type alias for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl From<elasticsearch::Error> for RepositoryError {
    fn from(err: elasticsearch::Error) -> Self {
        RepositoryError::Io {
            message: err.to_string(),
        }
    }
}
