//! Error types for the extraction layer.
//!
//! Errors are split by how the caller should react to them: configuration
//! problems are fatal, transport failures are retried before they surface,
//! field extraction failures point at bad data, and backend rejections fail
//! straight away.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for all extraction operations.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// Invalid construction-time parameters.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Search execution failed on every allowed attempt.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A document does not carry a usable cursor value.
    #[error(transparent)]
    FieldExtraction(#[from] FieldExtractionError),

    /// A malformed resume token.
    #[error(transparent)]
    Cursor(#[from] CursorError),

    /// The backend answered, but not with something we can use.
    #[error("search rejected by backend: {0}")]
    Backend(#[source] ConnectionError),

    /// An index refresh could not be performed.
    #[error("failed to refresh index {index}")]
    Refresh {
        index: String,
        #[source]
        source: ConnectionError,
    },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,
}

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Errors raised for invalid configuration. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The connection allows no search attempts at all.
    #[error("max connection attempts must be > 0, got {attempts}")]
    InvalidMaxAttempts { attempts: u32 },

    /// The page size would make every page empty.
    #[error("page size must be > 0, got {page_size}")]
    InvalidPageSize { page_size: usize },

    /// Composite pagination was requested without a secondary field.
    #[error("secondary sort requested but no secondary cursor field is configured")]
    SecondaryFieldNotConfigured,

    /// The connection could not be set up from its configuration.
    #[error("invalid connection configuration: {message}")]
    InvalidConnection { message: String },
}

/// Raised once every retry of a search has failed.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("search failed after {attempts} attempt(s): {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: ConnectionError,
    },
}

impl TransportError {
    /// Returns the last failure observed before giving up.
    pub fn last_error(&self) -> &ConnectionError {
        match self {
            TransportError::Exhausted { last, .. } => last,
        }
    }
}

/// Errors reading a cursor value out of a document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldExtractionError {
    /// A path segment does not exist.
    #[error("cursor field '{path}' not found: missing segment '{segment}'")]
    MissingField { path: String, segment: String },

    /// A path segment exists but is not an object, so it cannot be descended into.
    #[error("cursor field '{path}' is not traversable at segment '{segment}'")]
    NotTraversable { path: String, segment: String },

    /// The field is present with an explicit null.
    #[error("cursor field '{path}' is null")]
    NullValue { path: String },

    /// The field holds an object or an array rather than a scalar.
    #[error("cursor field '{path}' is not a scalar value")]
    NotScalar { path: String },
}

/// Errors decoding a serialized cursor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CursorError {
    #[error("invalid cursor token: {token}")]
    InvalidToken { token: String },

    #[error("cursor has a secondary value without a primary value")]
    SecondaryWithoutPrimary,
}

/// Failures reported by a [`SearchConnection`](crate::connection::SearchConnection).
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Network or I/O level failure. Worth retrying.
    #[error("transport failure: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The backend answered with a non-success status.
    #[error("request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The backend answered with a body that could not be understood.
    #[error("malformed response: {message}")]
    MalformedResponse { message: String },
}

impl ConnectionError {
    /// Creates a transport failure without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        ConnectionError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a malformed-response failure.
    pub fn malformed(message: impl Into<String>) -> Self {
        ConnectionError::MalformedResponse {
            message: message.into(),
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ConnectionError::Transport { .. })
    }
}
