//! Error types for port operations.

use std::path::PathBuf;

/// Graph store operation errors with context for debugging.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// Entity not found - includes entity type and ID for actionable error messages.
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// The store could not be reached or asked for the call to be repeated.
    #[error("Connection error in {operation}: {message}")]
    Connection {
        operation: &'static str,
        message: String,
    },

    /// Database operation failed - includes operation name for tracing.
    #[error("Database error in {operation}: {message}")]
    Database {
        operation: &'static str,
        message: String,
    },

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RepoError {
    /// Create a NotFound error with entity type and ID context.
    pub fn not_found(entity_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }

    /// Create a Database error with operation context.
    pub fn database(operation: &'static str, message: impl ToString) -> Self {
        Self::Database {
            operation,
            message: message.to_string(),
        }
    }

    /// Create a Connection error with operation context.
    pub fn connection(operation: &'static str, message: impl ToString) -> Self {
        Self::Connection {
            operation,
            message: message.to_string(),
        }
    }

    /// Create a Serialization error.
    pub fn serialization(message: impl ToString) -> Self {
        Self::Serialization(message.to_string())
    }

    /// Check if this is a NotFound error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether repeating the identical call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

/// Generative model call failures, classified by how the caller should react.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LlmError {
    #[error("LLM request timed out: {0}")]
    Timeout(String),
    #[error("LLM rate limit hit: {0}")]
    RateLimited(String),
    /// Connection refused or 5xx from the provider
    #[error("LLM service unavailable: {0}")]
    Unavailable(String),
    /// The provider rejected the request (bad request, auth)
    #[error("LLM request failed: {0}")]
    RequestFailed(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// Whether repeating the identical request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::RateLimited(_) | Self::Unavailable(_) => true,
            // Truncated bodies from a dropped connection
            Self::InvalidResponse(_) => true,
            Self::RequestFailed(_) => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ImageGenError {
    #[error("Generation failed: {0}")]
    GenerationFailed(String),
    #[error("Background removal failed: {0}")]
    BackgroundRemovalFailed(String),
    #[error("Service unavailable")]
    Unavailable,
}

/// Run directory file errors (`context.json`, `plot.json`, `calls.jsonl`).
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("I/O error on {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("Serialization error on {path}: {message}")]
    Serialization { path: PathBuf, message: String },
}

impl SnapshotError {
    pub fn io(path: impl Into<PathBuf>, err: impl ToString) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn serialization(path: impl Into<PathBuf>, err: impl ToString) -> Self {
        Self::Serialization {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
