//! Unified error types for the domain layer
//!
//! Every invariant the story graph, the branching rules and the conversation
//! history enforce is reported through [`DomainError`]. The variants map onto
//! the recovery policy the engine applies:
//!
//! - [`DomainError::Config`] is rejected before any generation begins.
//! - [`DomainError::Validation`] and [`DomainError::Parse`] describe model output
//!   that is malformed or under-delivers; the engine answers them with a repair
//!   round-trip.
//! - [`DomainError::Structural`] is a programming invariant violation and is
//!   never retried.

use thiserror::Error;

/// Unified error type for domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Generation parameters violate their bounds
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generated content does not satisfy the expected shape or minimums
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Text could not be parsed into the expected structure
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid ID format
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Conversation or graph invariant broken by the caller
    #[error("Structural invariant violated: {0}")]
    Structural(String),

    /// State transition not allowed
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),
}

impl DomainError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a validation error for generated content.
    ///
    /// Use this when model output parsed but does not meet a configured
    /// minimum or a required field is empty:
    ///
    /// ```ignore
    /// if draft.endings.len() < config.num_endings() as usize {
    ///     return Err(DomainError::validation("fewer endings than configured"));
    /// }
    /// ```
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create an invalid ID error
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// Create a structural invariant error
    pub fn structural(msg: impl Into<String>) -> Self {
        Self::Structural(msg.into())
    }

    /// Create an invalid state transition error
    pub fn invalid_state_transition(msg: impl Into<String>) -> Self {
        Self::InvalidStateTransition(msg.into())
    }

    /// Whether a repair round-trip with the model can fix this error.
    pub fn is_repairable(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Parse(_))
    }
}
