//! Error types for the sales agent orchestrator

use thiserror::Error;

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {

    // =============================
    // Turn Pipeline Errors
    // =============================

    /// Record lookup failed at the transport/storage layer.
    /// The orchestrator degrades this to an empty result set.
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// A model completion failed after all retry attempts.
    /// The orchestrator degrades this to the deterministic summary
    /// (structured path) or the fixed apology text (fallback path).
    #[error("Generation error: {0}")]
    Generation(String),

    /// A persistence call failed. Fatal to the turn.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Invalid model response: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("UUID parse error: {0}")]
    Uuid(#[from] uuid::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Whether this error aborts the whole turn. Everything except
    /// storage failures is absorbed into a degraded response.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AgentError::Storage(_))
    }
}
