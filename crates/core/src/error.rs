//! Error types for the Juliet domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant so callers can tell a
//! retrieval outage from a completion failure from a persistence fault.

use thiserror::Error;

/// The top-level error type for all Juliet operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Boundary errors ---
    #[error("User request is empty")]
    EmptyRequest,

    // --- Retrieval errors ---
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Persistence errors ---
    #[error("Persistence failed (store: {}, audit: {})", describe(.store), describe(.audit))]
    Persistence {
        store: Option<PersistenceError>,
        audit: Option<PersistenceError>,
    },

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

fn describe(err: &Option<PersistenceError>) -> String {
    match err {
        Some(e) => e.to_string(),
        None => "ok".into(),
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    #[error("Retrieval unavailable for collection '{collection}': {reason}")]
    Unavailable { collection: String, reason: String },

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Malformed query result from '{collection}': {reason}")]
    MalformedResult { collection: String, reason: String },
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum PersistenceError {
    #[error("Vector store write to '{collection}' failed: {reason}")]
    StoreWrite { collection: String, reason: String },

    #[error("Audit append to {path} failed: {reason}")]
    AuditAppend { path: String, reason: String },

    #[error("Conversation store error: {0}")]
    Conversation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retrieval_error_names_collection() {
        let err = Error::Retrieval(RetrievalError::Unavailable {
            collection: "semantic".into(),
            reason: "connection refused".into(),
        });
        assert!(err.to_string().contains("semantic"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn persistence_error_reports_both_sides() {
        let err = Error::Persistence {
            store: None,
            audit: Some(PersistenceError::AuditAppend {
                path: "/tmp/audit.jsonl".into(),
                reason: "disk full".into(),
            }),
        };
        let text = err.to_string();
        assert!(text.contains("store: ok"));
        assert!(text.contains("disk full"));
    }

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
    }
}
