//! Error types for the Periscope domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all Periscope operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Codec errors ---
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Storage errors ---
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    // --- Model runtime errors ---
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    // --- Orchestrator errors ---
    #[error("Orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),

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

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Errors from the part codec.
///
/// `MalformedPart` signals corruption of persisted data and is fatal;
/// it must never be swallowed or downgraded to a recoverable condition.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Malformed persisted part: {0}")]
    MalformedPart(String),

    #[error("Invalid part payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool timed out: {tool_name} after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Access denied: user {user_id} may not {action} chat {chat_id}")]
    AccessDenied {
        user_id: String,
        action: String,
        chat_id: String,
    },
}

#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    #[error("Model runtime unavailable: {0}")]
    Unavailable(String),

    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Message not found: no regeneration target in chat {chat_id}")]
    MessageNotFound { chat_id: String },

    #[error("Background save failed: {0}")]
    SaveFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_error_displays_correctly() {
        let err = Error::Codec(CodecError::MalformedPart(
            "tool row has null state".into(),
        ));
        assert!(err.to_string().contains("null state"));
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = Error::Tool(ToolError::Timeout {
            tool_name: "search".into(),
            timeout_secs: 15,
        });
        assert!(err.to_string().contains("search"));
        assert!(err.to_string().contains("15"));
    }

    #[test]
    fn access_denied_names_the_actor() {
        let err = StorageError::AccessDenied {
            user_id: "u1".into(),
            action: "write".into(),
            chat_id: "c1".into(),
        };
        let text = err.to_string();
        assert!(text.contains("u1"));
        assert!(text.contains("write"));
        assert!(text.contains("c1"));
    }
}
