//! Error types for the expense API client.
//!
//! # Design
//! The remote API reports failures as free text in `{ "message": ... }`.
//! `ApiError` turns that text into a tagged value once, at parse time, so
//! callers branch on the variant instead of sniffing strings. Session loss is
//! its own variant (`Unauthorized`); the message is kept verbatim because it
//! is what the user sees.

/// Errors returned by `ExpenseClient` parse methods and by transports.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// The caller's credential is missing, expired or rejected.
    #[error("{message}")]
    Unauthorized { status: u16, message: String },

    /// The server returned 404.
    #[error("{message}")]
    NotFound { message: String },

    /// Any other non-2xx response.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// A 2xx response whose envelope carried `"success": false`.
    #[error("{message}")]
    Unsuccessful { message: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// No response was received.
    #[error("{0}")]
    Transport(String),
}

impl ApiError {
    /// Build the error for a failed response, tagging session loss.
    ///
    /// A 401 is always session loss. Other statuses are session loss when the
    /// server's wording says so; the API has no structured code for it.
    pub fn classify(status: u16, message: String) -> Self {
        if status == 401 || message_indicates_session_loss(&message) {
            return ApiError::Unauthorized { status, message };
        }
        match status {
            404 => ApiError::NotFound { message },
            200..=299 => ApiError::Unsuccessful { message },
            _ => ApiError::Rejected { status, message },
        }
    }

    pub fn is_session_lost(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}

/// Literal, case-sensitive match on the phrases the API uses for auth failures.
pub fn message_indicates_session_loss(message: &str) -> bool {
    message.contains("Unauthorized") || message.contains("not authenticated")
}
