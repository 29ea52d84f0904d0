use reqwest::StatusCode;
use serde_json::{Value, json};
use thiserror::Error;

/// Errors surfaced to callers of the JSON client and the nonce signer
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Precondition failed: {0}")]
    Precondition(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Server error: HTTP {status}: {body}")]
    Server { status: u16, body: Value },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Deserialization error: {0}")]
    Deserialization(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Build a server error from a non-200 response.
    ///
    /// A non-empty body is kept as the server sent it: parsed JSON when it
    /// parses, the raw text otherwise. An empty body is replaced by
    /// `{"error": status, "error_description": reason}`.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let body = if body.trim().is_empty() {
            synthesized_error_body(status)
        } else {
            serde_json::from_str::<Value>(body).unwrap_or_else(|_| Value::String(body.to_string()))
        };

        ClientError::Server {
            status: status.as_u16(),
            body,
        }
    }

    /// The structured error body to hand to the user-facing layer.
    pub fn error_body(&self) -> Value {
        match self {
            ClientError::Server { body, .. } => body.clone(),
            ClientError::Precondition(msg) => json!({
                "error": "precondition_failed",
                "error_description": msg,
            }),
            ClientError::Network(msg) => json!({
                "error": "network_error",
                "error_description": msg,
            }),
            other => json!({
                "error": "client_error",
                "error_description": other.to_string(),
            }),
        }
    }
}

fn synthesized_error_body(status: StatusCode) -> Value {
    json!({
        "error": status.as_u16(),
        "error_description": status.canonical_reason().unwrap_or(""),
    })
}

/// Error types for the server-side nonce verification
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("Invalid nonce")]
    InvalidNonce,
    #[error("Invalid hash")]
    InvalidHash,
    #[error("Nonce already used")]
    NonceAlreadyUsed,
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
    #[error("Invalid body: {0}")]
    InvalidBody(String),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
