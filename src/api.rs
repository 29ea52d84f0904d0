use serde::{Deserialize, Serialize};

/// Endpoint that issues server nonces
pub const NONCE_PATH: &str = "/c2id/api/auth/nonce";

/// Nonce-protected profile endpoint served by the verifier
pub const PROFILE_PATH: &str = "/c2id/api/profile";

/// Header carrying the bearer token
pub const AUTHENTICATION_HEADER: &str = "Authentication";

/// Query parameter names attached to signed requests
pub const NONCE_PARAM: &str = "nonce";
pub const HASH_PARAM: &str = "hash";

/// Request for a server nonce, echoing the action it will protect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NonceRequest {
    /// HTTP method of the protected request
    pub method: String,
    /// Target path of the protected request
    pub action: String,
    /// Serialized payload of the protected request
    #[serde(default)]
    pub data: String,
}

/// Response containing a generated nonce
#[derive(Debug, Serialize, Deserialize)]
pub struct NonceResponse {
    /// The generated nonce
    pub nonce: String,
}

/// Structured error body returned by the verifier
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_description: String,
}

/// Response from the profile endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub updated: bool,
    pub profile: serde_json::Value,
}
