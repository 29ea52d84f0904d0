//! Reference verifier: issues server nonces and guards an endpoint with them.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::post,
};
use std::collections::HashMap;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::api::{
    AUTHENTICATION_HEADER, ErrorResponse, HASH_PARAM, NONCE_PARAM, NONCE_PATH, NonceRequest,
    NonceResponse, PROFILE_PATH, ProfileResponse,
};
use crate::error::VerificationError;
use crate::nonce_store::{NonceStore, SignedCheck};

#[derive(Clone)]
pub struct AppState {
    pub nonce_store: NonceStore,
    pub nonce_ttl_secs: i64,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(NONCE_PATH, post(issue_nonce))
        .route(PROFILE_PATH, post(update_profile).put(update_profile))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_response(status: StatusCode, error: &str, description: &str) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            error_description: description.to_string(),
        }),
    )
        .into_response()
}

impl IntoResponse for VerificationError {
    fn into_response(self) -> Response {
        match self {
            VerificationError::NonceAlreadyUsed => {
                error_response(StatusCode::UNAUTHORIZED, "unauthorized", "Replay detected")
            }
            VerificationError::InvalidNonce | VerificationError::InvalidHash => {
                error_response(StatusCode::UNAUTHORIZED, "unauthorized", &self.to_string())
            }
            VerificationError::MissingCredentials(msg) => {
                error_response(StatusCode::UNAUTHORIZED, "unauthorized", &msg)
            }
            VerificationError::InvalidBody(msg) => {
                error_response(StatusCode::BAD_REQUEST, "invalid_request", &msg)
            }
            VerificationError::Database(e) => {
                error!("Database error: {}", e);
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    "Internal server error",
                )
            }
        }
    }
}

/// Subject of the caller: the bearer token itself
fn bearer_subject(headers: &HeaderMap) -> Result<String, VerificationError> {
    headers
        .get(AUTHENTICATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or_else(|| VerificationError::MissingCredentials("Missing bearer token".to_string()))
}

/// Issue a server nonce for the action described in the body
async fn issue_nonce(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<NonceRequest>,
) -> Result<Json<NonceResponse>, VerificationError> {
    let subject = bearer_subject(&headers)?;

    let nonce = state
        .nonce_store
        .issue(&subject, &request, state.nonce_ttl_secs)
        .await?;

    Ok(Json(NonceResponse { nonce }))
}

/// Accept a profile update only when it carries a valid nonce and hash
async fn update_profile(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    body: String,
) -> Result<Json<ProfileResponse>, VerificationError> {
    let subject = bearer_subject(&headers)?;

    let (Some(client_nonce), Some(hash)) = (params.get(NONCE_PARAM), params.get(HASH_PARAM))
    else {
        info!("Request rejected. Path {} requires a nonce.", uri.path());
        return Err(VerificationError::MissingCredentials(
            "Cannot determine replay".to_string(),
        ));
    };

    let check = SignedCheck {
        method: method.as_str(),
        action: uri.path(),
        client_nonce,
        hash,
        payload: &body,
    };
    state.nonce_store.verify_signed(&subject, &check).await?;
    debug!("Nonce {} accepted for {}", client_nonce, uri.path());

    let profile = if body.trim().is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(&body).map_err(|e| VerificationError::InvalidBody(e.to_string()))?
    };

    Ok(Json(ProfileResponse {
        updated: true,
        profile,
    }))
}
