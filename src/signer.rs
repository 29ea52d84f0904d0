//! Nonce-challenge request signing.
//!
//! A signed submission fetches a server nonce bound to the action, generates a
//! client nonce, and attaches `hash = hex(SHA256(server_nonce + client_nonce + body))`
//! together with the client nonce as query parameters.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use reqwest::Method;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, error, info};

use crate::api::{HASH_PARAM, NONCE_PARAM, NONCE_PATH, NonceRequest, NonceResponse};
use crate::client::JsonClient;
use crate::error::ClientError;
use crate::request::JsonRequest;

const CLIENT_NONCE_BYTES: usize = 18;

/// Query parameters proving knowledge of the server nonce and the payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedParams {
    pub nonce: String,
    pub hash: String,
}

impl SignedParams {
    /// Insert `nonce` and `hash`; other keys are left alone
    pub fn merge_into(self, params: &mut BTreeMap<String, String>) {
        params.insert(NONCE_PARAM.to_string(), self.nonce);
        params.insert(HASH_PARAM.to_string(), self.hash);
    }
}

/// Random client nonce, fresh for every signing attempt
pub fn generate_client_nonce() -> String {
    let mut bytes = [0u8; CLIENT_NONCE_BYTES];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Lowercase hex SHA-256 of `server_nonce + client_nonce + payload`
pub fn compute_hash(server_nonce: &str, client_nonce: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(server_nonce.as_bytes());
    hasher.update(client_nonce.as_bytes());
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}

/// Sign an already serialized payload
fn sign_serialized(server_nonce: &str, payload: &str) -> Result<SignedParams, ClientError> {
    if server_nonce.is_empty() {
        return Err(ClientError::Precondition(
            "server nonce is missing".to_string(),
        ));
    }

    let nonce = generate_client_nonce();
    let hash = compute_hash(server_nonce, &nonce, payload);
    Ok(SignedParams { nonce, hash })
}

/// Sign `request` with a server nonce obtained from [`NonceSigner::fetch_server_nonce`]
pub fn sign_request(request: &JsonRequest, server_nonce: &str) -> Result<SignedParams, ClientError> {
    let payload = request.serialized_data()?.unwrap_or_default();
    sign_serialized(server_nonce, &payload)
}

/// Merge `nonce` and `hash` into the request params and return the body they cover
fn sign_in_place(request: &mut JsonRequest) -> Result<Option<String>, ClientError> {
    let server_nonce = request
        .server_nonce
        .clone()
        .filter(|nonce| !nonce.is_empty())
        .ok_or_else(|| ClientError::Precondition("request has no server nonce".to_string()))?;

    let body = request.serialized_data()?;
    let signed = sign_serialized(&server_nonce, body.as_deref().unwrap_or_default())?;
    signed.merge_into(&mut request.params);
    Ok(body)
}

/// Progress of one signed submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    NoNonce,
    NonceRequested,
    NonceReceived,
    Signed,
    Sent,
    Succeeded,
    Failed,
}

impl SubmissionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SubmissionState::Succeeded | SubmissionState::Failed)
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubmissionState::NoNonce => "no-nonce",
            SubmissionState::NonceRequested => "nonce-requested",
            SubmissionState::NonceReceived => "nonce-received",
            SubmissionState::Signed => "signed",
            SubmissionState::Sent => "sent",
            SubmissionState::Succeeded => "succeeded",
            SubmissionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Obtains server nonces and sends signed requests through a [`JsonClient`]
#[derive(Debug, Clone)]
pub struct NonceSigner {
    client: JsonClient,
    nonce_path: String,
}

impl NonceSigner {
    pub fn new(client: JsonClient) -> Self {
        Self::with_nonce_path(client, NONCE_PATH)
    }

    pub fn with_nonce_path(client: JsonClient, nonce_path: &str) -> Self {
        Self {
            client,
            nonce_path: nonce_path.to_string(),
        }
    }

    /// Ask the server for a nonce bound to the intended action
    pub async fn fetch_server_nonce(&self, request: &JsonRequest) -> Result<String, ClientError> {
        let nonce_request = NonceRequest {
            method: request.method.to_string(),
            action: self.client.resolve(request)?.path().to_string(),
            data: request.serialized_data()?.unwrap_or_default(),
        };
        let fetch = JsonRequest::new(Method::POST, &self.nonce_path).with_data(&nonce_request)?;

        debug!("Requesting nonce for {} {}", request.method, request.url);
        let response = self.client.send_json_request(&fetch).await?;

        let nonce = serde_json::from_value::<NonceResponse>(response)
            .map_err(|e| ClientError::Deserialization(format!("Invalid nonce response: {}", e)))?
            .nonce;
        if nonce.is_empty() {
            return Err(ClientError::Deserialization(
                "Nonce response carried an empty nonce".to_string(),
            ));
        }

        debug!("Received nonce: {}", nonce);
        Ok(nonce)
    }

    /// Sign `request` with its server nonce and send it.
    ///
    /// `request.server_nonce` must already be set.
    pub async fn send_signed_request(&self, mut request: JsonRequest) -> Result<Value, ClientError> {
        let body = sign_in_place(&mut request)?;
        self.client.dispatch(&request, body).await
    }

    /// Run the whole flow: fetch a nonce, sign, send
    pub async fn submit(&self, request: JsonRequest) -> Result<Value, ClientError> {
        let mut submission = SignedSubmission::new(request);
        submission.run(self).await
    }
}

/// One pass through the signed submission state machine.
///
/// A failed submission is not retried; start a new one from [`SubmissionState::NoNonce`].
#[derive(Debug)]
pub struct SignedSubmission {
    request: JsonRequest,
    state: SubmissionState,
}

impl SignedSubmission {
    pub fn new(request: JsonRequest) -> Self {
        Self {
            request,
            state: SubmissionState::NoNonce,
        }
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    fn transition(&mut self, next: SubmissionState) {
        debug!(
            "Signed submission {} {}: {} -> {}",
            self.request.method, self.request.url, self.state, next
        );
        self.state = next;
    }

    pub async fn run(&mut self, signer: &NonceSigner) -> Result<Value, ClientError> {
        if self.state != SubmissionState::NoNonce {
            return Err(ClientError::Precondition(format!(
                "submission already {}",
                self.state
            )));
        }

        let result = self.drive(signer).await;
        match &result {
            Ok(_) => {
                self.transition(SubmissionState::Succeeded);
                info!("Signed request to {} succeeded", self.request.url);
            }
            Err(e) => {
                self.transition(SubmissionState::Failed);
                error!("Signed request to {} failed: {}", self.request.url, e);
            }
        }
        result
    }

    async fn drive(&mut self, signer: &NonceSigner) -> Result<Value, ClientError> {
        self.transition(SubmissionState::NonceRequested);
        let server_nonce = signer.fetch_server_nonce(&self.request).await?;
        self.request.server_nonce = Some(server_nonce.clone());
        self.transition(SubmissionState::NonceReceived);

        let mut request = self.request.clone();
        let body = sign_in_place(&mut request)?;
        self.transition(SubmissionState::Signed);

        self.transition(SubmissionState::Sent);
        signer.client.dispatch(&request, body).await
    }
}
