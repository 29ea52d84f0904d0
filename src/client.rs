use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::{debug, error};
use url::Url;

use crate::api::AUTHENTICATION_HEADER;
use crate::error::ClientError;
use crate::request::{JsonRequest, with_query_params};

const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";

/// Sends JSON requests to the identity service and decodes JSON responses
#[derive(Debug, Clone)]
pub struct JsonClient {
    http: reqwest::Client,
    base_url: Url,
    bearer_token: Option<String>,
}

impl JsonClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: Url::parse(base_url)?,
            bearer_token: None,
        })
    }

    /// Send `Authentication: Bearer <token>` with every request
    pub fn with_bearer_token(mut self, token: &str) -> Self {
        self.bearer_token = Some(token.to_string()).filter(|t| !t.is_empty());
        self
    }

    /// Resolve the request target and append its query params
    pub fn resolve(&self, request: &JsonRequest) -> Result<Url, ClientError> {
        let url = self.base_url.join(&request.url)?;
        Ok(with_query_params(url, &request.params))
    }

    /// Send a request and return the parsed JSON body of a 200 response
    pub async fn send_json_request(&self, request: &JsonRequest) -> Result<Value, ClientError> {
        let body = request.serialized_data()?;
        self.dispatch(request, body).await
    }

    /// Send a request whose payload has already been serialized.
    ///
    /// The signer uses this so the bytes it hashed are the bytes on the wire.
    pub(crate) async fn dispatch(
        &self,
        request: &JsonRequest,
        body: Option<String>,
    ) -> Result<Value, ClientError> {
        let url = self.resolve(request)?;
        debug!("Sending {} {}", request.method, url);

        let mut builder = self
            .http
            .request(request.method.clone(), url.clone())
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE);
        if let Some(token) = &self.bearer_token {
            builder = builder.header(AUTHENTICATION_HEADER, format!("Bearer {}", token));
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            error!("Request to {} failed: {}", url, e);
            ClientError::Network(e.to_string())
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::Network(format!("Failed to read response body: {}", e)))?;
        debug!("Received HTTP {} from {}: {}", status, url, text);

        if status != StatusCode::OK {
            error!("Request to {} failed with HTTP {}", url, status);
            return Err(ClientError::from_response(status, &text));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| {
            ClientError::Deserialization(format!(
                "Failed to parse response: {}, Response: {}",
                e, text
            ))
        })
    }
}
