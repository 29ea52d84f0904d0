use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use url::Url;

use crate::error::ClientError;

/// A JSON request as handed to the client: method, target, query params and payload
#[derive(Debug, Clone)]
pub struct JsonRequest {
    pub method: Method,
    /// Path relative to the client base URL, or an absolute URL
    pub url: String,
    pub params: BTreeMap<String, String>,
    pub data: Option<Value>,
    /// Server nonce, required before the request can be signed
    pub server_nonce: Option<String>,
}

impl JsonRequest {
    pub fn new(method: Method, url: &str) -> Self {
        Self {
            method,
            url: url.to_string(),
            params: BTreeMap::new(),
            data: None,
            server_nonce: None,
        }
    }

    /// Attach a payload. Fails if the value cannot be represented as JSON.
    pub fn with_data<T: Serialize>(mut self, data: &T) -> Result<Self, ClientError> {
        self.data = Some(serde_json::to_value(data)?);
        Ok(self)
    }

    pub fn with_param(mut self, name: &str, value: &str) -> Self {
        self.params.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_server_nonce(mut self, nonce: &str) -> Self {
        self.server_nonce = Some(nonce.to_string());
        self
    }

    /// The payload exactly as it goes on the wire, if there is one
    pub fn serialized_data(&self) -> Result<Option<String>, ClientError> {
        self.data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(ClientError::from)
    }
}

/// Append `params` URL-encoded to whatever query `url` already carries
pub fn with_query_params(mut url: Url, params: &BTreeMap<String, String>) -> Url {
    if !params.is_empty() {
        url.query_pairs_mut().extend_pairs(params.iter());
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_query_params_appended() {
        let url = Url::parse("http://localhost/c2id/api/profile").unwrap();
        let mut params = BTreeMap::new();
        params.insert("foo".to_string(), "bar baz".to_string());
        params.insert("hash".to_string(), "ab&cd".to_string());

        let url = with_query_params(url, &params);

        assert_eq!(
            url.as_str(),
            "http://localhost/c2id/api/profile?foo=bar+baz&hash=ab%26cd"
        );
    }

    #[test]
    fn test_existing_query_is_kept() {
        let url = Url::parse("http://localhost/c2id/api/profile?see=%2Fhome").unwrap();
        let mut params = BTreeMap::new();
        params.insert("nonce".to_string(), "n1".to_string());

        let url = with_query_params(url, &params);

        assert_eq!(url.query(), Some("see=%2Fhome&nonce=n1"));
    }

    #[test]
    fn test_no_params_leaves_url_untouched() {
        let url = Url::parse("http://localhost/c2id/api/profile").unwrap();

        let url = with_query_params(url, &BTreeMap::new());

        assert_eq!(url.as_str(), "http://localhost/c2id/api/profile");
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_unencodable_data() {
        // JSON object keys must be strings
        let mut data = HashMap::new();
        data.insert((1, 2), 3);

        let result = JsonRequest::new(Method::POST, "/x").with_data(&data);

        assert!(matches!(result, Err(ClientError::Serialization(_))));
    }

    #[test]
    fn test_serialized_data() {
        let request = JsonRequest::new(Method::POST, "/x")
            .with_data(&json!({"a": 1}))
            .unwrap();
        assert_eq!(request.serialized_data().unwrap().as_deref(), Some(r#"{"a":1}"#));

        let empty = JsonRequest::new(Method::GET, "/x");
        assert_eq!(empty.serialized_data().unwrap(), None);
    }
}
