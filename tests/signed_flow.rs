use c2id_client::api::PROFILE_PATH;
use c2id_client::client::JsonClient;
use c2id_client::error::ClientError;
use c2id_client::nonce_store::NonceStore;
use c2id_client::request::JsonRequest;
use c2id_client::server::{self, AppState};
use c2id_client::signer::{NonceSigner, sign_request};
use reqwest::Method;
use serde_json::json;

/// Start the verifier on an ephemeral port and return its base URL
async fn spawn_verifier() -> String {
    let nonce_store = NonceStore::in_memory().await.unwrap();
    let app = server::router(AppState {
        nonce_store,
        nonce_ttl_secs: 60,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

fn profile_request() -> JsonRequest {
    JsonRequest::new(Method::PUT, PROFILE_PATH)
        .with_param("see", "/c2id/basic/index")
        .with_data(&json!({"givenName": "Jane", "familyName": "Doe"}))
        .unwrap()
}

#[tokio::test]
async fn test_signed_submission_accepted() {
    let base_url = spawn_verifier().await;
    let client = JsonClient::new(&base_url).unwrap().with_bearer_token("alice");
    let signer = NonceSigner::new(client);

    let response = signer.submit(profile_request()).await.unwrap();

    assert_eq!(response["updated"], true);
    assert_eq!(
        response["profile"],
        json!({"givenName": "Jane", "familyName": "Doe"})
    );
}

#[tokio::test]
async fn test_nonce_requires_bearer_token() {
    let base_url = spawn_verifier().await;
    let signer = NonceSigner::new(JsonClient::new(&base_url).unwrap());

    let result = signer.submit(profile_request()).await;

    match result {
        Err(ClientError::Server { status, body }) => {
            assert_eq!(status, 401);
            assert_eq!(body["error"], "unauthorized");
            assert_eq!(body["error_description"], "Missing bearer token");
        }
        other => panic!("Expected ClientError::Server, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unsigned_request_rejected() {
    let base_url = spawn_verifier().await;
    let client = JsonClient::new(&base_url).unwrap().with_bearer_token("alice");

    let result = client.send_json_request(&profile_request()).await;

    match result {
        Err(err @ ClientError::Server { status: 401, .. }) => {
            assert_eq!(err.error_body()["error_description"], "Cannot determine replay");
        }
        other => panic!("Expected HTTP 401, got {:?}", other),
    }
}

#[tokio::test]
async fn test_replayed_signature_rejected() {
    let base_url = spawn_verifier().await;
    let client = JsonClient::new(&base_url).unwrap().with_bearer_token("alice");
    let signer = NonceSigner::new(client.clone());

    let mut request = profile_request();
    let server_nonce = signer.fetch_server_nonce(&request).await.unwrap();
    let signed = sign_request(&request, &server_nonce).unwrap();
    signed.merge_into(&mut request.params);

    client.send_json_request(&request).await.unwrap();

    // Same client nonce and hash against a fresh server nonce
    signer.fetch_server_nonce(&request).await.unwrap();
    let replay = client.send_json_request(&request).await;

    match replay {
        Err(err @ ClientError::Server { status: 401, .. }) => {
            assert_eq!(err.error_body()["error_description"], "Replay detected");
        }
        other => panic!("Expected HTTP 401, got {:?}", other),
    }
}

#[tokio::test]
async fn test_send_signed_request_with_fetched_nonce() {
    let base_url = spawn_verifier().await;
    let client = JsonClient::new(&base_url).unwrap().with_bearer_token("bob");
    let signer = NonceSigner::new(client);

    let request = profile_request();
    let server_nonce = signer.fetch_server_nonce(&request).await.unwrap();

    let response = signer
        .send_signed_request(request.with_server_nonce(&server_nonce))
        .await
        .unwrap();

    assert_eq!(response["updated"], true);
}

#[tokio::test]
async fn test_nonce_for_other_subject_rejected() {
    let base_url = spawn_verifier().await;
    let alice = NonceSigner::new(JsonClient::new(&base_url).unwrap().with_bearer_token("alice"));
    let mallory = NonceSigner::new(JsonClient::new(&base_url).unwrap().with_bearer_token("mallory"));

    let request = profile_request();
    let server_nonce = alice.fetch_server_nonce(&request).await.unwrap();

    let result = mallory
        .send_signed_request(request.with_server_nonce(&server_nonce))
        .await;

    assert!(matches!(result, Err(ClientError::Server { status: 401, .. })));
}

#[tokio::test]
async fn test_absolute_url_submission_accepted() {
    let base_url = spawn_verifier().await;
    let client = JsonClient::new(&base_url).unwrap().with_bearer_token("alice");
    let signer = NonceSigner::new(client);

    let request = JsonRequest::new(Method::PUT, &format!("{}{}", base_url, PROFILE_PATH))
        .with_data(&json!({"a": 1}))
        .unwrap();
    let response = signer.submit(request).await.unwrap();

    assert_eq!(response["profile"], json!({"a": 1}));
}

#[tokio::test]
async fn test_interleaved_submissions_accepted() {
    let base_url = spawn_verifier().await;
    let client = JsonClient::new(&base_url).unwrap().with_bearer_token("alice");
    let signer = NonceSigner::new(client);

    let first = JsonRequest::new(Method::PUT, PROFILE_PATH)
        .with_data(&json!({"a": 1}))
        .unwrap();
    let second = JsonRequest::new(Method::PUT, PROFILE_PATH)
        .with_data(&json!({"b": 2}))
        .unwrap();

    let first_nonce = signer.fetch_server_nonce(&first).await.unwrap();
    let second_nonce = signer.fetch_server_nonce(&second).await.unwrap();

    let first = signer
        .send_signed_request(first.with_server_nonce(&first_nonce))
        .await
        .unwrap();
    let second = signer
        .send_signed_request(second.with_server_nonce(&second_nonce))
        .await
        .unwrap();

    assert_eq!(first["profile"], json!({"a": 1}));
    assert_eq!(second["profile"], json!({"b": 2}));
}
