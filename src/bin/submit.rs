use c2id_client::api::PROFILE_PATH;
use c2id_client::client::JsonClient;
use c2id_client::config::Config;
use c2id_client::error::ClientError;
use c2id_client::logging;
use c2id_client::request::JsonRequest;
use c2id_client::session::{Session, SessionStore};
use c2id_client::signer::NonceSigner;
use reqwest::Method;
use serde_json::Value;
use std::error::Error;
use std::io::{self, Write};
use tracing::{debug, error, info};

const DEFAULT_PAYLOAD: &str = "{}";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    logging::setup_default_logging()?;
    info!("Starting signed request client");

    let config = Config::from_env();
    let sessions = SessionStore::new(config.session_path.clone());

    let token = match sessions.load()?.bearer_token() {
        Some(token) => {
            debug!("Using bearer token from {}", sessions.path().display());
            token.to_string()
        }
        None => {
            let token = rpassword::prompt_password("Bearer token: ")?;
            let token = token.trim().to_string();
            if token.is_empty() {
                error!("No bearer token given");
                return Err("No bearer token given".into());
            }
            sessions.save(&Session::with_bearer_token(&token))?;
            token
        }
    };

    let method = prompt("HTTP method", "PUT")?;
    let method = Method::from_bytes(method.to_uppercase().as_bytes())
        .map_err(|_| format!("Invalid HTTP method: {}", method))?;
    let path = prompt("Path", PROFILE_PATH)?;
    let payload = prompt("JSON payload", DEFAULT_PAYLOAD)?;
    let payload: Value = serde_json::from_str(&payload)?;

    let client = JsonClient::new(&config.base_url)?.with_bearer_token(&token);
    let signer = NonceSigner::with_nonce_path(client, &config.nonce_path);
    let request = JsonRequest::new(method, &path).with_data(&payload)?;

    match signer.submit(request).await {
        Ok(response) => {
            info!("Signed request accepted");
            println!("✅ Submitted successfully");
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(e) => {
            error!("Signed request failed: {}", e);
            println!("❌ {}", describe(&e));
            std::process::exit(1);
        }
    }
}

/// One-line rendering of an error body: `error: error_description` when structured
fn describe(err: &ClientError) -> String {
    let body = err.error_body();
    match (body.get("error"), body.get("error_description")) {
        (Some(error), Some(description)) => format!(
            "{}: {}",
            plain(error),
            plain(description)
        ),
        _ => plain(&body),
    }
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Prompt for a value, falling back to `default` on an empty line
fn prompt(label: &str, default: &str) -> Result<String, Box<dyn Error>> {
    print!("{} [{}]: ", label, default);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    if input.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(input.to_string())
    }
}
