use std::time::Duration;
use tracing::{error, info};

use c2id_client::{
    config::Config,
    logging,
    nonce_store::NonceStore,
    server::{self, AppState},
};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::setup_default_logging()?;
    info!("Starting verifier service");

    let config = Config::from_env();

    if !std::path::Path::new(&config.db_path).exists() {
        std::fs::File::create(&config.db_path)?;
    }

    let db_url = format!("sqlite:{}", config.db_path);
    let nonce_store = NonceStore::new(&db_url).await?;

    let cleanup_store = nonce_store.clone();
    let retain_secs = config.nonce_ttl_secs;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            if let Err(e) = cleanup_store.cleanup_expired(retain_secs).await {
                error!("Nonce cleanup failed: {}", e);
            }
        }
    });

    let app = server::router(AppState {
        nonce_store,
        nonce_ttl_secs: config.nonce_ttl_secs,
    });

    info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
