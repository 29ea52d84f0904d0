use tracing_subscriber::EnvFilter;

/// Default filter: our own crate at debug in debug builds, everything else at info
fn default_directives() -> &'static str {
    if cfg!(debug_assertions) {
        "info,c2id_client=debug,tower_http=debug"
    } else {
        "info"
    }
}

/// Install the global subscriber; `RUST_LOG` overrides the default filter
pub fn setup_default_logging() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|e| e.to_string())?;

    Ok(())
}
