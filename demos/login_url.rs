//! Resolves a provider and prints the URL that starts a login.
//!
//! Usage: cargo run --example login_url -- demos/client_config.yaml

use oidc_rp::prelude::*;
use std::fs;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/client_config.yaml".to_string());
    let config_str = fs::read_to_string(&config_path)
        .map_err(|e| format!("Failed to read config file {config_path}: {e}"))?;
    let config: ClientConfig = serde_yaml::from_str(&config_str)
        .map_err(|e| format!("Failed to parse YAML config from {config_path}: {e}"))?;

    let sessions = Arc::new(InMemorySessionStore::new());
    let rp = RelyingParty::discover(config, sessions).await?;

    let session_id = uuid::Uuid::new_v4().to_string();
    let url = rp.begin_login(&session_id).await?;

    println!("Issuer:      {}", rp.metadata().issuer);
    println!("Session id:  {session_id}");
    println!("Open in a browser to log in:\n{url}");
    Ok(())
}
