use std::path::PathBuf;

use portico::config::ServerConfig;
use portico::server::Server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./settings.yaml"));

    let cfg = ServerConfig::load(&settings_path)?;

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_max_level(tracing::Level::from(cfg.log_level))
        .init();

    if !settings_path.exists() {
        tracing::info!(path = %settings_path.display(), "No settings file found, using default settings");
    }

    Server::bind(cfg)
        .await?
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutdown signal received");
        })
        .await
}
