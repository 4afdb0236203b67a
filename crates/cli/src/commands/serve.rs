//! `tracepilot serve` — start the HTTP gateway.

use tracepilot_config::AppConfig;
use tracing::info;

pub async fn run(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load()?;
    if let Some(port) = port {
        config.gateway.port = port;
    }

    info!(
        provider = %config.default_provider,
        model = %config.default_model,
        port = config.gateway.port,
        "Starting gateway"
    );

    tracepilot_gateway::start(config).await
}
