//! `tracepilot status` — show configuration and backend health.

use tracepilot_config::AppConfig;
use tracepilot_core::model::LanguageModel as _;
use tracepilot_providers::build_default_model;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;

    println!("TracePilot {}", env!("CARGO_PKG_VERSION"));
    println!("  config:    {}", AppConfig::config_path().display());
    println!("  provider:  {}", config.default_provider);
    println!("  model:     {}", config.default_model);
    println!(
        "  embedding: {}",
        config.embedding_model.as_deref().unwrap_or("(keyword search only)")
    );
    println!(
        "  budget:    {} tokens (system {} / response {})",
        config.budget.total_tokens,
        config.budget.system_prompt_reserve,
        config.budget.response_reserve
    );
    println!(
        "  gateway:   {}:{}",
        config.gateway.host, config.gateway.port
    );
    if config.knowledge.dirs.is_empty() {
        println!("  knowledge: (no directories configured)");
    } else {
        for dir in &config.knowledge.dirs {
            println!("  knowledge: {}", dir.display());
        }
    }

    match build_default_model(&config) {
        Ok(model) => match model.health_check().await {
            Ok(true) => println!("  backend:   reachable"),
            Ok(false) => println!("  backend:   unreachable"),
            Err(e) => println!("  backend:   error ({e})"),
        },
        Err(e) => println!("  backend:   not configured ({e})"),
    }

    Ok(())
}
