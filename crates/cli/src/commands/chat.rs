//! `tracepilot chat` — chat against a local in-process pipeline.
//!
//! Builds the same state the gateway serves, creates one session, and
//! drives it from stdin. Useful for poking at the workflow without an HTTP
//! client; telemetry can be uploaded through a running `serve` instance or
//! ingested knowledge answers general questions directly.

use std::io::{BufRead, Write};

use tracepilot_config::AppConfig;
use tracepilot_core::session::SessionStore as _;

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    let state = tracepilot_gateway::build_state(config).await?;
    let session = state.store.create("cli").await?;

    if let Some(message) = message {
        let outcome = state.orchestrator.chat(&session.id, &message).await?;
        println!("{}", outcome.response);
        println!(
            "\n[intent: {} | events: {} | docs: {} | tokens: {}]",
            outcome.metadata.intent,
            outcome.metadata.events_retrieved,
            outcome.metadata.documents_retrieved,
            outcome.metadata.tokens_used
        );
        return Ok(());
    }

    println!("TracePilot interactive chat — session {}", session.id);
    println!("Type a question, or 'exit' to quit.\n");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        match state.orchestrator.chat(&session.id, line).await {
            Ok(outcome) => {
                println!("\n{}\n", outcome.response);
            }
            Err(e) => {
                eprintln!("error: {e}");
            }
        }
    }

    Ok(())
}
