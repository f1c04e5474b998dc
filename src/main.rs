//! Firewall rule automation - Main Entry Point
//!
//! Runs one stage of the control plane per invocation:
//! - `collect <event.json>` compiles a tenant event into queue messages
//! - `execute <event.json>` reconciles queued messages onto the firewall
//!
//! The event payload is the raw EventBridge / SQS JSON handed over by the
//! hosting runtime; `-` reads it from stdin. Everything here is glue:
//! configuration loading, logging initialization and the composition root.

mod bootstrap;
mod composition_root;
mod config;
mod handlers;

use std::io::Read;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::bootstrap::bootstrap;
use crate::composition_root::compose;
use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load configuration
    let config = Config::from_env();
    config.validate()?;

    // 2. Initialize logging
    initialize_logging(&config);

    // 3. Decode the invocation
    let mut args = std::env::args().skip(1);
    let mode = args.next().context("usage: anfw-automate <collect|execute> <event.json|->")?;
    let event = read_event(args.next().as_deref().unwrap_or("-"))?;

    // 4. Bootstrap AWS environment and wire the composition root
    let env = bootstrap(&config).await?;
    let root = compose(env, &config);

    // 5. Run the requested stage
    match mode.as_str() {
        "collect" => handlers::collect::handle(&root, &config.app, event).await?,
        "execute" => handlers::execute::handle(&root, &config.app, event).await?,
        other => anyhow::bail!("unknown stage: {other} (expected collect or execute)"),
    }

    tracing::info!(mode = %mode, "invocation done");
    Ok(())
}

fn read_event(source: &str) -> anyhow::Result<serde_json::Value> {
    let raw = if source == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("reading event from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(source).with_context(|| format!("reading event from {source}"))?
    };
    serde_json::from_str(&raw).context("event payload is not valid JSON")
}

/// Initialize logging based on configuration.
fn initialize_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "anfw_automate={level},rule_collect={level},rule_execute={level},shared={level}",
            level = config.logging.level
        ))
    });

    match config.logging.format.as_str() {
        "compact" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().compact())
                .init();
        }
        "pretty" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
        _ => {
            // Default to "json"
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
    }
}
