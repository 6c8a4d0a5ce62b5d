//! # Scooter - Social Network Backend
//!
//! The binary: an axum HTTP API and a clap CLI over `scooter-core`.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               apps/scooter                   │
//! │                                              │
//! │   ┌─────────────┐        ┌─────────────┐     │
//! │   │    CLI      │        │  HTTP API   │     │
//! │   │   (clap)    │        │   (axum)    │     │
//! │   └──────┬──────┘        └──────┬──────┘     │
//! │          └───────────┬──────────┘            │
//! │                      ▼                       │
//! │              ┌──────────────┐                │
//! │              │ scooter-core │                │
//! │              └──────────────┘                │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! scooter server --host 0.0.0.0 --port 8080
//! scooter --config scooter.toml status
//! scooter invite --uses 10
//! scooter reconcile
//! ```

use clap::Parser;
use scooter::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // SCOOTER_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("SCOOTER_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let cli = cli::Cli::parse();

    let default_filter = if cli.verbose {
        "scooter=debug,scooter_core=debug,tower_http=debug"
    } else {
        "scooter=info,scooter_core=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    if !cli.quiet {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  ___  ___ ___   ___ _____ ___ ___
 / __|/ __/ _ \ / _ \_   _| __| _ \
 \__ \ (_| (_) | (_) || | | _||   /
 |___/\___\___/ \___/ |_| |___|_|_\

  Scooter v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
