//! # Scooter CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Initialize a new database
//! - `status` - Show item counts per table
//! - `invite` - Issue an invite code
//! - `reconcile` - Recompute reaction counters from reaction rows

mod commands;

use crate::config::{AppConfig, BackendKind};
use clap::{Parser, Subcommand};
use scooter_core::ScooterError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Scooter - social network backend
///
/// Profiles, posts, comments, reactions, follows and notifications over a
/// single key-value store.
#[derive(Parser, Debug)]
#[command(name = "scooter")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML configuration file
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the database (overrides the configuration file)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend: "redb" (persistent) or "memory" (volatile)
    #[arg(short = 'B', long, global = true)]
    pub backend: Option<String>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Show item counts per table
    Status,

    /// Issue an invite code
    Invite {
        /// How many times the code can be redeemed (1-100)
        #[arg(short, long)]
        uses: Option<u32>,

        /// User id recorded as the issuer
        #[arg(long, default_value = "cli")]
        issuer: String,
    },

    /// Recompute reaction counters from the per-user reaction rows
    Reconcile,
}

impl Cli {
    /// Resolve the effective configuration: file, environment, then flags.
    pub fn app_config(&self) -> Result<AppConfig, ScooterError> {
        let mut config = AppConfig::load(self.config.as_deref())?;
        if let Some(database) = &self.database {
            config.database.clone_from(database);
        }
        if let Some(backend) = &self.backend {
            config.backend = BackendKind::parse(backend)?;
        }
        Ok(config)
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), ScooterError> {
    let config = cli.app_config()?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => cmd_server(config, &host, port).await,
        Some(Commands::Init { force }) => cmd_init(&config, force),
        Some(Commands::Invite { uses, issuer }) => cmd_invite(&config, json_mode, &issuer, uses),
        Some(Commands::Reconcile) => cmd_reconcile(&config, json_mode),
        // No subcommand - show status by default
        Some(Commands::Status) | None => cmd_status(&config, json_mode),
    }
}
