//! # CLI Command Implementations

use crate::api::{self, AppState};
use crate::config::{AppConfig, BackendKind};
use scooter_core::clock::to_rfc3339;
use scooter_core::{ScooterError, Social, UserId};

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: AppConfig, host: &str, port: u16) -> Result<(), ScooterError> {
    let social = open_social(&config)?;

    println!("Scooter Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", host);
    println!("  Port:     {}", port);
    println!("  Backend:  {:?}", config.backend);
    println!("  Database: {:?}", config.database);
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    if config.backend == BackendKind::Memory {
        tracing::warn!("memory backend: all data is lost on exit");
    }

    let addr = format!("{}:{}", host, port);
    api::run_server(&addr, AppState::new(social, config)).await
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new database.
pub fn cmd_init(config: &AppConfig, force: bool) -> Result<(), ScooterError> {
    if config.backend == BackendKind::Memory {
        println!("Memory backend needs no initialization");
        return Ok(());
    }

    let path = &config.database;
    if path.exists() {
        if !force {
            return Err(ScooterError::Conflict(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(path).map_err(|e| {
            ScooterError::StorageError(format!("Cannot remove '{}': {e}", path.display()))
        })?;
    }

    open_social(config)?;
    println!("Initialized new redb database at {:?}", path);
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show item counts per table.
pub fn cmd_status(config: &AppConfig, json_mode: bool) -> Result<(), ScooterError> {
    let social = open_social(config)?;
    let stats = social.stats()?;

    if json_mode {
        let output = serde_json::json!({
            "database": config.database.to_string_lossy(),
            "backend": config.backend,
            "tables": stats,
        });
        println!("{}", to_pretty(&output)?);
        return Ok(());
    }

    println!("Scooter Status");
    println!("==============");
    println!("Database: {:?}", config.database);
    println!("Backend:  {:?}", config.backend);
    println!();
    for (table, count) in &stats {
        println!("{:<16} {}", table, count);
    }
    Ok(())
}

// =============================================================================
// INVITE COMMAND
// =============================================================================

/// Issue an invite code. The operator is trusted, so no admin check applies.
pub fn cmd_invite(
    config: &AppConfig,
    json_mode: bool,
    issuer: &str,
    uses: Option<u32>,
) -> Result<(), ScooterError> {
    let social = open_social(config)?;
    let invite = social.invites().issue(&UserId::new(issuer), uses)?;

    if json_mode {
        println!("{}", to_pretty(&invite)?);
    } else {
        println!("Invite code: {}", invite.code);
        println!("Uses:        {}", invite.uses_remaining);
        println!("Created:     {}", to_rfc3339(invite.created_at));
    }
    Ok(())
}

// =============================================================================
// RECONCILE COMMAND
// =============================================================================

/// Rewrite reaction counters that drifted from the reaction rows.
pub fn cmd_reconcile(config: &AppConfig, json_mode: bool) -> Result<(), ScooterError> {
    let social = open_social(config)?;
    let reports = social.reconcile_all()?;

    if json_mode {
        println!("{}", to_pretty(&reports)?);
        return Ok(());
    }

    if reports.is_empty() {
        println!("All reaction counters are consistent");
        return Ok(());
    }
    for report in &reports {
        println!("Post {}:", report.post_id);
        for fix in &report.corrections {
            println!("  {}  {} -> {}", fix.emoji, fix.stored, fix.actual);
        }
    }
    println!();
    println!("Corrected {} post(s)", reports.len());
    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the configured backend and wire the core over it.
pub fn open_social(config: &AppConfig) -> Result<Social, ScooterError> {
    let backend = config.open_backend()?;
    Ok(Social::with_backend(backend, config.core.clone()))
}

fn to_pretty<T: serde::Serialize>(value: &T) -> Result<String, ScooterError> {
    serde_json::to_string_pretty(value).map_err(|e| ScooterError::SerializationError(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn redb_config(dir: &TempDir) -> AppConfig {
        AppConfig {
            database: dir.path().join("test.redb"),
            ..AppConfig::default()
        }
    }

    #[test]
    fn init_refuses_existing_database_without_force() {
        let dir = TempDir::new().unwrap();
        let config = redb_config(&dir);
        cmd_init(&config, false).unwrap();
        assert!(config.database.exists());

        let err = cmd_init(&config, false).unwrap_err();
        assert!(matches!(err, ScooterError::Conflict(_)));
        cmd_init(&config, true).unwrap();
    }

    #[test]
    fn invites_issued_by_cli_persist() {
        let dir = TempDir::new().unwrap();
        let config = redb_config(&dir);
        cmd_invite(&config, true, "ops", Some(3)).unwrap();

        let social = open_social(&config).unwrap();
        assert_eq!(social.stats().unwrap().get("invites"), Some(&1));
    }

    #[test]
    fn status_and_reconcile_run_on_empty_store() {
        let config = AppConfig {
            backend: BackendKind::Memory,
            ..AppConfig::default()
        };
        cmd_status(&config, true).unwrap();
        cmd_reconcile(&config, false).unwrap();
    }
}
