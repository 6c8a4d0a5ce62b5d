//! # Application Configuration
//!
//! [`AppConfig`] is read from an optional TOML file and then overridden by
//! environment variables:
//!
//! - `SCOOTER_DATABASE`: path of the redb database
//! - `SCOOTER_ADMIN_EMAILS`: comma-separated admin emails (invite issuance)
//! - `SCOOTER_GATEWAY_KEY`: shared secret the identity gateway presents
//! - `SCOOTER_CORS_ORIGINS`: comma-separated origins, or "*" for all
//! - `SCOOTER_RATE_LIMIT`: requests per second (0 disables)
//! - `SCOOTER_MEDIA_BASE_URL`: base URL media keys are resolved against

use scooter_core::{CoreConfig, ScooterError, StorageBackend};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default requests per second.
pub const DEFAULT_RATE_LIMIT: u32 = 100;

/// Default request body limit (64 KiB).
pub const DEFAULT_BODY_LIMIT: usize = 64 * 1024;

/// Storage backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Volatile, lost on exit.
    Memory,
    /// redb database file.
    #[default]
    Redb,
}

impl BackendKind {
    /// Parse a CLI/config value.
    pub fn parse(raw: &str) -> Result<Self, ScooterError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "redb" => Ok(Self::Redb),
            other => Err(ScooterError::Validation(format!(
                "Unknown backend '{other}' (expected memory or redb)"
            ))),
        }
    }
}

/// Configuration of the Scooter binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: PathBuf,
    pub backend: BackendKind,
    /// When set, every request except `/health` must carry it as a bearer token.
    pub gateway_key: Option<String>,
    /// Allowed CORS origins. Empty means localhost only.
    pub cors_origins: Vec<String>,
    pub rate_limit: u32,
    pub body_limit: usize,
    pub core: CoreConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("scooter.redb"),
            backend: BackendKind::default(),
            gateway_key: None,
            cors_origins: Vec::new(),
            rate_limit: DEFAULT_RATE_LIMIT,
            body_limit: DEFAULT_BODY_LIMIT,
            core: CoreConfig::default(),
        }
    }
}

impl AppConfig {
    /// Parse a TOML document.
    pub fn from_toml(raw: &str) -> Result<Self, ScooterError> {
        toml::from_str(raw).map_err(|e| ScooterError::Validation(format!("Invalid config: {e}")))
    }

    /// Load the file at `path` if given, then apply the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ScooterError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    ScooterError::StorageError(format!(
                        "Cannot read config '{}': {e}",
                        path.display()
                    ))
                })?;
                Self::from_toml(&raw)?
            }
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Apply `SCOOTER_*` overrides from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("SCOOTER_DATABASE").filter(|p| !p.trim().is_empty()) {
            self.database = PathBuf::from(path.trim());
        }
        if let Some(raw) = lookup("SCOOTER_ADMIN_EMAILS") {
            self.core.admin_emails = CoreConfig::parse_admin_list(&raw);
        }
        if let Some(key) = lookup("SCOOTER_GATEWAY_KEY") {
            self.gateway_key = Some(key).filter(|k| !k.is_empty());
        }
        if let Some(raw) = lookup("SCOOTER_CORS_ORIGINS") {
            self.cors_origins = raw
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(raw) = lookup("SCOOTER_RATE_LIMIT") {
            match raw.trim().parse() {
                Ok(rps) => self.rate_limit = rps,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid SCOOTER_RATE_LIMIT"),
            }
        }
        if let Some(url) = lookup("SCOOTER_MEDIA_BASE_URL") {
            self.core.media_base_url = Some(url.trim().to_string()).filter(|u| !u.is_empty());
        }
    }

    /// Open the configured storage backend.
    pub fn open_backend(&self) -> Result<StorageBackend, ScooterError> {
        match self.backend {
            BackendKind::Memory => Ok(StorageBackend::default()),
            BackendKind::Redb => StorageBackend::redb(&self.database),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn toml_sections_fill_core_config() {
        let config = AppConfig::from_toml(
            r#"
            database = "/tmp/s.redb"
            rate_limit = 5

            [core]
            admin_emails = ["root@example.com"]
            media_base_url = "https://cdn.example.com"

            [core.features]
            invites = false
            "#,
        )
        .expect("parse");
        assert_eq!(config.database, PathBuf::from("/tmp/s.redb"));
        assert_eq!(config.rate_limit, 5);
        assert!(config.core.is_admin(Some("ROOT@example.com")));
        assert!(!config.core.features.invites);
        assert!(config.core.features.comments);
        assert_eq!(config.body_limit, DEFAULT_BODY_LIMIT);
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: BTreeMap<&str, &str> = [
            ("SCOOTER_ADMIN_EMAILS", "a@x.com, B@x.com"),
            ("SCOOTER_GATEWAY_KEY", "secret"),
            ("SCOOTER_CORS_ORIGINS", "https://app.example.com, "),
            ("SCOOTER_RATE_LIMIT", "not-a-number"),
            ("SCOOTER_MEDIA_BASE_URL", ""),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.core.media_base_url = Some("https://old".to_string());
        config.apply_overrides(|name| env.get(name).map(|v| (*v).to_string()));

        assert!(config.core.is_admin(Some("b@x.com")));
        assert_eq!(config.gateway_key.as_deref(), Some("secret"));
        assert_eq!(config.cors_origins, vec!["https://app.example.com"]);
        assert_eq!(config.rate_limit, DEFAULT_RATE_LIMIT);
        assert_eq!(config.core.media_base_url, None);
    }

    #[test]
    fn backend_names() {
        assert_eq!(BackendKind::parse("REDB").expect("redb"), BackendKind::Redb);
        assert_eq!(BackendKind::parse("memory").expect("memory"), BackendKind::Memory);
        assert!(BackendKind::parse("file").is_err());
    }

    #[test]
    fn invalid_toml_is_a_validation_error() {
        let err = AppConfig::from_toml("rate_limit = \"fast\"").expect_err("bad type");
        assert_eq!(err.status_code(), 400);
    }
}
