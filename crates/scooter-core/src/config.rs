//! # Core Configuration
//!
//! Values injected into [`crate::Social`] at construction. Nothing here is
//! read from the environment; the app layer loads and overrides it.

use crate::ScooterError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Configuration of the social core.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Lower-cased emails allowed to issue invite codes.
    pub admin_emails: BTreeSet<String>,
    /// Optional subsystems.
    pub features: Features,
    /// Base URL that media keys are appended to.
    pub media_base_url: Option<String>,
    /// Author snapshot policy.
    pub snapshot: SnapshotPolicy,
}

impl CoreConfig {
    /// Replace the admin list, normalizing each entry.
    #[must_use]
    pub fn with_admin_emails<I, S>(mut self, emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.admin_emails = emails
            .into_iter()
            .map(|e| e.as_ref().trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    /// Parse a comma-separated admin list.
    #[must_use]
    pub fn parse_admin_list(raw: &str) -> BTreeSet<String> {
        raw.split(',')
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect()
    }

    /// Whether this email belongs to an administrator.
    #[must_use]
    pub fn is_admin(&self, email: Option<&str>) -> bool {
        email.is_some_and(|e| self.admin_emails.contains(&e.trim().to_lowercase()))
    }

    /// Display URL for an opaque media key.
    #[must_use]
    pub fn media_url(&self, key: Option<&str>) -> Option<String> {
        let key = key.filter(|k| !k.is_empty())?;
        Some(match &self.media_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/')),
            None => key.to_string(),
        })
    }
}

/// Optional subsystem toggles. A disabled subsystem answers 501.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    pub comments: bool,
    pub reactions: bool,
    pub follows: bool,
    pub invites: bool,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            comments: true,
            reactions: true,
            follows: true,
            invites: true,
        }
    }
}

/// Optional subsystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Comments,
    Reactions,
    Follows,
    Invites,
}

impl Features {
    /// Fail with `Unavailable` when `feature` is disabled.
    pub fn require(&self, feature: Feature) -> Result<(), ScooterError> {
        let (enabled, name) = match feature {
            Feature::Comments => (self.comments, "Comments"),
            Feature::Reactions => (self.reactions, "Reactions"),
            Feature::Follows => (self.follows, "Follows"),
            Feature::Invites => (self.invites, "Invites"),
        };
        if enabled {
            Ok(())
        } else {
            Err(ScooterError::Unavailable(name))
        }
    }
}

/// How denormalized author fields on posts are kept fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotPolicy {
    /// Serve current profile values on read and rewrite stale snapshots.
    pub refresh_on_read: bool,
}

impl Default for SnapshotPolicy {
    fn default() -> Self {
        Self {
            refresh_on_read: true,
        }
    }
}
