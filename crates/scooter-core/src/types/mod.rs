//! # Core Type Definitions
//!
//! This module contains the identifiers, stored records and error type shared
//! by every component of the Scooter core:
//! - Identifiers (`UserId`, `PostId`, `CommentId`, `NotificationId`)
//! - The verified caller identity (`Caller`)
//! - Stored records (see [`records`])
//! - Error taxonomy (`ScooterError`)
//!
//! ## Key Safety
//!
//! Identifiers are embedded in store keys. Generated ids are UUID v4 strings;
//! user ids come from the identity provider and are treated as opaque text.

pub mod records;

pub use records::{
    AuthorSnapshot, Comment, FollowEdge, HandleReservation, IndexEntry, Invite, Notification,
    NotificationKind, Post, PostPointer, Profile, ReactionRow,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Wrap an existing identifier.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

string_id!(
    /// Stable user identifier issued by the identity provider. Immutable.
    UserId
);

string_id!(
    /// Identifier of a post.
    PostId
);

string_id!(
    /// Identifier of a comment. Also used as the `cause` of the
    /// notifications a comment produces.
    CommentId
);

string_id!(
    /// Identifier of a notification row.
    NotificationId
);

/// Generate a fresh random identifier (UUID v4, hyphenated).
#[must_use]
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl PostId {
    /// Generate a new random post id.
    #[must_use]
    pub fn generate() -> Self {
        Self(generate_id())
    }
}

impl CommentId {
    /// Generate a new random comment id.
    #[must_use]
    pub fn generate() -> Self {
        Self(generate_id())
    }
}

impl NotificationId {
    /// Generate a new random notification id.
    #[must_use]
    pub fn generate() -> Self {
        Self(generate_id())
    }
}

// =============================================================================
// CALLER
// =============================================================================

/// An already-verified caller identity delivered by the transport.
///
/// The core never authenticates; it trusts whatever the transport resolved
/// from the bearer credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Stable user id.
    pub user_id: UserId,
    /// Lower-cased email, if the identity provider supplied one.
    pub email: Option<String>,
}

impl Caller {
    /// Create a caller, normalizing the email to lower case.
    #[must_use]
    pub fn new(user_id: impl Into<String>, email: Option<&str>) -> Self {
        let email = email
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty());
        Self {
            user_id: UserId::new(user_id),
            email,
        }
    }

    /// Name shown for this caller when no handle has been claimed yet.
    #[must_use]
    pub fn fallback_name(&self) -> String {
        self.email
            .clone()
            .unwrap_or_else(|| self.user_id.to_string())
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Scooter core.
///
/// Every variant maps onto one HTTP status via [`ScooterError::status_code`].
/// Validation and authorization variants are always produced before any
/// write is issued.
#[derive(Debug, Error)]
pub enum ScooterError {
    /// Missing or invalid caller identity.
    #[error("Unauthorized")]
    Unauthorized,

    /// Malformed handle, empty or oversized text, missing field.
    #[error("{0}")]
    Validation(String),

    /// Handle already taken, duplicate claim.
    #[error("{0}")]
    Conflict(String),

    /// Unknown handle, post, comment or user.
    #[error("{0}")]
    NotFound(String),

    /// Mutating content the caller does not own.
    #[error("{0}")]
    Forbidden(String),

    /// An optional subsystem is not provisioned.
    #[error("{0} not enabled")]
    Unavailable(&'static str),

    /// A compare-and-swap loop ran out of retries on a primary write.
    #[error("Contention on {0}: retries exhausted")]
    Contention(String),

    /// A record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The underlying store failed.
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl ScooterError {
    /// HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::Validation(_) => 400,
            Self::Conflict(_) => 409,
            Self::NotFound(_) => 404,
            Self::Forbidden(_) => 403,
            Self::Unavailable(_) => 501,
            Self::Contention(_) | Self::SerializationError(_) | Self::StorageError(_) => 500,
        }
    }

    /// Whether the error was caused by the caller's input rather than the system.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

/// Result alias for core operations.
pub type ScooterResult<T> = Result<T, ScooterError>;

// =============================================================================
// TESTS
// =============================================================================
