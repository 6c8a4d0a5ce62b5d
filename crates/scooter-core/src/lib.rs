//! # scooter-core
//!
//! The data and consistency layer of Scooter - THE LEDGER.
//!
//! This crate maintains a small social graph and its interaction ledger on
//! top of a key-value store that only offers single-item atomic writes.
//! Derived aggregates (reaction counters, mention notifications, follow
//! requests) are kept coherent through ordered sequences of independent,
//! individually atomic operations.
//!
//! ## Components (leaves first)
//!
//! - [`directory`]: user id to unique handle and profile
//! - [`graph`]: follow edges and the follow-request lifecycle
//! - [`content`]: posts, author index, global recency index, feeds
//! - [`ledger`]: comments and emoji reactions
//! - [`fanout`]: derived notifications and their retraction
//!
//! [`Social`] wires them over one store.
//!
//! ## Architectural Constraints
//!
//! - NO async, NO network dependencies (pure Rust)
//! - Every store call touches exactly one item
//! - Validation and authorization run before any write
//! - Secondary write failures are logged, never surfaced

// =============================================================================
// MODULES
// =============================================================================

pub mod clock;
pub mod config;
pub mod content;
mod context;
pub mod directory;
pub mod fanout;
pub mod formats;
pub mod graph;
pub mod invites;
pub mod ledger;
pub mod mentions;
pub mod primitives;
pub mod social;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    AuthorSnapshot, Caller, Comment, CommentId, FollowEdge, HandleReservation, IndexEntry, Invite,
    Notification, NotificationId, NotificationKind, Post, PostId, PostPointer, Profile,
    ReactionRow, ScooterError, ScooterResult, UserId,
};

// =============================================================================
// RE-EXPORTS: Storage and Runtime
// =============================================================================

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CoreConfig, Features, SnapshotPolicy};
pub use storage::{KvStore, MemoryStore, RedbStore, StorageBackend};

// =============================================================================
// RE-EXPORTS: Components
// =============================================================================

pub use content::{Content, PostPatch, PostView};
pub use directory::{Directory, ProfilePatch, ProfileView, UserSummary};
pub use fanout::{Fanout, NotificationView};
pub use graph::{FollowRequestOutcome, Graph, RelatedUser, Relationship};
pub use invites::Invites;
pub use ledger::{
    CommentPage, CommentView, CounterCorrection, Ledger, PurgeReport, ReactionSummary,
    ReactionTransition, ReconcileReport, ToggleOutcome,
};
pub use social::{ProfilePage, Social};
