//! # Social
//!
//! The facade wiring the five components over one store, one clock and one
//! configuration. Operations that span several components (post deletion
//! with its cascade, profile pages, search) live here; everything else is
//! reached through the component accessors.

use crate::content::{Content, PostView};
use crate::context::Context;
use crate::directory::{Directory, UserSummary};
use crate::fanout::Fanout;
use crate::graph::{Graph, RelatedUser, Relationship};
use crate::invites::Invites;
use crate::ledger::{Ledger, PurgeReport, ReconcileReport};
use crate::primitives::{PROFILE_POSTS_LIMIT, SEARCH_LIMIT};
use crate::storage::{KvStore, Table};
use crate::{Caller, Clock, CoreConfig, Invite, Post, PostId, ScooterError, StorageBackend, SystemClock, UserId, formats};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// A user's public page as seen by a viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfilePage {
    #[serde(flatten)]
    pub user: UserSummary,
    pub followers: usize,
    pub following: usize,
    #[serde(flatten)]
    pub relationship: Relationship,
    pub is_self: bool,
    pub posts: Vec<PostView>,
}

/// The social core.
#[derive(Debug, Clone)]
pub struct Social {
    ctx: Context,
    directory: Directory,
    fanout: Fanout,
    graph: Graph,
    content: Content,
    ledger: Ledger,
    invites: Invites,
}

impl Social {
    /// Wire the components over an existing store.
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, config: CoreConfig) -> Self {
        let ctx = Context {
            store,
            clock,
            config: Arc::new(config),
        };
        let directory = Directory::new(ctx.clone());
        let fanout = Fanout::new(ctx.clone(), directory.clone());
        let graph = Graph::new(ctx.clone(), directory.clone(), fanout.clone());
        let content = Content::new(ctx.clone(), directory.clone(), fanout.clone(), graph.clone());
        let ledger = Ledger::new(ctx.clone(), directory.clone(), fanout.clone(), content.clone());
        let invites = Invites::new(ctx.clone());
        Self {
            ctx,
            directory,
            fanout,
            graph,
            content,
            ledger,
            invites,
        }
    }

    /// Wire the components over a backend with the system clock.
    pub fn with_backend(backend: StorageBackend, config: CoreConfig) -> Self {
        Self::new(Arc::new(backend), Arc::new(SystemClock), config)
    }

    /// Volatile instance.
    #[must_use]
    pub fn in_memory(config: CoreConfig) -> Self {
        Self::with_backend(StorageBackend::default(), config)
    }

    pub fn config(&self) -> &CoreConfig {
        &self.ctx.config
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn fanout(&self) -> &Fanout {
        &self.fanout
    }

    pub fn invites(&self) -> &Invites {
        &self.invites
    }

    // =========================================================================
    // CROSS-COMPONENT OPERATIONS
    // =========================================================================

    /// Delete a post and cascade through its interactions. Author only.
    ///
    /// Only the post row deletion can fail the call. The cascade is best
    /// effort and reported.
    pub fn delete_post(&self, author: &UserId, id: &PostId) -> Result<PurgeReport, ScooterError> {
        let post = self.content.delete_post(author, id)?;
        let report = self.ledger.purge_post(&post);
        if report.failures > 0 {
            warn!(post_id = %id, failures = report.failures, "post cascade incomplete");
        }
        Ok(report)
    }

    /// Users matching `query`, annotated with the viewer's follow state.
    pub fn search_users(&self, viewer: &UserId, query: &str) -> Result<Vec<RelatedUser>, ScooterError> {
        let ids: Vec<UserId> = self
            .directory
            .search(query, SEARCH_LIMIT)?
            .into_iter()
            .map(|user| user.user_id)
            .collect();
        self.graph.annotate(viewer, &ids)
    }

    /// Public page of the user owning `handle`.
    pub fn profile_by_handle(&self, viewer: &UserId, handle: &str) -> Result<ProfilePage, ScooterError> {
        let user = self.directory.resolve_handle(handle)?;
        Ok(ProfilePage {
            followers: self.graph.count_followers(&user)?,
            following: self.graph.count_following(&user)?,
            relationship: self.graph.relationship(viewer, &user)?,
            is_self: *viewer == user,
            posts: self.content.list_posts_by_author(&user, PROFILE_POSTS_LIMIT)?,
            user: self.directory.summary(&user)?,
        })
    }

    /// Followers of the user owning `handle`.
    pub fn followers_of(&self, viewer: &UserId, handle: &str) -> Result<Vec<RelatedUser>, ScooterError> {
        let user = self.directory.resolve_handle(handle)?;
        self.graph.list_followers(viewer, &user)
    }

    /// Users followed by the owner of `handle`.
    pub fn following_of(&self, viewer: &UserId, handle: &str) -> Result<Vec<RelatedUser>, ScooterError> {
        let user = self.directory.resolve_handle(handle)?;
        self.graph.list_following(viewer, &user)
    }

    pub fn issue_invite(&self, caller: &Caller, uses: Option<u32>) -> Result<Invite, ScooterError> {
        self.invites.issue_for(caller, uses)
    }

    pub fn redeem_invite(&self, code: &str) -> Result<Invite, ScooterError> {
        self.invites.redeem(code)
    }

    // =========================================================================
    // MAINTENANCE
    // =========================================================================

    /// Item count of every table.
    pub fn stats(&self) -> Result<BTreeMap<&'static str, usize>, ScooterError> {
        Table::ALL
            .iter()
            .map(|table| Ok((table.name(), self.ctx.store.count(*table)?)))
            .collect()
    }

    /// Reconcile the reaction counters of every post. Returns the posts that drifted.
    pub fn reconcile_all(&self) -> Result<Vec<ReconcileReport>, ScooterError> {
        let mut drifted = Vec::new();
        let mut scanned = 0_usize;
        for item in self.ctx.store.scan(Table::Posts, None)? {
            let post: Post = formats::decode(&item.value)?;
            scanned += 1;
            let report = self.ledger.reconcile_reaction_counts(&post.id)?;
            if !report.corrections.is_empty() {
                drifted.push(report);
            }
        }
        info!(scanned, drifted = drifted.len(), "reaction reconciliation finished");
        Ok(drifted)
    }
}

// =============================================================================
// TESTS
// =============================================================================
