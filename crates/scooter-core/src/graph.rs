//! # Relationship Graph
//!
//! Follow edges and the follow-request lifecycle.
//!
//! A pending follow request is a `follow_request` notification in the
//! target's inbox; there is no separate request table. Accepting runs three
//! independent writes in a fixed order:
//!
//! 1. insert the edge (primary, errors surface)
//! 2. retract the request (best effort)
//! 3. notify the requester (best effort)
//!
//! Re-running an accept after a partial failure converges: the edge insert is
//! an idempotent put and retraction of nothing is a no-op.
//!
//! Counts are computed at read time. There are no maintained counters.

use crate::config::Feature;
use crate::context::Context;
use crate::directory::{Directory, UserSummary};
use crate::fanout::{Fanout, NotificationDraft, Retraction};
use crate::storage::{Key, Query, Table};
use crate::{FollowEdge, NotificationKind, ScooterError, UserId, formats};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Result of [`Graph::send_follow_request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowRequestOutcome {
    /// A new request was placed in the target's inbox.
    Requested,
    /// A live request already existed.
    AlreadyPending,
    /// The requester already follows the target.
    AlreadyFollowing,
}

/// A listed user annotated with the viewer's follow state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedUser {
    #[serde(flatten)]
    pub user: UserSummary,
    pub is_following: bool,
}

/// Relationship between a viewer and another user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    /// Viewer follows the other user.
    pub is_following: bool,
    /// The other user follows the viewer.
    pub follows_you: bool,
    /// Viewer has a live request in the other user's inbox.
    pub request_pending: bool,
}

fn edge_key(follower: &UserId, followee: &UserId) -> Key {
    Key::new(follower.as_str(), followee.as_str())
}

/// The Relationship Graph component.
#[derive(Debug, Clone)]
pub struct Graph {
    ctx: Context,
    directory: Directory,
    fanout: Fanout,
}

impl Graph {
    pub(crate) fn new(ctx: Context, directory: Directory, fanout: Fanout) -> Self {
        Self {
            ctx,
            directory,
            fanout,
        }
    }

    fn require_enabled(&self) -> Result<(), ScooterError> {
        self.ctx.config.features.require(Feature::Follows)
    }

    /// Whether `follower` follows `followee`.
    pub fn is_following(&self, follower: &UserId, followee: &UserId) -> Result<bool, ScooterError> {
        Ok(self
            .ctx
            .store
            .get(Table::Follows, &edge_key(follower, followee))?
            .is_some())
    }

    /// Ask to follow `target`.
    pub fn send_follow_request(
        &self,
        requester: &UserId,
        target: &UserId,
    ) -> Result<FollowRequestOutcome, ScooterError> {
        self.require_enabled()?;
        if requester == target {
            return Err(ScooterError::validation("You cannot follow yourself"));
        }
        if self.is_following(requester, target)? {
            return Ok(FollowRequestOutcome::AlreadyFollowing);
        }
        if self
            .fanout
            .exists_pending(target, NotificationKind::FollowRequest, requester)?
        {
            return Ok(FollowRequestOutcome::AlreadyPending);
        }

        let name = self.directory.summary(requester)?.mention_name();
        self.fanout.emit(NotificationDraft::new(
            NotificationKind::FollowRequest,
            requester,
            target,
            format!("{name} wants to follow you"),
        ))?;
        debug!(requester = %requester, target_user = %target, "follow request sent");
        Ok(FollowRequestOutcome::Requested)
    }

    /// Accept `requester`'s pending request to follow `accepter`.
    pub fn accept_follow_request(
        &self,
        accepter: &UserId,
        requester: &UserId,
    ) -> Result<(), ScooterError> {
        self.require_enabled()?;
        let pending =
            self.fanout
                .exists_pending(accepter, NotificationKind::FollowRequest, requester)?;
        let already = self.is_following(requester, accepter)?;
        if !pending && !already {
            return Err(ScooterError::not_found("No pending follow request"));
        }

        if !already {
            let edge = FollowEdge {
                follower: requester.clone(),
                followee: accepter.clone(),
                created_at: self.ctx.now(),
            };
            self.ctx
                .save(Table::Follows, &edge_key(requester, accepter), &edge)?;
        }

        self.fanout.retract_best_effort(
            &Retraction::new(accepter, NotificationKind::FollowRequest).from(requester),
        );

        if pending {
            let name = self
                .directory
                .summary(accepter)
                .map_or_else(|_| accepter.to_string(), |s| s.mention_name());
            self.fanout.emit_best_effort(NotificationDraft::new(
                NotificationKind::FollowAccept,
                accepter,
                requester,
                format!("{name} accepted your follow request"),
            ));
        }
        debug!(follower = %requester, followee = %accepter, "follow request accepted");
        Ok(())
    }

    /// Drop `requester`'s request without creating an edge. Returns whether one existed.
    pub fn decline_follow_request(
        &self,
        decliner: &UserId,
        requester: &UserId,
    ) -> Result<bool, ScooterError> {
        self.require_enabled()?;
        let removed = self.fanout.retract(
            &Retraction::new(decliner, NotificationKind::FollowRequest).from(requester),
        )?;
        Ok(removed > 0)
    }

    /// Withdraw the caller's own request to `target`. Returns whether one existed.
    pub fn cancel_follow_request(
        &self,
        requester: &UserId,
        target: &UserId,
    ) -> Result<bool, ScooterError> {
        self.require_enabled()?;
        let removed = self.fanout.retract(
            &Retraction::new(target, NotificationKind::FollowRequest).from(requester),
        )?;
        Ok(removed > 0)
    }

    /// Remove the edge `follower -> followee`. Returns whether it existed.
    ///
    /// Stale follow notifications between the two are retracted on a best
    /// effort basis.
    pub fn unfollow(&self, follower: &UserId, followee: &UserId) -> Result<bool, ScooterError> {
        self.require_enabled()?;
        if follower == followee {
            return Err(ScooterError::validation("You cannot unfollow yourself"));
        }
        let existed = self
            .ctx
            .remove(Table::Follows, &edge_key(follower, followee))?;

        self.fanout.retract_best_effort(
            &Retraction::new(follower, NotificationKind::FollowAccept).from(followee),
        );
        self.fanout.retract_best_effort(
            &Retraction::new(followee, NotificationKind::FollowRequest).from(follower),
        );
        Ok(existed)
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Users `user` follows, up to `limit`.
    pub fn following_ids(&self, user: &UserId, limit: usize) -> Result<Vec<UserId>, ScooterError> {
        Ok(self
            .ctx
            .store
            .query(Table::Follows, user.as_str(), &Query::all().limit(limit))?
            .into_iter()
            .map(|item| UserId::new(item.key.sort))
            .collect())
    }

    /// Users following `user`.
    ///
    /// Edges are partitioned by follower, so this scans the edge table.
    pub fn follower_ids(&self, user: &UserId) -> Result<Vec<UserId>, ScooterError> {
        let mut followers = Vec::new();
        for item in self.ctx.store.scan(Table::Follows, None)? {
            if item.key.sort == user.as_str() {
                let edge: FollowEdge = formats::decode(&item.value)?;
                followers.push(edge.follower);
            }
        }
        Ok(followers)
    }

    pub fn count_following(&self, user: &UserId) -> Result<usize, ScooterError> {
        Ok(self
            .ctx
            .store
            .query(Table::Follows, user.as_str(), &Query::all())?
            .len())
    }

    pub fn count_followers(&self, user: &UserId) -> Result<usize, ScooterError> {
        Ok(self.follower_ids(user)?.len())
    }

    /// How `viewer` relates to `other`.
    pub fn relationship(&self, viewer: &UserId, other: &UserId) -> Result<Relationship, ScooterError> {
        if viewer == other {
            return Ok(Relationship::default());
        }
        Ok(Relationship {
            is_following: self.is_following(viewer, other)?,
            follows_you: self.is_following(other, viewer)?,
            request_pending: self.fanout.exists_pending(
                other,
                NotificationKind::FollowRequest,
                viewer,
            )?,
        })
    }

    /// Hydrate `users` and flag which ones `viewer` follows.
    pub fn annotate(
        &self,
        viewer: &UserId,
        users: &[UserId],
    ) -> Result<Vec<RelatedUser>, ScooterError> {
        let followed: BTreeSet<UserId> = self
            .following_ids(viewer, usize::MAX)?
            .into_iter()
            .collect();
        let mut summaries = self.directory.summaries(users)?;
        Ok(users
            .iter()
            .filter_map(|id| {
                summaries.remove(id).map(|user| RelatedUser {
                    is_following: followed.contains(id),
                    user,
                })
            })
            .collect())
    }

    /// Followers of `user`, annotated for `viewer`.
    pub fn list_followers(
        &self,
        viewer: &UserId,
        user: &UserId,
    ) -> Result<Vec<RelatedUser>, ScooterError> {
        let ids = self.follower_ids(user)?;
        self.annotate(viewer, &ids)
    }

    /// Users `user` follows, annotated for `viewer`.
    pub fn list_following(
        &self,
        viewer: &UserId,
        user: &UserId,
    ) -> Result<Vec<RelatedUser>, ScooterError> {
        let ids = self.following_ids(user, usize::MAX)?;
        self.annotate(viewer, &ids)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Features;
    use crate::context::tests::memory_context;
    use crate::{Caller, CoreConfig};

    fn graph_with(config: CoreConfig) -> Graph {
        let ctx = memory_context(config);
        let directory = Directory::new(ctx.clone());
        let fanout = Fanout::new(ctx.clone(), directory.clone());
        Graph::new(ctx, directory, fanout)
    }

    fn graph() -> Graph {
        graph_with(CoreConfig::default())
    }

    fn ids() -> (UserId, UserId) {
        (UserId::new("u-a"), UserId::new("u-b"))
    }

    fn pending(graph: &Graph, target: &UserId, source: &UserId) -> bool {
        graph
            .fanout
            .exists_pending(target, NotificationKind::FollowRequest, source)
            .expect("pending")
    }

    #[test]
    fn request_then_accept_creates_edge_and_clears_request() {
        let graph = graph();
        let (a, b) = ids();

        assert_eq!(
            graph.send_follow_request(&a, &b).expect("request"),
            FollowRequestOutcome::Requested
        );
        assert_eq!(
            graph.send_follow_request(&a, &b).expect("again"),
            FollowRequestOutcome::AlreadyPending
        );
        assert!(pending(&graph, &b, &a));

        graph.accept_follow_request(&b, &a).expect("accept");
        assert!(graph.is_following(&a, &b).expect("edge"));
        assert!(!graph.is_following(&b, &a).expect("no reverse edge"));
        assert!(!pending(&graph, &b, &a));

        let inbox = graph.fanout.list(&a, 50, false).expect("inbox");
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationKind::FollowAccept);

        // Re-running converges without a second accept notice.
        graph.accept_follow_request(&b, &a).expect("re-accept");
        assert_eq!(graph.fanout.list(&a, 50, false).expect("inbox").len(), 1);

        assert_eq!(
            graph.send_follow_request(&a, &b).expect("following"),
            FollowRequestOutcome::AlreadyFollowing
        );
    }

    #[test]
    fn self_follow_is_rejected() {
        let graph = graph();
        let (a, _) = ids();
        let err = graph.send_follow_request(&a, &a).expect_err("self");
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn accept_without_request_is_not_found() {
        let graph = graph();
        let (a, b) = ids();
        let err = graph.accept_follow_request(&b, &a).expect_err("none");
        assert_eq!(err.status_code(), 404);
        assert!(!graph.is_following(&a, &b).expect("edge"));
    }

    #[test]
    fn decline_and_cancel_only_retract() {
        let graph = graph();
        let (a, b) = ids();
        graph.send_follow_request(&a, &b).expect("request");
        assert!(graph.decline_follow_request(&b, &a).expect("decline"));
        assert!(!graph.decline_follow_request(&b, &a).expect("decline again"));
        assert!(!graph.is_following(&a, &b).expect("edge"));

        graph.send_follow_request(&a, &b).expect("request");
        assert!(graph.cancel_follow_request(&a, &b).expect("cancel"));
        assert!(!pending(&graph, &b, &a));
    }

    #[test]
    fn unfollow_removes_edge_and_accept_notice() {
        let graph = graph();
        let (a, b) = ids();
        graph.send_follow_request(&a, &b).expect("request");
        graph.accept_follow_request(&b, &a).expect("accept");

        assert!(graph.unfollow(&a, &b).expect("unfollow"));
        assert!(!graph.is_following(&a, &b).expect("edge"));
        assert!(graph.fanout.list(&a, 50, false).expect("inbox").is_empty());
        assert!(!graph.unfollow(&a, &b).expect("idempotent"));
    }

    #[test]
    fn counts_and_annotated_lists() {
        let graph = graph();
        let dir = graph.directory.clone();
        let (a, b) = ids();
        let c = UserId::new("u-c");
        dir.claim(&Caller::new("u-b", None), "bobby").expect("claim");

        for follower in [&a, &c] {
            graph.send_follow_request(follower, &b).expect("request");
            graph.accept_follow_request(&b, follower).expect("accept");
        }
        graph.send_follow_request(&a, &c).expect("request");
        graph.accept_follow_request(&c, &a).expect("accept");

        assert_eq!(graph.count_followers(&b).expect("followers"), 2);
        assert_eq!(graph.count_following(&a).expect("following"), 2);

        let listed = graph.list_followers(&a, &b).expect("list");
        let flags: Vec<_> = listed
            .iter()
            .map(|r| (r.user.user_id.as_str(), r.is_following))
            .collect();
        assert_eq!(flags, vec![("u-a", false), ("u-c", true)]);

        let rel = graph.relationship(&a, &b).expect("relationship");
        assert!(rel.is_following && !rel.follows_you && !rel.request_pending);
    }

    #[test]
    fn disabled_follows_answer_unavailable() {
        let graph = graph_with(CoreConfig {
            features: Features {
                follows: false,
                ..Features::default()
            },
            ..CoreConfig::default()
        });
        let (a, b) = ids();
        let err = graph.send_follow_request(&a, &b).expect_err("disabled");
        assert_eq!(err.status_code(), 501);
    }
}
