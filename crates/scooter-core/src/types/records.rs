//! Stored records.
//!
//! Every value persisted in the store is one of these structs, encoded with
//! postcard. Field order is part of the on-disk format.

use super::{CommentId, NotificationId, PostId, UserId};
use serde::{Deserialize, Serialize};

/// Profile row. Created lazily on the first profile write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: UserId,
    /// Claimed handle. Immutable once set.
    pub handle: Option<String>,
    pub avatar_key: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub updated_at: i64,
}

impl Profile {
    /// Empty profile for a user who has not written anything yet.
    #[must_use]
    pub fn empty(user_id: UserId, now: i64) -> Self {
        Self {
            user_id,
            handle: None,
            avatar_key: None,
            full_name: None,
            email: None,
            updated_at: now,
        }
    }

    /// Handle, else email, else user id.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.handle
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| self.user_id.to_string())
    }
}

/// Handle reservation: the arbiter of handle uniqueness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleReservation {
    pub handle: String,
    pub user_id: UserId,
    /// Avatar republished from the profile so search needs no second read.
    pub avatar_key: Option<String>,
    pub claimed_at: i64,
}

/// Directed follow edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowEdge {
    pub follower: UserId,
    pub followee: UserId,
    pub created_at: i64,
}

/// Author fields copied onto a post at write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSnapshot {
    pub display_name: String,
    pub handle: Option<String>,
    pub avatar_key: Option<String>,
    pub stamped_at: i64,
}

/// Primary post row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,
    pub text: String,
    pub image_key: Option<String>,
    pub created_at: i64,
    pub edited_at: Option<i64>,
    pub author: AuthorSnapshot,
}

/// Index entry pointing at a post row (author partition and global feed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostPointer {
    pub post_id: PostId,
    pub author_id: UserId,
    pub created_at: i64,
}

/// Comment row, stored under its post's partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author_id: UserId,
    pub text: String,
    pub created_at: i64,
    pub edited_at: Option<i64>,
}

/// A user's single active reaction on a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionRow {
    pub user_id: UserId,
    pub emoji: String,
    pub reacted_at: i64,
}

/// Notification types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Mention,
    Comment,
    Reaction,
    FollowRequest,
    FollowAccept,
}

impl NotificationKind {
    /// Stable wire and key name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mention => "mention",
            Self::Comment => "comment",
            Self::Reaction => "reaction",
            Self::FollowRequest => "follow_request",
            Self::FollowAccept => "follow_accept",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification row in a target's inbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub target: UserId,
    pub kind: NotificationKind,
    pub source: UserId,
    pub post_id: Option<PostId>,
    /// Comment id that produced this notification, if any.
    pub cause: Option<String>,
    pub message: String,
    pub read: bool,
    pub created_at: i64,
}

/// Secondary index entry for one notification.
///
/// Lives in the target's partition of the index table, sorted by
/// `{kind}#{source}#{post}#{id}`, so dedup and retraction need one prefix
/// query instead of an inbox scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub notification_id: NotificationId,
    /// Sort key of the notification row this entry points at.
    pub row_sort: String,
    pub kind: NotificationKind,
    pub source: UserId,
    pub post_id: Option<PostId>,
    pub cause: Option<String>,
}

/// Admin-issued invite code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invite {
    pub code: String,
    pub uses_remaining: u32,
    pub created_by: UserId,
    pub created_at: i64,
}
