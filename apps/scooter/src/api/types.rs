//! # API Request/Response Types
//!
//! JSON bodies and query strings of the HTTP API. Field names are camelCase
//! on the wire.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use scooter_core::{
    CommentPage, CommentView, FollowRequestOutcome, Invite, NotificationView, ScooterError,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Bare acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub const fn ok() -> Self {
        Self { ok: true }
    }
}

// =============================================================================
// IDENTITY
// =============================================================================

/// `POST /username`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub handle: String,
}

/// `GET /search`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

// =============================================================================
// POSTS
// =============================================================================

/// `POST /posts`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    #[serde(default)]
    pub text: String,
    pub image_key: Option<String>,
}

/// Any plain list: feeds, search results, follower lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

/// `GET /posts?limit=`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

// =============================================================================
// COMMENTS
// =============================================================================

/// `POST /posts/{id}/comments` and `PATCH /posts/{id}/comments/{cid}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

/// `GET /posts/{id}/comments?cursor=&limit=`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentParams {
    pub cursor: Option<String>,
    pub limit: Option<usize>,
}

/// One page of comments with an opaque cursor for the next.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentsResponse {
    pub items: Vec<CommentView>,
    pub next_cursor: Option<String>,
}

impl From<CommentPage> for CommentsResponse {
    fn from(page: CommentPage) -> Self {
        Self {
            items: page.items,
            next_cursor: page.next_cursor.as_deref().map(encode_cursor),
        }
    }
}

/// Encode a sort key as an opaque cursor.
pub fn encode_cursor(sort: &str) -> String {
    URL_SAFE_NO_PAD.encode(sort)
}

/// Decode a cursor produced by [`encode_cursor`].
pub fn decode_cursor(cursor: &str) -> Result<String, ScooterError> {
    URL_SAFE_NO_PAD
        .decode(cursor.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or_else(|| ScooterError::Validation("Invalid cursor".to_string()))
}

// =============================================================================
// REACTIONS
// =============================================================================

/// `POST /posts/{id}/reactions`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionRequest {
    pub emoji: String,
}

/// `GET /posts/{id}/reactions?who=1`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReactionParams {
    pub who: Option<String>,
}

impl ReactionParams {
    pub fn include_who(&self) -> bool {
        flag(self.who.as_deref())
    }
}

// =============================================================================
// RELATIONSHIPS
// =============================================================================

/// Body of every follow endpoint: the other user's handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandleRequest {
    pub handle: String,
}

/// `POST /follow-request`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FollowResponse {
    pub status: FollowRequestOutcome,
}

/// Result of decline, cancel and unfollow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChangedResponse {
    pub changed: bool,
}

// =============================================================================
// NOTIFICATIONS
// =============================================================================

/// `GET /notifications?markRead=1&limit=`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationParams {
    pub mark_read: Option<String>,
    pub limit: Option<usize>,
}

impl NotificationParams {
    pub fn mark_read(&self) -> bool {
        flag(self.mark_read.as_deref())
    }
}

/// Inbox page plus the unread count after any marking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsResponse {
    pub items: Vec<NotificationView>,
    pub unread: usize,
}

/// `GET /notifications/unread`
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UnreadResponse {
    pub unread: usize,
}

// =============================================================================
// INVITES
// =============================================================================

/// `POST /invites`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueInviteRequest {
    pub uses: Option<u32>,
}

/// `POST /invites/redeem`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedeemInviteRequest {
    pub code: String,
}

/// An invite code as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteResponse {
    pub code: String,
    pub uses_remaining: u32,
}

impl From<Invite> for InviteResponse {
    fn from(invite: Invite) -> Self {
        Self {
            code: invite.code,
            uses_remaining: invite.uses_remaining,
        }
    }
}

/// Query-string booleans: `1`, `true` and `yes` are true.
fn flag(raw: Option<&str>) -> bool {
    matches!(
        raw.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes")
    )
}
