//! Integration tests for the Scooter HTTP API.
//!
//! Uses axum-test to test the API handlers without starting a real server.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::{HeaderName, HeaderValue, StatusCode, header};
use axum_test::{TestRequest, TestServer};
use scooter::api::types::{
    CommentsResponse, HealthResponse, InviteResponse, ListResponse, NotificationsResponse,
    UnreadResponse,
};
use scooter::api::{AppState, ErrorResponse, create_router};
use scooter::config::AppConfig;
use scooter_core::{CommentView, ManualClock, MemoryStore, PostView, ProfileView, Social};
use serde_json::{Value, json};
use std::sync::Arc;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Configuration without rate limiting or gateway key.
fn test_config() -> AppConfig {
    AppConfig {
        rate_limit: 0,
        ..AppConfig::default()
    }
}

/// Create a test server over a fresh in-memory store and a stepping clock.
fn server_with(config: AppConfig) -> TestServer {
    let social = Social::new(
        Arc::new(MemoryStore::new()),
        Arc::new(ManualClock::default()),
        config.core.clone(),
    );
    let router = create_router(AppState::new(social, config));
    TestServer::new(router).unwrap()
}

fn create_test_server() -> TestServer {
    server_with(test_config())
}

/// Attach the identity headers the gateway would forward.
fn as_user(request: TestRequest, user: &str) -> TestRequest {
    request.add_header(
        HeaderName::from_static("x-user-id"),
        HeaderValue::from_str(user).unwrap(),
    )
}

fn with_email(request: TestRequest, email: &str) -> TestRequest {
    request.add_header(
        HeaderName::from_static("x-user-email"),
        HeaderValue::from_str(email).unwrap(),
    )
}

async fn claim(server: &TestServer, user: &str, handle: &str) {
    as_user(server.post("/username"), user)
        .json(&json!({ "handle": handle }))
        .await
        .assert_status_ok();
}

async fn create_post(server: &TestServer, user: &str, text: &str) -> PostView {
    let response = as_user(server.post("/posts"), user)
        .json(&json!({ "text": text }))
        .await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

// =============================================================================
// HEALTH AND AUTHENTICATION
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let server = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let server = create_test_server();

    let response = server.get("/me").await;

    response.assert_status_unauthorized();
    let body: ErrorResponse = response.json();
    assert!(!body.message.is_empty());
}

#[tokio::test]
async fn test_gateway_key_is_enforced() {
    let server = server_with(AppConfig {
        gateway_key: Some("s3cret".to_string()),
        ..test_config()
    });

    server.get("/health").await.assert_status_ok();
    as_user(server.get("/me"), "alice")
        .await
        .assert_status_unauthorized();
    as_user(server.get("/me"), "alice")
        .add_header(
            header::AUTHORIZATION,
            "Bearer wrong".parse::<HeaderValue>().unwrap(),
        )
        .await
        .assert_status_unauthorized();
    as_user(server.get("/me"), "alice")
        .add_header(
            header::AUTHORIZATION,
            "Bearer s3cret".parse::<HeaderValue>().unwrap(),
        )
        .await
        .assert_status_ok();
}

// =============================================================================
// IDENTITY
// =============================================================================

#[tokio::test]
async fn test_me_before_and_after_claim() {
    let server = create_test_server();

    let response = with_email(as_user(server.get("/me"), "alice"), "Alice@Example.com").await;
    response.assert_status_ok();
    let me: ProfileView = response.json();
    assert_eq!(me.handle, None);
    assert_eq!(me.email.as_deref(), Some("alice@example.com"));

    claim(&server, "alice", "Alice_1").await;
    let me: ProfileView = as_user(server.get("/me"), "alice").await.json();
    assert_eq!(me.handle.as_deref(), Some("alice_1"));
    assert_eq!(me.display_name, "alice_1");
}

#[tokio::test]
async fn test_handle_conflict_and_validation() {
    let server = create_test_server();
    claim(&server, "alice", "shared").await;

    as_user(server.post("/username"), "bob")
        .json(&json!({ "handle": "shared" }))
        .await
        .assert_status(StatusCode::CONFLICT);
    as_user(server.post("/username"), "bob")
        .json(&json!({ "handle": "no spaces!" }))
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn test_profile_page_and_search() {
    let server = create_test_server();
    claim(&server, "alice", "alice").await;
    claim(&server, "bob", "bobby").await;
    create_post(&server, "bob", "first").await;

    let response = as_user(server.get("/u/bobby"), "alice").await;
    response.assert_status_ok();
    let page: Value = response.json();
    assert_eq!(page["handle"], "bobby");
    assert_eq!(page["isSelf"], false);
    assert_eq!(page["posts"].as_array().unwrap().len(), 1);

    as_user(server.get("/u/nobody"), "alice")
        .await
        .assert_status_not_found();

    let found: Value = as_user(server.get("/search"), "alice")
        .add_query_param("q", "bob")
        .await
        .json();
    assert_eq!(found["items"][0]["handle"], "bobby");
    assert_eq!(found["items"][0]["isFollowing"], false);
}

// =============================================================================
// POSTS AND MENTIONS
// =============================================================================

#[tokio::test]
async fn test_post_mention_notifies_once() {
    let server = create_test_server();
    claim(&server, "alice", "alice").await;
    claim(&server, "bob", "bob").await;

    let post = create_post(&server, "alice", "hello @bob and @bob again").await;
    assert_eq!(post.handle.as_deref(), Some("alice"));

    let unread: UnreadResponse = as_user(server.get("/notifications/unread"), "bob")
        .await
        .json();
    assert_eq!(unread.unread, 1);

    let inbox: NotificationsResponse = as_user(server.get("/notifications"), "bob")
        .add_query_param("markRead", "1")
        .await
        .json();
    assert_eq!(inbox.items.len(), 1);
    assert!(inbox.items[0].read);
    assert_eq!(inbox.items[0].post_id.as_ref(), Some(&post.id));
    assert_eq!(inbox.unread, 0);
}

#[tokio::test]
async fn test_only_author_may_edit_or_delete() {
    let server = create_test_server();
    let post = create_post(&server, "alice", "mine").await;
    let path = format!("/posts/{}", post.id);

    as_user(server.patch(&path), "mallory")
        .json(&json!({ "text": "hacked" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    as_user(server.delete(&path), "mallory")
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let edited: PostView = as_user(server.patch(&path), "alice")
        .json(&json!({ "text": "still mine" }))
        .await
        .json();
    assert_eq!(edited.text, "still mine");
    assert!(edited.edited_at.is_some());

    as_user(server.delete(&path), "alice").await.assert_status_ok();
    as_user(server.get(&path), "alice")
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_empty_post_is_rejected() {
    let server = create_test_server();

    as_user(server.post("/posts"), "alice")
        .json(&json!({ "text": "   " }))
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn test_global_feed_newest_first() {
    let server = create_test_server();
    create_post(&server, "alice", "one").await;
    create_post(&server, "bob", "two").await;

    let feed: ListResponse<PostView> = as_user(server.get("/posts"), "carol")
        .add_query_param("limit", "10")
        .await
        .json();
    assert_eq!(feed.items.len(), 2);
    assert!(feed.items[0].created_at >= feed.items[1].created_at);
}

// =============================================================================
// REACTIONS AND COMMENTS
// =============================================================================

#[tokio::test]
async fn test_reaction_toggle_round_trip() {
    let server = create_test_server();
    let post = create_post(&server, "alice", "react to me").await;
    let path = format!("/posts/{}/reactions", post.id);

    let set: Value = as_user(server.post(&path), "bob")
        .json(&json!({ "emoji": "🔥" }))
        .await
        .json();
    assert_eq!(set["transition"]["action"], "set");
    assert_eq!(set["counts"]["🔥"], 1);
    assert_eq!(set["mine"], "🔥");

    let switched: Value = as_user(server.post(&path), "bob")
        .json(&json!({ "emoji": "👍" }))
        .await
        .json();
    assert_eq!(switched["transition"]["action"], "switched");
    assert_eq!(switched["counts"]["🔥"], 0);
    assert_eq!(switched["counts"]["👍"], 1);

    let summary: Value = as_user(server.get(&path), "alice")
        .add_query_param("who", "1")
        .await
        .json();
    assert_eq!(summary["counts"]["👍"], 1);
    assert!(summary["mine"].is_null());
    assert_eq!(summary["who"]["👍"][0]["userId"], "bob");
}

#[tokio::test]
async fn test_comment_pagination_cursor() {
    let server = create_test_server();
    let post = create_post(&server, "alice", "discuss").await;
    let path = format!("/posts/{}/comments", post.id);

    for text in ["one", "two", "three"] {
        let response = as_user(server.post(&path), "bob")
            .json(&json!({ "text": text }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let _: CommentView = response.json();
    }

    let first: CommentsResponse = as_user(server.get(&path), "alice")
        .add_query_param("limit", "2")
        .await
        .json();
    assert_eq!(first.items.len(), 2);
    let cursor = first.next_cursor.unwrap();

    let second: CommentsResponse = as_user(server.get(&path), "alice")
        .add_query_param("limit", "2")
        .add_query_param("cursor", &cursor)
        .await
        .json();
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].text, "three");
    assert!(second.next_cursor.is_none());

    as_user(server.get(&path), "alice")
        .add_query_param("cursor", "%%%")
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn test_comment_without_text_is_bad_request() {
    let server = create_test_server();
    let post = create_post(&server, "alice", "discuss").await;

    let response = as_user(server.post(&format!("/posts/{}/comments", post.id)), "bob")
        .json(&json!({}))
        .await;
    response.assert_status_bad_request();
    let body: ErrorResponse = response.json();
    assert!(body.message.contains("text"));
}

#[tokio::test]
async fn test_malformed_query_is_bad_request() {
    let server = create_test_server();

    let response = as_user(server.get("/posts"), "alice")
        .add_query_param("limit", "plenty")
        .await;
    response.assert_status_bad_request();
    let body: ErrorResponse = response.json();
    assert!(!body.message.is_empty());
}

#[tokio::test]
async fn test_disabled_comments_answer_not_implemented() {
    let mut config = test_config();
    config.core.features.comments = false;
    let server = server_with(config);
    let post = create_post(&server, "alice", "quiet").await;

    let response = as_user(server.post(&format!("/posts/{}/comments", post.id)), "bob")
        .json(&json!({ "text": "hi" }))
        .await;
    response.assert_status(StatusCode::NOT_IMPLEMENTED);
    let body: ErrorResponse = response.json();
    assert_eq!(body.message, "Comments not enabled");
}

// =============================================================================
// RELATIONSHIPS
// =============================================================================

#[tokio::test]
async fn test_follow_request_accept_and_feed() {
    let server = create_test_server();
    claim(&server, "alice", "alice").await;
    claim(&server, "bob", "bob").await;
    create_post(&server, "bob", "from bob").await;

    let requested: Value = as_user(server.post("/follow-request"), "alice")
        .json(&json!({ "handle": "bob" }))
        .await
        .json();
    assert_eq!(requested["status"], "requested");

    let again: Value = as_user(server.post("/follow-request"), "alice")
        .json(&json!({ "handle": "bob" }))
        .await
        .json();
    assert_eq!(again["status"], "already_pending");

    as_user(server.post("/follow-accept"), "bob")
        .json(&json!({ "handle": "alice" }))
        .await
        .assert_status_ok();

    let feed: ListResponse<PostView> = as_user(server.get("/feed"), "alice").await.json();
    assert_eq!(feed.items.len(), 1);
    assert_eq!(feed.items[0].text, "from bob");

    let unfollowed: Value = as_user(server.post("/unfollow"), "alice")
        .json(&json!({ "handle": "bob" }))
        .await
        .json();
    assert_eq!(unfollowed["changed"], true);
}

#[tokio::test]
async fn test_accept_without_request_is_not_found() {
    let server = create_test_server();
    claim(&server, "alice", "alice").await;

    as_user(server.post("/follow-accept"), "bob")
        .json(&json!({ "handle": "alice" }))
        .await
        .assert_status_not_found();
}

// =============================================================================
// INVITES
// =============================================================================

#[tokio::test]
async fn test_invites_admin_only_then_redeemable() {
    let mut config = test_config();
    config.core = config.core.with_admin_emails(["root@example.com"]);
    let server = server_with(config);

    with_email(as_user(server.post("/invites"), "eve"), "eve@example.com")
        .json(&json!({ "uses": 2 }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let response = with_email(as_user(server.post("/invites"), "root"), "ROOT@example.com")
        .json(&json!({ "uses": 1 }))
        .await;
    response.assert_status(StatusCode::CREATED);
    let invite: InviteResponse = response.json();
    assert_eq!(invite.uses_remaining, 1);

    let redeemed: InviteResponse = as_user(server.post("/invites/redeem"), "newbie")
        .json(&json!({ "code": invite.code.to_lowercase() }))
        .await
        .json();
    assert_eq!(redeemed.uses_remaining, 0);

    as_user(server.post("/invites/redeem"), "other")
        .json(&json!({ "code": invite.code }))
        .await
        .assert_status(StatusCode::CONFLICT);
}
