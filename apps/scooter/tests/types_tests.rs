//! Unit tests for API types serialization/deserialization.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use scooter::api::types::{
    CommentsResponse, CreatePostRequest, HealthResponse, InviteResponse, ListResponse,
    NotificationParams, OkResponse, ReactionParams, decode_cursor, encode_cursor,
};
use scooter_core::{CommentPage, Invite, UserId};

// =============================================================================
// HEALTH RESPONSE TESTS
// =============================================================================

#[test]
fn test_health_response_default() {
    let health = HealthResponse::default();
    assert_eq!(health.status, "ok");
    assert!(!health.version.is_empty());
}

#[test]
fn test_ok_response_serialization() {
    let json = serde_json::to_string(&OkResponse::ok()).unwrap();
    assert_eq!(json, r#"{"ok":true}"#);
}

// =============================================================================
// CURSOR TESTS
// =============================================================================

#[test]
fn test_cursor_is_url_safe() {
    let cursor = encode_cursor("0000001700000000000#c/d+e");
    assert!(!cursor.contains('/'));
    assert!(!cursor.contains('+'));
    assert!(!cursor.contains('='));
    assert_eq!(decode_cursor(&cursor).unwrap(), "0000001700000000000#c/d+e");
}

#[test]
fn test_invalid_cursor_is_validation_error() {
    let err = decode_cursor("not base64 at all!").unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[test]
fn test_comment_page_encodes_next_cursor() {
    let page = CommentPage {
        items: Vec::new(),
        next_cursor: Some("sort-key".to_string()),
    };
    let response = CommentsResponse::from(page);
    let cursor = response.next_cursor.clone().unwrap();
    assert_eq!(decode_cursor(&cursor).unwrap(), "sort-key");

    let json = serde_json::to_value(&response).unwrap();
    assert!(json.get("nextCursor").is_some());
}

// =============================================================================
// REQUEST TESTS
// =============================================================================

#[test]
fn test_create_post_request_camel_case() {
    let request: CreatePostRequest =
        serde_json::from_str(r#"{"text":"hi","imageKey":"uploads/a.png"}"#).unwrap();
    assert_eq!(request.text, "hi");
    assert_eq!(request.image_key.as_deref(), Some("uploads/a.png"));

    let image_only: CreatePostRequest =
        serde_json::from_str(r#"{"imageKey":"uploads/b.png"}"#).unwrap();
    assert!(image_only.text.is_empty());
}

#[test]
fn test_query_flags() {
    let on = |raw: &str| ReactionParams {
        who: Some(raw.to_string()),
    };
    assert!(on("1").include_who());
    assert!(on("TRUE").include_who());
    assert!(on(" yes ").include_who());
    assert!(!on("0").include_who());
    assert!(!ReactionParams::default().include_who());

    let params = NotificationParams {
        mark_read: Some("true".to_string()),
        limit: None,
    };
    assert!(params.mark_read());
    assert!(!NotificationParams::default().mark_read());
}

// =============================================================================
// RESPONSE TESTS
// =============================================================================

#[test]
fn test_invite_response_hides_issuer() {
    let invite = Invite {
        code: "ABCD1234".to_string(),
        uses_remaining: 3,
        created_by: UserId::new("admin"),
        created_at: 1,
    };
    let json = serde_json::to_value(InviteResponse::from(invite)).unwrap();
    assert_eq!(json["code"], "ABCD1234");
    assert_eq!(json["usesRemaining"], 3);
    assert!(json.get("createdBy").is_none());
}

#[test]
fn test_list_response_wraps_items() {
    let list: ListResponse<u32> = vec![1, 2].into();
    let json = serde_json::to_string(&list).unwrap();
    assert_eq!(json, r#"{"items":[1,2]}"#);
}
