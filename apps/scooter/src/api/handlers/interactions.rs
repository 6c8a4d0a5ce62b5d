//! Comments and reactions.

use crate::api::types::{
    CommentParams, CommentRequest, CommentsResponse, OkResponse, ReactionParams, ReactionRequest,
    decode_cursor,
};
use crate::api::{ApiJson, ApiQuery, ApiResult, AppState, CurrentUser, blocking};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use scooter_core::primitives::COMMENT_PAGE_SIZE;
use scooter_core::{CommentId, CommentView, PostId, ReactionSummary, ToggleOutcome};

/// `GET /posts/{id}/comments?cursor=&limit=`
pub async fn list_comments(
    State(state): State<AppState>,
    CurrentUser(_caller): CurrentUser,
    Path(id): Path<String>,
    ApiQuery(params): ApiQuery<CommentParams>,
) -> ApiResult<Json<CommentsResponse>> {
    let cursor = params.cursor.as_deref().map(decode_cursor).transpose()?;
    let limit = params.limit.unwrap_or(COMMENT_PAGE_SIZE);
    blocking(&state, move |social| {
        social
            .ledger()
            .list_comments(&PostId::new(id), cursor.as_deref(), limit)
    })
    .await
    .map(|page| Json(page.into()))
}

/// `POST /posts/{id}/comments`
pub async fn add_comment(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<CommentRequest>,
) -> ApiResult<(StatusCode, Json<CommentView>)> {
    blocking(&state, move |social| {
        social
            .ledger()
            .add_comment(&caller, &PostId::new(id), &request.text)
    })
    .await
    .map(|comment| (StatusCode::CREATED, Json(comment)))
}

/// `PATCH /posts/{id}/comments/{cid}`
pub async fn edit_comment(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path((id, cid)): Path<(String, String)>,
    ApiJson(request): ApiJson<CommentRequest>,
) -> ApiResult<Json<CommentView>> {
    blocking(&state, move |social| {
        social.ledger().edit_comment(
            &caller.user_id,
            &PostId::new(id),
            &CommentId::new(cid),
            &request.text,
        )
    })
    .await
    .map(Json)
}

/// `DELETE /posts/{id}/comments/{cid}`
pub async fn delete_comment(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path((id, cid)): Path<(String, String)>,
) -> ApiResult<Json<OkResponse>> {
    blocking(&state, move |social| {
        social
            .ledger()
            .delete_comment(&caller.user_id, &PostId::new(id), &CommentId::new(cid))
    })
    .await?;
    Ok(Json(OkResponse::ok()))
}

/// `GET /posts/{id}/reactions?who=1`
pub async fn reactions(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<String>,
    ApiQuery(params): ApiQuery<ReactionParams>,
) -> ApiResult<Json<ReactionSummary>> {
    let include_who = params.include_who();
    blocking(&state, move |social| {
        social
            .ledger()
            .reaction_summary(&PostId::new(id), Some(&caller.user_id), include_who)
    })
    .await
    .map(Json)
}

/// `POST /posts/{id}/reactions`
pub async fn toggle_reaction(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<String>,
    ApiJson(request): ApiJson<ReactionRequest>,
) -> ApiResult<Json<ToggleOutcome>> {
    blocking(&state, move |social| {
        social
            .ledger()
            .toggle_reaction(&caller.user_id, &PostId::new(id), &request.emoji)
    })
    .await
    .map(Json)
}
