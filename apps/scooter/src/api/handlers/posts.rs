//! Posts and feeds.

use crate::api::types::{CreatePostRequest, LimitParams, ListResponse, OkResponse};
use crate::api::{ApiJson, ApiQuery, ApiResult, AppState, CurrentUser, blocking};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use scooter_core::primitives::FEED_LIMIT;
use scooter_core::{PostId, PostPatch, PostView};

/// `GET /feed`: own and followed users' posts.
pub async fn feed(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Json<ListResponse<PostView>>> {
    blocking(&state, move |social| {
        social.content().following_feed(&caller.user_id)
    })
    .await
    .map(|items| Json(items.into()))
}

/// `GET /posts?limit=`: everyone's posts.
pub async fn global(
    State(state): State<AppState>,
    CurrentUser(_caller): CurrentUser,
    ApiQuery(params): ApiQuery<LimitParams>,
) -> ApiResult<Json<ListResponse<PostView>>> {
    let limit = params.limit.unwrap_or(FEED_LIMIT).clamp(1, FEED_LIMIT);
    blocking(&state, move |social| social.content().global_feed(limit))
        .await
        .map(|items| Json(items.into()))
}

/// `POST /posts`
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ApiJson(request): ApiJson<CreatePostRequest>,
) -> ApiResult<(StatusCode, Json<PostView>)> {
    blocking(&state, move |social| {
        social
            .content()
            .create_post(&caller, &request.text, request.image_key.as_deref())
    })
    .await
    .map(|post| (StatusCode::CREATED, Json(post)))
}

/// `GET /posts/{id}`
pub async fn get_one(
    State(state): State<AppState>,
    CurrentUser(_caller): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<PostView>> {
    blocking(&state, move |social| social.content().get_post(&PostId::new(id)))
        .await
        .map(Json)
}

/// `PATCH /posts/{id}`
pub async fn edit(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<String>,
    ApiJson(patch): ApiJson<PostPatch>,
) -> ApiResult<Json<PostView>> {
    blocking(&state, move |social| {
        social
            .content()
            .edit_post(&caller.user_id, &PostId::new(id), &patch)
    })
    .await
    .map(Json)
}

/// `DELETE /posts/{id}`: cascades through comments, reactions and notifications.
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<OkResponse>> {
    blocking(&state, move |social| {
        social.delete_post(&caller.user_id, &PostId::new(id))
    })
    .await?;
    Ok(Json(OkResponse::ok()))
}
