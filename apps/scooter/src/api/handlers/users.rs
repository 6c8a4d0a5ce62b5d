//! Profile, handle claim, search and public user pages.

use crate::api::types::{ClaimRequest, ListResponse, SearchParams};
use crate::api::{ApiJson, ApiQuery, ApiResult, AppState, CurrentUser, blocking};
use axum::{
    Json,
    extract::{Path, State},
};
use scooter_core::{ProfilePage, ProfilePatch, ProfileView, RelatedUser};

/// `GET /me`
pub async fn me(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Json<ProfileView>> {
    blocking(&state, move |social| social.directory().me(&caller))
        .await
        .map(Json)
}

/// `PATCH /me`
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ApiJson(patch): ApiJson<ProfilePatch>,
) -> ApiResult<Json<ProfileView>> {
    blocking(&state, move |social| {
        social.directory().update_profile(&caller, &patch)?;
        social.directory().me(&caller)
    })
    .await
    .map(Json)
}

/// `POST /username`
pub async fn claim_username(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ApiJson(request): ApiJson<ClaimRequest>,
) -> ApiResult<Json<ProfileView>> {
    blocking(&state, move |social| {
        social.directory().claim(&caller, &request.handle)?;
        social.directory().me(&caller)
    })
    .await
    .map(Json)
}

/// `GET /search?q=`
pub async fn search(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> ApiResult<Json<ListResponse<RelatedUser>>> {
    blocking(&state, move |social| {
        social.search_users(&caller.user_id, &params.q)
    })
    .await
    .map(|items| Json(items.into()))
}

/// `GET /u/{handle}`
pub async fn profile(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(handle): Path<String>,
) -> ApiResult<Json<ProfilePage>> {
    blocking(&state, move |social| {
        social.profile_by_handle(&caller.user_id, &handle)
    })
    .await
    .map(Json)
}

/// `GET /u/{handle}/followers`
pub async fn followers(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(handle): Path<String>,
) -> ApiResult<Json<ListResponse<RelatedUser>>> {
    blocking(&state, move |social| social.followers_of(&caller.user_id, &handle))
        .await
        .map(|items| Json(items.into()))
}

/// `GET /u/{handle}/following`
pub async fn following(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(handle): Path<String>,
) -> ApiResult<Json<ListResponse<RelatedUser>>> {
    blocking(&state, move |social| social.following_of(&caller.user_id, &handle))
        .await
        .map(|items| Json(items.into()))
}
