//! Follow requests and unfollowing.
//!
//! Every endpoint takes the other user's handle in the body.

use crate::api::types::{ChangedResponse, FollowResponse, HandleRequest, OkResponse};
use crate::api::{ApiJson, ApiResult, AppState, CurrentUser, blocking};
use axum::{Json, extract::State};

/// `POST /follow-request`
pub async fn request(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ApiJson(body): ApiJson<HandleRequest>,
) -> ApiResult<Json<FollowResponse>> {
    blocking(&state, move |social| {
        let target = social.directory().resolve_handle(&body.handle)?;
        social.graph().send_follow_request(&caller.user_id, &target)
    })
    .await
    .map(|status| Json(FollowResponse { status }))
}

/// `POST /follow-accept`: `handle` is the requester.
pub async fn accept(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ApiJson(body): ApiJson<HandleRequest>,
) -> ApiResult<Json<OkResponse>> {
    blocking(&state, move |social| {
        let requester = social.directory().resolve_handle(&body.handle)?;
        social
            .graph()
            .accept_follow_request(&caller.user_id, &requester)
    })
    .await?;
    Ok(Json(OkResponse::ok()))
}

/// `POST /follow-decline`: `handle` is the requester.
pub async fn decline(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ApiJson(body): ApiJson<HandleRequest>,
) -> ApiResult<Json<ChangedResponse>> {
    blocking(&state, move |social| {
        let requester = social.directory().resolve_handle(&body.handle)?;
        social
            .graph()
            .decline_follow_request(&caller.user_id, &requester)
    })
    .await
    .map(|changed| Json(ChangedResponse { changed }))
}

/// `POST /follow-cancel`: `handle` is the user the caller asked to follow.
pub async fn cancel(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ApiJson(body): ApiJson<HandleRequest>,
) -> ApiResult<Json<ChangedResponse>> {
    blocking(&state, move |social| {
        let target = social.directory().resolve_handle(&body.handle)?;
        social.graph().cancel_follow_request(&caller.user_id, &target)
    })
    .await
    .map(|changed| Json(ChangedResponse { changed }))
}

/// `POST /unfollow`
pub async fn unfollow(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ApiJson(body): ApiJson<HandleRequest>,
) -> ApiResult<Json<ChangedResponse>> {
    blocking(&state, move |social| {
        let followee = social.directory().resolve_handle(&body.handle)?;
        social.graph().unfollow(&caller.user_id, &followee)
    })
    .await
    .map(|changed| Json(ChangedResponse { changed }))
}
