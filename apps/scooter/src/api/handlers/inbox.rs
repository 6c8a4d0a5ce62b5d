//! Notifications and invite codes.

use crate::api::types::{
    InviteResponse, IssueInviteRequest, NotificationParams, NotificationsResponse,
    RedeemInviteRequest, UnreadResponse,
};
use crate::api::{ApiJson, ApiQuery, ApiResult, AppState, CurrentUser, blocking};
use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use scooter_core::primitives::NOTIFICATION_LIMIT;

/// `GET /notifications?markRead=1&limit=`
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ApiQuery(params): ApiQuery<NotificationParams>,
) -> ApiResult<Json<NotificationsResponse>> {
    let mark_read = params.mark_read();
    let limit = params.limit.unwrap_or(NOTIFICATION_LIMIT);
    blocking(&state, move |social| {
        let items = social.fanout().list(&caller.user_id, limit, mark_read)?;
        let unread = social.fanout().unread_count(&caller.user_id)?;
        Ok(NotificationsResponse { items, unread })
    })
    .await
    .map(Json)
}

/// `GET /notifications/unread`
pub async fn unread(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> ApiResult<Json<UnreadResponse>> {
    blocking(&state, move |social| {
        social.fanout().unread_count(&caller.user_id)
    })
    .await
    .map(|unread| Json(UnreadResponse { unread }))
}

/// `POST /invites`: admins only.
pub async fn issue_invite(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    ApiJson(request): ApiJson<IssueInviteRequest>,
) -> ApiResult<(StatusCode, Json<InviteResponse>)> {
    blocking(&state, move |social| social.issue_invite(&caller, request.uses))
        .await
        .map(|invite| (StatusCode::CREATED, Json(invite.into())))
}

/// `POST /invites/redeem`
pub async fn redeem_invite(
    State(state): State<AppState>,
    CurrentUser(_caller): CurrentUser,
    ApiJson(request): ApiJson<RedeemInviteRequest>,
) -> ApiResult<Json<InviteResponse>> {
    blocking(&state, move |social| social.redeem_invite(&request.code))
        .await
        .map(|invite| Json(invite.into()))
}
