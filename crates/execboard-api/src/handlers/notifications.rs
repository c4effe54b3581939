//! In-app notification handlers.

use axum::extract::State;
use serde::{Deserialize, Serialize};
use validator::Validate;

use execboard_models::Notification;

use crate::auth::Session;
use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::validation::{PathId, ValidatedQuery};

const DEFAULT_LIMIT: u32 = 50;

#[derive(Debug, Deserialize, Validate)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    #[validate(range(min = 1, max = 100, message = "limit must be 1-100"))]
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct MarkAllRead {
    pub updated: u64,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    session: Session,
    ValidatedQuery(query): ValidatedQuery<NotificationQuery>,
) -> ApiResult<ApiResponse<Vec<Notification>>> {
    let items = state
        .repos
        .notifications
        .list(
            session.user_id,
            query.unread_only,
            query.limit.unwrap_or(DEFAULT_LIMIT),
        )
        .await?;
    Ok(ApiResponse::ok(items))
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    session: Session,
    PathId(notification_id): PathId,
) -> ApiResult<ApiResponse<()>> {
    if !state
        .repos
        .notifications
        .mark_read(notification_id, session.user_id)
        .await?
    {
        return Err(ApiError::not_found("Notification not found"));
    }
    Ok(ApiResponse::message("Notification marked as read"))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<ApiResponse<MarkAllRead>> {
    let updated = state
        .repos
        .notifications
        .mark_all_read(session.user_id)
        .await?;
    Ok(ApiResponse::ok(MarkAllRead { updated }))
}
