//! Direct message handlers.
//!
//! Messages flow between the two parties of an application. Admins may
//! message anyone and anyone may reply to an admin.

use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use execboard_models::{Message, NotificationKind, Page, Role};

use crate::auth::Session;
use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::security::{
    sanitize_optional, sanitize_plain_text, MAX_MESSAGE_LENGTH, MAX_TITLE_LENGTH,
};
use crate::services::Notice;
use crate::state::AppState;
use crate::validation::{page_request, PathId, ValidatedJson, ValidatedQuery};

#[derive(Debug, Deserialize, Validate)]
pub struct MessageListQuery {
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 100))]
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    pub recipient_id: Uuid,
    pub application_id: Option<Uuid>,
    #[validate(length(max = 200, message = "Subject must be at most 200 characters"))]
    pub subject: Option<String>,
    #[validate(length(min = 1, max = 10000, message = "Body must be 1-10000 characters"))]
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub unread: u64,
}

pub async fn list_messages(
    State(state): State<AppState>,
    session: Session,
    ValidatedQuery(query): ValidatedQuery<MessageListQuery>,
) -> ApiResult<ApiResponse<Page<Message>>> {
    let page = state
        .repos
        .messages
        .list_for_user(session.user_id, page_request(query.page, query.per_page))
        .await?;
    Ok(ApiResponse::ok(page))
}

pub async fn unread_count(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<ApiResponse<UnreadCount>> {
    let unread = state.repos.messages.unread_count(session.user_id).await?;
    Ok(ApiResponse::ok(UnreadCount { unread }))
}

/// Resolve the two user ids behind an application: (candidate, employer).
async fn application_parties(state: &AppState, application_id: Uuid) -> ApiResult<(Uuid, Uuid)> {
    let application = state
        .repos
        .applications
        .find(application_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Application not found"))?;
    let job = state
        .repos
        .jobs
        .find(application.job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;
    let candidate = state
        .repos
        .profiles
        .candidate_by_id(application.candidate_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Candidate not found"))?;
    let employer = state
        .repos
        .profiles
        .employer_by_id(job.employer_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Employer not found"))?;
    Ok((candidate.user_id, employer.user_id))
}

pub async fn send_message(
    State(state): State<AppState>,
    session: Session,
    ValidatedJson(request): ValidatedJson<SendMessageRequest>,
) -> ApiResult<ApiResponse<Message>> {
    if request.recipient_id == session.user_id {
        return Err(ApiError::field("recipient_id", "You cannot message yourself"));
    }
    let body = sanitize_plain_text(&request.body, MAX_MESSAGE_LENGTH);
    if body.is_empty() {
        return Err(ApiError::field("body", "Message body is required"));
    }

    let recipient = state
        .repos
        .users
        .find_by_id(request.recipient_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Recipient not found"))?;

    if !session.is_admin() && recipient.role != Role::Admin {
        let application_id = request.application_id.ok_or_else(|| {
            ApiError::forbidden("Messages must be between the parties of an application")
        })?;
        let (candidate_user, employer_user) = application_parties(&state, application_id).await?;
        let parties_match = (session.user_id == candidate_user && recipient.id == employer_user)
            || (session.user_id == employer_user && recipient.id == candidate_user);
        if !parties_match {
            return Err(ApiError::forbidden(
                "Messages must be between the parties of an application",
            ));
        }
    }

    let message = Message::new(
        session.user_id,
        recipient.id,
        request.application_id,
        sanitize_optional(request.subject.as_deref(), MAX_TITLE_LENGTH),
        body,
    );
    state.repos.messages.insert(&message).await?;
    info!(message_id = %message.id, sender = %session.user_id, "Message sent");

    let notice = Notice::new(
        NotificationKind::NewMessage,
        "New message",
        format!("{} sent you a message", session.name),
    )
    .with_link("/messages");
    state.notifier.notify_user(recipient.id, &notice).await;

    Ok(ApiResponse::created(message))
}

/// Only the recipient can mark a message read.
pub async fn mark_message_read(
    State(state): State<AppState>,
    session: Session,
    PathId(message_id): PathId,
) -> ApiResult<ApiResponse<Message>> {
    let message = state
        .repos
        .messages
        .mark_read(message_id, session.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Message not found"))?;
    Ok(ApiResponse::ok(message))
}
