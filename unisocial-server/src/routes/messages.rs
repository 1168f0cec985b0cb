use axum::extract::{Path, Query, State};
use axum::Json;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use unisocial_shared::errors::{AppError, AppResult, ErrorCode};
use unisocial_shared::types::auth::AuthUser;
use unisocial_shared::types::pagination::{Paginated, PaginationParams};
use unisocial_shared::types::ApiResponse;

use crate::models::{Message, NewMessage};
use crate::routes::users::load_active_user;
use crate::schema::{messages, users};
use crate::services::conversation::{self, ConversationPreview};
use crate::services::{block_service, notification_service};
use crate::AppState;

// --- POST /api/messages ---

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub receiver_id: Uuid,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub message_id: Uuid,
}

pub async fn send_message(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<Json<ApiResponse<SendMessageResponse>>> {
    if !state.config.messaging_enabled {
        return Err(AppError::new(ErrorCode::FeatureDisabled, "direct messaging is disabled"));
    }
    if req.receiver_id == auth.id {
        return Err(AppError::new(ErrorCode::CannotMessageSelf, "you cannot message yourself"));
    }
    if req.content.trim().is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, "message content cannot be empty"));
    }

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let receiver = load_active_user(&mut conn, req.receiver_id)?;
    block_service::ensure_unblocked(&mut conn, auth.id, receiver.id)?;

    let new_message = NewMessage {
        sender_id: auth.id,
        receiver_id: receiver.id,
        content: req.content,
    };

    let message: Message = diesel::insert_into(messages::table)
        .values(&new_message)
        .get_result(&mut conn)?;

    if state.config.notifications_enabled && receiver.notify_on_messages {
        let sender_name: String = users::table
            .find(auth.id)
            .select(users::username)
            .first(&mut conn)
            .unwrap_or_else(|_| "someone".to_string());

        if let Err(e) = notification_service::notify(
            &state.db,
            receiver.id,
            auth.id,
            "message",
            Some(message.id),
            &format!("New message from {sender_name}"),
        ) {
            tracing::error!(error = %e, "failed to create message notification");
        }
    }

    tracing::debug!(
        message_id = %message.id,
        sender_id = %auth.id,
        receiver_id = %receiver.id,
        "message sent"
    );

    Ok(Json(ApiResponse::ok(SendMessageResponse { message_id: message.id })))
}

// --- GET /api/messages/conversations ---

pub async fn list_conversations(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<ConversationPreview>>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    // Conversations are derived: load everything involving the caller,
    // newest first, and group by counterparty in memory.
    let involving: Vec<Message> = messages::table
        .filter(messages::sender_id.eq(auth.id).or(messages::receiver_id.eq(auth.id)))
        .order(messages::created_at.desc())
        .load(&mut conn)?;

    let previews = conversation::group_conversations(auth.id, &involving);
    let (page, total) = conversation::page_conversations(
        previews,
        params.offset() as usize,
        params.limit() as usize,
    );

    let paginated = Paginated::new(page, total as u64, &params);
    Ok(Json(ApiResponse::ok(paginated)))
}

// --- GET /api/messages/with/:user_id ---

pub async fn get_conversation(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(partner_id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<Message>>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let pair_filter = messages::sender_id
        .eq(auth.id)
        .and(messages::receiver_id.eq(partner_id))
        .or(messages::sender_id.eq(partner_id).and(messages::receiver_id.eq(auth.id)));

    let total: i64 = messages::table
        .filter(pair_filter)
        .count()
        .get_result(&mut conn)?;

    let items: Vec<Message> = messages::table
        .filter(pair_filter)
        .order(messages::created_at.desc())
        .offset(params.offset() as i64)
        .limit(params.limit() as i64)
        .load(&mut conn)?;

    let paginated = Paginated::new(items, total as u64, &params);
    Ok(Json(ApiResponse::ok(paginated)))
}

// --- POST /api/messages/with/:user_id/read ---

#[derive(Debug, Serialize)]
pub struct MarkReadResponse {
    pub updated: usize,
}

pub async fn mark_conversation_read(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(partner_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<MarkReadResponse>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let updated = diesel::update(
        messages::table
            .filter(messages::sender_id.eq(partner_id))
            .filter(messages::receiver_id.eq(auth.id))
            .filter(messages::is_read.eq(false)),
    )
    .set(messages::is_read.eq(true))
    .execute(&mut conn)?;

    Ok(Json(ApiResponse::ok(MarkReadResponse { updated })))
}

// --- GET /api/messages/unread-count ---

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

pub async fn unread_count(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<UnreadCountResponse>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let count: i64 = messages::table
        .filter(messages::receiver_id.eq(auth.id))
        .filter(messages::is_read.eq(false))
        .count()
        .get_result(&mut conn)?;

    Ok(Json(ApiResponse::ok(UnreadCountResponse { count })))
}
