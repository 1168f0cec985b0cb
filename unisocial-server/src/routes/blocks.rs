use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use unisocial_shared::errors::{AppError, AppResult, ErrorCode};
use unisocial_shared::types::auth::AuthUser;
use unisocial_shared::types::ApiResponse;

use crate::models::{Block, NewBlock};
use crate::schema::{blocks, users};
use crate::AppState;

// --- POST /api/users/:id/block ---

#[derive(Debug, Deserialize, Default)]
pub struct BlockRequest {
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct BlockResponse {
    pub blocked_user: String,
}

pub async fn block_user(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(target_id): Path<Uuid>,
    body: Option<Json<BlockRequest>>,
) -> AppResult<Json<ApiResponse<BlockResponse>>> {
    if auth.id == target_id {
        return Err(AppError::new(ErrorCode::SelfBlockNotAllowed, "you cannot block yourself"));
    }

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let target_username: String = users::table
        .find(target_id)
        .select(users::username)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))?;

    let expires_at = body.map(|Json(b)| b.expires_at).unwrap_or(None);

    // Idempotent: already-blocked is success, not a conflict. The unique
    // (blocker, blocked) index turns a concurrent duplicate into a no-op.
    diesel::insert_into(blocks::table)
        .values(&NewBlock {
            blocker_id: auth.id,
            blocked_id: target_id,
            expires_at,
        })
        .on_conflict_do_nothing()
        .execute(&mut conn)?;

    tracing::info!(blocker_id = %auth.id, blocked_id = %target_id, "user blocked");

    Ok(Json(ApiResponse::ok(BlockResponse {
        blocked_user: target_username,
    })))
}

// --- DELETE /api/users/:id/block ---

#[derive(Debug, Serialize)]
pub struct UnblockResponse {
    pub removed: bool,
}

pub async fn unblock_user(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(target_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<UnblockResponse>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let removed = diesel::delete(
        blocks::table
            .filter(blocks::blocker_id.eq(auth.id))
            .filter(blocks::blocked_id.eq(target_id)),
    )
    .execute(&mut conn)?;

    if removed > 0 {
        tracing::info!(blocker_id = %auth.id, blocked_id = %target_id, "user unblocked");
    }

    Ok(Json(ApiResponse::ok(UnblockResponse { removed: removed > 0 })))
}

// --- GET /api/users/me/blocked ---

#[derive(Debug, Serialize)]
pub struct BlockedEntry {
    pub user_id: Uuid,
    pub username: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub async fn list_blocked(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<BlockedEntry>>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let rows: Vec<Block> = blocks::table
        .filter(blocks::blocker_id.eq(auth.id))
        .order(blocks::created_at.desc())
        .load(&mut conn)?;

    let mut entries = Vec::with_capacity(rows.len());
    for block in rows {
        let username: String = users::table
            .find(block.blocked_id)
            .select(users::username)
            .first(&mut conn)
            .unwrap_or_else(|_| "deleted user".to_string());

        entries.push(BlockedEntry {
            user_id: block.blocked_id,
            username,
            expires_at: block.expires_at,
            created_at: block.created_at,
        });
    }

    Ok(Json(ApiResponse::ok(entries)))
}
