use axum::extract::{Path, Query, State};
use axum::Json;
use diesel::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use unisocial_shared::errors::{AppError, AppResult, ErrorCode};
use unisocial_shared::types::auth::AuthUser;
use unisocial_shared::types::pagination::{Paginated, PaginationParams};
use unisocial_shared::types::ApiResponse;

use crate::models::{NewFollow, PublicProfile, User};
use crate::routes::users::load_active_user;
use crate::schema::{follows, users};
use crate::services::{block_service, notification_service};
use crate::AppState;

// --- POST /api/users/:id/follow ---

#[derive(Debug, Serialize)]
pub struct FollowResponse {
    pub following: bool,
}

pub async fn follow_user(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(target_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<FollowResponse>>> {
    if auth.id == target_id {
        return Err(AppError::new(ErrorCode::CannotFollowSelf, "you cannot follow yourself"));
    }

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let target = load_active_user(&mut conn, target_id)?;
    block_service::ensure_unblocked(&mut conn, auth.id, target.id)?;

    // Idempotent: the unique (follower, followed) index absorbs repeats.
    let inserted = diesel::insert_into(follows::table)
        .values(&NewFollow {
            follower_id: auth.id,
            followed_id: target.id,
        })
        .on_conflict_do_nothing()
        .execute(&mut conn)?;

    if inserted > 0 && state.config.notifications_enabled && target.notify_on_follows {
        let actor_name: String = users::table
            .find(auth.id)
            .select(users::username)
            .first(&mut conn)
            .unwrap_or_else(|_| "someone".to_string());

        if let Err(e) = notification_service::notify(
            &state.db,
            target.id,
            auth.id,
            "follow",
            None,
            &format!("{actor_name} started following you"),
        ) {
            tracing::error!(error = %e, "failed to create follow notification");
        }
    }

    Ok(Json(ApiResponse::ok(FollowResponse { following: true })))
}

// --- DELETE /api/users/:id/follow ---

#[derive(Debug, Serialize)]
pub struct UnfollowResponse {
    pub removed: bool,
}

pub async fn unfollow_user(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(target_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<UnfollowResponse>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let removed = diesel::delete(
        follows::table
            .filter(follows::follower_id.eq(auth.id))
            .filter(follows::followed_id.eq(target_id)),
    )
    .execute(&mut conn)?;

    Ok(Json(ApiResponse::ok(UnfollowResponse { removed: removed > 0 })))
}

// --- GET /api/users/me/followers ---

pub async fn list_followers(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<PublicProfile>>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let total: i64 = follows::table
        .filter(follows::followed_id.eq(auth.id))
        .count()
        .get_result(&mut conn)?;

    let follower_ids: Vec<Uuid> = follows::table
        .filter(follows::followed_id.eq(auth.id))
        .order(follows::created_at.desc())
        .offset(params.offset() as i64)
        .limit(params.limit() as i64)
        .select(follows::follower_id)
        .load(&mut conn)?;

    let profiles = load_profiles_in_order(&mut conn, &follower_ids)?;
    let paginated = Paginated::new(profiles, total as u64, &params);
    Ok(Json(ApiResponse::ok(paginated)))
}

// --- GET /api/users/me/following ---

pub async fn list_following(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<PublicProfile>>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let total: i64 = follows::table
        .filter(follows::follower_id.eq(auth.id))
        .count()
        .get_result(&mut conn)?;

    let followed_ids: Vec<Uuid> = follows::table
        .filter(follows::follower_id.eq(auth.id))
        .order(follows::created_at.desc())
        .offset(params.offset() as i64)
        .limit(params.limit() as i64)
        .select(follows::followed_id)
        .load(&mut conn)?;

    let profiles = load_profiles_in_order(&mut conn, &followed_ids)?;
    let paginated = Paginated::new(profiles, total as u64, &params);
    Ok(Json(ApiResponse::ok(paginated)))
}

/// Load profiles for the given ids, preserving the input order.
fn load_profiles_in_order(
    conn: &mut PgConnection,
    ids: &[Uuid],
) -> AppResult<Vec<PublicProfile>> {
    let mut loaded: Vec<User> = users::table
        .filter(users::id.eq_any(ids))
        .load(conn)?;

    let order: std::collections::HashMap<Uuid, usize> =
        ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    loaded.sort_by_key(|u| order.get(&u.id).copied().unwrap_or(usize::MAX));

    Ok(loaded.into_iter().map(PublicProfile::from).collect())
}
