use axum::extract::{Path, Query, State};
use axum::Json;
use diesel::prelude::*;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use unisocial_shared::errors::{AppError, AppResult, ErrorCode};
use unisocial_shared::types::auth::{AuthUser, UserRole};
use unisocial_shared::types::pagination::{Paginated, PaginationParams};
use unisocial_shared::types::ApiResponse;

use crate::models::{PublicProfile, User};
use crate::schema::{follows, users};
use crate::services::block_service;
use crate::AppState;

// --- GET /api/users/:id ---

pub async fn get_user(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<PublicProfile>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let user: User = users::table
        .find(user_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))?;

    let is_owner_or_admin = auth.owns_or_admin(user.id);

    if !user.is_active && !is_owner_or_admin {
        return Err(AppError::new(ErrorCode::UserNotFound, "user not found"));
    }

    // A blocked counterparty sees nothing; indistinguishable from absence.
    if !is_owner_or_admin && block_service::interaction_blocked(&mut conn, auth.id, user.id)? {
        return Err(AppError::new(ErrorCode::UserNotFound, "user not found"));
    }

    if !is_owner_or_admin {
        match user.profile_visibility.as_str() {
            "private" => {
                return Err(AppError::new(ErrorCode::ProfilePrivate, "this profile is private"));
            }
            "followers" => {
                let follows_them: bool = follows::table
                    .filter(follows::follower_id.eq(auth.id))
                    .filter(follows::followed_id.eq(user.id))
                    .count()
                    .get_result::<i64>(&mut conn)
                    .map(|c| c > 0)
                    .unwrap_or(false);

                if !follows_them {
                    return Err(AppError::new(
                        ErrorCode::ProfilePrivate,
                        "this profile is only visible to followers",
                    ));
                }
            }
            _ => {}
        }
    }

    Ok(Json(ApiResponse::ok(PublicProfile::from(user))))
}

// --- GET /api/users/search ---

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default)]
    pub page: Option<u64>,
    #[serde(default)]
    pub per_page: Option<u64>,
}

pub async fn search_users(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<ApiResponse<Paginated<PublicProfile>>>> {
    if !state.config.search_enabled {
        return Err(AppError::new(ErrorCode::FeatureDisabled, "search is disabled"));
    }

    let query = params.q.trim();
    if query.is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, "search query is required"));
    }

    let pagination = PaginationParams {
        page: params.page.unwrap_or(1),
        per_page: params.per_page.unwrap_or(20),
    };

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let hidden = block_service::blocked_counterparties(&mut conn, auth.id)?;
    let pattern = format!("%{}%", query.replace('%', "\\%").replace('_', "\\_"));

    let total: i64 = users::table
        .filter(users::username.ilike(&pattern))
        .filter(users::is_active.eq(true))
        .filter(users::id.ne_all(&hidden))
        .filter(users::profile_visibility.ne("private"))
        .count()
        .get_result(&mut conn)?;

    let matches: Vec<User> = users::table
        .filter(users::username.ilike(&pattern))
        .filter(users::is_active.eq(true))
        .filter(users::id.ne_all(&hidden))
        .filter(users::profile_visibility.ne("private"))
        .order(users::username.asc())
        .offset(pagination.offset() as i64)
        .limit(pagination.limit() as i64)
        .load(&mut conn)?;

    let profiles: Vec<PublicProfile> = matches.into_iter().map(PublicProfile::from).collect();
    let paginated = Paginated::new(profiles, total as u64, &pagination);

    Ok(Json(ApiResponse::ok(paginated)))
}

// --- Shared lookup helpers ---

/// Load an active user or fail with UserNotFound.
pub fn load_active_user(conn: &mut PgConnection, user_id: Uuid) -> AppResult<User> {
    let user: User = users::table
        .find(user_id)
        .first(conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))?;

    if !user.is_active {
        return Err(AppError::new(ErrorCode::UserNotFound, "user not found"));
    }

    Ok(user)
}

/// True when `viewer` may see `target`'s posts under its visibility setting.
pub fn can_view_posts(
    conn: &mut PgConnection,
    viewer: &AuthUser,
    target: &User,
) -> AppResult<bool> {
    if viewer.owns_or_admin(target.id) || viewer.role == UserRole::Moderator {
        return Ok(true);
    }

    match target.profile_visibility.as_str() {
        "private" => Ok(false),
        "followers" => {
            let follows_them: bool = follows::table
                .filter(follows::follower_id.eq(viewer.id))
                .filter(follows::followed_id.eq(target.id))
                .count()
                .get_result::<i64>(conn)
                .map(|c| c > 0)
                .unwrap_or(false);
            Ok(follows_them)
        }
        _ => Ok(true),
    }
}
