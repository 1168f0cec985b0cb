use axum::extract::State;
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use std::sync::Arc;

use unisocial_shared::errors::{AppError, AppResult, ErrorCode};
use unisocial_shared::types::auth::AuthUser;
use unisocial_shared::types::ApiResponse;

use crate::models::{UpdateProfile, User};
use crate::schema::users;
use crate::AppState;

// --- GET /api/users/me ---

pub async fn get_own_profile(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<User>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let user = users::table
        .find(auth.id)
        .first::<User>(&mut conn)
        .map_err(|_| AppError::new(ErrorCode::UserNotFound, "user not found"))?;

    Ok(Json(ApiResponse::ok(user)))
}

// --- PATCH /api/users/me ---

pub async fn update_own_profile(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<UpdateProfile>,
) -> AppResult<Json<ApiResponse<User>>> {
    if let Some(ref visibility) = payload.profile_visibility {
        if !["public", "followers", "private"].contains(&visibility.as_str()) {
            return Err(AppError::new(
                ErrorCode::ValidationError,
                "profile_visibility must be 'public', 'followers', or 'private'",
            ));
        }
    }

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let updated = diesel::update(users::table.find(auth.id))
        .set((&payload, users::updated_at.eq(Utc::now())))
        .get_result::<User>(&mut conn)
        .map_err(|e| match e {
            diesel::result::Error::NotFound => {
                AppError::new(ErrorCode::UserNotFound, "user not found")
            }
            other => AppError::Database(other),
        })?;

    tracing::debug!(user_id = %auth.id, "profile updated");

    Ok(Json(ApiResponse::ok(updated)))
}
