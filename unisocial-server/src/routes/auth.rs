use axum::extract::State;
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use validator::Validate;

use unisocial_shared::errors::{AppError, AppResult, ErrorCode};
use unisocial_shared::types::auth::{AuthUser, TokenPair, UserRole};
use unisocial_shared::types::ApiResponse;

use crate::models::{NewRefreshToken, NewUser, RefreshToken, User};
use crate::schema::{refresh_tokens, users};
use crate::services::{auth_service, token_service};
use crate::AppState;

// --- POST /api/auth/register ---

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    pub username: String,
    #[validate(email(message = "invalid email format"))]
    pub email: String,
    pub password: String,
    pub age: Option<i32>,
    pub bio: Option<String>,
    pub interests: Option<Vec<String>>,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Json<ApiResponse<TokenPair>>> {
    if !state.config.registration_enabled {
        return Err(AppError::new(ErrorCode::FeatureDisabled, "registration is disabled"));
    }

    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;

    auth_service::validate_username(&req.username)?;
    auth_service::validate_password(&req.password)?;

    let password_hash = auth_service::hash_password(&req.password)?;
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let username_taken: bool = users::table
        .filter(users::username.eq(&req.username))
        .count()
        .get_result::<i64>(&mut conn)
        .map(|c| c > 0)
        .unwrap_or(false);

    if username_taken {
        return Err(AppError::new(ErrorCode::UsernameTaken, "username is already taken"));
    }

    let email_taken: bool = users::table
        .filter(users::email.eq(req.email.to_lowercase()))
        .count()
        .get_result::<i64>(&mut conn)
        .map(|c| c > 0)
        .unwrap_or(false);

    if email_taken {
        return Err(AppError::new(ErrorCode::EmailAlreadyExists, "email already registered"));
    }

    let interests = req
        .interests
        .map(|i| serde_json::to_value(i))
        .transpose()
        .map_err(|e| AppError::internal(e.to_string()))?;

    let new_user = NewUser {
        username: req.username,
        email: req.email.to_lowercase(),
        password_hash,
        bio: req.bio,
        interests,
        age: req.age,
    };

    // The unique indexes are the authoritative duplicate guard; the
    // pre-checks above only produce friendlier messages.
    let user: User = diesel::insert_into(users::table)
        .values(&new_user)
        .get_result(&mut conn)
        .map_err(|e| match e {
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => AppError::new(ErrorCode::UsernameTaken, "username or email is already taken"),
            other => AppError::Database(other),
        })?;

    let (token_pair, refresh_hash) = token_service::create_token_pair(
        user.id,
        UserRole::User,
        &state.config.jwt_secret,
        state.config.jwt_access_ttl,
    )?;

    let new_rt = NewRefreshToken {
        user_id: user.id,
        token_hash: refresh_hash,
        expires_at: Utc::now() + chrono::Duration::seconds(state.config.jwt_refresh_ttl),
    };
    diesel::insert_into(refresh_tokens::table)
        .values(&new_rt)
        .execute(&mut conn)?;

    tracing::info!(user_id = %user.id, username = %user.username, "user registered");

    Ok(Json(ApiResponse::ok(token_pair)))
}

// --- POST /api/auth/login ---

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<TokenPair>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let user: User = users::table
        .filter(users::username.eq(&req.username))
        .first(&mut conn)
        .map_err(|_| AppError::new(ErrorCode::InvalidCredentials, "invalid username or password"))?;

    if !user.is_active {
        return Err(AppError::new(ErrorCode::AccountDeactivated, "account is deactivated"));
    }

    // Account-level block: reject while active, clear lazily once lapsed.
    if user.is_blocked {
        if let Some(blocked_until) = user.blocked_until {
            if blocked_until > Utc::now() {
                return Err(AppError::new(
                    ErrorCode::AccountBlocked,
                    format!("account blocked until {}", blocked_until.format("%Y-%m-%d %H:%M UTC")),
                ));
            }
            diesel::update(users::table.find(user.id))
                .set((
                    users::is_blocked.eq(false),
                    users::blocked_until.eq(None::<chrono::DateTime<Utc>>),
                ))
                .execute(&mut conn)?;
        } else {
            return Err(AppError::new(ErrorCode::AccountBlocked, "account permanently blocked"));
        }
    }

    let valid = auth_service::verify_password(&req.password, &user.password_hash)?;
    if !valid {
        return Err(AppError::new(ErrorCode::InvalidCredentials, "invalid username or password"));
    }

    let role = user.role.parse::<UserRole>().unwrap_or(UserRole::User);

    let (token_pair, refresh_hash) = token_service::create_token_pair(
        user.id,
        role,
        &state.config.jwt_secret,
        state.config.jwt_access_ttl,
    )?;

    let new_rt = NewRefreshToken {
        user_id: user.id,
        token_hash: refresh_hash,
        expires_at: Utc::now() + chrono::Duration::seconds(state.config.jwt_refresh_ttl),
    };
    diesel::insert_into(refresh_tokens::table)
        .values(&new_rt)
        .execute(&mut conn)?;

    diesel::update(users::table.find(user.id))
        .set((users::is_online.eq(true), users::last_seen_at.eq(Utc::now())))
        .execute(&mut conn)?;

    tracing::info!(user_id = %user.id, "user logged in");

    Ok(Json(ApiResponse::ok(token_pair)))
}

// --- POST /api/auth/refresh ---

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> AppResult<Json<ApiResponse<TokenPair>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let token_hash = token_service::hash_token(&req.refresh_token);

    let stored: RefreshToken = refresh_tokens::table
        .filter(refresh_tokens::token_hash.eq(&token_hash))
        .first(&mut conn)
        .map_err(|_| AppError::new(ErrorCode::TokenInvalid, "unknown refresh token"))?;

    if stored.revoked_at.is_some() {
        return Err(AppError::new(ErrorCode::RefreshTokenRevoked, "refresh token has been revoked"));
    }
    if stored.expires_at < Utc::now() {
        return Err(AppError::new(ErrorCode::TokenExpired, "refresh token has expired"));
    }

    let user: User = users::table
        .find(stored.user_id)
        .first(&mut conn)
        .map_err(|_| AppError::new(ErrorCode::TokenInvalid, "unknown refresh token"))?;

    let role = user.role.parse::<UserRole>().unwrap_or(UserRole::User);

    // Rotate: revoke the presented token before issuing a replacement.
    diesel::update(refresh_tokens::table.find(stored.id))
        .set(refresh_tokens::revoked_at.eq(Utc::now()))
        .execute(&mut conn)?;

    let (token_pair, refresh_hash) = token_service::create_token_pair(
        user.id,
        role,
        &state.config.jwt_secret,
        state.config.jwt_access_ttl,
    )?;

    let new_rt = NewRefreshToken {
        user_id: user.id,
        token_hash: refresh_hash,
        expires_at: Utc::now() + chrono::Duration::seconds(state.config.jwt_refresh_ttl),
    };
    diesel::insert_into(refresh_tokens::table)
        .values(&new_rt)
        .execute(&mut conn)?;

    Ok(Json(ApiResponse::ok(token_pair)))
}

// --- POST /api/auth/logout ---

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub logged_out: bool,
}

pub async fn logout(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<LogoutRequest>,
) -> AppResult<Json<ApiResponse<LogoutResponse>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    if let Some(refresh_token) = req.refresh_token {
        let token_hash = token_service::hash_token(&refresh_token);
        diesel::update(
            refresh_tokens::table
                .filter(refresh_tokens::user_id.eq(auth.id))
                .filter(refresh_tokens::token_hash.eq(token_hash))
                .filter(refresh_tokens::revoked_at.is_null()),
        )
        .set(refresh_tokens::revoked_at.eq(Utc::now()))
        .execute(&mut conn)?;
    }

    diesel::update(users::table.find(auth.id))
        .set((users::is_online.eq(false), users::last_seen_at.eq(Utc::now())))
        .execute(&mut conn)?;

    tracing::info!(user_id = %auth.id, "user logged out");

    Ok(Json(ApiResponse::ok(LogoutResponse { logged_out: true })))
}

// --- GET /api/auth/me ---

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: uuid::Uuid,
    pub role: UserRole,
}

pub async fn me(auth: AuthUser) -> AppResult<Json<ApiResponse<MeResponse>>> {
    Ok(Json(ApiResponse::ok(MeResponse {
        id: auth.id,
        role: auth.role,
    })))
}
