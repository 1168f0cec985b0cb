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

use crate::models::{Comment, NewComment, NewLike, NewPost, Post};
use crate::routes::users::{can_view_posts, load_active_user};
use crate::schema::{comments, likes, posts, users};
use crate::services::{block_service, notification_service};
use crate::AppState;

// --- POST /api/posts ---

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub content: String,
    pub image_url: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

pub async fn create_post(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePostRequest>,
) -> AppResult<Json<ApiResponse<Post>>> {
    if req.content.trim().is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, "post content cannot be empty"));
    }
    if req.latitude.is_some() != req.longitude.is_some() {
        return Err(AppError::new(
            ErrorCode::ValidationError,
            "latitude and longitude must be provided together",
        ));
    }

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let new_post = NewPost {
        user_id: auth.id,
        content: req.content,
        image_url: req.image_url,
        latitude: req.latitude,
        longitude: req.longitude,
    };

    let post: Post = diesel::insert_into(posts::table)
        .values(&new_post)
        .get_result(&mut conn)?;

    tracing::debug!(post_id = %post.id, user_id = %auth.id, "post created");

    Ok(Json(ApiResponse::ok(post)))
}

// --- GET /api/posts ---

pub async fn list_posts(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<Post>>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let hidden = block_service::blocked_counterparties(&mut conn, auth.id)?;

    let total: i64 = posts::table
        .filter(posts::user_id.ne_all(&hidden))
        .count()
        .get_result(&mut conn)?;

    let items: Vec<Post> = posts::table
        .filter(posts::user_id.ne_all(&hidden))
        .order(posts::created_at.desc())
        .offset(params.offset() as i64)
        .limit(params.limit() as i64)
        .load(&mut conn)?;

    let paginated = Paginated::new(items, total as u64, &params);
    Ok(Json(ApiResponse::ok(paginated)))
}

// --- GET /api/users/:id/posts ---

pub async fn list_user_posts(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<Post>>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let target = load_active_user(&mut conn, user_id)?;

    if !auth.owns_or_admin(target.id)
        && block_service::interaction_blocked(&mut conn, auth.id, target.id)?
    {
        return Err(AppError::new(ErrorCode::UserNotFound, "user not found"));
    }

    if !can_view_posts(&mut conn, &auth, &target)? {
        return Err(AppError::new(ErrorCode::ProfilePrivate, "this user's posts are not visible to you"));
    }

    let total: i64 = posts::table
        .filter(posts::user_id.eq(target.id))
        .count()
        .get_result(&mut conn)?;

    let items: Vec<Post> = posts::table
        .filter(posts::user_id.eq(target.id))
        .order(posts::created_at.desc())
        .offset(params.offset() as i64)
        .limit(params.limit() as i64)
        .load(&mut conn)?;

    let paginated = Paginated::new(items, total as u64, &params);
    Ok(Json(ApiResponse::ok(paginated)))
}

// --- DELETE /api/posts/:id ---

#[derive(Debug, Serialize)]
pub struct PostDeletedResponse {
    pub deleted: bool,
}

pub async fn delete_post(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<PostDeletedResponse>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let post: Post = posts::table
        .find(post_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::PostNotFound, "post not found"))?;

    if !auth.owns_or_admin(post.user_id) {
        return Err(AppError::new(ErrorCode::Forbidden, "you can only delete your own posts"));
    }

    // One transaction: the post and its dependents disappear together, so
    // no orphan comment or like rows can survive a partial failure.
    conn.transaction::<_, AppError, _>(|conn| {
        diesel::delete(comments::table.filter(comments::post_id.eq(post_id))).execute(conn)?;
        diesel::delete(likes::table.filter(likes::post_id.eq(post_id))).execute(conn)?;
        diesel::delete(posts::table.find(post_id)).execute(conn)?;
        Ok(())
    })?;

    tracing::info!(post_id = %post_id, deleted_by = %auth.id, "post deleted");

    Ok(Json(ApiResponse::ok(PostDeletedResponse { deleted: true })))
}

// --- POST /api/posts/:id/like ---

#[derive(Debug, Serialize)]
pub struct ToggleLikeResponse {
    pub liked: bool,
    pub like_count: i64,
}

/// Pure toggle: one call flips the state, two calls restore it. The unique
/// (user, post) index is the duplicate guard; concurrent toggles from the
/// same user can never leave two rows.
pub async fn toggle_like(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<ToggleLikeResponse>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let post: Post = posts::table
        .find(post_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::PostNotFound, "post not found"))?;

    if post.user_id != auth.id {
        block_service::ensure_unblocked(&mut conn, auth.id, post.user_id)?;
    }

    let (liked, like_count) = conn.transaction::<_, AppError, _>(|conn| {
        let deleted = diesel::delete(
            likes::table
                .filter(likes::user_id.eq(auth.id))
                .filter(likes::post_id.eq(post_id)),
        )
        .execute(conn)?;

        let liked = if deleted == 0 {
            diesel::insert_into(likes::table)
                .values(&NewLike { user_id: auth.id, post_id })
                .on_conflict_do_nothing()
                .execute(conn)?;
            true
        } else {
            false
        };

        let like_count: i64 = likes::table
            .filter(likes::post_id.eq(post_id))
            .count()
            .get_result(conn)?;

        Ok((liked, like_count))
    })?;

    // Only the like edge notifies; unliking is silent.
    if liked && post.user_id != auth.id && state.config.notifications_enabled {
        let owner_wants_it: bool = users::table
            .find(post.user_id)
            .select(users::notify_on_likes)
            .first(&mut conn)
            .unwrap_or(true);

        if owner_wants_it {
            let actor_name: String = users::table
                .find(auth.id)
                .select(users::username)
                .first(&mut conn)
                .unwrap_or_else(|_| "someone".to_string());

            if let Err(e) = notification_service::notify(
                &state.db,
                post.user_id,
                auth.id,
                "like",
                Some(post_id),
                &format!("{actor_name} liked your post"),
            ) {
                tracing::error!(error = %e, post_id = %post_id, "failed to create like notification");
            }
        }
    }

    Ok(Json(ApiResponse::ok(ToggleLikeResponse { liked, like_count })))
}

// --- POST /api/posts/:id/comments ---

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
}

pub async fn create_comment(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<Uuid>,
    Json(req): Json<CreateCommentRequest>,
) -> AppResult<Json<ApiResponse<Comment>>> {
    if !state.config.comments_enabled {
        return Err(AppError::new(ErrorCode::FeatureDisabled, "comments are disabled"));
    }
    if req.content.trim().is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, "comment content cannot be empty"));
    }

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let post: Post = posts::table
        .find(post_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::PostNotFound, "post not found"))?;

    if post.user_id != auth.id {
        block_service::ensure_unblocked(&mut conn, auth.id, post.user_id)?;
    }

    let new_comment = NewComment {
        post_id,
        user_id: auth.id,
        content: req.content,
    };

    let comment: Comment = diesel::insert_into(comments::table)
        .values(&new_comment)
        .get_result(&mut conn)?;

    if post.user_id != auth.id && state.config.notifications_enabled {
        let owner_wants_it: bool = users::table
            .find(post.user_id)
            .select(users::notify_on_comments)
            .first(&mut conn)
            .unwrap_or(true);

        if owner_wants_it {
            let actor_name: String = users::table
                .find(auth.id)
                .select(users::username)
                .first(&mut conn)
                .unwrap_or_else(|_| "someone".to_string());

            if let Err(e) = notification_service::notify(
                &state.db,
                post.user_id,
                auth.id,
                "comment",
                Some(post_id),
                &format!("{actor_name} commented on your post"),
            ) {
                tracing::error!(error = %e, post_id = %post_id, "failed to create comment notification");
            }
        }
    }

    Ok(Json(ApiResponse::ok(comment)))
}

// --- GET /api/posts/:id/comments ---

pub async fn list_comments(
    _auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(post_id): Path<Uuid>,
    Query(params): Query<PaginationParams>,
) -> AppResult<Json<ApiResponse<Paginated<Comment>>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let post_exists: bool = posts::table
        .find(post_id)
        .count()
        .get_result::<i64>(&mut conn)
        .map(|c| c > 0)
        .unwrap_or(false);

    if !post_exists {
        return Err(AppError::new(ErrorCode::PostNotFound, "post not found"));
    }

    let total: i64 = comments::table
        .filter(comments::post_id.eq(post_id))
        .count()
        .get_result(&mut conn)?;

    let items: Vec<Comment> = comments::table
        .filter(comments::post_id.eq(post_id))
        .order(comments::created_at.asc())
        .offset(params.offset() as i64)
        .limit(params.limit() as i64)
        .load(&mut conn)?;

    let paginated = Paginated::new(items, total as u64, &params);
    Ok(Json(ApiResponse::ok(paginated)))
}

// --- DELETE /api/comments/:id ---

#[derive(Debug, Serialize)]
pub struct CommentDeletedResponse {
    pub deleted: bool,
}

pub async fn delete_comment(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(comment_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<CommentDeletedResponse>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let comment: Comment = comments::table
        .find(comment_id)
        .first(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::CommentNotFound, "comment not found"))?;

    // The comment author, the post owner, or an admin may remove it.
    let post_owner: Uuid = posts::table
        .find(comment.post_id)
        .select(posts::user_id)
        .first(&mut conn)?;

    if !auth.owns_or_admin(comment.user_id) && auth.id != post_owner {
        return Err(AppError::new(ErrorCode::Forbidden, "you cannot delete this comment"));
    }

    diesel::delete(comments::table.find(comment_id)).execute(&mut conn)?;

    Ok(Json(ApiResponse::ok(CommentDeletedResponse { deleted: true })))
}
