use chrono::{Duration, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use unisocial_shared::clients::db::DbPool;
use unisocial_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::{NewNotification, Notification};
use crate::schema::notifications;

fn get_conn(pool: &DbPool) -> AppResult<diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<PgConnection>>> {
    pool.get().map_err(|e| {
        tracing::error!(error = %e, "failed to get db connection");
        AppError::internal("database connection error")
    })
}

/// Insert a notification for `user_id` about an action performed by
/// `actor_id`. Callers are responsible for filtering out self-notification
/// (`actor_id == user_id`) and for honoring the recipient's preferences;
/// this function writes unconditionally.
pub fn notify(
    pool: &DbPool,
    user_id: Uuid,
    actor_id: Uuid,
    notification_type: &str,
    reference_id: Option<Uuid>,
    content: &str,
) -> AppResult<Notification> {
    let mut conn = get_conn(pool)?;

    let new_notification = NewNotification {
        user_id,
        actor_id,
        notification_type: notification_type.to_string(),
        reference_id,
        content: content.to_string(),
    };

    let notification = diesel::insert_into(notifications::table)
        .values(&new_notification)
        .get_result::<Notification>(&mut conn)?;

    tracing::debug!(
        notification_id = %notification.id,
        user_id = %user_id,
        actor_id = %actor_id,
        notification_type = %notification_type,
        "notification created"
    );

    Ok(notification)
}

/// List notifications for a user, newest first, with pagination.
pub fn list_notifications(
    pool: &DbPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> AppResult<(Vec<Notification>, i64)> {
    let mut conn = get_conn(pool)?;

    let total: i64 = notifications::table
        .filter(notifications::user_id.eq(user_id))
        .count()
        .get_result(&mut conn)?;

    let items = notifications::table
        .filter(notifications::user_id.eq(user_id))
        .order(notifications::created_at.desc())
        .limit(limit)
        .offset(offset)
        .load::<Notification>(&mut conn)?;

    Ok((items, total))
}

pub fn count_unread(pool: &DbPool, user_id: Uuid) -> AppResult<i64> {
    let mut conn = get_conn(pool)?;

    let count: i64 = notifications::table
        .filter(notifications::user_id.eq(user_id))
        .filter(notifications::is_read.eq(false))
        .count()
        .get_result(&mut conn)?;

    Ok(count)
}

/// Mark all unread notifications as read. A single UPDATE statement, so a
/// concurrent unread-count query sees either the old or the new count.
pub fn mark_all_read(pool: &DbPool, user_id: Uuid) -> AppResult<usize> {
    let mut conn = get_conn(pool)?;

    let updated = diesel::update(
        notifications::table
            .filter(notifications::user_id.eq(user_id))
            .filter(notifications::is_read.eq(false)),
    )
    .set(notifications::is_read.eq(true))
    .execute(&mut conn)?;

    Ok(updated)
}

/// Mark a single notification as read (only if it belongs to the user).
pub fn mark_read(pool: &DbPool, notification_id: Uuid, user_id: Uuid) -> AppResult<Notification> {
    let mut conn = get_conn(pool)?;

    let notification = diesel::update(
        notifications::table
            .filter(notifications::id.eq(notification_id))
            .filter(notifications::user_id.eq(user_id)),
    )
    .set(notifications::is_read.eq(true))
    .get_result::<Notification>(&mut conn)
    .map_err(|e| match e {
        diesel::result::Error::NotFound => {
            AppError::new(ErrorCode::NotificationNotFound, "notification not found")
        }
        other => AppError::Database(other),
    })?;

    Ok(notification)
}

/// Age-based housekeeping: delete notifications older than `retention_days`.
/// Best effort; no other component depends on it.
pub fn delete_older_than(pool: &DbPool, retention_days: i64) -> AppResult<usize> {
    let mut conn = get_conn(pool)?;
    let cutoff = Utc::now() - Duration::days(retention_days);

    let deleted = diesel::delete(
        notifications::table.filter(notifications::created_at.lt(cutoff)),
    )
    .execute(&mut conn)?;

    if deleted > 0 {
        tracing::info!(deleted, retention_days, "purged old notifications");
    }

    Ok(deleted)
}
