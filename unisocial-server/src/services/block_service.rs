use chrono::Utc;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

use unisocial_shared::clients::db::DbPool;
use unisocial_shared::errors::{AppError, AppResult, ErrorCode};

use crate::models::Block;
use crate::schema::{blocks, users};
use crate::services::notification_service;

/// True if an unexpired block exists between the pair in either direction.
/// Mutual suppression: a user blocked by X can neither message nor comment
/// in a context visible to X, and vice versa.
pub fn interaction_blocked(conn: &mut PgConnection, a: Uuid, b: Uuid) -> AppResult<bool> {
    let now = Utc::now();

    let count: i64 = blocks::table
        .filter(
            blocks::blocker_id.eq(a).and(blocks::blocked_id.eq(b))
                .or(blocks::blocker_id.eq(b).and(blocks::blocked_id.eq(a))),
        )
        .filter(blocks::expires_at.is_null().or(blocks::expires_at.gt(now)))
        .count()
        .get_result(conn)?;

    Ok(count > 0)
}

/// Guard used by content, follow, and messaging paths before any write.
pub fn ensure_unblocked(conn: &mut PgConnection, a: Uuid, b: Uuid) -> AppResult<()> {
    if interaction_blocked(conn, a, b)? {
        return Err(AppError::new(
            ErrorCode::InteractionBlocked,
            "interactions between these users are blocked",
        ));
    }
    Ok(())
}

/// All counterparties with an active block in either direction relative to
/// `user_id`. Used to filter feeds and search results.
pub fn blocked_counterparties(conn: &mut PgConnection, user_id: Uuid) -> AppResult<Vec<Uuid>> {
    let now = Utc::now();

    let rows: Vec<(Uuid, Uuid)> = blocks::table
        .filter(blocks::blocker_id.eq(user_id).or(blocks::blocked_id.eq(user_id)))
        .filter(blocks::expires_at.is_null().or(blocks::expires_at.gt(now)))
        .select((blocks::blocker_id, blocks::blocked_id))
        .load(conn)?;

    let mut ids: Vec<Uuid> = rows
        .into_iter()
        .map(|(blocker, blocked)| if blocker == user_id { blocked } else { blocker })
        .collect();
    ids.sort();
    ids.dedup();
    Ok(ids)
}

/// A removed expired block plus the contact details the caller needs to
/// send the best-effort unblock email.
#[derive(Debug)]
pub struct ExpiredBlockNotice {
    pub block: Block,
    pub blocked_email: Option<String>,
    pub blocker_username: String,
}

/// Delete user-to-user blocks whose expiry has passed and notify each
/// affected user once. The deleted rows are the notification source, so a
/// rerun scans an empty set and can never notify the same unblock twice.
/// Email dispatch is left to the async caller; diesel code cannot await
/// the HTTP client.
pub fn cleanup_expired_blocks(
    pool: &DbPool,
    notifications_enabled: bool,
) -> AppResult<Vec<ExpiredBlockNotice>> {
    let mut conn = pool.get().map_err(|e| {
        tracing::error!(error = %e, "failed to get db connection");
        AppError::internal("database connection error")
    })?;

    let now = Utc::now();

    let expired: Vec<Block> = conn.transaction(|conn| {
        let expired: Vec<Block> = blocks::table
            .filter(blocks::expires_at.is_not_null())
            .filter(blocks::expires_at.le(now))
            .load(conn)?;

        if !expired.is_empty() {
            let ids: Vec<Uuid> = expired.iter().map(|b| b.id).collect();
            diesel::delete(blocks::table.filter(blocks::id.eq_any(&ids))).execute(conn)?;
        }

        diesel::QueryResult::Ok(expired)
    })?;

    let mut notified = Vec::with_capacity(expired.len());
    for block in expired {
        let (blocked_email, blocker_username): (Option<String>, String) = {
            let blocked_email = users::table
                .find(block.blocked_id)
                .select(users::email)
                .first::<String>(&mut conn)
                .optional()?;
            let blocker_username = users::table
                .find(block.blocker_id)
                .select(users::username)
                .first::<String>(&mut conn)
                .optional()?
                .unwrap_or_else(|| "a user".to_string());
            (blocked_email, blocker_username)
        };

        if notifications_enabled {
            if let Err(e) = notification_service::notify(
                pool,
                block.blocked_id,
                block.blocker_id,
                "unblock",
                Some(block.id),
                &format!("The block placed by {blocker_username} has expired"),
            ) {
                tracing::error!(error = %e, block_id = %block.id, "failed to create unblock notification");
            }
        }

        tracing::info!(
            block_id = %block.id,
            blocker_id = %block.blocker_id,
            blocked_id = %block.blocked_id,
            "expired block removed"
        );

        notified.push(ExpiredBlockNotice { block, blocked_email, blocker_username });
    }

    Ok(notified)
}

/// Clear lapsed account-level blocks (the site-wide `is_blocked` flag set by
/// admin action), mirroring the lazy clearing the login path performs.
pub fn clear_lapsed_account_blocks(pool: &DbPool) -> AppResult<usize> {
    let mut conn = pool.get().map_err(|e| {
        tracing::error!(error = %e, "failed to get db connection");
        AppError::internal("database connection error")
    })?;

    let now = Utc::now();
    let cleared = diesel::update(
        users::table
            .filter(users::is_blocked.eq(true))
            .filter(users::blocked_until.is_not_null())
            .filter(users::blocked_until.le(now)),
    )
    .set((
        users::is_blocked.eq(false),
        users::blocked_until.eq(None::<chrono::DateTime<Utc>>),
    ))
    .execute(&mut conn)?;

    if cleared > 0 {
        tracing::info!(cleared, "lapsed account blocks cleared");
    }

    Ok(cleared)
}
