use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use unisocial_shared::errors::{AppError, AppResult, ErrorCode};
use unisocial_shared::middleware::AdminUser;
use unisocial_shared::types::pagination::{Paginated, PaginationParams};
use unisocial_shared::types::ApiResponse;

use crate::models::{
    Report, ReportTarget, REPORT_STATUS_PENDING, REPORT_STATUS_RESOLVED, REPORT_STATUS_REVIEWED,
};
use crate::schema::{comments, likes, messages, posts, reports, users};
use crate::services::notification_service;
use crate::AppState;

// --- Request / Response types ---

#[derive(Debug, Deserialize)]
pub struct ReportFilterParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
    pub status: Option<String>,
}

fn default_page() -> u64 { 1 }
fn default_per_page() -> u64 { 20 }

impl ReportFilterParams {
    fn pagination(&self) -> PaginationParams {
        PaginationParams {
            page: self.page,
            per_page: self.per_page,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ResolveReportRequest {
    pub action: String,
    pub notes: Option<String>,
    pub block_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Default)]
pub struct AccountBlockRequest {
    pub until: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub pending_reports: i64,
    pub blocked_accounts: i64,
    pub reports_today: i64,
}

const RESOLVE_ACTIONS: [&str; 4] = ["dismissed", "warned", "content_removed", "user_blocked"];

// --- GET /api/admin/reports ---

pub async fn list_reports(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReportFilterParams>,
) -> AppResult<Json<ApiResponse<Paginated<Report>>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let pagination = params.pagination();
    let offset = pagination.offset() as i64;
    let limit = pagination.limit() as i64;

    let (items, total): (Vec<Report>, i64) = if let Some(ref status) = params.status {
        let items = reports::table
            .filter(reports::status.eq(status))
            .order(reports::created_at.desc())
            .offset(offset)
            .limit(limit)
            .load::<Report>(&mut conn)?;

        let total: i64 = reports::table
            .filter(reports::status.eq(status))
            .count()
            .get_result(&mut conn)?;

        (items, total)
    } else {
        let items = reports::table
            .order(reports::created_at.desc())
            .offset(offset)
            .limit(limit)
            .load::<Report>(&mut conn)?;

        let total: i64 = reports::table.count().get_result(&mut conn)?;

        (items, total)
    };

    let paginated = Paginated::new(items, total as u64, &pagination);
    Ok(Json(ApiResponse::ok(paginated)))
}

// --- GET /api/admin/reports/:id ---

pub async fn get_report(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(report_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Report>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let report = reports::table
        .find(report_id)
        .first::<Report>(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::ReportNotFound, "report not found"))?;

    Ok(Json(ApiResponse::ok(report)))
}

// --- PUT /api/admin/reports/:id/review ---

pub async fn review_report(
    admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(report_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Report>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let report = reports::table
        .find(report_id)
        .first::<Report>(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::ReportNotFound, "report not found"))?;

    if report.status != REPORT_STATUS_PENDING {
        return Err(AppError::new(
            ErrorCode::ReportAlreadyResolved,
            "only pending reports can be moved to review",
        ));
    }

    let updated: Report = diesel::update(reports::table.find(report_id))
        .set(reports::status.eq(REPORT_STATUS_REVIEWED))
        .get_result(&mut conn)?;

    tracing::info!(report_id = %report_id, admin_id = %admin.0.id, "report under review");

    Ok(Json(ApiResponse::ok(updated)))
}

// --- PUT /api/admin/reports/:id/resolve ---

pub async fn resolve_report(
    admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(report_id): Path<Uuid>,
    Json(body): Json<ResolveReportRequest>,
) -> AppResult<Json<ApiResponse<Report>>> {
    if !RESOLVE_ACTIONS.contains(&body.action.as_str()) {
        return Err(AppError::new(
            ErrorCode::ValidationError,
            format!(
                "invalid action '{}'; must be one of: {}",
                body.action,
                RESOLVE_ACTIONS.join(", ")
            ),
        ));
    }

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let report = reports::table
        .find(report_id)
        .first::<Report>(&mut conn)
        .optional()?
        .ok_or_else(|| AppError::new(ErrorCode::ReportNotFound, "report not found"))?;

    if report.status == REPORT_STATUS_RESOLVED {
        return Err(AppError::new(
            ErrorCode::ReportAlreadyResolved,
            "this report has already been resolved",
        ));
    }

    let updated: Report = conn.transaction::<_, AppError, _>(|conn| {
        let updated: Report = diesel::update(reports::table.find(report_id))
            .set((
                reports::status.eq(REPORT_STATUS_RESOLVED),
                reports::admin_action.eq(&body.action),
                reports::admin_notes.eq(&body.notes),
                reports::resolved_by.eq(admin.0.id),
                reports::resolved_at.eq(Utc::now()),
            ))
            .get_result(conn)?;

        match body.action.as_str() {
            "content_removed" => remove_reported_content(conn, &updated)?,
            "user_blocked" => {
                if let Some(user_id) = affected_user(conn, &updated)? {
                    diesel::update(users::table.find(user_id))
                        .set((
                            users::is_blocked.eq(true),
                            users::blocked_until.eq(body.block_until),
                        ))
                        .execute(conn)?;
                }
            }
            _ => {}
        }

        Ok(updated)
    })?;

    if state.config.notifications_enabled {
        if let Err(e) = notification_service::notify(
            &state.db,
            updated.reporter_id,
            admin.0.id,
            "admin_action",
            Some(updated.id),
            &format!("Your report was resolved: {}", body.action),
        ) {
            tracing::error!(error = %e, report_id = %report_id, "failed to notify reporter");
        }
    }

    tracing::info!(
        report_id = %report_id,
        admin_id = %admin.0.id,
        action = %body.action,
        "report resolved"
    );

    Ok(Json(ApiResponse::ok(updated)))
}

/// Delete the reported post or comment. User and message targets have no
/// content row to remove.
fn remove_reported_content(conn: &mut PgConnection, report: &Report) -> AppResult<()> {
    match report.target_type.parse::<ReportTarget>() {
        Ok(ReportTarget::Post) => {
            diesel::delete(comments::table.filter(comments::post_id.eq(report.target_id)))
                .execute(conn)?;
            diesel::delete(likes::table.filter(likes::post_id.eq(report.target_id)))
                .execute(conn)?;
            diesel::delete(posts::table.find(report.target_id)).execute(conn)?;
        }
        Ok(ReportTarget::Comment) => {
            diesel::delete(comments::table.find(report.target_id)).execute(conn)?;
        }
        _ => {}
    }
    Ok(())
}

/// The user an account-level action applies to, resolved from the report
/// target: the user itself, or the author/sender of the reported content.
fn affected_user(conn: &mut PgConnection, report: &Report) -> AppResult<Option<Uuid>> {
    let user = match report.target_type.parse::<ReportTarget>() {
        Ok(ReportTarget::User) => Some(report.target_id),
        Ok(ReportTarget::Post) => posts::table
            .find(report.target_id)
            .select(posts::user_id)
            .first(conn)
            .optional()?,
        Ok(ReportTarget::Comment) => comments::table
            .find(report.target_id)
            .select(comments::user_id)
            .first(conn)
            .optional()?,
        Ok(ReportTarget::Message) => messages::table
            .find(report.target_id)
            .select(messages::sender_id)
            .first(conn)
            .optional()?,
        Err(_) => None,
    };
    Ok(user)
}

// --- PUT /api/admin/users/:id/block ---

#[derive(Debug, Serialize)]
pub struct AccountBlockResponse {
    pub user_id: Uuid,
    pub is_blocked: bool,
    pub blocked_until: Option<DateTime<Utc>>,
}

pub async fn block_account(
    admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
    body: Option<Json<AccountBlockRequest>>,
) -> AppResult<Json<ApiResponse<AccountBlockResponse>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let until = body.map(|Json(b)| b.until).unwrap_or(None);

    let updated = diesel::update(users::table.find(user_id))
        .set((users::is_blocked.eq(true), users::blocked_until.eq(until)))
        .execute(&mut conn)?;

    if updated == 0 {
        return Err(AppError::new(ErrorCode::UserNotFound, "user not found"));
    }

    if state.config.notifications_enabled {
        if let Err(e) = notification_service::notify(
            &state.db,
            user_id,
            admin.0.id,
            "admin_action",
            None,
            "Your account has been blocked by a moderator",
        ) {
            tracing::error!(error = %e, user_id = %user_id, "failed to notify blocked user");
        }
    }

    tracing::info!(user_id = %user_id, admin_id = %admin.0.id, "account blocked");

    Ok(Json(ApiResponse::ok(AccountBlockResponse {
        user_id,
        is_blocked: true,
        blocked_until: until,
    })))
}

// --- PUT /api/admin/users/:id/unblock ---

pub async fn unblock_account(
    admin: AdminUser,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<AccountBlockResponse>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let updated = diesel::update(users::table.find(user_id))
        .set((
            users::is_blocked.eq(false),
            users::blocked_until.eq(None::<DateTime<Utc>>),
        ))
        .execute(&mut conn)?;

    if updated == 0 {
        return Err(AppError::new(ErrorCode::UserNotFound, "user not found"));
    }

    tracing::info!(user_id = %user_id, admin_id = %admin.0.id, "account unblocked");

    Ok(Json(ApiResponse::ok(AccountBlockResponse {
        user_id,
        is_blocked: false,
        blocked_until: None,
    })))
}

// --- GET /api/admin/stats ---

pub async fn get_stats(
    _admin: AdminUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<DashboardStats>>> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let pending_reports: i64 = reports::table
        .filter(reports::status.eq(REPORT_STATUS_PENDING))
        .count()
        .get_result(&mut conn)?;

    let blocked_accounts: i64 = users::table
        .filter(users::is_blocked.eq(true))
        .count()
        .get_result(&mut conn)?;

    let today_start = Utc::now().date_naive().and_hms_opt(0, 0, 0).unwrap();
    let today_start_utc = today_start.and_utc();

    let reports_today: i64 = reports::table
        .filter(reports::created_at.ge(today_start_utc))
        .count()
        .get_result(&mut conn)?;

    Ok(Json(ApiResponse::ok(DashboardStats {
        pending_reports,
        blocked_accounts,
        reports_today,
    })))
}
