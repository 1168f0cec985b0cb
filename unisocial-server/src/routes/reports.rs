use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use unisocial_shared::errors::{AppError, AppResult, ErrorCode};
use unisocial_shared::types::auth::AuthUser;
use unisocial_shared::types::ApiResponse;

use crate::models::{
    NewReport, Report, ReportTarget, REPORT_STATUS_PENDING, REPORT_STATUS_REVIEWED,
};
use crate::schema::{comments, messages, posts, reports, users};
use crate::AppState;

// --- POST /api/reports ---

#[derive(Debug, Deserialize)]
pub struct CreateReportRequest {
    pub target_type: String,
    pub target_id: Uuid,
    pub reason: String,
    pub details: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateReportResponse {
    pub report_id: Uuid,
}

/// Fixed-window key for the server-side report limiter. The original system
/// only throttled in the browser, which is trivially bypassed; the counter
/// here is authoritative.
pub fn report_window_key(reporter_id: Uuid, now: DateTime<Utc>) -> String {
    format!("rl:report:{}:{}", reporter_id, now.format("%Y%m%d%H"))
}

pub async fn create_report(
    auth: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateReportRequest>,
) -> AppResult<Json<ApiResponse<CreateReportResponse>>> {
    if !state.config.reporting_enabled {
        return Err(AppError::new(ErrorCode::FeatureDisabled, "reporting is disabled"));
    }

    let target: ReportTarget = req
        .target_type
        .parse()
        .map_err(|e: String| AppError::new(ErrorCode::ValidationError, e))?;

    if req.reason.trim().is_empty() {
        return Err(AppError::new(ErrorCode::ValidationError, "a report reason is required"));
    }

    let key = report_window_key(auth.id, Utc::now());
    let within_limit = state
        .redis
        .rate_limit_check(&key, state.config.report_limit_per_hour, 3600)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "report rate limit check failed");
            AppError::internal("rate limiter unavailable")
        })?;

    if !within_limit {
        return Err(AppError::new(
            ErrorCode::RateLimited,
            "too many reports; try again later",
        ));
    }

    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    validate_report_target(&mut conn, &auth, target, req.target_id)?;

    // Duplicate check and insert share one transaction; the partial unique
    // index on open reports closes the remaining race, and its violation
    // maps to the same DuplicateReport the pre-check produces.
    let report: Report = conn.transaction::<_, AppError, _>(|conn| {
        let open: i64 = reports::table
            .filter(reports::reporter_id.eq(auth.id))
            .filter(reports::target_type.eq(target.as_str()))
            .filter(reports::target_id.eq(req.target_id))
            .filter(reports::status.eq_any([REPORT_STATUS_PENDING, REPORT_STATUS_REVIEWED]))
            .count()
            .get_result(conn)?;

        if open > 0 {
            return Err(AppError::new(
                ErrorCode::DuplicateReport,
                "you already have an open report against this target",
            ));
        }

        let new_report = NewReport {
            reporter_id: auth.id,
            target_type: target.as_str().to_string(),
            target_id: req.target_id,
            reason: req.reason.clone(),
            details: req.details.clone(),
        };

        diesel::insert_into(reports::table)
            .values(&new_report)
            .get_result(conn)
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::UniqueViolation,
                    _,
                ) => AppError::new(
                    ErrorCode::DuplicateReport,
                    "you already have an open report against this target",
                ),
                other => AppError::Database(other),
            })
    })?;

    tracing::info!(
        report_id = %report.id,
        reporter_id = %auth.id,
        target_type = %report.target_type,
        target_id = %report.target_id,
        "report created"
    );

    Ok(Json(ApiResponse::ok(CreateReportResponse { report_id: report.id })))
}

/// Confirm the reported entity exists; for messages, the reporter must be a
/// participant of that conversation.
fn validate_report_target(
    conn: &mut PgConnection,
    auth: &AuthUser,
    target: ReportTarget,
    target_id: Uuid,
) -> AppResult<()> {
    match target {
        ReportTarget::Post => {
            let exists: bool = posts::table
                .find(target_id)
                .count()
                .get_result::<i64>(conn)
                .map(|c| c > 0)
                .unwrap_or(false);
            if !exists {
                return Err(AppError::new(ErrorCode::PostNotFound, "reported post not found"));
            }
        }
        ReportTarget::Comment => {
            let exists: bool = comments::table
                .find(target_id)
                .count()
                .get_result::<i64>(conn)
                .map(|c| c > 0)
                .unwrap_or(false);
            if !exists {
                return Err(AppError::new(ErrorCode::CommentNotFound, "reported comment not found"));
            }
        }
        ReportTarget::User => {
            if target_id == auth.id {
                return Err(AppError::new(ErrorCode::CannotReportSelf, "you cannot report yourself"));
            }
            let exists: bool = users::table
                .find(target_id)
                .count()
                .get_result::<i64>(conn)
                .map(|c| c > 0)
                .unwrap_or(false);
            if !exists {
                return Err(AppError::new(ErrorCode::UserNotFound, "reported user not found"));
            }
        }
        ReportTarget::Message => {
            let participants: Option<(Uuid, Uuid)> = messages::table
                .find(target_id)
                .select((messages::sender_id, messages::receiver_id))
                .first(conn)
                .optional()?;

            let Some((sender, receiver)) = participants else {
                return Err(AppError::new(ErrorCode::MessageNotFound, "reported message not found"));
            };

            if auth.id != sender && auth.id != receiver {
                return Err(AppError::new(
                    ErrorCode::Forbidden,
                    "you can only report messages from your own conversations",
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_key_is_stable_within_the_hour() {
        let reporter = Uuid::new_v4();
        let a = Utc.with_ymd_and_hms(2026, 8, 6, 14, 5, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 8, 6, 14, 59, 59).unwrap();
        assert_eq!(report_window_key(reporter, a), report_window_key(reporter, b));
    }

    #[test]
    fn window_key_rolls_over_on_the_hour() {
        let reporter = Uuid::new_v4();
        let a = Utc.with_ymd_and_hms(2026, 8, 6, 14, 59, 59).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 8, 6, 15, 0, 0).unwrap();
        assert_ne!(report_window_key(reporter, a), report_window_key(reporter, b));
    }

    #[test]
    fn window_key_is_scoped_per_reporter() {
        let now = Utc::now();
        assert_ne!(
            report_window_key(Uuid::new_v4(), now),
            report_window_key(Uuid::new_v4(), now)
        );
    }
}
