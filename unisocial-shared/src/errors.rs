use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Auth errors
/// - E2xxx: User directory errors
/// - E3xxx: Content errors
/// - E4xxx: Messaging errors
/// - E5xxx: Notification errors
/// - E6xxx: Moderation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    RateLimited,
    BadRequest,
    FeatureDisabled,

    // Auth (E1xxx)
    InvalidCredentials,
    UsernameTaken,
    EmailAlreadyExists,
    InvalidUsername,
    PasswordTooWeak,
    TokenExpired,
    TokenInvalid,
    RefreshTokenRevoked,
    AccountBlocked,
    AccountDeactivated,

    // User directory (E2xxx)
    UserNotFound,
    ProfilePrivate,
    CannotFollowSelf,

    // Content (E3xxx)
    PostNotFound,
    CommentNotFound,

    // Messaging (E4xxx)
    MessageNotFound,
    CannotMessageSelf,

    // Notifications (E5xxx)
    NotificationNotFound,

    // Moderation (E6xxx)
    ReportNotFound,
    ReportAlreadyResolved,
    CannotReportSelf,
    DuplicateReport,
    SelfBlockNotAllowed,
    InteractionBlocked,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::RateLimited => "E0006",
            Self::BadRequest => "E0007",
            Self::FeatureDisabled => "E0008",

            // Auth
            Self::InvalidCredentials => "E1001",
            Self::UsernameTaken => "E1002",
            Self::EmailAlreadyExists => "E1003",
            Self::InvalidUsername => "E1004",
            Self::PasswordTooWeak => "E1005",
            Self::TokenExpired => "E1006",
            Self::TokenInvalid => "E1007",
            Self::RefreshTokenRevoked => "E1008",
            Self::AccountBlocked => "E1009",
            Self::AccountDeactivated => "E1010",

            // User directory
            Self::UserNotFound => "E2001",
            Self::ProfilePrivate => "E2002",
            Self::CannotFollowSelf => "E2003",

            // Content
            Self::PostNotFound => "E3001",
            Self::CommentNotFound => "E3002",

            // Messaging
            Self::MessageNotFound => "E4001",
            Self::CannotMessageSelf => "E4002",

            // Notifications
            Self::NotificationNotFound => "E5001",

            // Moderation
            Self::ReportNotFound => "E6001",
            Self::ReportAlreadyResolved => "E6002",
            Self::CannotReportSelf => "E6003",
            Self::DuplicateReport => "E6004",
            Self::SelfBlockNotAllowed => "E6005",
            Self::InteractionBlocked => "E6006",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ValidationError | Self::BadRequest | Self::PasswordTooWeak
            | Self::InvalidUsername => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::UserNotFound | Self::PostNotFound
            | Self::CommentNotFound | Self::MessageNotFound
            | Self::NotificationNotFound | Self::ReportNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::InvalidCredentials | Self::TokenExpired
            | Self::TokenInvalid | Self::RefreshTokenRevoked => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::AccountBlocked | Self::AccountDeactivated
            | Self::ProfilePrivate | Self::CannotFollowSelf | Self::CannotMessageSelf
            | Self::CannotReportSelf | Self::SelfBlockNotAllowed
            | Self::InteractionBlocked | Self::FeatureDisabled => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::UsernameTaken | Self::EmailAlreadyExists | Self::DuplicateReport
            | Self::ReportAlreadyResolved => StatusCode::CONFLICT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
            AppError::Database(err) => {
                tracing::error!(error = %err, "database error");
                match err {
                    diesel::result::Error::NotFound => (
                        StatusCode::NOT_FOUND,
                        ApiErrorResponse::new("E0003", "resource not found"),
                    ),
                    _ => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ApiErrorResponse::new("E0001", "storage error"),
                    ),
                }
            }
            AppError::Validation(msg) => (
                StatusCode::BAD_REQUEST,
                ApiErrorResponse::new("E0002", msg),
            ),
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_codes_map_to_409() {
        assert_eq!(ErrorCode::DuplicateReport.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::UsernameTaken.status_code(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::ReportAlreadyResolved.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn blocked_interactions_are_forbidden_not_conflict() {
        assert_eq!(ErrorCode::InteractionBlocked.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::SelfBlockNotAllowed.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::AccountBlocked.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn codes_are_unique() {
        let all = [
            ErrorCode::InternalError, ErrorCode::ValidationError, ErrorCode::NotFound,
            ErrorCode::Unauthorized, ErrorCode::Forbidden, ErrorCode::RateLimited,
            ErrorCode::BadRequest, ErrorCode::FeatureDisabled,
            ErrorCode::InvalidCredentials, ErrorCode::UsernameTaken,
            ErrorCode::EmailAlreadyExists, ErrorCode::InvalidUsername,
            ErrorCode::PasswordTooWeak, ErrorCode::TokenExpired, ErrorCode::TokenInvalid,
            ErrorCode::RefreshTokenRevoked, ErrorCode::AccountBlocked,
            ErrorCode::AccountDeactivated, ErrorCode::UserNotFound,
            ErrorCode::ProfilePrivate, ErrorCode::CannotFollowSelf,
            ErrorCode::PostNotFound, ErrorCode::CommentNotFound,
            ErrorCode::MessageNotFound, ErrorCode::CannotMessageSelf,
            ErrorCode::NotificationNotFound, ErrorCode::ReportNotFound,
            ErrorCode::ReportAlreadyResolved, ErrorCode::CannotReportSelf,
            ErrorCode::DuplicateReport, ErrorCode::SelfBlockNotAllowed,
            ErrorCode::InteractionBlocked,
        ];
        let mut codes: Vec<&str> = all.iter().map(|c| c.code()).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }

    #[test]
    fn database_not_found_translates_to_404() {
        let err = AppError::Database(diesel::result::Error::NotFound);
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
