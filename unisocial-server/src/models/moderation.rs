use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema::reports;

pub const REPORT_STATUS_PENDING: &str = "pending";
pub const REPORT_STATUS_REVIEWED: &str = "reviewed";
pub const REPORT_STATUS_RESOLVED: &str = "resolved";

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = reports)]
pub struct Report {
    pub id: Uuid,
    pub reporter_id: Uuid,
    pub target_type: String,
    pub target_id: Uuid,
    pub reason: String,
    pub details: Option<String>,
    pub status: String,
    pub admin_action: Option<String>,
    pub admin_notes: Option<String>,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = reports)]
pub struct NewReport {
    pub reporter_id: Uuid,
    pub target_type: String,
    pub target_id: Uuid,
    pub reason: String,
    pub details: Option<String>,
}

/// Reportable entity kinds. Parsing is strict: anything outside the four
/// known kinds is a validation error at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportTarget {
    Post,
    Comment,
    User,
    Message,
}

impl ReportTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Comment => "comment",
            Self::User => "user",
            Self::Message => "message",
        }
    }
}

impl std::str::FromStr for ReportTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" => Ok(Self::Post),
            "comment" => Ok(Self::Comment),
            "user" => Ok(Self::User),
            "message" => Ok(Self::Message),
            _ => Err(format!("unknown report target type: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_target_parses_known_kinds_only() {
        for kind in ["post", "comment", "user", "message"] {
            let parsed: ReportTarget = kind.parse().unwrap();
            assert_eq!(parsed.as_str(), kind);
        }
        assert!("profile".parse::<ReportTarget>().is_err());
        assert!("POST".parse::<ReportTarget>().is_err());
    }
}
