use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{refresh_tokens, users};

// --- User ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub is_active: bool,
    pub is_blocked: bool,
    pub blocked_until: Option<DateTime<Utc>>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub interests: Option<serde_json::Value>,
    pub age: Option<i32>,
    pub profile_visibility: String,
    pub allow_tagging: bool,
    pub notify_on_likes: bool,
    pub notify_on_comments: bool,
    pub notify_on_follows: bool,
    pub notify_on_messages: bool,
    pub is_online: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub bio: Option<String>,
    pub interests: Option<serde_json::Value>,
    pub age: Option<i32>,
}

/// Partial profile update; only present fields are written.
#[derive(Debug, Deserialize, AsChangeset)]
#[diesel(table_name = users)]
pub struct UpdateProfile {
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub interests: Option<serde_json::Value>,
    pub age: Option<i32>,
    pub profile_visibility: Option<String>,
    pub allow_tagging: Option<bool>,
    pub notify_on_likes: Option<bool>,
    pub notify_on_comments: Option<bool>,
    pub notify_on_follows: Option<bool>,
    pub notify_on_messages: Option<bool>,
}

/// Public view of a profile, stripped of credentials and preferences.
#[derive(Debug, Serialize)]
pub struct PublicProfile {
    pub id: Uuid,
    pub username: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub interests: Option<serde_json::Value>,
    pub is_online: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for PublicProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            bio: user.bio,
            avatar_url: user.avatar_url,
            interests: user.interests,
            is_online: user.is_online,
            created_at: user.created_at,
        }
    }
}

// --- RefreshToken ---

#[derive(Debug, Queryable, Identifiable, Serialize)]
#[diesel(table_name = refresh_tokens)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = refresh_tokens)]
pub struct NewRefreshToken {
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}
