use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Moderator,
    Admin,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::User => write!(f, "user"),
            UserRole::Moderator => write!(f, "moderator"),
            UserRole::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(UserRole::User),
            "moderator" => Ok(UserRole::Moderator),
            "admin" => Ok(UserRole::Admin),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: UserRole,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

impl Claims {
    pub fn new(user_id: Uuid, role: UserRole, duration_secs: i64) -> Self {
        let now = Utc::now().timestamp();
        Self {
            sub: user_id,
            role,
            iat: now,
            exp: now + duration_secs,
            jti: Uuid::now_v7(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_moderator(&self) -> bool {
        matches!(self.role, UserRole::Moderator | UserRole::Admin)
    }
}

/// The authenticated caller, resolved from the access token by the request
/// extractor. Every mutating handler takes this before touching storage.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: UserRole,
    pub token_id: Uuid,
}

impl AuthUser {
    /// Ownership check used for resource mutation: the acting user must own
    /// the resource, or hold the admin role.
    pub fn owns_or_admin(&self, owner_id: Uuid) -> bool {
        self.id == owner_id || self.role == UserRole::Admin
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            role: claims.role,
            token_id: claims.jti,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

impl TokenPair {
    pub fn new(access_token: String, refresh_token: String, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_display_and_parse() {
        for role in [UserRole::User, UserRole::Moderator, UserRole::Admin] {
            let parsed: UserRole = role.to_string().parse().unwrap();
            assert_eq!(parsed, role);
        }
        assert!("superuser".parse::<UserRole>().is_err());
    }

    #[test]
    fn admin_implies_moderator() {
        let claims = Claims::new(Uuid::new_v4(), UserRole::Admin, 60);
        assert!(claims.is_admin());
        assert!(claims.is_moderator());

        let claims = Claims::new(Uuid::new_v4(), UserRole::Moderator, 60);
        assert!(!claims.is_admin());
        assert!(claims.is_moderator());
    }

    #[test]
    fn fresh_claims_are_not_expired() {
        let claims = Claims::new(Uuid::new_v4(), UserRole::User, 300);
        assert!(!claims.is_expired());
    }

    #[test]
    fn owns_or_admin_covers_owner_and_admin_only() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let as_owner = AuthUser { id: owner, role: UserRole::User, token_id: Uuid::now_v7() };
        let as_other = AuthUser { id: other, role: UserRole::User, token_id: Uuid::now_v7() };
        let as_admin = AuthUser { id: other, role: UserRole::Admin, token_id: Uuid::now_v7() };
        let as_mod = AuthUser { id: other, role: UserRole::Moderator, token_id: Uuid::now_v7() };

        assert!(as_owner.owns_or_admin(owner));
        assert!(!as_other.owns_or_admin(owner));
        assert!(as_admin.owns_or_admin(owner));
        assert!(!as_mod.owns_or_admin(owner));
    }
}
