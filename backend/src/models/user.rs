//! Models that represent users, authentication payloads, and role metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::FromRow;
use validator::Validate;

use crate::types::UserId;

#[derive(Debug, Clone, FromRow)]
/// Database representation of a user account.
pub struct User {
    /// Unique identifier for the user.
    pub id: UserId,
    /// Display name carried in every token.
    pub username: String,
    /// Login identifier.
    pub email: String,
    /// Argon2id PHC string of `password || pepper`.
    pub password_hash: String,
    /// Role describing the user's privileges.
    #[sqlx(try_from = "String")]
    pub role: UserRole,
    /// Creation timestamp for auditing.
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Supported user roles stored in the database.
pub enum UserRole {
    /// Standard role with access to the user's own data.
    #[default]
    User,
    /// Administrator role with elevated permissions.
    Admin,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown user role: {0}")]
pub struct UnknownRole(pub String);

impl UserRole {
    /// Returns the canonical snake_case representation of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "user" => Some(UserRole::User),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

impl TryFrom<String> for UserRole {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        UserRole::parse(&value).ok_or(UnknownRole(value))
    }
}

impl Serialize for UserRole {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UserRole {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        UserRole::parse(&s).ok_or_else(|| serde::de::Error::unknown_variant(&s, &["user", "admin"]))
    }
}

/// The authenticated principal every token refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub username: String,
    pub role: UserRole,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Identity {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Validate)]
/// Credentials submitted by a user attempting to authenticate.
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 1024))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Token pair returned after a successful login.
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Seconds until the access token expires.
    pub expires_in: i64,
    pub user: Identity,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Body of a successful `/auth/refresh` call.
pub struct RefreshResponse {
    pub access_token: String,
    /// Absent when the fast path returned the caller's still-valid access token.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_in: i64,
}

impl User {
    /// Constructs a new user with a freshly generated identifier.
    pub fn new(username: String, email: String, password_hash: String, role: UserRole) -> Self {
        Self {
            id: UserId::new(),
            username,
            email,
            password_hash,
            role,
            created_at: Utc::now(),
        }
    }

    /// Returns `true` when the user holds the `Admin` role.
    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }
}
