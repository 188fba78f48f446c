use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where the UI should send the user once the session is gone.
pub const LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: UserResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{error}")]
pub struct ApiError {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Set when the caller must navigate away, e.g. to the login page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
}

impl ApiError {
    fn new(error: impl Into<String>, code: &str) -> Self {
        Self {
            error: error.into(),
            code: code.to_string(),
            details: None,
            redirect_to: None,
        }
    }

    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::new(msg, "UNKNOWN")
    }

    pub fn unauthorized() -> Self {
        Self::new("Unauthorized", "UNAUTHORIZED")
    }

    /// The refresh attempt failed; the session has been cleared.
    pub fn session_expired() -> Self {
        Self {
            redirect_to: Some(LOGIN_PATH.to_string()),
            ..Self::new("Session expired", "SESSION_EXPIRED")
        }
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::new(msg, "REQUEST_FAILED")
    }

    pub fn is_session_expired(&self) -> bool {
        self.code == "SESSION_EXPIRED"
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::request_failed(format!("Request failed: {}", err))
    }
}
