use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

/// Message returned for every rejected credential on the refresh and protected paths.
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";
/// Message returned for every failed login, whether the email exists or not.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Reasons an authentication step can fail.
///
/// Only `StoreFailure` and `InvalidCredentials` are distinguishable by a
/// client; the rest collapse into one generic 401.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing refresh cookie or authorization header")]
    MalformedInput,
    #[error("token signature or expiry check failed")]
    InvalidToken,
    #[error("no active refresh token record for user")]
    NoActiveSession,
    #[error("presented refresh token matches no active record")]
    HashMismatch,
    #[error("user referenced by token no longer exists")]
    IdentityGone,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("credential store failure: {0}")]
    StoreFailure(#[source] anyhow::Error),
}

impl AuthError {
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MalformedInput => "malformed_input",
            AuthError::InvalidToken => "invalid_token",
            AuthError::NoActiveSession => "no_active_session",
            AuthError::HashMismatch => "hash_mismatch",
            AuthError::IdentityGone => "identity_gone",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::StoreFailure(_) => "store_failure",
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    Auth(AuthError),
    InternalServerError(anyhow::Error),
    Validation(Vec<String>),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code, details) = match self {
            AppError::Auth(AuthError::StoreFailure(err)) => {
                tracing::error!(error = ?err, "Credential store failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_SERVER_ERROR".to_string(),
                    None,
                )
            }
            AppError::Auth(AuthError::InvalidCredentials) => (
                StatusCode::UNAUTHORIZED,
                INVALID_CREDENTIALS_MESSAGE.to_string(),
                "INVALID_CREDENTIALS".to_string(),
                None,
            ),
            AppError::Auth(err) => {
                tracing::warn!(reason = err.reason(), "Authentication rejected");
                (
                    StatusCode::UNAUTHORIZED,
                    UNAUTHORIZED_MESSAGE.to_string(),
                    "UNAUTHORIZED".to_string(),
                    None,
                )
            }
            AppError::InternalServerError(err) => {
                tracing::error!("Internal server error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_SERVER_ERROR".to_string(),
                    None,
                )
            }
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "Validation failed".to_string(),
                "VALIDATION_ERROR".to_string(),
                Some(serde_json::json!({ "errors": errors })),
            ),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            code,
            details,
        });

        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalServerError(err)
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let code = e.code.as_ref();
                    format!("{}: {}", field, code)
                })
            })
            .collect();
        AppError::Validation(messages)
    }
}
