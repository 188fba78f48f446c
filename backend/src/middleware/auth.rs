use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::{
    error::{AppError, AuthError},
    state::AppState,
};

/// Rejects requests without a valid access token and exposes the caller's
/// `Identity` to downstream handlers through request extensions.
pub async fn auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers()).ok_or(AuthError::MalformedInput)?;
    let identity = state
        .tokens
        .verify_access_token(token)
        .and_then(|claims| claims.identity())
        .ok_or(AuthError::InvalidToken)?;

    tracing::debug!(user_id = %identity.id, "Authenticated request");
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer_token)
}

fn parse_bearer_token(header: &str) -> Option<&str> {
    let (scheme, rest) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
