use axum::{
    extract::{Extension, Query, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{
    error::{AppError, AuthError},
    middleware::auth::bearer_token,
    models::{
        refresh_token::RefreshTokenRecord,
        user::{Identity, LoginRequest, LoginResponse, RefreshResponse},
    },
    state::AppState,
    types::UserId,
    utils::{
        cookies::{
            build_auth_cookie, build_clear_cookie, extract_cookie_value, REFRESH_COOKIE_NAME,
            REFRESH_COOKIE_PATH,
        },
        jwt::IssuedToken,
    },
};

const TOKEN_TYPE: &str = "Bearer";

type HandlerResult<T> = Result<T, AppError>;

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> HandlerResult<Response> {
    payload.validate()?;

    let identity = state
        .credentials
        .verify(&payload.email, &payload.password)
        .await?;

    let (access, refresh) = issue_pair(&state, &identity)?;
    let record = state
        .refresh_tokens
        .create(
            identity.id,
            &refresh.token,
            Utc::now() + state.tokens.refresh_ttl(),
            user_agent(&headers),
        )
        .await
        .map_err(AuthError::StoreFailure)?;

    tracing::info!(user_id = %identity.id, record_id = %record.id, "User logged in");

    let cookie = refresh_cookie(&state, &refresh.token);
    let body = LoginResponse {
        access_token: access.token,
        refresh_token: refresh.token,
        token_type: TOKEN_TYPE.to_string(),
        expires_in: state.tokens.access_ttl().num_seconds(),
        user: identity,
    };
    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// Exchanges a refresh cookie for a new token pair.
///
/// A still-valid bearer presented next to the cookie is echoed back without
/// touching the store. Otherwise the refresh token is verified, matched against
/// the user's stored hashes and rotated in place. Every rejection carries the
/// same 401 body.
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> HandlerResult<Response> {
    let presented = refresh_cookie_value(&headers).ok_or(AuthError::MalformedInput)?;

    if let Some(access_token) = bearer_token(&headers) {
        if let Some(claims) = state.tokens.verify_access_token(access_token) {
            tracing::debug!(user_id = %claims.sub, "Access token still valid, skipping rotation");
            let body = RefreshResponse {
                access_token: access_token.to_string(),
                refresh_token: None,
                token_type: TOKEN_TYPE.to_string(),
                expires_in: (claims.exp - Utc::now().timestamp()).max(0),
            };
            return Ok(Json(body).into_response());
        }
    }

    let user_id = state
        .tokens
        .verify_refresh_token(&presented)
        .and_then(|claims| claims.user_id())
        .ok_or(AuthError::InvalidToken)?;

    let record = match_session(&state, user_id, &presented)
        .await?
        .ok_or(AuthError::HashMismatch)?;

    let user = state
        .users
        .find_by_id(user_id)
        .await
        .map_err(AuthError::StoreFailure)?
        .ok_or(AuthError::IdentityGone)?;
    let identity = Identity::from(&user);

    let (access, refresh) = issue_pair(&state, &identity)?;

    let rotated = state
        .refresh_tokens
        .rotate(
            &record,
            &refresh.token,
            Utc::now() + state.tokens.refresh_ttl(),
            user_agent(&headers),
        )
        .await
        .map_err(AuthError::StoreFailure)?;
    if !rotated {
        // A concurrent refresh already replaced this hash.
        return Err(AuthError::HashMismatch.into());
    }

    match state.refresh_tokens.purge_expired(user_id).await {
        Ok(0) => {}
        Ok(purged) => tracing::debug!(user_id = %user_id, purged, "Purged expired refresh tokens"),
        Err(err) => {
            tracing::warn!(user_id = %user_id, error = %err, "Failed to purge expired refresh tokens")
        }
    }

    tracing::info!(user_id = %user_id, record_id = %record.id, "Refresh token rotated");

    let cookie = refresh_cookie(&state, &refresh.token);
    let body = RefreshResponse {
        access_token: access.token,
        refresh_token: Some(refresh.token),
        token_type: TOKEN_TYPE.to_string(),
        expires_in: state.tokens.access_ttl().num_seconds(),
    };
    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct LogoutParams {
    #[serde(default)]
    pub all: bool,
}

/// Ends the caller's session, or every session of the user with `?all=true`.
///
/// The refresh cookie only carries authority when it matches a stored record;
/// a rotated-out token is ignored. `all` falls back to a valid bearer.
/// Succeeds even when no credential is presented or nothing is left to delete.
pub async fn logout(
    State(state): State<AppState>,
    Query(params): Query<LogoutParams>,
    headers: HeaderMap,
) -> HandlerResult<Response> {
    let session = match refresh_cookie_value(&headers) {
        Some(token) => current_session(&state, &token).await?,
        None => None,
    };

    if params.all {
        let user_id = session.as_ref().map(|record| record.user_id).or_else(|| {
            bearer_token(&headers)
                .and_then(|token| state.tokens.verify_access_token(token))
                .and_then(|claims| claims.user_id())
        });
        if let Some(user_id) = user_id {
            let removed = state
                .refresh_tokens
                .revoke_all(user_id)
                .await
                .map_err(AuthError::StoreFailure)?;
            tracing::info!(user_id = %user_id, removed, "Revoked all refresh tokens");
        }
    } else if let Some(record) = session {
        state
            .refresh_tokens
            .revoke(record.id)
            .await
            .map_err(AuthError::StoreFailure)?;
        tracing::info!(user_id = %record.user_id, record_id = %record.id, "Refresh token revoked");
    }

    let cookie = build_clear_cookie(
        REFRESH_COOKIE_NAME,
        REFRESH_COOKIE_PATH,
        state.cookie_options(),
    );
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "message": "Logged out" })),
    )
        .into_response())
}

pub async fn me(Extension(identity): Extension<Identity>) -> Json<Identity> {
    Json(identity)
}

fn issue_pair(state: &AppState, identity: &Identity) -> HandlerResult<(IssuedToken, IssuedToken)> {
    let access = state.tokens.issue_access_token(identity)?;
    let refresh = state.tokens.issue_refresh_token(identity)?;
    Ok((access, refresh))
}

/// Finds the stored record for `token`. An empty candidate set is
/// `NoActiveSession`; a non-empty set with no match is `Ok(None)`.
async fn match_session(
    state: &AppState,
    user_id: UserId,
    token: &str,
) -> HandlerResult<Option<RefreshTokenRecord>> {
    let candidates = state
        .refresh_tokens
        .find_active_by_user(user_id)
        .await
        .map_err(AuthError::StoreFailure)?;
    if candidates.is_empty() {
        return Err(AuthError::NoActiveSession.into());
    }
    Ok(state
        .refresh_tokens
        .match_by_plaintext(candidates, token)
        .await)
}

/// Resolves a presented refresh token to its live record, if any.
async fn current_session(
    state: &AppState,
    token: &str,
) -> HandlerResult<Option<RefreshTokenRecord>> {
    let Some(user_id) = state
        .tokens
        .verify_refresh_token(token)
        .and_then(|claims| claims.user_id())
    else {
        return Ok(None);
    };
    let candidates = state
        .refresh_tokens
        .find_active_by_user(user_id)
        .await
        .map_err(AuthError::StoreFailure)?;
    Ok(state
        .refresh_tokens
        .match_by_plaintext(candidates, token)
        .await)
}

fn refresh_cookie(state: &AppState, token: &str) -> String {
    let max_age = state
        .tokens
        .refresh_ttl()
        .to_std()
        .unwrap_or_default();
    build_auth_cookie(
        REFRESH_COOKIE_NAME,
        token,
        max_age,
        REFRESH_COOKIE_PATH,
        state.cookie_options(),
    )
}

fn refresh_cookie_value(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|raw| extract_cookie_value(raw, REFRESH_COOKIE_NAME))
}

fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.chars().take(512).collect())
}
