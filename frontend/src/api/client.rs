use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::{
    api::types::*,
    config::ClientConfig,
    state::auth::AuthSession,
};

const REFRESH_COOKIE_NAME: &str = "refresh_token";

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
        })
    }

    pub fn new_with_base_url(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::new(&ClientConfig::new(base_url))
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn login(
        &self,
        session: &mut AuthSession,
        request: &LoginRequest,
    ) -> Result<LoginResponse, ApiError> {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(request)
            .send()
            .await?;
        let login: LoginResponse = parse_json(response).await?;
        *session = AuthSession::from_login(&login);
        log::debug!("signed in as {}", login.user.username);
        Ok(login)
    }

    /// Exchanges the session's refresh token for a new pair.
    ///
    /// The stale bearer travels along so the server can skip rotation when
    /// it is in fact still valid.
    pub async fn refresh_session(&self, session: &mut AuthSession) -> Result<(), ApiError> {
        let refresh_token = session
            .refresh_token
            .as_deref()
            .ok_or_else(ApiError::unauthorized)?;
        let mut request = self
            .client
            .post(self.url("/auth/refresh"))
            .header(header::COOKIE, refresh_cookie(refresh_token));
        if let Some(access_token) = session.access_token.as_deref() {
            request = request.bearer_auth(access_token);
        }

        let refreshed: RefreshResponse = parse_json(request.send().await?).await?;
        session.apply_refresh(&refreshed);
        Ok(())
    }

    /// Ends the session server-side (all devices with `all`) and clears it
    /// locally, even if the server could not be reached.
    pub async fn logout(&self, session: &mut AuthSession, all: bool) -> Result<(), ApiError> {
        let mut request = self.client.post(self.url("/auth/logout"));
        if all {
            request = request.query(&[("all", "true")]);
        }
        if let Some(refresh_token) = session.refresh_token.as_deref() {
            request = request.header(header::COOKIE, refresh_cookie(refresh_token));
        }
        if let Some(access_token) = session.access_token.as_deref() {
            request = request.bearer_auth(access_token);
        }

        let result = match request.send().await {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) => Err(error_from_response(response).await),
            Err(err) => Err(ApiError::from(err)),
        };
        session.clear();
        result
    }

    pub async fn get_me(&self, session: &mut AuthSession) -> Result<UserResponse, ApiError> {
        let url = self.url("/auth/me");
        let response = self
            .send_authorized(session, |client| client.get(&url))
            .await?;
        let user: UserResponse = parse_json(response).await?;
        session.user = Some(user.clone());
        Ok(user)
    }

    /// Sends an authenticated request, renewing the session once on 401.
    ///
    /// `build` is invoked again for the replay, so it must produce the same
    /// request each time. If the refresh fails the session is cleared and
    /// [`ApiError::session_expired`] is returned. Otherwise the replay's
    /// response is returned as-is, a second 401 included, for the caller to
    /// interpret.
    pub async fn send_authorized<F>(
        &self,
        session: &mut AuthSession,
        build: F,
    ) -> Result<Response, ApiError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let response = self.send_with_bearer(session, &build).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        log::debug!("access token rejected, attempting refresh");
        if let Err(err) = self.refresh_session(session).await {
            log::warn!("session refresh failed: {}", err);
            session.clear();
            return Err(ApiError::session_expired());
        }

        self.send_with_bearer(session, &build).await
    }

    async fn send_with_bearer<F>(
        &self,
        session: &AuthSession,
        build: &F,
    ) -> Result<Response, ApiError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut request = build(&self.client);
        if let Some(access_token) = session.access_token.as_deref() {
            request = request.bearer_auth(access_token);
        }
        Ok(request.send().await?)
    }
}

fn refresh_cookie(token: &str) -> String {
    format!("{}={}", REFRESH_COOKIE_NAME, token)
}

/// Decodes a 2xx body as `T`, or turns an error response into an [`ApiError`].
pub async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    if !response.status().is_success() {
        return Err(error_from_response(response).await);
    }
    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::unknown(format!("Failed to parse response: {}", e)))
}

async fn error_from_response(response: Response) -> ApiError {
    let status = response.status();
    match response.json::<ApiError>().await {
        Ok(error) => error,
        Err(_) if status == StatusCode::UNAUTHORIZED => ApiError::unauthorized(),
        Err(_) => ApiError::request_failed(format!("Request failed with status {}", status)),
    }
}
