#![allow(dead_code)]
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request},
    response::Response,
    Router,
};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, sync::Arc, time::Duration as StdDuration};
use tokenwarden_backend::{
    config::Config,
    models::user::{User, UserRole},
    repositories::memory::{InMemoryRefreshTokenRepository, InMemoryUserRepository},
    routes::build_router,
    state::AppState,
    utils::{cookies::SameSite, password::hash_password},
};

pub const PASSWORD: &str = "correct horse battery staple";

pub fn test_config() -> Config {
    Config {
        database_url: env::var("TEST_DATABASE_URL").unwrap_or_default(),
        jwt_secret: "a_secure_token_that_is_long_enough_123".into(),
        refresh_token_secret: "a_different_refresh_secret_456".into(),
        password_pepper: "test-pepper".into(),
        jwt_expiration_hours: 1,
        refresh_token_expiration_days: 7,
        cookie_secure: true,
        cookie_same_site: SameSite::Strict,
        cors_allow_origins: vec!["http://localhost:8000".into()],
        bind_addr: "127.0.0.1:0".into(),
    }
}

/// A router backed by in-memory repositories the test can inspect.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub users: Arc<InMemoryUserRepository>,
    pub refresh_tokens: Arc<InMemoryRefreshTokenRepository>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let users = Arc::new(InMemoryUserRepository::new());
        let refresh_tokens = Arc::new(InMemoryRefreshTokenRepository::new());
        let state = AppState::from_repositories(users.clone(), refresh_tokens.clone(), config);
        Self {
            router: build_router(state.clone()),
            state,
            users,
            refresh_tokens,
        }
    }

    pub fn seed_user(&self, email: &str, role: UserRole) -> User {
        let hash = hash_password(PASSWORD, &self.state.config.password_pepper).expect("hash");
        let username = email.split('@').next().unwrap_or(email).to_string();
        let user = User::new(username, email.to_string(), hash, role);
        self.users.seed(user.clone());
        user
    }

    pub fn store_queries(&self) -> usize {
        self.users.query_count() + self.refresh_tokens.query_count()
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        use tower::ServiceExt;
        self.router.clone().oneshot(request).await.expect("router")
    }

    /// Logs in as `email` and returns `(access_token, refresh_token)`.
    pub async fn login(&self, email: &str) -> (String, String) {
        let response = self
            .send(json_request(
                Method::POST,
                "/api/auth/login",
                serde_json::json!({ "email": email, "password": PASSWORD }),
            ))
            .await;
        assert_eq!(response.status(), 200, "login failed");
        let body = body_json(response).await;
        (
            body["accessToken"].as_str().expect("access").to_string(),
            body["refreshToken"].as_str().expect("refresh").to_string(),
        )
    }

    pub async fn refresh(&self, refresh_token: Option<&str>, bearer: Option<&str>) -> Response {
        self.send(auth_request(
            Method::POST,
            "/api/auth/refresh",
            refresh_token,
            bearer,
        ))
        .await
    }
}

pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::USER_AGENT, "integration-test")
        .body(Body::from(body.to_string()))
        .expect("request")
}

pub fn auth_request(
    method: Method,
    uri: &str,
    refresh_token: Option<&str>,
    bearer: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::USER_AGENT, "integration-test");
    if let Some(token) = refresh_token {
        builder = builder.header(header::COOKIE, format!("theme=dark; refresh_token={token}"));
    }
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub fn set_cookie_header(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(&prefix))
        .map(str::to_string)
}

pub fn set_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = set_cookie_header(headers, name)?;
    let token = raw
        .strip_prefix(&format!("{name}="))?
        .split(';')
        .next()?
        .trim()
        .to_string();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Connects to `TEST_DATABASE_URL`, or returns `None` when it is unset.
pub async fn test_pool() -> Option<PgPool> {
    let database_url = env::var("TEST_DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(StdDuration::from_secs(30))
        .connect(&database_url)
        .await
        .expect("connect to TEST_DATABASE_URL");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    Some(pool)
}
