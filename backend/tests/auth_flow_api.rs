use axum::http::{header, Method, StatusCode};
use serde_json::json;
use tokenwarden_backend::models::user::UserRole;

mod support;

use support::{auth_request, body_json, json_request, set_cookie_header, set_cookie_value, TestApp};

#[tokio::test]
async fn login_returns_token_pair_and_sets_refresh_cookie() {
    let app = TestApp::new();
    let user = app.seed_user("alice@example.com", UserRole::Admin);

    let response = app
        .send(json_request(
            Method::POST,
            "/api/auth/login",
            json!({ "email": "alice@example.com", "password": support::PASSWORD }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let cookie = set_cookie_header(response.headers(), "refresh_token").expect("cookie");
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Secure"));
    assert!(cookie.contains("Path=/"));
    assert!(cookie.contains("Max-Age=604800"));
    let cookie_token = set_cookie_value(response.headers(), "refresh_token").expect("token");

    let body = body_json(response).await;
    assert_eq!(body["tokenType"], "Bearer");
    assert_eq!(body["expiresIn"], 3600);
    assert_eq!(body["refreshToken"], cookie_token.as_str());
    assert_eq!(body["user"]["id"], user.id.to_string());
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["role"], "admin");

    let records = app.refresh_tokens.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].user_id, user.id);
    assert_ne!(records[0].token_hash, cookie_token);
    assert_eq!(records[0].user_agent.as_deref(), Some("integration-test"));
}

#[tokio::test]
async fn login_email_lookup_ignores_case() {
    let app = TestApp::new();
    app.seed_user("bob@example.com", UserRole::User);

    let response = app
        .send(json_request(
            Method::POST,
            "/api/auth/login",
            json!({ "email": "Bob@Example.com", "password": support::PASSWORD }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = TestApp::new();
    app.seed_user("alice@example.com", UserRole::User);

    let wrong_password = app
        .send(json_request(
            Method::POST,
            "/api/auth/login",
            json!({ "email": "alice@example.com", "password": "not it" }),
        ))
        .await;
    let unknown_email = app
        .send(json_request(
            Method::POST,
            "/api/auth/login",
            json!({ "email": "nobody@example.com", "password": "not it" }),
        ))
        .await;

    assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_email.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookie_header(wrong_password.headers(), "refresh_token").is_none());

    let a = body_json(wrong_password).await;
    let b = body_json(unknown_email).await;
    assert_eq!(a, b);
    assert_eq!(a["error"], "Invalid email or password");
    assert!(app.refresh_tokens.records().is_empty());
}

#[tokio::test]
async fn login_rejects_malformed_payload() {
    let app = TestApp::new();

    let response = app
        .send(json_request(
            Method::POST,
            "/api/auth/login",
            json!({ "email": "not-an-email", "password": "" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(app.store_queries(), 0);
}

#[tokio::test]
async fn me_returns_identity_for_valid_bearer() {
    let app = TestApp::new();
    let user = app.seed_user("carol@example.com", UserRole::User);
    let (access, _) = app.login("carol@example.com").await;

    let response = app
        .send(auth_request(Method::GET, "/api/auth/me", None, Some(&access)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body, json!({ "id": user.id.to_string(), "username": "carol", "role": "user" }));
}

#[tokio::test]
async fn me_rejects_missing_and_foreign_tokens_alike() {
    let app = TestApp::new();
    app.seed_user("carol@example.com", UserRole::User);
    let (_, refresh) = app.login("carol@example.com").await;

    let missing = app
        .send(auth_request(Method::GET, "/api/auth/me", None, None))
        .await;
    // A refresh token is signed with the other secret and must not pass as access.
    let wrong_kind = app
        .send(auth_request(Method::GET, "/api/auth/me", None, Some(&refresh)))
        .await;

    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_kind.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(missing).await, body_json(wrong_kind).await);
}

#[tokio::test]
async fn logout_removes_only_the_presented_session() {
    let app = TestApp::new();
    app.seed_user("dave@example.com", UserRole::User);
    let (_, laptop) = app.login("dave@example.com").await;
    let (_, phone) = app.login("dave@example.com").await;
    assert_eq!(app.refresh_tokens.records().len(), 2);

    let response = app
        .send(auth_request(Method::POST, "/api/auth/logout", Some(&laptop), None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cleared = set_cookie_header(response.headers(), "refresh_token").expect("cookie");
    assert!(cleared.starts_with("refresh_token=;"));
    assert!(cleared.contains("Max-Age=0"));
    assert_eq!(body_json(response).await, json!({ "message": "Logged out" }));

    assert_eq!(app.refresh_tokens.records().len(), 1);
    assert_eq!(app.refresh(Some(&laptop), None).await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.refresh(Some(&phone), None).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn logout_all_removes_every_session_of_the_user() {
    let app = TestApp::new();
    app.seed_user("erin@example.com", UserRole::User);
    let frank = app.seed_user("frank@example.com", UserRole::User);
    let (access, _) = app.login("erin@example.com").await;
    app.login("erin@example.com").await;
    app.login("frank@example.com").await;

    let response = app
        .send(auth_request(
            Method::POST,
            "/api/auth/logout?all=true",
            None,
            Some(&access),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let remaining = app.refresh_tokens.records();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].user_id, frank.id);
}

#[tokio::test]
async fn logout_all_ignores_rotated_out_refresh_token() {
    let app = TestApp::new();
    app.seed_user("hank@example.com", UserRole::User);
    let (_, laptop) = app.login("hank@example.com").await;
    app.login("hank@example.com").await;
    assert_eq!(app.refresh(Some(&laptop), None).await.status(), StatusCode::OK);
    assert_eq!(app.refresh(Some(&laptop), None).await.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(auth_request(
            Method::POST,
            "/api/auth/logout?all=true",
            Some(&laptop),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.refresh_tokens.records().len(), 2);
}

#[tokio::test]
async fn logout_all_with_live_refresh_token_removes_every_session() {
    let app = TestApp::new();
    app.seed_user("ivy@example.com", UserRole::User);
    let (_, laptop) = app.login("ivy@example.com").await;
    app.login("ivy@example.com").await;

    let response = app
        .send(auth_request(
            Method::POST,
            "/api/auth/logout?all=true",
            Some(&laptop),
            None,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.refresh_tokens.records().is_empty());
}

#[tokio::test]
async fn logout_is_idempotent() {
    let app = TestApp::new();
    app.seed_user("gina@example.com", UserRole::User);
    let (_, refresh) = app.login("gina@example.com").await;

    for _ in 0..2 {
        let response = app
            .send(auth_request(Method::POST, "/api/auth/logout", Some(&refresh), None))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    let anonymous = app
        .send(auth_request(Method::POST, "/api/auth/logout", None, None))
        .await;
    assert_eq!(anonymous.status(), StatusCode::OK);
    assert!(app.refresh_tokens.records().is_empty());
}

#[tokio::test]
async fn health_and_request_id_header() {
    let app = TestApp::new();

    let mut request = auth_request(Method::GET, "/api/health", None, None);
    request
        .headers_mut()
        .insert("x-correlation-id", "corr-123".parse().unwrap());
    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "corr-123");
    assert_eq!(body_json(response).await, json!({ "status": "ok" }));

    let generated = app
        .send(auth_request(Method::GET, "/api/health", None, None))
        .await;
    assert!(generated.headers().contains_key("x-request-id"));
    assert!(!generated.headers().contains_key(header::SET_COOKIE));
}
