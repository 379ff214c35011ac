mod common;

use axum::http::{header, HeaderValue, StatusCode};
use common::{authed, spawn_app, PASSWORD};
use etf_server::services::security::create_access_token;
use serde_json::{json, Value};

#[tokio::test]
async fn signup_login_and_profile() {
    let app = spawn_app().await;

    let signup = app
        .server
        .post("/signup")
        .json(&json!({
            "username": "alice",
            "password": PASSWORD,
            "name": "앨리스",
            "email": "alice@example.com",
        }))
        .await;
    signup.assert_status_ok();
    assert_eq!(signup.json::<Value>()["message"], "회원가입 성공");

    let login: Value = app
        .server
        .post("/login")
        .json(&json!({ "username": "alice", "password": PASSWORD }))
        .await
        .json();
    assert_eq!(login["token_type"], "bearer");
    assert_eq!(login["name"], "앨리스");
    let token = login["access_token"].as_str().unwrap();

    let me: Value = authed(app.server.get("/me"), token).await.json();
    assert_eq!(me["username"], "alice");
    assert_eq!(me["email"], "alice@example.com");
    assert!(me.get("hashed_password").is_none());
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let app = spawn_app().await;
    app.register("bob").await;

    let resp = app
        .server
        .post("/signup")
        .json(&json!({ "username": "bob", "password": PASSWORD, "name": "other" }))
        .await;
    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.json::<Value>()["detail"], "이미 존재하는 아이디입니다.");
}

#[tokio::test]
async fn wrong_password_is_rejected() {
    let app = spawn_app().await;
    app.register("carol").await;

    let resp = app
        .server
        .post("/login")
        .json(&json!({ "username": "carol", "password": "not-the-password" }))
        .await;
    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);

    let resp = app
        .server
        .post("/login")
        .json(&json!({ "username": "nobody", "password": PASSWORD }))
        .await;
    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn short_password_fails_validation() {
    let app = spawn_app().await;
    let resp = app
        .server
        .post("/signup")
        .json(&json!({ "username": "dave", "password": "123", "name": "dave" }))
        .await;
    assert_eq!(resp.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn profile_requires_a_valid_token() {
    let app = spawn_app().await;

    let resp = app.server.get("/me").await;
    assert_eq!(resp.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.json::<Value>()["detail"], "Not authenticated");

    let resp = authed(app.server.get("/me"), "garbage").await;
    assert_eq!(resp.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.json::<Value>()["detail"], "Could not validate credentials");
}

#[tokio::test]
async fn health_is_public() {
    let app = spawn_app().await;
    let body: Value = app.server.get("/health").await.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let app = spawn_app().await;
    app.register("wade").await;

    let resp = app
        .server
        .post("/signup")
        .json(&json!({
            "username": "wade2",
            "password": PASSWORD,
            "name": "wade",
            "email": "wade@example.com",
        }))
        .await;
    assert_eq!(resp.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(resp.json::<Value>()["detail"], "이미 사용 중인 이메일입니다.");
}

#[tokio::test]
async fn signup_with_missing_fields_fails_validation() {
    let app = spawn_app().await;
    let resp = app
        .server
        .post("/signup")
        .json(&json!({ "username": "erin" }))
        .await;
    assert_eq!(resp.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(resp.json::<Value>()["detail"].is_string());
}

#[tokio::test]
async fn login_with_empty_fields_fails_validation() {
    let app = spawn_app().await;
    let resp = app
        .server
        .post("/login")
        .json(&json!({ "username": "", "password": "" }))
        .await;
    assert_eq!(resp.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn malformed_authorization_header_is_challenged() {
    let app = spawn_app().await;
    let resp = app
        .server
        .get("/me")
        .add_header(
            header::AUTHORIZATION,
            HeaderValue::from_static("Token not-a-bearer"),
        )
        .await;
    assert_eq!(resp.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(resp.headers()[header::WWW_AUTHENTICATE], "Bearer");
    assert_eq!(resp.json::<Value>()["detail"], "Not authenticated");
}

#[tokio::test]
async fn token_for_missing_user_is_not_found() {
    let app = spawn_app().await;
    let config = &app.state.config;
    let token =
        create_access_token("ghost", &config.jwt_secret, config.access_token_expire_minutes)
            .unwrap();

    let resp = authed(app.server.get("/me"), &token).await;
    assert_eq!(resp.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(resp.json::<Value>()["detail"], "사용자를 찾을 수 없습니다.");
}
