mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{
    access_cookie_header, authed_json_request, authed_request, basic_auth, body_json,
    cookie_pair, extract_token, json_request, test_config, TestApp, PASSWORD,
};
use serde_json::json;

fn login_request(authorization: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/auth/login")
        .header(header::AUTHORIZATION, authorization)
        .body(Body::empty())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn register(app: &TestApp, email: &str, password: &str) -> StatusCode {
    app.send(json_request(
        "POST",
        "/auth/register",
        json!({ "email": email, "display_name": "Quiz Master", "password": password }),
    ))
    .await
    .status()
}

#[tokio::test]
async fn test_register_verify_login_flow() {
    let app = TestApp::new();

    assert_eq!(
        register(&app, "Player@Example.com", PASSWORD).await,
        StatusCode::CREATED
    );

    let sent = app.email.last().unwrap();
    assert_eq!(sent.to, "player@example.com");
    assert_eq!(sent.from, "do-not-reply@example.com");
    assert_eq!(sent.subject, "Open Trivia Online - Verify Your Account");

    // Password login works before verification, but the session is not
    // accepted until the account is verified.
    let response = app
        .send(login_request(&basic_auth("player@example.com", PASSWORD)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = cookie_pair(&access_cookie_header(&response).unwrap());
    let response = app.send(authed_request("GET", "/auth/token", &cookie)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let token = extract_token(&sent.html_body).unwrap();
    let response = app.send(get(&format!("/auth/verify?token={}", token))).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Verification is idempotent
    let response = app.send(get(&format!("/auth/verify?token={}", token))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send(login_request(&basic_auth("player@example.com", PASSWORD)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = access_cookie_header(&response).unwrap();
    let body = body_json(response).await;
    assert!(body["access_token"].as_str().is_some());

    let response = app
        .send(authed_request("GET", "/auth/token", &cookie_pair(&set_cookie)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["email"], "player@example.com");
    assert_eq!(body["username"], "Quiz Master");
    assert!(body.get("is_admin").is_none());
    assert!(body.get("is_support").is_none());
}

#[tokio::test]
async fn test_login_cookie_attributes() {
    let app = TestApp::new();
    app.seed_user(1, "player", |_| {});

    let response = app
        .send(login_request(&basic_auth("user1@example.com", PASSWORD)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = access_cookie_header(&response).unwrap();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));
    assert!(set_cookie.contains("Path=/"));
    assert!(set_cookie.contains("Max-Age=3540"));
    assert!(!set_cookie.contains("Secure"));
}

#[tokio::test]
async fn test_secure_cookie_when_configured() {
    let mut config = test_config();
    config.security.secure_cookies = true;
    let app = TestApp::with_config(config);
    app.seed_user(1, "player", |_| {});

    let response = app
        .send(login_request(&basic_auth("user1@example.com", PASSWORD)))
        .await;
    let set_cookie = access_cookie_header(&response).unwrap();
    assert!(set_cookie.contains("Secure"));
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = TestApp::new();
    app.seed_user(1, "player", |_| {});

    let cases = [
        basic_auth("user1@example.com", "wrong-password-123"),
        basic_auth("nobody@example.com", PASSWORD),
        "Basic not-base64!".to_string(),
        "Bearer something".to_string(),
    ];

    for authorization in cases {
        let response = app.send(login_request(&authorization)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(access_cookie_header(&response).is_none());
        let body = body_json(response).await;
        assert_eq!(body["error"], "there was an issue trying to log this user in");
    }

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/auth/login")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_rejections() {
    let app = TestApp::new();

    assert_eq!(
        register(&app, "player@example.com", PASSWORD).await,
        StatusCode::CREATED
    );
    assert_eq!(
        register(&app, "PLAYER@example.com", PASSWORD).await,
        StatusCode::CONFLICT
    );
    assert_eq!(
        register(&app, "short@example.com", "123456789").await,
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        register(&app, "not-an-email", PASSWORD).await,
        StatusCode::UNPROCESSABLE_ENTITY
    );

    let response = app
        .send(json_request(
            "POST",
            "/auth/register",
            json!({ "email": "blank@example.com", "display_name": "   ", "password": PASSWORD }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "display name is required");

    // Only the first registration reached the mailer
    assert_eq!(app.email.sent().len(), 1);
}

#[tokio::test]
async fn test_register_email_failure_keeps_account() {
    let app = TestApp::new();
    app.email.set_failing(true);

    assert_eq!(
        register(&app, "player@example.com", PASSWORD).await,
        StatusCode::INTERNAL_SERVER_ERROR
    );

    // The account exists, so the address cannot be registered again
    app.email.set_failing(false);
    assert_eq!(
        register(&app, "player@example.com", PASSWORD).await,
        StatusCode::CONFLICT
    );
}

#[tokio::test]
async fn test_verify_rejects_bad_tokens() {
    let app = TestApp::new();
    app.seed_user(1, "player", |u| u.is_verified = false);

    let login_token = app.tokens.generate_login_with_email_token(1).unwrap();
    for token in ["", "garbage", login_token.as_str()] {
        let response = app.send(get(&format!("/auth/verify?token={}", token))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

#[tokio::test]
async fn test_email_link_login() {
    let app = TestApp::new();
    app.seed_user(1, "player", |u| u.is_verified = false);

    let response = app
        .send(json_request(
            "POST",
            "/auth/send-login-email",
            json!({ "email": "USER1@example.com" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let sent = app.email.last().unwrap();
    assert_eq!(sent.to, "user1@example.com");
    assert_eq!(sent.subject, "Open Trivia Online - Login Email");
    let token = extract_token(&sent.html_body).unwrap();

    let response = app
        .send(get(&format!("/auth/login-with-email?token={}", token)))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = cookie_pair(&access_cookie_header(&response).unwrap());

    // Following the link verified the account, so the session is accepted
    let response = app.send(authed_request("GET", "/auth/token", &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.users.call_count("update_last_login"), 1);
}

#[tokio::test]
async fn test_email_link_rejects_other_token_kinds() {
    let app = TestApp::new();
    app.seed_user(1, "player", |_| {});

    let verification = app.tokens.generate_verification_token(1).unwrap();
    let access = app.tokens.generate_access_token(1).unwrap();

    for token in [verification, access] {
        let response = app
            .send(get(&format!("/auth/login-with-email?token={}", token)))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(access_cookie_header(&response).is_none());
    }
}

#[tokio::test]
async fn test_send_login_email_failures() {
    let app = TestApp::new();
    app.seed_user(1, "player", |_| {});
    app.seed_user(2, "player", |u| {
        u.is_banned = true;
        u.ban_reason = Some("spam".to_string());
    });

    let response = app
        .send(json_request(
            "POST",
            "/auth/send-login-email",
            json!({ "email": "nobody@example.com" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .send(json_request(
            "POST",
            "/auth/send-login-email",
            json!({ "email": "user2@example.com" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    app.email.set_failing(true);
    let response = app
        .send(json_request(
            "POST",
            "/auth/send-login-email",
            json!({ "email": "user1@example.com" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(response).await;
    assert_eq!(body["error"], "the login by email failed to send");
}

#[tokio::test]
async fn test_update_own_password() {
    let app = TestApp::new();
    let (_, cookie) = app.seed_user(1, "player", |_| {});

    let response = app
        .send(authed_json_request(
            "POST",
            "/auth/update-password/self",
            &cookie,
            json!({ "password": "short" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(authed_json_request(
            "POST",
            "/auth/update-password/self",
            &cookie,
            json!({ "password": "a-brand-new-password" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send(login_request(&basic_auth("user1@example.com", PASSWORD)))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .send(login_request(&basic_auth(
            "user1@example.com",
            "a-brand-new-password",
        )))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_update_password_malformed_body() {
    let app = TestApp::new();
    let (_, cookie) = app.seed_user(1, "player", |_| {});

    let response = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/auth/update-password/self")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::COOKIE, &cookie)
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().starts_with("Json parse error"));
    assert_eq!(app.users.call_count("update_password_hash"), 0);
}

#[tokio::test]
async fn test_update_password_requires_session() {
    let app = TestApp::new();
    app.seed_user(1, "player", |_| {});

    let response = app
        .send(json_request(
            "POST",
            "/auth/update-password/self",
            json!({ "password": "a-brand-new-password" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.users.call_count("update_password_hash"), 0);
}

#[tokio::test]
async fn test_logout_expires_cookie() {
    let app = TestApp::new();
    let (_, cookie) = app.seed_user(1, "player", |_| {});

    let response = app.send(authed_request("POST", "/auth/logout", &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = access_cookie_header(&response).unwrap();
    assert!(set_cookie.starts_with("access_token=;"));
    assert!(set_cookie.contains("Max-Age=0"));
    assert!(set_cookie.contains("Path=/"));
}
