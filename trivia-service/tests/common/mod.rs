//! Shared setup for trivia-service integration tests: the full router over
//! in-memory stores and a recording email sender.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use secrecy::Secret;
use service_core::config::Config;
use std::sync::Arc;
use tower::util::ServiceExt;
use trivia_service::{
    build_router,
    config::{
        AppConfig, DatabaseConfig, EmailConfig, Environment, PasswordConfig, RateLimitConfig,
        SecurityConfig, TokenConfig,
    },
    models::User,
    services::{
        MemoryTriviaStore, MemoryUserStore, MemoryWaitlistStore, MockEmailService, TokenService,
    },
    utils::{Password, PasswordHasher},
    AppState,
};

pub const PASSWORD: &str = "correct-horse-battery";
const PEPPER: &str = "integration-test-pepper";

pub fn test_config() -> AppConfig {
    AppConfig {
        common: Config::default(),
        environment: Environment::Dev,
        service_name: "trivia-service".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        database: DatabaseConfig {
            url: Secret::new("postgres://localhost/trivia_test".to_string()),
            max_connections: 5,
            min_connections: 1,
        },
        token: TokenConfig {
            secret_key: Secret::new("integration-secret-0123456789abcdef".to_string()),
            issuer: "trivia-service".to_string(),
            access_token_expiry_minutes: 59,
            verification_token_expiry_minutes: 1440,
            login_email_token_expiry_minutes: 15,
            refresh_token_expiry_minutes: 10080,
        },
        password: PasswordConfig {
            pepper: Secret::new(PEPPER.to_string()),
        },
        email: EmailConfig {
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            smtp_user: "user".to_string(),
            smtp_password: Secret::new("password".to_string()),
            from_address: "do-not-reply@example.com".to_string(),
            app_name: "Open Trivia Online".to_string(),
            base_url: "http://localhost:3000".to_string(),
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            secure_cookies: false,
        },
        rate_limit: RateLimitConfig {
            login_attempts: 100,
            login_window_seconds: 60,
            register_attempts: 100,
            register_window_seconds: 60,
            login_email_attempts: 100,
            login_email_window_seconds: 60,
        },
    }
}

pub struct TestApp {
    pub router: Router,
    pub users: Arc<MemoryUserStore>,
    pub trivia: Arc<MemoryTriviaStore>,
    pub waitlist: Arc<MemoryWaitlistStore>,
    pub email: Arc<MockEmailService>,
    pub tokens: TokenService,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let users = Arc::new(MemoryUserStore::new());
        let trivia = Arc::new(MemoryTriviaStore::new());
        let waitlist = Arc::new(MemoryWaitlistStore::new());
        let email = Arc::new(MockEmailService::new());
        let tokens = TokenService::new(&config.token);

        let state = AppState::new(
            config,
            None,
            users.clone(),
            trivia.clone(),
            waitlist.clone(),
            email.clone(),
        );

        Self {
            router: build_router(state),
            users,
            trivia,
            waitlist,
            email,
            tokens,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Store an account directly and return it with a `Cookie` header value
    /// holding a valid access token.
    pub fn seed_user(&self, id: i64, role: &str, tweak: impl FnOnce(&mut User)) -> (User, String) {
        let hash = PasswordHasher::new(Secret::new(PEPPER.to_string()))
            .hash_password(&Password::new(PASSWORD.to_string()))
            .unwrap();

        let mut user = User::new(
            id,
            format!("user{}@example.com", id),
            format!("User {}", id),
            Some(hash.as_str().to_string()),
            role.to_string(),
        );
        user.is_verified = true;
        tweak(&mut user);
        self.users.upsert(user.clone()).unwrap();

        let token = self.tokens.generate_access_token(id).unwrap();
        (user, format!("access_token={}", token))
    }
}

pub fn basic_auth(email: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", email, password)))
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn authed_json_request(
    method: &str,
    uri: &str,
    cookie: &str,
    body: serde_json::Value,
) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, cookie)
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn authed_request(method: &str, uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// The `Set-Cookie` header for `access_token`, if the response carries one.
pub fn access_cookie_header(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("access_token="))
        .map(str::to_string)
}

/// `name=value` part of a `Set-Cookie` header, usable as a `Cookie` header.
pub fn cookie_pair(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// The `token` query value from the first link in an email body.
pub fn extract_token(html_body: &str) -> Option<String> {
    let start = html_body.find("?token=")? + "?token=".len();
    let rest = &html_body[start..];
    let end = rest.find('"').unwrap_or(rest.len());
    Some(rest[..end].to_string())
}
