pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::dtos::MessageResponse;
use crate::middleware::Authorizer;
use crate::services::{
    AuthService, Database, EmailProvider, EmailTemplates, TokenService, TriviaService,
    TriviaStore, UserStore, WaitlistService, WaitlistStore,
};
use crate::utils::PasswordHasher;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    /// `None` when the stores are not PostgreSQL-backed; health then only
    /// reports the process as up.
    pub db: Option<Database>,
    pub auth: AuthService,
    pub authorizer: Authorizer,
    pub trivia: TriviaService,
    pub waitlist: WaitlistService,
    pub login_rate_limiter: IpRateLimiter,
    pub register_rate_limiter: IpRateLimiter,
    pub login_email_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire services over the given stores and email sender.
    pub fn new(
        config: AppConfig,
        db: Option<Database>,
        users: Arc<dyn UserStore>,
        trivia: Arc<dyn TriviaStore>,
        waitlist: Arc<dyn WaitlistStore>,
        email: Arc<dyn EmailProvider>,
    ) -> Self {
        let tokens = TokenService::new(&config.token);
        let hasher = PasswordHasher::new(config.password.pepper.clone());
        let templates = EmailTemplates::new(
            config.email.app_name.clone(),
            config.email.base_url.clone(),
        );

        let auth = AuthService::new(
            users.clone(),
            email,
            tokens.clone(),
            hasher,
            templates,
            config.email.from_address.clone(),
        );
        let authorizer = Authorizer::new(tokens, users);

        let login_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.login_attempts,
            config.rate_limit.login_window_seconds,
        );
        let register_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.register_attempts,
            config.rate_limit.register_window_seconds,
        );
        let login_email_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.login_email_attempts,
            config.rate_limit.login_email_window_seconds,
        );

        Self {
            config,
            db,
            auth,
            authorizer,
            trivia: TriviaService::new(trivia),
            waitlist: WaitlistService::new(waitlist),
            login_rate_limiter,
            register_rate_limiter,
            login_email_rate_limiter,
        }
    }
}

/// Liveness plus a database round trip when PostgreSQL is configured.
///
/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Result<Json<MessageResponse>, AppError> {
    if let Some(db) = &state.db {
        db::health_check(db.pool()).await.map_err(|e| {
            tracing::error!(error = %e, "Database health check failed");
            AppError::ServiceUnavailable(anyhow::anyhow!("database unavailable"))
        })?;
    }
    Ok(Json(MessageResponse::new("ok")))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| {
            if o == "*" {
                tracing::warn!("Wildcard CORS origin ignored; cookies need explicit origins");
                return None;
            }
            o.parse::<HeaderValue>()
                .map_err(|e| tracing::error!("Invalid CORS origin '{}': {}", o, e))
                .ok()
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

pub fn build_router(state: AppState) -> Router {
    let trivia_routes = Router::new()
        .route(
            "/trivia/import-questions",
            post(handlers::trivia::import_questions),
        )
        .route(
            "/trivia/import-wrong-answers",
            post(handlers::trivia::import_wrong_answers),
        )
        .route(
            "/trivia/questions",
            get(handlers::trivia::list_questions).post(handlers::trivia::create_question),
        )
        .route(
            "/trivia/questions/:id",
            get(handlers::trivia::get_question).put(handlers::trivia::update_question),
        )
        .route(
            "/trivia/questions/:id/archived",
            patch(handlers::trivia::toggle_question_archived),
        )
        .route(
            "/trivia/questions/:id/published",
            patch(handlers::trivia::toggle_question_published),
        )
        .route(
            "/trivia/wrong-answers",
            get(handlers::trivia::list_wrong_answers).post(handlers::trivia::create_wrong_answer),
        )
        .route(
            "/trivia/wrong-answers/:id",
            get(handlers::trivia::get_wrong_answer).put(handlers::trivia::update_wrong_answer),
        )
        .route(
            "/trivia/wrong-answers/:id/archived",
            patch(handlers::trivia::toggle_wrong_answer_archived),
        )
        .layer(from_fn_with_state(state.clone(), middleware::require_admin));

    let login_route = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let register_route = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .layer(from_fn_with_state(
            state.register_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let login_email_route = Router::new()
        .route(
            "/auth/send-login-email",
            post(handlers::auth::send_login_email),
        )
        .layer(from_fn_with_state(
            state.login_email_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/verify", get(handlers::auth::verify))
        .route(
            "/auth/login-with-email",
            get(handlers::auth::login_with_email),
        )
        .route("/auth/token", get(handlers::auth::token_info))
        .route(
            "/auth/update-password/self",
            post(handlers::auth::update_self_password),
        )
        .route("/auth/logout", post(handlers::auth::logout))
        .route(
            "/waitlist",
            post(handlers::waitlist::create_waitlist_entry),
        )
        .merge(login_route)
        .merge(register_route)
        .merge(login_email_route)
        .merge(trivia_routes)
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config.security.allowed_origins))
}
