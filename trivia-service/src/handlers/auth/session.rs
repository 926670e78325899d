use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use service_core::{
    axum::{
        extract::{Query, State},
        http::{header, HeaderMap},
        response::IntoResponse,
        Json,
    },
    error::AppError,
};

use crate::{
    dtos::{
        auth::{SendLoginEmailRequest, TokenQuery},
        MessageResponse,
    },
    middleware::{AuthUser, ACCESS_TOKEN_COOKIE},
    utils::ValidatedJson,
    AppState,
};

/// `access_token` cookie carrying a freshly issued access token.
fn access_cookie(state: &AppState, token: String) -> Cookie<'static> {
    Cookie::build((ACCESS_TOKEN_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.security.secure_cookies)
        .max_age(time::Duration::seconds(
            state.config.access_cookie_max_age_seconds(),
        ))
        .build()
}

/// Password login from `Authorization: Basic base64(email:password)`.
///
/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Authorization header is required"))
        })?;

    let res = state.auth.login(authorization).await?;
    let jar = jar.add(access_cookie(&state, res.access_token.clone()));

    Ok((jar, Json(res)))
}

/// POST /auth/send-login-email
pub async fn send_login_email(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SendLoginEmailRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .auth
        .send_login_email(&req.email.to_lowercase())
        .await?;

    Ok(Json(MessageResponse::new(format!(
        "user ({}) email was sent.",
        user.email
    ))))
}

/// Follow a login link: marks the account verified and sets the session
/// cookie.
///
/// GET /auth/login-with-email?token=
pub async fn login_with_email(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<TokenQuery>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = state.auth.verify_login_link(&query.token).await?;
    let res = state.auth.login_with_email_link(user_id).await?;
    let jar = jar.add(access_cookie(&state, res.access_token));

    Ok((
        jar,
        Json(MessageResponse::new("successfully logged in with email link")),
    ))
}

/// Context of the caller behind the current cookie.
///
/// GET /auth/token
pub async fn token_info(AuthUser(user): AuthUser) -> impl IntoResponse {
    Json(user)
}

/// Expire the session cookie. Issued tokens stay valid until they expire.
///
/// POST /auth/logout
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let expired = Cookie::build((ACCESS_TOKEN_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.security.secure_cookies)
        .max_age(time::Duration::ZERO)
        .build();

    (jar.add(expired), Json(MessageResponse::new("logged out")))
}
