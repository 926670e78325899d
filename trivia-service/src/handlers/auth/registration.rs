use service_core::{
    axum::{
        extract::{Query, State},
        http::StatusCode,
        response::IntoResponse,
        Json,
    },
    error::AppError,
};

use crate::{
    dtos::{
        auth::{RegisterRequest, TokenQuery},
        MessageResponse,
    },
    services::NewUser,
    utils::ValidatedJson,
    AppState,
};

/// Create a player account and mail the verification link.
///
/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = state
        .auth
        .register_new_user(NewUser {
            email: req.email,
            display_name: req.display_name,
            password: req.password,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(format!(
            "user ({}) was created. check your email for verification.",
            user.email
        ))),
    ))
}

/// GET /auth/verify?token=
pub async fn verify(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Result<impl IntoResponse, AppError> {
    state.auth.verify_new_user(&query.token).await?;

    Ok((
        StatusCode::OK,
        Json(MessageResponse::new(
            "user was verified successfully. you can now login",
        )),
    ))
}
