use service_core::{
    axum::{extract::State, response::IntoResponse, Json},
    error::AppError,
};

use crate::{
    dtos::{auth::UpdatePasswordRequest, MessageResponse},
    middleware::AuthUser,
    utils::ValidatedJson,
    AppState,
};

/// POST /auth/update-password/self
pub async fn update_self_password(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    ValidatedJson(req): ValidatedJson<UpdatePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .auth
        .update_user_password(user.id, req.password)
        .await?;

    Ok(Json(MessageResponse::new("password updated successfully")))
}
