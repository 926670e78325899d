use service_core::{
    axum::{extract::State, http::StatusCode, response::IntoResponse, Json},
    error::AppError,
};

use crate::{dtos::waitlist::WaitlistRequest, AppState};

/// POST /waitlist
pub async fn create_waitlist_entry(
    State(state): State<AppState>,
    Json(req): Json<WaitlistRequest>,
) -> Result<impl IntoResponse, AppError> {
    let entry = state.waitlist.create_waitlist_entry(&req.email).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}
