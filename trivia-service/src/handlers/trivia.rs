//! Admin-only trivia content management. Every route here sits behind the
//! `require_admin` layer.

use service_core::{
    axum::{
        extract::{Path, Query, State},
        http::StatusCode,
        response::IntoResponse,
        Json,
    },
    error::AppError,
};

use crate::{
    dtos::{
        trivia::{
            ListQuery, QuestionImport, QuestionRequest, WrongAnswerImport, WrongAnswerRequest,
        },
        MessageResponse,
    },
    AppState,
};

// ==================== Questions ====================

/// POST /trivia/import-questions
pub async fn import_questions(
    State(state): State<AppState>,
    Json(data): Json<Vec<QuestionImport>>,
) -> Result<impl IntoResponse, AppError> {
    let results = state.trivia.import_questions(&data).await?;
    Ok((StatusCode::CREATED, Json(results)))
}

/// GET /trivia/questions
pub async fn list_questions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.trivia.list_questions(&query).await?))
}

/// GET /trivia/questions/:id
pub async fn get_question(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.trivia.get_question(id).await?))
}

/// POST /trivia/questions
pub async fn create_question(
    State(state): State<AppState>,
    Json(req): Json<QuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let question = state.trivia.create_question(&req).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

/// PUT /trivia/questions/:id
pub async fn update_question(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<QuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.trivia.update_question(id, &req).await?))
}

/// PATCH /trivia/questions/:id/archived
pub async fn toggle_question_archived(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.trivia.toggle_question_archived(id).await?;
    Ok(Json(MessageResponse::new("question archived status updated")))
}

/// PATCH /trivia/questions/:id/published
pub async fn toggle_question_published(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.trivia.toggle_question_published(id).await?;
    Ok(Json(MessageResponse::new("question published status updated")))
}

// ==================== Wrong answers ====================

/// POST /trivia/import-wrong-answers
pub async fn import_wrong_answers(
    State(state): State<AppState>,
    Json(data): Json<Vec<WrongAnswerImport>>,
) -> Result<impl IntoResponse, AppError> {
    let results = state.trivia.import_wrong_answers(&data).await?;
    Ok((StatusCode::CREATED, Json(results)))
}

/// GET /trivia/wrong-answers
pub async fn list_wrong_answers(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.trivia.list_wrong_answers(&query).await?))
}

/// GET /trivia/wrong-answers/:id
pub async fn get_wrong_answer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.trivia.get_wrong_answer(id).await?))
}

/// POST /trivia/wrong-answers
pub async fn create_wrong_answer(
    State(state): State<AppState>,
    Json(req): Json<WrongAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let answer = state.trivia.create_wrong_answer(&req).await?;
    Ok((StatusCode::CREATED, Json(answer)))
}

/// PUT /trivia/wrong-answers/:id
pub async fn update_wrong_answer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<WrongAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.trivia.update_wrong_answer(id, &req).await?))
}

/// PATCH /trivia/wrong-answers/:id/archived
pub async fn toggle_wrong_answer_archived(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    state.trivia.toggle_wrong_answer_archived(id).await?;
    Ok(Json(MessageResponse::new(
        "wrong answer archived status updated",
    )))
}
