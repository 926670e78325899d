//! Trivia content: questions with their correct answer, and the pool of
//! wrong answers drawn from when building a round.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TriviaQuestion {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
    pub is_archived: bool,
    pub is_published: bool,
    pub question: String,
    pub correct_answer: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WrongAnswer {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
    pub is_archived: bool,
    pub answer_text: String,
    pub tags: Vec<String>,
}

/// One page of a listing plus the total number of matching rows.
#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub results: Vec<T>,
    pub total: i64,
    pub page_size: i64,
    pub page: i64,
}
