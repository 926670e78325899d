use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WaitlistEntry {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub email: String,
}
