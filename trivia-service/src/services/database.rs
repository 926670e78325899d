//! PostgreSQL-backed stores.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, Postgres};
use sqlx::QueryBuilder;

use crate::models::{TriviaQuestion, User, WaitlistEntry, WrongAnswer};
use crate::services::store::{
    ListFilter, QuestionFields, StatusFilter, TriviaStore, UserStore, WaitlistStore,
    WrongAnswerFields,
};

const USER_COLUMNS: &str = "id, created_at, modified_at, is_archived, email, display_name, \
     avatar_url, profile_text, is_verified, user_type_key, password_hash, last_login, \
     is_banned, ban_reason";

const QUESTION_COLUMNS: &str =
    "id, created_at, modified_at, is_archived, is_published, question, correct_answer, tags";

const WRONG_ANSWER_COLUMNS: &str = "id, created_at, modified_at, is_archived, answer_text, tags";

/// PostgreSQL database wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_err(e: sqlx::Error) -> anyhow::Error {
    anyhow::anyhow!(e)
}

#[derive(Clone, Copy)]
enum Table {
    Questions,
    WrongAnswers,
}

/// Appends the shared `WHERE` clause for listings and counts.
fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, table: Table, filter: &ListFilter) {
    qb.push(" WHERE 1=1");

    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", search);
        match table {
            Table::Questions => {
                qb.push(" AND (question ILIKE ")
                    .push_bind(pattern.clone())
                    .push(" OR correct_answer ILIKE ")
                    .push_bind(pattern);
            }
            Table::WrongAnswers => {
                qb.push(" AND (answer_text ILIKE ").push_bind(pattern);
            }
        }
        qb.push(" OR ").push_bind(search.clone()).push(" = ANY(tags))");
    }

    match (table, filter.status) {
        (Table::Questions, Some(StatusFilter::Active)) => {
            qb.push(" AND is_archived = false AND is_published = true");
        }
        (Table::WrongAnswers, Some(StatusFilter::Active)) => {
            qb.push(" AND is_archived = false");
        }
        (_, Some(StatusFilter::Archived)) => {
            qb.push(" AND is_archived = true");
        }
        (Table::Questions, Some(StatusFilter::Published)) => {
            qb.push(" AND is_published = true");
        }
        (Table::Questions, Some(StatusFilter::Unpublished)) => {
            qb.push(" AND is_published = false");
        }
        _ => {}
    }

    if !filter.tags.is_empty() {
        qb.push(" AND tags && ").push_bind(filter.tags.clone());
    }
}

fn push_page(qb: &mut QueryBuilder<'_, Postgres>, filter: &ListFilter) {
    qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(filter.offset);
}

#[async_trait]
impl UserStore for Database {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, anyhow::Error> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn create(
        &self,
        email: &str,
        display_name: &str,
        password_hash: Option<&str>,
        user_type_key: &str,
    ) -> Result<User, anyhow::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, display_name, password_hash, user_type_key)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(email)
        .bind(display_name)
        .bind(password_hash)
        .bind(user_type_key)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn mark_verified(&self, id: i64) -> Result<(), anyhow::Error> {
        sqlx::query("UPDATE users SET is_verified = true, modified_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn update_last_login(&self, id: i64) -> Result<(), anyhow::Error> {
        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn update_password_hash(
        &self,
        id: i64,
        password_hash: &str,
    ) -> Result<(), anyhow::Error> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $1, modified_at = NOW() WHERE id = $2",
        )
        .bind(password_hash)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(anyhow::anyhow!("no user with id {}", id));
        }
        Ok(())
    }
}

#[async_trait]
impl WaitlistStore for Database {
    async fn create(&self, email: &str) -> Result<WaitlistEntry, anyhow::Error> {
        sqlx::query_as::<_, WaitlistEntry>(
            "INSERT INTO waitlist (email) VALUES ($1) RETURNING id, created_at, email",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }
}

#[async_trait]
impl TriviaStore for Database {
    async fn list_questions(&self, filter: &ListFilter) -> Result<Vec<TriviaQuestion>, anyhow::Error> {
        let mut qb = QueryBuilder::new(format!("SELECT {} FROM trivia_questions", QUESTION_COLUMNS));
        push_filters(&mut qb, Table::Questions, filter);
        push_page(&mut qb, filter);

        qb.build_query_as::<TriviaQuestion>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn count_questions(&self, filter: &ListFilter) -> Result<i64, anyhow::Error> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM trivia_questions");
        push_filters(&mut qb, Table::Questions, filter);

        qb.build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn find_question_by_id(&self, id: i64) -> Result<Option<TriviaQuestion>, anyhow::Error> {
        sqlx::query_as::<_, TriviaQuestion>(&format!(
            "SELECT {} FROM trivia_questions WHERE id = $1",
            QUESTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn find_question_by_text(
        &self,
        question: &str,
    ) -> Result<Option<TriviaQuestion>, anyhow::Error> {
        sqlx::query_as::<_, TriviaQuestion>(&format!(
            "SELECT {} FROM trivia_questions WHERE question = $1",
            QUESTION_COLUMNS
        ))
        .bind(question)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn insert_question(&self, fields: &QuestionFields) -> Result<TriviaQuestion, anyhow::Error> {
        sqlx::query_as::<_, TriviaQuestion>(&format!(
            r#"
            INSERT INTO trivia_questions (question, correct_answer, tags, is_published)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            QUESTION_COLUMNS
        ))
        .bind(&fields.question)
        .bind(&fields.correct_answer)
        .bind(&fields.tags)
        .bind(fields.is_published)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn update_question(
        &self,
        id: i64,
        fields: &QuestionFields,
    ) -> Result<Option<TriviaQuestion>, anyhow::Error> {
        sqlx::query_as::<_, TriviaQuestion>(&format!(
            r#"
            UPDATE trivia_questions
            SET question = $1, correct_answer = $2, tags = $3, is_published = $4, modified_at = NOW()
            WHERE id = $5
            RETURNING {}
            "#,
            QUESTION_COLUMNS
        ))
        .bind(&fields.question)
        .bind(&fields.correct_answer)
        .bind(&fields.tags)
        .bind(fields.is_published)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn set_question_status(
        &self,
        id: i64,
        is_archived: bool,
        is_published: bool,
    ) -> Result<(), anyhow::Error> {
        sqlx::query(
            "UPDATE trivia_questions SET is_archived = $1, is_published = $2, modified_at = NOW() WHERE id = $3",
        )
        .bind(is_archived)
        .bind(is_published)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn list_wrong_answers(&self, filter: &ListFilter) -> Result<Vec<WrongAnswer>, anyhow::Error> {
        let mut qb =
            QueryBuilder::new(format!("SELECT {} FROM wrong_answer_pool", WRONG_ANSWER_COLUMNS));
        push_filters(&mut qb, Table::WrongAnswers, filter);
        push_page(&mut qb, filter);

        qb.build_query_as::<WrongAnswer>()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn count_wrong_answers(&self, filter: &ListFilter) -> Result<i64, anyhow::Error> {
        let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM wrong_answer_pool");
        push_filters(&mut qb, Table::WrongAnswers, filter);

        qb.build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn find_wrong_answer_by_id(&self, id: i64) -> Result<Option<WrongAnswer>, anyhow::Error> {
        sqlx::query_as::<_, WrongAnswer>(&format!(
            "SELECT {} FROM wrong_answer_pool WHERE id = $1",
            WRONG_ANSWER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn find_wrong_answer_by_text(
        &self,
        answer_text: &str,
    ) -> Result<Option<WrongAnswer>, anyhow::Error> {
        sqlx::query_as::<_, WrongAnswer>(&format!(
            "SELECT {} FROM wrong_answer_pool WHERE answer_text = $1",
            WRONG_ANSWER_COLUMNS
        ))
        .bind(answer_text)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn insert_wrong_answer(
        &self,
        fields: &WrongAnswerFields,
    ) -> Result<WrongAnswer, anyhow::Error> {
        sqlx::query_as::<_, WrongAnswer>(&format!(
            "INSERT INTO wrong_answer_pool (answer_text, tags) VALUES ($1, $2) RETURNING {}",
            WRONG_ANSWER_COLUMNS
        ))
        .bind(&fields.answer_text)
        .bind(&fields.tags)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn update_wrong_answer(
        &self,
        id: i64,
        fields: &WrongAnswerFields,
    ) -> Result<Option<WrongAnswer>, anyhow::Error> {
        sqlx::query_as::<_, WrongAnswer>(&format!(
            r#"
            UPDATE wrong_answer_pool
            SET answer_text = $1, tags = $2, modified_at = NOW()
            WHERE id = $3
            RETURNING {}
            "#,
            WRONG_ANSWER_COLUMNS
        ))
        .bind(&fields.answer_text)
        .bind(&fields.tags)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn set_wrong_answer_archived(
        &self,
        id: i64,
        is_archived: bool,
    ) -> Result<(), anyhow::Error> {
        sqlx::query(
            "UPDATE wrong_answer_pool SET is_archived = $1, modified_at = NOW() WHERE id = $2",
        )
        .bind(is_archived)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_filter_sql() {
        let filter = ListFilter {
            limit: 25,
            offset: 0,
            search: Some("paris".to_string()),
            status: Some(StatusFilter::Active),
            tags: vec!["geography".to_string()],
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM trivia_questions");
        push_filters(&mut qb, Table::Questions, &filter);

        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM trivia_questions WHERE 1=1 AND (question ILIKE $1 OR correct_answer ILIKE $2 OR $3 = ANY(tags)) AND is_archived = false AND is_published = true AND tags && $4"
        );
    }

    #[test]
    fn test_wrong_answer_ignores_publish_filter() {
        let filter = ListFilter {
            status: Some(StatusFilter::Published),
            ..Default::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM wrong_answer_pool");
        push_filters(&mut qb, Table::WrongAnswers, &filter);

        assert_eq!(qb.sql(), "SELECT COUNT(*) FROM wrong_answer_pool WHERE 1=1");
    }

    #[tokio::test]
    #[ignore] // Requires running PostgreSQL with migrations applied
    async fn test_user_round_trip() {
        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/trivia_test".to_string());
        let pool = PgPool::connect(&url).await.unwrap();
        let db = Database::new(pool);

        let email = format!(
            "user-{}@example.com",
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        );
        let user = UserStore::create(&db, &email, "Tester", Some("hash"), "player")
            .await
            .unwrap();
        assert!(!user.is_verified);

        db.mark_verified(user.id).await.unwrap();
        let found = db.find_by_email(&email.to_uppercase()).await.unwrap().unwrap();
        assert!(found.is_verified);
        assert_eq!(found.password_hash.as_deref(), Some("hash"));
    }
}
