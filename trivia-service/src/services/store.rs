//! Persistence seams. PostgreSQL implementations live in `database.rs`; the
//! in-memory ones here back the test suite and local experiments.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::{TriviaQuestion, User, WaitlistEntry, WrongAnswer};

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, anyhow::Error>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error>;
    async fn create(
        &self,
        email: &str,
        display_name: &str,
        password_hash: Option<&str>,
        user_type_key: &str,
    ) -> Result<User, anyhow::Error>;
    async fn mark_verified(&self, id: i64) -> Result<(), anyhow::Error>;
    async fn update_last_login(&self, id: i64) -> Result<(), anyhow::Error>;
    async fn update_password_hash(&self, id: i64, password_hash: &str)
        -> Result<(), anyhow::Error>;
}

#[async_trait]
pub trait WaitlistStore: Send + Sync {
    async fn create(&self, email: &str) -> Result<WaitlistEntry, anyhow::Error>;
}

/// Listing status filter. `Published`/`Unpublished` only apply to questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Active,
    Archived,
    Published,
    Unpublished,
}

impl StatusFilter {
    /// Unknown values yield `None` and the filter is dropped.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "active" => Some(StatusFilter::Active),
            "archived" => Some(StatusFilter::Archived),
            "published" => Some(StatusFilter::Published),
            "unpublished" => Some(StatusFilter::Unpublished),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub limit: i64,
    pub offset: i64,
    pub search: Option<String>,
    pub status: Option<StatusFilter>,
    /// Lower-cased tags; a row matches when it shares at least one.
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct QuestionFields {
    pub question: String,
    pub correct_answer: String,
    pub tags: Vec<String>,
    pub is_published: bool,
}

#[derive(Debug, Clone)]
pub struct WrongAnswerFields {
    pub answer_text: String,
    pub tags: Vec<String>,
}

#[async_trait]
pub trait TriviaStore: Send + Sync {
    async fn list_questions(&self, filter: &ListFilter) -> Result<Vec<TriviaQuestion>, anyhow::Error>;
    async fn count_questions(&self, filter: &ListFilter) -> Result<i64, anyhow::Error>;
    async fn find_question_by_id(&self, id: i64) -> Result<Option<TriviaQuestion>, anyhow::Error>;
    async fn find_question_by_text(
        &self,
        question: &str,
    ) -> Result<Option<TriviaQuestion>, anyhow::Error>;
    async fn insert_question(&self, fields: &QuestionFields) -> Result<TriviaQuestion, anyhow::Error>;
    async fn update_question(
        &self,
        id: i64,
        fields: &QuestionFields,
    ) -> Result<Option<TriviaQuestion>, anyhow::Error>;
    async fn set_question_status(
        &self,
        id: i64,
        is_archived: bool,
        is_published: bool,
    ) -> Result<(), anyhow::Error>;

    async fn list_wrong_answers(&self, filter: &ListFilter) -> Result<Vec<WrongAnswer>, anyhow::Error>;
    async fn count_wrong_answers(&self, filter: &ListFilter) -> Result<i64, anyhow::Error>;
    async fn find_wrong_answer_by_id(&self, id: i64) -> Result<Option<WrongAnswer>, anyhow::Error>;
    async fn find_wrong_answer_by_text(
        &self,
        answer_text: &str,
    ) -> Result<Option<WrongAnswer>, anyhow::Error>;
    async fn insert_wrong_answer(
        &self,
        fields: &WrongAnswerFields,
    ) -> Result<WrongAnswer, anyhow::Error>;
    async fn update_wrong_answer(
        &self,
        id: i64,
        fields: &WrongAnswerFields,
    ) -> Result<Option<WrongAnswer>, anyhow::Error>;
    async fn set_wrong_answer_archived(&self, id: i64, is_archived: bool)
        -> Result<(), anyhow::Error>;
}

fn poisoned<E: std::fmt::Display>(e: E) -> anyhow::Error {
    anyhow::anyhow!("In-memory store mutex poisoned: {}", e)
}

// ==================== In-memory users ====================

#[derive(Default)]
struct UserTable {
    next_id: i64,
    rows: HashMap<i64, User>,
}

/// In-memory [`UserStore`]. Counts calls per operation and can be switched
/// into a failing mode to exercise store-error paths.
#[derive(Default)]
pub struct MemoryUserStore {
    table: Mutex<UserTable>,
    fail: Mutex<bool>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a store error.
    pub fn set_failing(&self, fail: bool) {
        if let Ok(mut f) = self.fail.lock() {
            *f = fail;
        }
    }

    /// Number of times `op` (a [`UserStore`] method name) has been called.
    pub fn call_count(&self, op: &str) -> usize {
        self.calls
            .lock()
            .map(|c| c.get(op).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn record(&self, op: &'static str) -> Result<(), anyhow::Error> {
        *self.calls.lock().map_err(poisoned)?.entry(op).or_insert(0) += 1;
        self.check()
    }

    fn check(&self) -> Result<(), anyhow::Error> {
        if *self.fail.lock().map_err(poisoned)? {
            return Err(anyhow::anyhow!("user store unavailable"));
        }
        Ok(())
    }

    /// Insert or replace a full row; used to seed banned, archived or admin
    /// accounts.
    pub fn upsert(&self, user: User) -> Result<(), anyhow::Error> {
        let mut table = self.table.lock().map_err(poisoned)?;
        table.next_id = table.next_id.max(user.id);
        table.rows.insert(user.id, user);
        Ok(())
    }

    fn modify(
        &self,
        op: &'static str,
        id: i64,
        f: impl FnOnce(&mut User),
    ) -> Result<(), anyhow::Error> {
        self.record(op)?;
        let mut table = self.table.lock().map_err(poisoned)?;
        let user = table
            .rows
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("no user with id {}", id))?;
        f(user);
        user.modified_at = Some(Utc::now());
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, anyhow::Error> {
        self.record("find_by_id")?;
        Ok(self.table.lock().map_err(poisoned)?.rows.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error> {
        self.record("find_by_email")?;
        let table = self.table.lock().map_err(poisoned)?;
        Ok(table
            .rows
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn create(
        &self,
        email: &str,
        display_name: &str,
        password_hash: Option<&str>,
        user_type_key: &str,
    ) -> Result<User, anyhow::Error> {
        self.record("create")?;
        let mut table = self.table.lock().map_err(poisoned)?;
        if table.rows.values().any(|u| u.email.eq_ignore_ascii_case(email)) {
            return Err(anyhow::anyhow!("duplicate email"));
        }
        table.next_id += 1;
        let user = User::new(
            table.next_id,
            email.to_string(),
            display_name.to_string(),
            password_hash.map(str::to_string),
            user_type_key.to_string(),
        );
        table.rows.insert(user.id, user.clone());
        Ok(user)
    }

    async fn mark_verified(&self, id: i64) -> Result<(), anyhow::Error> {
        self.modify("mark_verified", id, |u| u.is_verified = true)
    }

    async fn update_last_login(&self, id: i64) -> Result<(), anyhow::Error> {
        self.modify("update_last_login", id, |u| u.last_login = Some(Utc::now()))
    }

    async fn update_password_hash(
        &self,
        id: i64,
        password_hash: &str,
    ) -> Result<(), anyhow::Error> {
        self.modify("update_password_hash", id, |u| {
            u.password_hash = Some(password_hash.to_string())
        })
    }
}

// ==================== In-memory waitlist ====================

#[derive(Default)]
pub struct MemoryWaitlistStore {
    rows: Mutex<Vec<WaitlistEntry>>,
}

impl MemoryWaitlistStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<WaitlistEntry> {
        self.rows.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl WaitlistStore for MemoryWaitlistStore {
    async fn create(&self, email: &str) -> Result<WaitlistEntry, anyhow::Error> {
        let mut rows = self.rows.lock().map_err(poisoned)?;
        let entry = WaitlistEntry {
            id: rows.len() as i64 + 1,
            created_at: Utc::now(),
            email: email.to_string(),
        };
        rows.push(entry.clone());
        Ok(entry)
    }
}

// ==================== In-memory trivia ====================

#[derive(Default)]
struct TriviaTables {
    next_question_id: i64,
    questions: Vec<TriviaQuestion>,
    next_answer_id: i64,
    answers: Vec<WrongAnswer>,
}

#[derive(Default)]
pub struct MemoryTriviaStore {
    tables: Mutex<TriviaTables>,
}

impl MemoryTriviaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_search(search: &Option<String>, texts: &[&str], tags: &[String]) -> bool {
    match search {
        None => true,
        Some(s) => {
            let needle = s.to_lowercase();
            texts.iter().any(|t| t.to_lowercase().contains(&needle)) || tags.iter().any(|t| t == s)
        }
    }
}

fn matches_tags(filter: &[String], tags: &[String]) -> bool {
    filter.is_empty() || filter.iter().any(|f| tags.contains(f))
}

fn question_matches(filter: &ListFilter, q: &TriviaQuestion) -> bool {
    let status_ok = match filter.status {
        None => true,
        Some(StatusFilter::Active) => !q.is_archived && q.is_published,
        Some(StatusFilter::Archived) => q.is_archived,
        Some(StatusFilter::Published) => q.is_published,
        Some(StatusFilter::Unpublished) => !q.is_published,
    };
    status_ok
        && matches_search(&filter.search, &[&q.question, &q.correct_answer], &q.tags)
        && matches_tags(&filter.tags, &q.tags)
}

fn wrong_answer_matches(filter: &ListFilter, a: &WrongAnswer) -> bool {
    let status_ok = match filter.status {
        Some(StatusFilter::Active) => !a.is_archived,
        Some(StatusFilter::Archived) => a.is_archived,
        _ => true,
    };
    status_ok
        && matches_search(&filter.search, &[&a.answer_text], &a.tags)
        && matches_tags(&filter.tags, &a.tags)
}

/// Newest first, then the requested window.
fn page<T: Clone>(rows: Vec<&T>, filter: &ListFilter) -> Vec<T> {
    rows.into_iter()
        .rev()
        .skip(filter.offset.max(0) as usize)
        .take(filter.limit.max(0) as usize)
        .cloned()
        .collect()
}

#[async_trait]
impl TriviaStore for MemoryTriviaStore {
    async fn list_questions(&self, filter: &ListFilter) -> Result<Vec<TriviaQuestion>, anyhow::Error> {
        let tables = self.tables.lock().map_err(poisoned)?;
        let rows = tables
            .questions
            .iter()
            .filter(|q| question_matches(filter, q))
            .collect();
        Ok(page(rows, filter))
    }

    async fn count_questions(&self, filter: &ListFilter) -> Result<i64, anyhow::Error> {
        let tables = self.tables.lock().map_err(poisoned)?;
        Ok(tables
            .questions
            .iter()
            .filter(|q| question_matches(filter, q))
            .count() as i64)
    }

    async fn find_question_by_id(&self, id: i64) -> Result<Option<TriviaQuestion>, anyhow::Error> {
        let tables = self.tables.lock().map_err(poisoned)?;
        Ok(tables.questions.iter().find(|q| q.id == id).cloned())
    }

    async fn find_question_by_text(
        &self,
        question: &str,
    ) -> Result<Option<TriviaQuestion>, anyhow::Error> {
        let tables = self.tables.lock().map_err(poisoned)?;
        Ok(tables.questions.iter().find(|q| q.question == question).cloned())
    }

    async fn insert_question(&self, fields: &QuestionFields) -> Result<TriviaQuestion, anyhow::Error> {
        let mut tables = self.tables.lock().map_err(poisoned)?;
        tables.next_question_id += 1;
        let question = TriviaQuestion {
            id: tables.next_question_id,
            created_at: Utc::now(),
            modified_at: None,
            is_archived: false,
            is_published: fields.is_published,
            question: fields.question.clone(),
            correct_answer: fields.correct_answer.clone(),
            tags: fields.tags.clone(),
        };
        tables.questions.push(question.clone());
        Ok(question)
    }

    async fn update_question(
        &self,
        id: i64,
        fields: &QuestionFields,
    ) -> Result<Option<TriviaQuestion>, anyhow::Error> {
        let mut tables = self.tables.lock().map_err(poisoned)?;
        Ok(tables.questions.iter_mut().find(|q| q.id == id).map(|q| {
            q.question = fields.question.clone();
            q.correct_answer = fields.correct_answer.clone();
            q.tags = fields.tags.clone();
            q.is_published = fields.is_published;
            q.modified_at = Some(Utc::now());
            q.clone()
        }))
    }

    async fn set_question_status(
        &self,
        id: i64,
        is_archived: bool,
        is_published: bool,
    ) -> Result<(), anyhow::Error> {
        let mut tables = self.tables.lock().map_err(poisoned)?;
        if let Some(q) = tables.questions.iter_mut().find(|q| q.id == id) {
            q.is_archived = is_archived;
            q.is_published = is_published;
            q.modified_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn list_wrong_answers(&self, filter: &ListFilter) -> Result<Vec<WrongAnswer>, anyhow::Error> {
        let tables = self.tables.lock().map_err(poisoned)?;
        let rows = tables
            .answers
            .iter()
            .filter(|a| wrong_answer_matches(filter, a))
            .collect();
        Ok(page(rows, filter))
    }

    async fn count_wrong_answers(&self, filter: &ListFilter) -> Result<i64, anyhow::Error> {
        let tables = self.tables.lock().map_err(poisoned)?;
        Ok(tables
            .answers
            .iter()
            .filter(|a| wrong_answer_matches(filter, a))
            .count() as i64)
    }

    async fn find_wrong_answer_by_id(&self, id: i64) -> Result<Option<WrongAnswer>, anyhow::Error> {
        let tables = self.tables.lock().map_err(poisoned)?;
        Ok(tables.answers.iter().find(|a| a.id == id).cloned())
    }

    async fn find_wrong_answer_by_text(
        &self,
        answer_text: &str,
    ) -> Result<Option<WrongAnswer>, anyhow::Error> {
        let tables = self.tables.lock().map_err(poisoned)?;
        Ok(tables
            .answers
            .iter()
            .find(|a| a.answer_text == answer_text)
            .cloned())
    }

    async fn insert_wrong_answer(
        &self,
        fields: &WrongAnswerFields,
    ) -> Result<WrongAnswer, anyhow::Error> {
        let mut tables = self.tables.lock().map_err(poisoned)?;
        tables.next_answer_id += 1;
        let answer = WrongAnswer {
            id: tables.next_answer_id,
            created_at: Utc::now(),
            modified_at: None,
            is_archived: false,
            answer_text: fields.answer_text.clone(),
            tags: fields.tags.clone(),
        };
        tables.answers.push(answer.clone());
        Ok(answer)
    }

    async fn update_wrong_answer(
        &self,
        id: i64,
        fields: &WrongAnswerFields,
    ) -> Result<Option<WrongAnswer>, anyhow::Error> {
        let mut tables = self.tables.lock().map_err(poisoned)?;
        Ok(tables.answers.iter_mut().find(|a| a.id == id).map(|a| {
            a.answer_text = fields.answer_text.clone();
            a.tags = fields.tags.clone();
            a.modified_at = Some(Utc::now());
            a.clone()
        }))
    }

    async fn set_wrong_answer_archived(
        &self,
        id: i64,
        is_archived: bool,
    ) -> Result<(), anyhow::Error> {
        let mut tables = self.tables.lock().map_err(poisoned)?;
        if let Some(a) = tables.answers.iter_mut().find(|a| a.id == id) {
            a.is_archived = is_archived;
            a.modified_at = Some(Utc::now());
        }
        Ok(())
    }
}
