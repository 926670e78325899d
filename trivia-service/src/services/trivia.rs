use std::sync::Arc;

use crate::{
    dtos::trivia::{
        ListQuery, QuestionImport, QuestionImportResults, QuestionRequest, WrongAnswerImport,
        WrongAnswerImportResults, WrongAnswerRequest,
    },
    models::{Paginated, TriviaQuestion, WrongAnswer},
    services::{
        store::{ListFilter, QuestionFields, StatusFilter, TriviaStore, WrongAnswerFields},
        ServiceError,
    },
};

fn normalize_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

fn list_filter(query: &ListQuery) -> ListFilter {
    let page = query.page();
    let page_size = query.page_size();

    ListFilter {
        limit: page_size,
        offset: (page - 1).saturating_mul(page_size),
        search: query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        status: query.status.as_deref().and_then(StatusFilter::parse),
        tags: query
            .tags
            .as_deref()
            .map(|t| normalize_tags(&t.split(',').map(str::to_string).collect::<Vec<_>>()))
            .unwrap_or_default(),
    }
}

/// Question and wrong-answer pool management.
#[derive(Clone)]
pub struct TriviaService {
    store: Arc<dyn TriviaStore>,
}

impl TriviaService {
    pub fn new(store: Arc<dyn TriviaStore>) -> Self {
        Self { store }
    }

    // ==================== Questions ====================

    pub async fn list_questions(
        &self,
        query: &ListQuery,
    ) -> Result<Paginated<TriviaQuestion>, ServiceError> {
        let filter = list_filter(query);
        let results = self
            .store
            .list_questions(&filter)
            .await
            .map_err(ServiceError::Database)?;
        let total = self
            .store
            .count_questions(&filter)
            .await
            .map_err(ServiceError::Database)?;

        Ok(Paginated {
            results,
            total,
            page_size: query.page_size(),
            page: query.page(),
        })
    }

    pub async fn get_question(&self, id: i64) -> Result<TriviaQuestion, ServiceError> {
        self.store
            .find_question_by_id(id)
            .await
            .map_err(ServiceError::Database)?
            .ok_or_else(|| ServiceError::NotFound("question".to_string()))
    }

    fn question_fields(req: &QuestionRequest) -> Result<QuestionFields, ServiceError> {
        let question = req.question.trim();
        let correct_answer = req.correct_answer.trim();
        if question.is_empty() || correct_answer.is_empty() {
            return Err(ServiceError::Validation(
                "question and correct answer are required".to_string(),
            ));
        }
        Ok(QuestionFields {
            question: question.to_string(),
            correct_answer: correct_answer.to_string(),
            tags: normalize_tags(&req.tags),
            is_published: req.is_published,
        })
    }

    pub async fn create_question(&self, req: &QuestionRequest) -> Result<TriviaQuestion, ServiceError> {
        let fields = Self::question_fields(req)?;

        if self
            .store
            .find_question_by_text(&fields.question)
            .await
            .map_err(ServiceError::Database)?
            .is_some()
        {
            return Err(ServiceError::DuplicateQuestion);
        }

        let question = self
            .store
            .insert_question(&fields)
            .await
            .map_err(ServiceError::Database)?;
        tracing::info!(question_id = question.id, "Question created");
        Ok(question)
    }

    pub async fn update_question(
        &self,
        id: i64,
        req: &QuestionRequest,
    ) -> Result<TriviaQuestion, ServiceError> {
        let fields = Self::question_fields(req)?;
        let existing = self.get_question(id).await?;

        if existing.question != fields.question {
            if let Some(duplicate) = self
                .store
                .find_question_by_text(&fields.question)
                .await
                .map_err(ServiceError::Database)?
            {
                if duplicate.id != id {
                    return Err(ServiceError::DuplicateQuestion);
                }
            }
        }

        self.store
            .update_question(id, &fields)
            .await
            .map_err(ServiceError::Database)?
            .ok_or_else(|| ServiceError::NotFound("question".to_string()))
    }

    /// Archiving also unpublishes; unarchiving leaves the question unpublished.
    pub async fn toggle_question_archived(&self, id: i64) -> Result<(), ServiceError> {
        let question = self.get_question(id).await?;
        let (is_archived, is_published) = if question.is_archived {
            (false, question.is_published)
        } else {
            (true, false)
        };

        self.store
            .set_question_status(id, is_archived, is_published)
            .await
            .map_err(ServiceError::Database)
    }

    pub async fn toggle_question_published(&self, id: i64) -> Result<(), ServiceError> {
        let question = self.get_question(id).await?;
        if question.is_archived {
            return Err(ServiceError::Validation(
                "cannot change published status of archived question".to_string(),
            ));
        }

        self.store
            .set_question_status(id, false, !question.is_published)
            .await
            .map_err(ServiceError::Database)
    }

    /// Insert every valid question whose trimmed text is not already present.
    /// Items missing a question or answer are skipped.
    pub async fn import_questions(
        &self,
        data: &[QuestionImport],
    ) -> Result<QuestionImportResults, ServiceError> {
        let mut added = 0;
        for item in data {
            let fields = match Self::question_fields(&QuestionRequest {
                question: item.question.clone(),
                correct_answer: item.correct_answer.clone(),
                tags: item.tags.clone(),
                is_published: true,
            }) {
                Ok(fields) => fields,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping invalid imported question");
                    continue;
                }
            };

            let existing = self
                .store
                .find_question_by_text(&fields.question)
                .await
                .map_err(ServiceError::Database)?;
            if existing.is_some() {
                continue;
            }

            self.store
                .insert_question(&fields)
                .await
                .map_err(ServiceError::Database)?;
            added += 1;
        }

        tracing::info!(processed = data.len(), added, "Questions imported");
        Ok(QuestionImportResults {
            total_questions_processed: data.len() as i64,
            questions_added: added,
        })
    }

    // ==================== Wrong answers ====================

    pub async fn list_wrong_answers(
        &self,
        query: &ListQuery,
    ) -> Result<Paginated<WrongAnswer>, ServiceError> {
        let filter = list_filter(query);
        let results = self
            .store
            .list_wrong_answers(&filter)
            .await
            .map_err(ServiceError::Database)?;
        let total = self
            .store
            .count_wrong_answers(&filter)
            .await
            .map_err(ServiceError::Database)?;

        Ok(Paginated {
            results,
            total,
            page_size: query.page_size(),
            page: query.page(),
        })
    }

    pub async fn get_wrong_answer(&self, id: i64) -> Result<WrongAnswer, ServiceError> {
        self.store
            .find_wrong_answer_by_id(id)
            .await
            .map_err(ServiceError::Database)?
            .ok_or_else(|| ServiceError::NotFound("wrong answer".to_string()))
    }

    fn wrong_answer_fields(req: &WrongAnswerRequest) -> Result<WrongAnswerFields, ServiceError> {
        let answer_text = req.answer_text.trim();
        if answer_text.is_empty() {
            return Err(ServiceError::Validation("answer text is required".to_string()));
        }
        Ok(WrongAnswerFields {
            answer_text: answer_text.to_string(),
            tags: normalize_tags(&req.tags),
        })
    }

    pub async fn create_wrong_answer(
        &self,
        req: &WrongAnswerRequest,
    ) -> Result<WrongAnswer, ServiceError> {
        let fields = Self::wrong_answer_fields(req)?;

        if self
            .store
            .find_wrong_answer_by_text(&fields.answer_text)
            .await
            .map_err(ServiceError::Database)?
            .is_some()
        {
            return Err(ServiceError::DuplicateWrongAnswer);
        }

        let answer = self
            .store
            .insert_wrong_answer(&fields)
            .await
            .map_err(ServiceError::Database)?;
        tracing::info!(wrong_answer_id = answer.id, "Wrong answer created");
        Ok(answer)
    }

    pub async fn update_wrong_answer(
        &self,
        id: i64,
        req: &WrongAnswerRequest,
    ) -> Result<WrongAnswer, ServiceError> {
        let fields = Self::wrong_answer_fields(req)?;
        let existing = self.get_wrong_answer(id).await?;

        if existing.answer_text != fields.answer_text {
            if let Some(duplicate) = self
                .store
                .find_wrong_answer_by_text(&fields.answer_text)
                .await
                .map_err(ServiceError::Database)?
            {
                if duplicate.id != id {
                    return Err(ServiceError::DuplicateWrongAnswer);
                }
            }
        }

        self.store
            .update_wrong_answer(id, &fields)
            .await
            .map_err(ServiceError::Database)?
            .ok_or_else(|| ServiceError::NotFound("wrong answer".to_string()))
    }

    pub async fn toggle_wrong_answer_archived(&self, id: i64) -> Result<(), ServiceError> {
        let answer = self.get_wrong_answer(id).await?;
        self.store
            .set_wrong_answer_archived(id, !answer.is_archived)
            .await
            .map_err(ServiceError::Database)
    }

    pub async fn import_wrong_answers(
        &self,
        data: &[WrongAnswerImport],
    ) -> Result<WrongAnswerImportResults, ServiceError> {
        let mut added = 0;
        for item in data {
            let fields = match Self::wrong_answer_fields(&WrongAnswerRequest {
                answer_text: item.answer_text.clone(),
                tags: item.tags.clone(),
            }) {
                Ok(fields) => fields,
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping invalid imported wrong answer");
                    continue;
                }
            };

            let existing = self
                .store
                .find_wrong_answer_by_text(&fields.answer_text)
                .await
                .map_err(ServiceError::Database)?;
            if existing.is_some() {
                continue;
            }

            self.store
                .insert_wrong_answer(&fields)
                .await
                .map_err(ServiceError::Database)?;
            added += 1;
        }

        tracing::info!(processed = data.len(), added, "Wrong answers imported");
        Ok(WrongAnswerImportResults {
            total_answers_processed: data.len() as i64,
            answers_added: added,
        })
    }
}
