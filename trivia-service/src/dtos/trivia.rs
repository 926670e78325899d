use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 25;

/// Raw listing query. Numeric values that fail to parse or are not positive
/// fall back to the defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub tags: Option<String>,
}

impl ListQuery {
    pub fn page(&self) -> i64 {
        positive_or(self.page.as_deref(), DEFAULT_PAGE)
    }

    pub fn page_size(&self) -> i64 {
        positive_or(self.page_size.as_deref(), DEFAULT_PAGE_SIZE)
    }
}

fn positive_or(value: Option<&str>, default: i64) -> i64 {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub correct_answer: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_published: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WrongAnswerRequest {
    #[serde(default)]
    pub answer_text: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuestionImport {
    pub question: String,
    pub correct_answer: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WrongAnswerImport {
    pub answer_text: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct QuestionImportResults {
    pub total_questions_processed: i64,
    pub questions_added: i64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct WrongAnswerImportResults {
    pub total_answers_processed: i64,
    pub answers_added: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        let query = ListQuery::default();
        assert_eq!(query.page(), 1);
        assert_eq!(query.page_size(), 25);
    }

    #[test]
    fn test_pagination_ignores_bad_values() {
        let query = ListQuery {
            page: Some("-3".to_string()),
            page_size: Some("lots".to_string()),
            ..Default::default()
        };
        assert_eq!(query.page(), 1);
        assert_eq!(query.page_size(), 25);

        let query = ListQuery {
            page: Some("4".to_string()),
            page_size: Some("10".to_string()),
            ..Default::default()
        };
        assert_eq!(query.page(), 4);
        assert_eq!(query.page_size(), 10);
    }
}
