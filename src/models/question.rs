// src/models/question.rs

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::test_info::TestInfo;

/// Represents the 'test_questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Question {
    pub id: i64,

    #[sqlx(default)]
    pub subject: Option<String>,

    #[sqlx(default)]
    pub topic: Option<String>,

    /// The question text. Stored in the `question` column.
    #[sqlx(rename = "question")]
    pub prompt: String,

    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,

    /// The correct option letter.
    pub correct_answer: String,

    #[sqlx(default)]
    pub explanation: Option<String>,
}

/// DTO for sending a question to the client while an attempt is running
/// (excludes the correct answer and the explanation).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub subject: Option<String>,
    pub topic: Option<String>,
    pub prompt: String,
    pub options: [String; 4],
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            subject: q.subject,
            topic: q.topic,
            prompt: q.prompt,
            options: [q.option_a, q.option_b, q.option_c, q.option_d],
        }
    }
}

/// Helper struct for fetching answer keys when scoring.
#[derive(Debug, Clone, FromRow)]
pub struct AnswerKey {
    pub id: i64,
    pub correct_answer: String,
}

/// Full question dump: subject -> topic -> questions.
pub type GroupedQuestions = BTreeMap<String, BTreeMap<String, Vec<Question>>>;

#[derive(Debug, Serialize)]
pub struct TestQuestionsResponse {
    pub test: TestInfo,
    pub grouped_questions: GroupedQuestions,
}

/// Single-question page of a running attempt.
#[derive(Debug, Serialize)]
pub struct QuestionView {
    pub test: TestInfo,
    pub question: PublicQuestion,
    pub q_num: usize,
    pub total: usize,
    pub selected_answer: Option<String>,
    pub is_marked: bool,
    pub is_skipped: bool,
    pub marked_questions: BTreeSet<i64>,
    pub skipped_questions: BTreeSet<i64>,
    pub duration_minutes: Option<i64>,
    pub flashes: Vec<String>,
}

/// Navigation action posted from the question page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nav {
    Previous,
    Next,
    Submit,
    Skip,
}

/// Form body of `POST /test/tests/{id}/question/{n}`.
#[derive(Debug, Deserialize, Validate)]
pub struct QuestionForm {
    #[validate(length(max = 500))]
    pub answer: Option<String>,
    pub nav: Option<String>,
}

impl QuestionForm {
    /// The selected option, with blank submissions treated as "no answer".
    pub fn selected(&self) -> Option<&str> {
        self.answer
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }

    /// Unknown or missing actions yield `None` and simply re-render the page.
    pub fn nav(&self) -> Option<Nav> {
        match self.nav.as_deref()? {
            "previous" => Some(Nav::Previous),
            "next" => Some(Nav::Next),
            "submit" => Some(Nav::Submit),
            "skip" => Some(Nav::Skip),
            _ => None,
        }
    }
}
