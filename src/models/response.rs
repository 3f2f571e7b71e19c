// src/models/response.rs

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{
    error::AppError,
    models::{question::Question, test_info::TestInfo},
};

/// A question joined with the current user's stored response, if any.
/// `is_correct` is `None` when no row exists (the question was left unanswered).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReviewedQuestion {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub question: Question,
    pub user_answer: Option<String>,
    #[serde(serialize_with = "as_opt_bool")]
    pub is_correct: Option<i64>,
}

fn as_opt_bool<S: serde::Serializer>(value: &Option<i64>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => s.serialize_some(&(*v != 0)),
        None => s.serialize_none(),
    }
}

/// Aggregate counts of one submission. `total = correct + wrong + unanswered`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreSummary {
    pub total: usize,
    pub correct: usize,
    pub wrong: usize,
    pub unanswered: usize,
}

/// Response body of a successful `GET|POST /test/tests/{id}/submit`.
#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub test: TestInfo,
    #[serde(flatten)]
    pub summary: ScoreSummary,
}

/// Form body of `POST /test/tests/{id}/submit`.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitForm {
    pub review: Option<String>,
}

/// Which stored responses a review page walks through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewFilter {
    Correct,
    Incorrect,
    All,
}

impl ReviewFilter {
    /// Extra `WHERE` condition appended to the review join.
    pub fn sql_condition(self) -> &'static str {
        match self {
            ReviewFilter::Correct => " AND ur.is_correct = 1",
            ReviewFilter::Incorrect => " AND ur.is_correct = 0",
            ReviewFilter::All => "",
        }
    }
}

impl FromStr for ReviewFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "correct" => Ok(ReviewFilter::Correct),
            "incorrect" => Ok(ReviewFilter::Incorrect),
            "all" => Ok(ReviewFilter::All),
            other => Err(AppError::InvalidFilter(other.to_string())),
        }
    }
}

/// Pre-submission status of one question, for the review palette.
#[derive(Debug, Serialize)]
pub struct PaletteEntry {
    pub q_num: usize,
    pub question_id: i64,
    pub selected_answer: Option<String>,
    pub marked: bool,
    pub skipped: bool,
}

#[derive(Debug, Serialize)]
pub struct PaletteResponse {
    pub test: TestInfo,
    pub questions: Vec<PaletteEntry>,
    pub answered_count: usize,
}

/// Post-submission results grouped by correctness.
#[derive(Debug, Serialize)]
pub struct AttemptedReviewResponse {
    pub test: TestInfo,
    pub correct_count: usize,
    pub incorrect_count: usize,
    pub unanswered_count: usize,
    pub correct_questions: Vec<ReviewedQuestion>,
    pub incorrect_questions: Vec<ReviewedQuestion>,
    pub unanswered_questions: Vec<ReviewedQuestion>,
}

/// One question of a filtered review walk, with its neighbours.
#[derive(Debug, Serialize)]
pub struct ReviewQuestionResponse {
    pub test: TestInfo,
    pub question: ReviewedQuestion,
    pub q_index: usize,
    pub total: usize,
    pub filter_type: ReviewFilter,
    pub prev_q: Option<usize>,
    pub next_q: Option<usize>,
}
