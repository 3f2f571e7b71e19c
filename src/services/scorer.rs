// src/services/scorer.rs

use std::collections::BTreeMap;

use sqlx::{Connection, SqliteConnection};

use crate::{
    config::{PERSIST_ATTEMPTS, SUBMITTED_MARKER_QUESTION_ID},
    error::AppError,
    models::{question::AnswerKey, response::ScoreSummary, test_info::TestInfo},
    services::{
        router::DatabaseRouter,
        session::{AttemptKey, SessionStore},
    },
};

/// Outcome of grading one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradedAnswer {
    pub question_id: i64,
    pub user_answer: String,
    pub is_correct: bool,
}

#[derive(Debug)]
pub struct Submission {
    pub test: TestInfo,
    pub summary: ScoreSummary,
}

/// Case-insensitive match; a blank answer never matches.
pub fn is_correct(user_answer: &str, correct_answer: &str) -> bool {
    let user_answer = user_answer.trim();
    !user_answer.is_empty() && user_answer.to_lowercase() == correct_answer.trim().to_lowercase()
}

/// Grades `answers` against the answer keys.
///
/// Unanswered questions produce no `GradedAnswer`; they only count toward
/// `unanswered`. Answers to ids outside `keys` are ignored.
pub fn grade(
    keys: &[AnswerKey],
    answers: &BTreeMap<i64, String>,
) -> (Vec<GradedAnswer>, ScoreSummary) {
    let mut graded = Vec::new();
    let mut summary = ScoreSummary {
        total: keys.len(),
        ..ScoreSummary::default()
    };

    for key in keys {
        let Some(answer) = answers
            .get(&key.id)
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
        else {
            continue;
        };
        let correct = is_correct(answer, &key.correct_answer);
        if correct {
            summary.correct += 1;
        } else {
            summary.wrong += 1;
        }
        graded.push(GradedAnswer {
            question_id: key.id,
            user_answer: answer.to_string(),
            is_correct: correct,
        });
    }

    summary.unanswered = summary.total - summary.correct - summary.wrong;
    (graded, summary)
}

/// Upserts one row per graded answer plus the submitted marker, in one
/// transaction. Rows of questions left unanswered this time are kept.
async fn write_responses(
    conn: &mut SqliteConnection,
    key: AttemptKey,
    graded: &[GradedAnswer],
) -> Result<(), sqlx::Error> {
    let mut tx = conn.begin().await?;

    for answer in graded {
        sqlx::query(
            r#"
            INSERT INTO user_responses
                (test_id, user_id, question_id, user_answer, is_correct,
                 test_started, test_submitted)
            VALUES (?, ?, ?, ?, ?, 1, 1)
            ON CONFLICT(test_id, user_id, question_id) DO UPDATE SET
                user_answer = excluded.user_answer,
                is_correct = excluded.is_correct,
                test_started = 1,
                test_submitted = 1,
                timestamp = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key.test_id)
        .bind(key.user_id)
        .bind(answer.question_id)
        .bind(&answer.user_answer)
        .bind(i64::from(answer.is_correct))
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO user_responses (test_id, user_id, question_id, test_started, test_submitted)
        VALUES (?, ?, ?, 1, 1)
        ON CONFLICT(test_id, user_id, question_id) DO UPDATE SET
            test_submitted = 1,
            timestamp = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key.test_id)
    .bind(key.user_id)
    .bind(SUBMITTED_MARKER_QUESTION_ID)
    .execute(&mut *tx)
    .await?;

    tx.commit().await
}

/// Scores the attempt held in the session, persists its response records
/// and clears the session's answers.
///
/// * `SessionExpired` if the attempt is unbound or its file vanished.
/// * `AlreadySubmitted` if the attempt was scored and not started again.
/// * `TestNotFound` if the bound file has no such test or no questions.
/// * `PersistenceFailure` if the write set cannot be committed; the session
///   is left untouched so the submission can be retried.
pub async fn submit_attempt(
    router: &DatabaseRouter,
    sessions: &SessionStore,
    key: AttemptKey,
) -> Result<Submission, AppError> {
    let state = sessions.snapshot(key);
    let bound = state.database_file.as_deref().ok_or(AppError::SessionExpired)?;
    if state.submitted {
        return Err(AppError::AlreadySubmitted(key.test_id));
    }
    let descriptor = router.bound(bound).await?;
    let mut conn = router.open(&descriptor).await?;

    let test = sqlx::query_as::<_, TestInfo>("SELECT * FROM test_info WHERE id = ?")
        .bind(key.test_id)
        .fetch_optional(&mut conn)
        .await?
        .ok_or(AppError::TestNotFound(key.test_id))?;

    let keys = sqlx::query_as::<_, AnswerKey>(
        "SELECT id, correct_answer FROM test_questions WHERE test_id = ? ORDER BY id",
    )
    .bind(key.test_id)
    .fetch_all(&mut conn)
    .await?;

    if keys.is_empty() {
        return Err(AppError::TestNotFound(key.test_id));
    }

    let (graded, summary) = grade(&keys, &state.answers);

    let mut attempt = 1;
    loop {
        match write_responses(&mut conn, key, &graded).await {
            Ok(()) => break,
            Err(e) if attempt < PERSIST_ATTEMPTS => {
                tracing::warn!(
                    "Saving responses for test {} user {} failed (attempt {}): {:?}",
                    key.test_id,
                    key.user_id,
                    attempt,
                    e
                );
                attempt += 1;
            }
            Err(e) => return Err(AppError::PersistenceFailure(e.to_string())),
        }
    }

    tracing::info!(
        "Test {} submitted by user {} in {}: {}/{} correct",
        key.test_id,
        key.user_id,
        descriptor.file_name,
        summary.correct,
        summary.total
    );

    sessions.clear(key);

    Ok(Submission { test, summary })
}
