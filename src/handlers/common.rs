// src/handlers/common.rs

//! Query and redirect helpers shared by the test handlers.

use axum::response::{IntoResponse, Redirect, Response};
use sqlx::SqliteConnection;

use crate::{
    error::AppError,
    models::{question::Question, test_info::TestInfo},
    services::{
        discovery::DatabaseDescriptor,
        router::DatabaseRouter,
        session::{AttemptKey, SessionStore},
    },
};

pub const TESTS_PATH: &str = "/test/tests";

pub fn question_path(test_id: i64, q_num: usize) -> String {
    format!("{}/{}/question/{}", TESTS_PATH, test_id, q_num)
}

pub fn submit_path(test_id: i64) -> String {
    format!("{}/{}/submit", TESTS_PATH, test_id)
}

pub fn review_attempted_path(test_id: i64) -> String {
    format!("{}/{}/review-attempted", TESTS_PATH, test_id)
}

/// Queues `message` for the user and answers with `303 See Other` to `to`.
pub fn flash_redirect(
    sessions: &SessionStore,
    user_id: i64,
    message: impl Into<String>,
    to: &str,
) -> Response {
    sessions.push_flash(user_id, message);
    Redirect::to(to).into_response()
}

/// The database the attempt is bound to, checked to still exist.
pub async fn bound_database(
    router: &DatabaseRouter,
    sessions: &SessionStore,
    key: AttemptKey,
) -> Result<DatabaseDescriptor, AppError> {
    let state = sessions.snapshot(key);
    let path = state.database_file.ok_or(AppError::SessionExpired)?;
    router.bound(&path).await
}

pub async fn fetch_test(
    conn: &mut SqliteConnection,
    test_id: i64,
) -> Result<Option<TestInfo>, AppError> {
    let test = sqlx::query_as::<_, TestInfo>("SELECT * FROM test_info WHERE id = ?")
        .bind(test_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch test {}: {:?}", test_id, e);
            AppError::from(e)
        })?;
    Ok(test)
}

/// Questions of the test in attempt order (by id).
pub async fn fetch_questions(
    conn: &mut SqliteConnection,
    test_id: i64,
) -> Result<Vec<Question>, AppError> {
    let questions = sqlx::query_as::<_, Question>(
        "SELECT * FROM test_questions WHERE test_id = ? ORDER BY id",
    )
    .bind(test_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch questions of test {}: {:?}", test_id, e);
        AppError::from(e)
    })?;
    Ok(questions)
}

/// Loads the test and its questions from the attempt's bound database.
/// Fails with `TestNotFound` when the test is missing or has no questions.
pub async fn load_bound_attempt(
    router: &DatabaseRouter,
    sessions: &SessionStore,
    key: AttemptKey,
) -> Result<(TestInfo, Vec<Question>), AppError> {
    let descriptor = bound_database(router, sessions, key).await?;
    let mut conn = router.open(&descriptor).await?;

    let test = fetch_test(&mut conn, key.test_id)
        .await?
        .ok_or(AppError::TestNotFound(key.test_id))?;
    let questions = fetch_questions(&mut conn, key.test_id).await?;
    if questions.is_empty() {
        return Err(AppError::TestNotFound(key.test_id));
    }

    Ok((test, questions))
}
