// src/handlers/catalog.rs

use std::collections::BTreeMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use crate::{
    config::Config,
    error::AppError,
    handlers::common::{fetch_questions, fetch_test},
    models::{
        question::{GroupedQuestions, TestQuestionsResponse},
        test_info::{TestListResponse, TestListingRow, TestSummary},
    },
    services::{
        discovery::{Category, DatabaseDescriptor},
        router::DatabaseRouter,
        session::SessionStore,
    },
    utils::jwt::Identity,
};

async fn list_in_database(
    router: &DatabaseRouter,
    descriptor: &DatabaseDescriptor,
    user_id: i64,
) -> Result<Vec<TestListingRow>, AppError> {
    let mut conn = router.open(descriptor).await?;

    let rows = sqlx::query_as::<_, TestListingRow>(
        r#"
        SELECT
            ti.*,
            EXISTS (
                SELECT 1 FROM user_responses ur
                WHERE ur.test_id = ti.id AND ur.user_id = ? AND ur.test_submitted = 1
            ) AS test_submitted
        FROM test_info ti
        ORDER BY ti.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut conn)
    .await?;

    Ok(rows)
}

/// Lists the tests of every test database matching the session's goal key.
///
/// Databases that cannot be read are logged and left out of the listing.
/// Pending flash messages are returned (and cleared) alongside.
pub async fn list_tests(
    State(router): State<DatabaseRouter>,
    State(sessions): State<SessionStore>,
    State(config): State<Config>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, AppError> {
    let goal = sessions.goal(identity.user_id);
    let databases = router
        .resolve_by_goal(Category::Test, goal.as_deref())
        .await;

    tracing::debug!(
        "Goal {:?} matched {} test database(s)",
        goal,
        databases.len()
    );

    let mut tests = Vec::new();
    for descriptor in &databases {
        match list_in_database(&router, descriptor, identity.user_id).await {
            Ok(rows) => {
                tests.extend(rows.into_iter().map(|row| TestSummary {
                    effective_locked: config.lock_gating && row.test.locked(),
                    test_submitted: row.test_submitted != 0,
                    database_file: descriptor.file_name.clone(),
                    test: row.test,
                }));
            }
            Err(e) => {
                tracing::error!("Skipping {} in test listing: {}", descriptor.file_name, e);
            }
        }
    }

    tests.sort_by(|a, b| b.test.created_at.cmp(&a.test.created_at));

    Ok(Json(TestListResponse {
        goal,
        flashes: sessions.take_flashes(identity.user_id),
        tests,
    }))
}

/// Full question dump of a test, grouped by subject and topic.
pub async fn view_test_questions(
    State(router): State<DatabaseRouter>,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let descriptor = router.resolve_by_test_id(test_id).await?;
    let mut conn = router.open(&descriptor).await?;

    let test = fetch_test(&mut conn, test_id)
        .await?
        .ok_or(AppError::TestNotFound(test_id))?;
    let questions = fetch_questions(&mut conn, test_id).await?;

    let mut grouped_questions: GroupedQuestions = BTreeMap::new();
    for question in questions {
        let subject = question.subject.clone().unwrap_or_default();
        let topic = question.topic.clone().unwrap_or_default();
        grouped_questions
            .entry(subject)
            .or_default()
            .entry(topic)
            .or_default()
            .push(question);
    }

    Ok(Json(TestQuestionsResponse {
        test,
        grouped_questions,
    }))
}
