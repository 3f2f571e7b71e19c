// src/handlers/review.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use sqlx::SqliteConnection;

use crate::{
    error::AppError,
    handlers::common::{
        TESTS_PATH, bound_database, fetch_test, flash_redirect, load_bound_attempt,
        review_attempted_path,
    },
    models::response::{
        AttemptedReviewResponse, PaletteEntry, PaletteResponse, ReviewFilter,
        ReviewQuestionResponse, ReviewedQuestion,
    },
    services::{
        router::DatabaseRouter,
        session::{AttemptKey, SessionStore},
    },
    utils::jwt::Identity,
};

const REVIEW_BASE_QUERY: &str = r#"
    SELECT tq.*, ur.user_answer, ur.is_correct
    FROM test_questions tq
    LEFT JOIN user_responses ur ON tq.id = ur.question_id
        AND ur.test_id = ? AND ur.user_id = ?
    WHERE tq.test_id = ?
"#;

async fn fetch_reviewed(
    conn: &mut SqliteConnection,
    key: AttemptKey,
    filter: ReviewFilter,
) -> Result<Vec<ReviewedQuestion>, AppError> {
    let sql = format!("{}{} ORDER BY tq.id", REVIEW_BASE_QUERY, filter.sql_condition());
    let rows = sqlx::query_as::<_, ReviewedQuestion>(&sql)
        .bind(key.test_id)
        .bind(key.user_id)
        .bind(key.test_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch review of test {}: {:?}", key.test_id, e);
            AppError::from(e)
        })?;
    Ok(rows)
}

/// Pre-submission overview: every question with its answered, marked and
/// skipped status from the running attempt.
pub async fn review_test(
    State(router): State<DatabaseRouter>,
    State(sessions): State<SessionStore>,
    Extension(identity): Extension<Identity>,
    Path(test_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let key = AttemptKey::new(test_id, identity.user_id);
    let (test, questions) = load_bound_attempt(&router, &sessions, key).await?;
    let state = sessions.snapshot(key);

    let questions: Vec<PaletteEntry> = questions
        .iter()
        .enumerate()
        .map(|(index, q)| PaletteEntry {
            q_num: index + 1,
            question_id: q.id,
            selected_answer: state.answers.get(&q.id).cloned(),
            marked: state.marked.contains(&q.id),
            skipped: state.skipped.contains(&q.id),
        })
        .collect();
    let answered_count = questions.iter().filter(|q| q.selected_answer.is_some()).count();

    Ok(Json(PaletteResponse {
        test,
        questions,
        answered_count,
    }))
}

/// Submitted results of the current user, split by correctness.
pub async fn review_attempted(
    State(router): State<DatabaseRouter>,
    State(sessions): State<SessionStore>,
    Extension(identity): Extension<Identity>,
    Path(test_id): Path<i64>,
) -> Result<Response, AppError> {
    let key = AttemptKey::new(test_id, identity.user_id);
    let descriptor = match bound_database(&router, &sessions, key).await {
        Ok(descriptor) => descriptor,
        Err(AppError::SessionExpired) => return Ok(Redirect::to(TESTS_PATH).into_response()),
        Err(e) => return Err(e),
    };
    let mut conn = router.open(&descriptor).await?;

    let Some(test) = fetch_test(&mut conn, test_id).await? else {
        let message = format!("Test ID {} not found!", test_id);
        return Ok(flash_redirect(&sessions, key.user_id, message, TESTS_PATH));
    };

    let all_questions = fetch_reviewed(&mut conn, key, ReviewFilter::All).await?;

    let mut correct_questions = Vec::new();
    let mut incorrect_questions = Vec::new();
    let mut unanswered_questions = Vec::new();
    for question in all_questions {
        match question.is_correct {
            Some(1) => correct_questions.push(question),
            Some(_) => incorrect_questions.push(question),
            None => unanswered_questions.push(question),
        }
    }

    tracing::debug!(
        "Review of test {} for user {}: {} correct, {} wrong, {} unanswered",
        test_id,
        key.user_id,
        correct_questions.len(),
        incorrect_questions.len(),
        unanswered_questions.len()
    );

    Ok(Json(AttemptedReviewResponse {
        test,
        correct_count: correct_questions.len(),
        incorrect_count: incorrect_questions.len(),
        unanswered_count: unanswered_questions.len(),
        correct_questions,
        incorrect_questions,
        unanswered_questions,
    })
    .into_response())
}

/// One question of a filtered walk through the submitted results.
/// `q_index` is 1-based within the filtered list.
pub async fn review_question(
    State(router): State<DatabaseRouter>,
    State(sessions): State<SessionStore>,
    Extension(identity): Extension<Identity>,
    Path((test_id, filter_type, q_index)): Path<(i64, String, usize)>,
) -> Result<Response, AppError> {
    let filter: ReviewFilter = filter_type.parse()?;
    let key = AttemptKey::new(test_id, identity.user_id);

    let descriptor = match bound_database(&router, &sessions, key).await {
        Ok(descriptor) => descriptor,
        Err(AppError::SessionExpired) => {
            return Ok(Redirect::to(&review_attempted_path(test_id)).into_response());
        }
        Err(e) => return Err(e),
    };
    let mut conn = router.open(&descriptor).await?;

    let Some(test) = fetch_test(&mut conn, test_id).await? else {
        let message = format!("Test ID {} not found!", test_id);
        return Ok(flash_redirect(&sessions, key.user_id, message, TESTS_PATH));
    };

    let mut questions = fetch_reviewed(&mut conn, key, filter).await?;
    let total = questions.len();
    if q_index < 1 || q_index > total {
        return Ok(flash_redirect(
            &sessions,
            key.user_id,
            "No questions found for this filter",
            &review_attempted_path(test_id),
        ));
    }

    let question = questions.swap_remove(q_index - 1);
    Ok(Json(ReviewQuestionResponse {
        test,
        question,
        q_index,
        total,
        filter_type: filter,
        prev_q: (q_index > 1).then(|| q_index - 1),
        next_q: (q_index < total).then(|| q_index + 1),
    })
    .into_response())
}
