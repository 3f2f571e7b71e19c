// src/handlers/attempt.rs

use axum::{
    Extension, Form, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    handlers::common::{
        TESTS_PATH, bound_database, fetch_test, flash_redirect, load_bound_attempt,
        question_path, review_attempted_path, submit_path,
    },
    models::{
        question::{Nav, PublicQuestion, Question, QuestionForm, QuestionView},
        response::{ReportResponse, SubmitForm},
        test_info::TestInfo,
    },
    services::{
        router::DatabaseRouter,
        scorer,
        session::{AttemptKey, SessionStore},
    },
    utils::jwt::Identity,
};

#[derive(Debug, Deserialize)]
pub struct StartParams {
    pub db_file: Option<String>,
}

/// Binds a new attempt to the database file the listing reported for the
/// test, then redirects to the first question.
///
/// Every failure is reported as a flash message and a redirect to the list.
pub async fn start_test(
    State(router): State<DatabaseRouter>,
    State(sessions): State<SessionStore>,
    State(config): State<Config>,
    Extension(identity): Extension<Identity>,
    Path(test_id): Path<i64>,
    Query(params): Query<StartParams>,
) -> Response {
    let user_id = identity.user_id;
    let Some(db_file) = params.db_file.filter(|f| !f.trim().is_empty()) else {
        return flash_redirect(&sessions, user_id, "No database specified!", TESTS_PATH);
    };

    let descriptor = match router.resolve_named(&db_file, test_id).await {
        Ok(descriptor) => descriptor,
        Err(AppError::TestNotFound(_)) => {
            let message = format!("Test ID {} not found in {}!", test_id, db_file);
            return flash_redirect(&sessions, user_id, message, TESTS_PATH);
        }
        Err(AppError::NotFound(message)) | Err(AppError::BadRequest(message)) => {
            return flash_redirect(&sessions, user_id, message, TESTS_PATH);
        }
        Err(e) => {
            tracing::error!("Cannot start test {} from {}: {}", test_id, db_file, e);
            let message = format!("Database {} could not be opened!", db_file);
            return flash_redirect(&sessions, user_id, message, TESTS_PATH);
        }
    };

    // Opening provisions the response table before the attempt writes to it.
    let test = match router.open(&descriptor).await {
        Ok(mut conn) => fetch_test(&mut conn, test_id).await,
        Err(e) => Err(e),
    };
    match test {
        Ok(Some(test)) if config.lock_gating && test.locked() => {
            let message = format!("Test {} is locked!", test.test_name);
            return flash_redirect(&sessions, user_id, message, TESTS_PATH);
        }
        Ok(Some(_)) => {}
        Ok(None) => {
            let message = format!("Test ID {} not found in {}!", test_id, db_file);
            return flash_redirect(&sessions, user_id, message, TESTS_PATH);
        }
        Err(e) => {
            tracing::error!("Cannot start test {} from {}: {}", test_id, db_file, e);
            let message = format!("Database {} could not be opened!", db_file);
            return flash_redirect(&sessions, user_id, message, TESTS_PATH);
        }
    }

    let key = AttemptKey::new(test_id, user_id);
    sessions.start_attempt(key, descriptor.path);
    tracing::info!(
        "User {} started test {} in {}",
        user_id,
        test_id,
        descriptor.file_name
    );

    Redirect::to(&question_path(test_id, 1)).into_response()
}

fn build_view(
    sessions: &SessionStore,
    key: AttemptKey,
    test: TestInfo,
    mut questions: Vec<Question>,
    q_num: usize,
) -> QuestionView {
    let total = questions.len();
    let question = questions.swap_remove(q_num - 1);
    let state = sessions.snapshot(key);

    QuestionView {
        duration_minutes: test.duration_minutes,
        test,
        q_num,
        total,
        selected_answer: state.answers.get(&question.id).cloned(),
        is_marked: state.marked.contains(&question.id),
        is_skipped: state.skipped.contains(&question.id),
        marked_questions: state.marked,
        skipped_questions: state.skipped,
        question: PublicQuestion::from(question),
        flashes: sessions.take_flashes(key.user_id),
    }
}

fn check_position(q_num: usize, total: usize) -> Result<(), AppError> {
    if q_num < 1 || q_num > total {
        return Err(AppError::NotFound(format!("Question {} not found", q_num)));
    }
    Ok(())
}

/// Shows question `q_num` (1-based) of the running attempt.
pub async fn show_question(
    State(router): State<DatabaseRouter>,
    State(sessions): State<SessionStore>,
    Extension(identity): Extension<Identity>,
    Path((test_id, q_num)): Path<(i64, usize)>,
) -> Result<impl IntoResponse, AppError> {
    let key = AttemptKey::new(test_id, identity.user_id);
    let (test, questions) = load_bound_attempt(&router, &sessions, key).await?;
    check_position(q_num, questions.len())?;

    Ok(Json(build_view(&sessions, key, test, questions, q_num)))
}

/// Applies one navigation action to the attempt.
///
/// * `skip`: skip the question and move forward.
/// * `next` / `submit`: require an answer, save it, move forward or to submission.
/// * `previous`: save the answer if one was given and move back.
/// Anything else re-renders the question.
pub async fn answer_question(
    State(router): State<DatabaseRouter>,
    State(sessions): State<SessionStore>,
    Extension(identity): Extension<Identity>,
    Path((test_id, q_num)): Path<(i64, usize)>,
    Form(form): Form<QuestionForm>,
) -> Result<Response, AppError> {
    if let Err(validation_errors) = form.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let key = AttemptKey::new(test_id, identity.user_id);
    let (test, questions) = load_bound_attempt(&router, &sessions, key).await?;
    let total = questions.len();
    check_position(q_num, total)?;
    let question_id = questions[q_num - 1].id;

    let redirect = match form.nav() {
        Some(Nav::Skip) => {
            sessions.record_skip(key, question_id);
            Some(question_path(test_id, (q_num + 1).min(total)))
        }
        Some(nav @ (Nav::Next | Nav::Submit)) => match form.selected() {
            Some(answer) => {
                sessions.record_answer(key, question_id, answer);
                if nav == Nav::Next {
                    Some(question_path(test_id, (q_num + 1).min(total)))
                } else {
                    Some(submit_path(test_id))
                }
            }
            None => {
                sessions.push_flash(key.user_id, "Please select an option or choose Skip.");
                None
            }
        },
        Some(Nav::Previous) => {
            if let Some(answer) = form.selected() {
                sessions.record_answer(key, question_id, answer);
            }
            Some(question_path(test_id, q_num.saturating_sub(1).max(1)))
        }
        None => None,
    };

    match redirect {
        Some(to) => Ok(Redirect::to(&to).into_response()),
        None => Ok(Json(build_view(&sessions, key, test, questions, q_num)).into_response()),
    }
}

/// Flips the mark of question `q_num` and reports the new state as JSON.
pub async fn toggle_mark(
    State(router): State<DatabaseRouter>,
    State(sessions): State<SessionStore>,
    Extension(identity): Extension<Identity>,
    Path((test_id, q_num)): Path<(i64, usize)>,
) -> Result<Response, AppError> {
    let key = AttemptKey::new(test_id, identity.user_id);

    let descriptor = match bound_database(&router, &sessions, key).await {
        Ok(descriptor) => Some(descriptor),
        Err(AppError::SessionExpired) => match router.resolve_by_test_id(test_id).await {
            Ok(descriptor) => Some(descriptor),
            Err(AppError::TestNotFound(_)) => None,
            Err(e) => return Err(e),
        },
        Err(e) => return Err(e),
    };

    let question_ids = match descriptor {
        Some(descriptor) => {
            let mut conn = router.open(&descriptor).await?;
            sqlx::query_scalar::<_, i64>(
                "SELECT id FROM test_questions WHERE test_id = ? ORDER BY id",
            )
            .bind(test_id)
            .fetch_all(&mut conn)
            .await?
        }
        None => Vec::new(),
    };

    if q_num < 1 || q_num > question_ids.len() {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "Invalid question" })),
        )
            .into_response());
    }

    let marked = sessions.toggle_mark(key, question_ids[q_num - 1]);
    Ok(Json(json!({ "success": true, "marked": marked })).into_response())
}

async fn finish_attempt(
    router: &DatabaseRouter,
    sessions: &SessionStore,
    key: AttemptKey,
) -> Result<Response, AppError> {
    match scorer::submit_attempt(router, sessions, key).await {
        Ok(submission) => Ok(Json(ReportResponse {
            test: submission.test,
            summary: submission.summary,
        })
        .into_response()),
        Err(AppError::SessionExpired) => Ok(flash_redirect(
            sessions,
            key.user_id,
            "Test session expired!",
            TESTS_PATH,
        )),
        Err(AppError::AlreadySubmitted(id)) => {
            Ok(Redirect::to(&review_attempted_path(id)).into_response())
        }
        Err(AppError::TestNotFound(id)) => Ok(flash_redirect(
            sessions,
            key.user_id,
            format!("Test ID {} not found!", id),
            TESTS_PATH,
        )),
        Err(e) => Err(e),
    }
}

/// Scores the running attempt and returns the report. An attempt that was
/// already scored redirects to its results instead.
pub async fn submit_test(
    State(router): State<DatabaseRouter>,
    State(sessions): State<SessionStore>,
    Extension(identity): Extension<Identity>,
    Path(test_id): Path<i64>,
) -> Result<Response, AppError> {
    let key = AttemptKey::new(test_id, identity.user_id);
    finish_attempt(&router, &sessions, key).await
}

/// Form variant of submission. `review=review` goes to the results review
/// instead of scoring.
pub async fn submit_test_form(
    State(router): State<DatabaseRouter>,
    State(sessions): State<SessionStore>,
    Extension(identity): Extension<Identity>,
    Path(test_id): Path<i64>,
    Form(form): Form<SubmitForm>,
) -> Result<Response, AppError> {
    if form.review.as_deref() == Some("review") {
        return Ok(Redirect::to(&review_attempted_path(test_id)).into_response());
    }

    let key = AttemptKey::new(test_id, identity.user_id);
    finish_attempt(&router, &sessions, key).await
}
