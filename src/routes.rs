// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{attempt, catalog, review, session},
    state::AppState,
    utils::jwt::identity_middleware,
};

/// Assembles the main application router.
///
/// * Merges the test and session sub-routers.
/// * Resolves the requesting user for every route (identity middleware).
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let test_routes = Router::new()
        .route("/tests", get(catalog::list_tests))
        .route("/tests/{test_id}/questions", get(catalog::view_test_questions))
        .route("/tests/{test_id}/start", get(attempt::start_test))
        .route(
            "/tests/{test_id}/question/{q_num}",
            get(attempt::show_question).post(attempt::answer_question),
        )
        .route(
            "/tests/{test_id}/question/{q_num}/toggle_mark",
            post(attempt::toggle_mark),
        )
        .route("/tests/{test_id}/review", get(review::review_test))
        .route(
            "/tests/{test_id}/review-attempted",
            get(review::review_attempted),
        )
        .route(
            "/tests/{test_id}/review/{filter_type}/{q_index}",
            get(review::review_question),
        )
        .route(
            "/tests/{test_id}/submit",
            get(attempt::submit_test).post(attempt::submit_test_form),
        );

    let session_routes = Router::new()
        .route(
            "/",
            get(session::get_session).post(session::create_session),
        )
        .route("/goal", put(session::set_goal));

    Router::new()
        .nest("/test", test_routes)
        .nest("/api/session", session_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            identity_middleware,
        ))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
