// src/handlers/session.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::session::{CreateSessionRequest, SessionResponse, SetGoalRequest},
    services::session::SessionStore,
    utils::jwt::{Identity, sign_jwt},
};

/// Issues an identity token for `user_id`.
///
/// There is no password: the token only tells the service which user's
/// attempts and results a request belongs to.
pub async fn create_session(
    State(config): State<Config>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let token = sign_jwt(payload.user_id, &config.jwt_secret, config.jwt_expiration)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "token": token,
            "type": "Bearer",
            "user_id": payload.user_id
        })),
    ))
}

pub async fn get_session(
    State(sessions): State<SessionStore>,
    Extension(identity): Extension<Identity>,
) -> impl IntoResponse {
    Json(SessionResponse {
        user_id: identity.user_id,
        authenticated: identity.authenticated,
        goal: sessions.goal(identity.user_id),
    })
}

/// Selects the goal key that filters the test listing. `null` clears it.
pub async fn set_goal(
    State(sessions): State<SessionStore>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<SetGoalRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    tracing::info!("User {} selected goal {:?}", identity.user_id, payload.goal);
    sessions.set_goal(identity.user_id, payload.goal.clone());

    Ok(Json(SessionResponse {
        user_id: identity.user_id,
        authenticated: identity.authenticated,
        goal: payload.goal,
    }))
}
