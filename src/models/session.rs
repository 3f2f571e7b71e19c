// src/models/session.rs

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

static GOAL_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("goal key pattern is valid"));

/// DTO for obtaining an identity token.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSessionRequest {
    #[validate(range(min = 1))]
    pub user_id: i64,
}

/// DTO for selecting (or clearing) the goal key of the current session.
#[derive(Debug, Deserialize, Validate)]
pub struct SetGoalRequest {
    #[validate(length(min = 1, max = 64), custom(function = validate_goal_key))]
    pub goal: Option<String>,
}

fn validate_goal_key(goal: &str) -> Result<(), validator::ValidationError> {
    if !GOAL_KEY.is_match(goal) {
        return Err(validator::ValidationError::new("invalid_goal_key"));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: i64,
    /// `false` for the guest identity used when no token is sent.
    pub authenticated: bool,
    pub goal: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_key_accepts_track_names() {
        let req = SetGoalRequest {
            goal: Some("neet_ug".to_string()),
        };
        assert!(req.validate().is_ok());

        let req = SetGoalRequest { goal: None };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn goal_key_rejects_path_characters() {
        let req = SetGoalRequest {
            goal: Some("../etc".to_string()),
        };
        assert!(req.validate().is_err());
    }
}
