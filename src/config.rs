// src/config.rs

use std::env;
use std::path::PathBuf;

use dotenvy::dotenv;

/// Persistent storage root used when deployed (`RENDER=true`).
pub const PRODUCTION_DATA_DIR: &str = "/var/data";

/// Local development root, relative to the working directory.
pub const DEV_DATA_DIR: &str = "data";

/// Extension of the SQLite files picked up by discovery.
pub const DATABASE_EXTENSION: &str = "db";

/// Question id of the "attempt was submitted" marker row in `user_responses`.
pub const SUBMITTED_MARKER_QUESTION_ID: i64 = 0;

/// How many times a submission's write set is attempted before giving up.
pub const PERSIST_ATTEMPTS: usize = 2;

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub port: u16,
    pub guest_user_id: i64,
    pub session_idle_minutes: i64,
    pub lock_gating: bool,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let data_dir = data_dir_for(env::var("RENDER").ok().as_deref());

        let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86_400);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3000);

        let guest_user_id = env::var("GUEST_USER_ID")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);

        let session_idle_minutes = env::var("SESSION_IDLE_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(180);

        let lock_gating = env::var("TEST_LOCK_GATING")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        Self {
            data_dir,
            jwt_secret,
            jwt_expiration,
            rust_log,
            port,
            guest_user_id,
            session_idle_minutes,
            lock_gating,
        }
    }
}

/// Picks the storage root from the value of the `RENDER` variable.
fn data_dir_for(render: Option<&str>) -> PathBuf {
    if render == Some("true") {
        PathBuf::from(PRODUCTION_DATA_DIR)
    } else {
        env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(DEV_DATA_DIR)
    }
}
