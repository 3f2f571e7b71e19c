// src/models/test_info.rs

use serde::Serialize;
use sqlx::FromRow;

/// Represents the 'test_info' table of a test database.
/// Ids are only unique within the file the row lives in.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TestInfo {
    pub id: i64,

    pub test_name: String,

    #[sqlx(default)]
    pub description: Option<String>,

    /// Time allowed for one attempt, in minutes.
    #[sqlx(default)]
    pub duration_minutes: Option<i64>,

    /// Availability window, stored as text by the authoring tool.
    #[sqlx(default)]
    pub start_time: Option<String>,
    #[sqlx(default)]
    pub end_time: Option<String>,

    #[sqlx(default)]
    pub created_at: Option<String>,

    /// Older files have no `is_locked` column; those tests are unlocked.
    #[sqlx(default)]
    #[serde(serialize_with = "as_bool")]
    pub is_locked: i64,
}

impl TestInfo {
    pub fn locked(&self) -> bool {
        self.is_locked != 0
    }
}

fn as_bool<S: serde::Serializer>(value: &i64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_bool(*value != 0)
}

/// Row returned by the test listing query: the test plus the
/// "already submitted by this user" flag.
#[derive(Debug, FromRow)]
pub struct TestListingRow {
    #[sqlx(flatten)]
    pub test: TestInfo,
    pub test_submitted: i64,
}

/// One entry of `GET /test/tests`.
#[derive(Debug, Serialize)]
pub struct TestSummary {
    #[serde(flatten)]
    pub test: TestInfo,
    pub effective_locked: bool,
    pub test_submitted: bool,
    /// Basename of the database file holding the test; `start` expects it back.
    pub database_file: String,
}

#[derive(Debug, Serialize)]
pub struct TestListResponse {
    pub goal: Option<String>,
    pub flashes: Vec<String>,
    pub tests: Vec<TestSummary>,
}
