// src/utils/sqlite.rs

use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{Connection, SqliteConnection};

/// DDL for the per-file response table. `IF NOT EXISTS` keeps it safe to repeat.
pub const CREATE_USER_RESPONSES: &str = r#"
CREATE TABLE IF NOT EXISTS user_responses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    test_id INTEGER NOT NULL,
    user_id INTEGER NOT NULL,
    question_id INTEGER,
    user_answer TEXT,
    is_correct INTEGER,
    test_started INTEGER DEFAULT 0,
    test_submitted INTEGER DEFAULT 0,
    timestamp DATETIME DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(test_id, user_id, question_id)
)
"#;

/// Opens a short-lived connection to an existing database file.
///
/// Never creates the file: a missing path is an error, not an empty database.
/// The connection is closed when dropped, so callers hold it only for the
/// duration of one logical operation.
pub async fn connect(path: &Path) -> Result<SqliteConnection, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(false)
        .journal_mode(SqliteJournalMode::Delete);

    SqliteConnection::connect_with(&options).await
}

/// Creates `user_responses` when the file does not have it yet.
pub async fn ensure_response_table(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_USER_RESPONSES).execute(&mut *conn).await?;
    Ok(())
}
