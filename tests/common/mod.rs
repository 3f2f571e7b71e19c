// tests/common/mod.rs

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use quiz_backend::{config::Config, routes, state::AppState};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, SqliteConnection};
use tempfile::TempDir;

pub struct TestApp {
    pub address: String,
    pub data_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub fn path(&self) -> &Path {
        self.data_dir.path()
    }
}

/// Helper function to spawn the app on a random port for testing.
/// The returned app serves databases from its own temporary directory.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(customize: impl FnOnce(&mut Config)) -> TestApp {
    let data_dir = tempfile::tempdir().expect("Failed to create data dir");

    let mut config = Config {
        data_dir: data_dir.path().to_path_buf(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        port: 0,
        guest_user_id: 1,
        session_idle_minutes: 180,
        lock_gating: false,
    };
    customize(&mut config);

    let app = routes::create_router(AppState::new(config));

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Redirects are part of the contract, so they are observed, not followed.
    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        address,
        data_dir,
        client,
    }
}

async fn open(path: &Path, create: bool) -> SqliteConnection {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(create);
    SqliteConnection::connect_with(&options).await.unwrap()
}

/// Creates a test database `name` in `dir` with one test per entry of
/// `tests`: (test id, name, created_at, correct answers). Question ids are
/// `test_id * 100 + position`.
pub async fn seed_test_db(dir: &Path, name: &str, tests: &[(i64, &str, &str, &[&str])]) -> PathBuf {
    let path = dir.join(name);
    let mut conn = open(&path, true).await;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS test_info (
            id INTEGER PRIMARY KEY,
            test_name TEXT NOT NULL,
            description TEXT,
            duration_minutes INTEGER,
            start_time TEXT,
            end_time TEXT,
            created_at TEXT
        )",
    )
    .execute(&mut conn)
    .await
    .unwrap();
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS test_questions (
            id INTEGER PRIMARY KEY,
            test_id INTEGER NOT NULL,
            subject TEXT,
            topic TEXT,
            question TEXT NOT NULL,
            option_a TEXT NOT NULL,
            option_b TEXT NOT NULL,
            option_c TEXT NOT NULL,
            option_d TEXT NOT NULL,
            correct_answer TEXT NOT NULL,
            explanation TEXT
        )",
    )
    .execute(&mut conn)
    .await
    .unwrap();

    for &(test_id, test_name, created_at, answers) in tests {
        sqlx::query(
            "INSERT INTO test_info (id, test_name, description, duration_minutes, created_at)
             VALUES (?, ?, 'Mock paper', 45, ?)",
        )
        .bind(test_id)
        .bind(test_name)
        .bind(created_at)
        .execute(&mut conn)
        .await
        .unwrap();

        for (position, correct) in answers.iter().enumerate() {
            let question_id = test_id * 100 + position as i64 + 1;
            let subject = if position % 2 == 0 { "Physics" } else { "Chemistry" };
            sqlx::query(
                "INSERT INTO test_questions
                 (id, test_id, subject, topic, question,
                  option_a, option_b, option_c, option_d, correct_answer, explanation)
                 VALUES (?, ?, ?, 'Basics', ?,
                         'opt a', 'opt b', 'opt c', 'opt d', ?, 'See notes')",
            )
            .bind(question_id)
            .bind(test_id)
            .bind(subject)
            .bind(format!("Question {}", question_id))
            .bind(*correct)
            .execute(&mut conn)
            .await
            .unwrap();
        }
    }

    path
}

/// Adds the optional `is_locked` column and locks `test_id`.
pub async fn lock_test(path: &Path, test_id: i64) {
    let mut conn = open(path, false).await;
    sqlx::query("ALTER TABLE test_info ADD COLUMN is_locked INTEGER NOT NULL DEFAULT 0")
        .execute(&mut conn)
        .await
        .unwrap();
    sqlx::query("UPDATE test_info SET is_locked = 1 WHERE id = ?")
        .bind(test_id)
        .execute(&mut conn)
        .await
        .unwrap();
}

/// Stored responses of (test, user): (question_id, user_answer, is_correct).
pub async fn stored_responses(
    path: &Path,
    test_id: i64,
    user_id: i64,
) -> Vec<(i64, Option<String>, Option<i64>)> {
    let mut conn = open(path, false).await;
    sqlx::query_as(
        "SELECT question_id, user_answer, is_correct FROM user_responses
         WHERE test_id = ? AND user_id = ? ORDER BY question_id",
    )
    .bind(test_id)
    .bind(user_id)
    .fetch_all(&mut conn)
    .await
    .unwrap()
}

pub fn location(response: &reqwest::Response) -> String {
    response
        .headers()
        .get(reqwest::header::LOCATION)
        .expect("Missing Location header")
        .to_str()
        .unwrap()
        .to_string()
}
