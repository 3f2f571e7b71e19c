//! SQLite fixtures shared by the unit tests.

use std::path::{Path, PathBuf};

use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, SqliteConnection};

pub struct SeedQuestion {
    pub id: i64,
    pub subject: &'static str,
    pub topic: &'static str,
    pub correct: &'static str,
}

/// Question `id` of subject "Biology" whose correct option is `correct`.
pub fn question(id: i64, correct: &'static str) -> SeedQuestion {
    SeedQuestion {
        id,
        subject: "Biology",
        topic: "Cells",
        correct,
    }
}

pub struct SeedTest {
    pub id: i64,
    pub name: &'static str,
    pub questions: Vec<SeedQuestion>,
}

pub fn mock_test(id: i64, name: &'static str, questions: Vec<SeedQuestion>) -> SeedTest {
    SeedTest {
        id,
        name,
        questions,
    }
}

/// Creates `dir/name` holding the given tests and their questions.
/// Ids are taken as-is.
pub async fn seed_test_db(dir: &Path, name: &str, tests: Vec<SeedTest>) -> PathBuf {
    let path = dir.join(name);
    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);
    let mut conn = SqliteConnection::connect_with(&options).await.unwrap();

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

    for seed in tests {
        sqlx::query(
            "INSERT INTO test_info (id, test_name, duration_minutes, created_at)
             VALUES (?, ?, 30, '2024-01-01 10:00:00')",
        )
        .bind(seed.id)
        .bind(seed.name)
        .execute(&mut conn)
        .await
        .unwrap();

        for q in &seed.questions {
            sqlx::query(
                "INSERT INTO test_questions
                 (id, test_id, subject, topic, question,
                  option_a, option_b, option_c, option_d, correct_answer, explanation)
                 VALUES (?, ?, ?, ?, ?, 'A1', 'B1', 'C1', 'D1', ?, 'because')",
            )
            .bind(q.id)
            .bind(seed.id)
            .bind(q.subject)
            .bind(q.topic)
            .bind(format!("Question {}", q.id))
            .bind(q.correct)
            .execute(&mut conn)
            .await
            .unwrap();
        }
    }

    path
}
