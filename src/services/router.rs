// src/services/router.rs

//! Maps goal keys and test ids onto concrete database files.
//!
//! Test ids are only unique inside one file, so every operation on a test
//! first re-derives which file holds it. Nothing is cached between calls
//! apart from which file versions already have the response table.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use sqlx::SqliteConnection;

use crate::{
    config::DATABASE_EXTENSION,
    error::AppError,
    services::discovery::{self, Category, DatabaseDescriptor, DiscoveredDatabases},
    utils::sqlite,
};

#[derive(Clone)]
pub struct DatabaseRouter {
    data_dir: PathBuf,
    /// Modification time of each file when it was last provisioned.
    provisioned: Arc<Mutex<HashMap<PathBuf, SystemTime>>>,
}

impl DatabaseRouter {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            provisioned: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn discover(&self) -> DiscoveredDatabases {
        discovery::discover(&self.data_dir).await
    }

    /// Descriptors of `category` whose file name contains `goal`
    /// (case-insensitive), or all of them when no goal is set.
    pub async fn resolve_by_goal(
        &self,
        category: Category,
        goal: Option<&str>,
    ) -> Vec<DatabaseDescriptor> {
        let discovered = self.discover().await;
        filter_by_goal(discovered.of(category), goal)
    }

    /// Finds the test database that contains `test_id`.
    pub async fn resolve_by_test_id(&self, test_id: i64) -> Result<DatabaseDescriptor, AppError> {
        let discovered = self.discover().await;
        probe_candidates(discovered.of(Category::Test), test_id).await
    }

    /// Validates a client-supplied file name against the storage root and
    /// checks that it holds `test_id`.
    pub async fn resolve_named(
        &self,
        db_file: &str,
        test_id: i64,
    ) -> Result<DatabaseDescriptor, AppError> {
        let name = db_file.trim();
        if name.is_empty() {
            return Err(AppError::BadRequest("No database specified!".to_string()));
        }

        let not_found = || AppError::NotFound(format!("Database {} not found!", name));

        // Only bare file names inside the root are accepted.
        let candidate = Path::new(name);
        if candidate.file_name() != Some(OsStr::new(name))
            || !candidate
                .extension()
                .and_then(OsStr::to_str)
                .is_some_and(|ext| ext.eq_ignore_ascii_case(DATABASE_EXTENSION))
        {
            return Err(not_found());
        }

        let path = self.data_dir.join(name);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(not_found());
        }

        let descriptor = DatabaseDescriptor::new(path).ok_or_else(not_found)?;
        match contains_test(&descriptor.path, test_id).await {
            Ok(true) => Ok(descriptor),
            Ok(false) => Err(AppError::TestNotFound(test_id)),
            Err(e) => {
                tracing::error!("Failed to probe {}: {:?}", descriptor.file_name, e);
                Err(AppError::DatabaseUnavailable(e.to_string()))
            }
        }
    }

    /// Re-checks a file an attempt was bound to. A vanished file means the
    /// attempt can no longer continue.
    pub async fn bound(&self, path: &Path) -> Result<DatabaseDescriptor, AppError> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            tracing::warn!("Bound database {} no longer exists", path.display());
            return Err(AppError::SessionExpired);
        }
        DatabaseDescriptor::new(path.to_path_buf()).ok_or(AppError::SessionExpired)
    }

    /// Opens a short-lived connection to a resolved database, provisioning
    /// its `user_responses` table the first time this version of the file is
    /// used. A file replaced on disk gets a new modification time and is
    /// provisioned again.
    pub async fn open(
        &self,
        descriptor: &DatabaseDescriptor,
    ) -> Result<SqliteConnection, AppError> {
        let mut conn = sqlite::connect(&descriptor.path).await.map_err(|e| {
            tracing::error!("Failed to open {}: {:?}", descriptor.file_name, e);
            AppError::DatabaseUnavailable(e.to_string())
        })?;

        let version = modified_at(&descriptor.path).await;
        if !self.is_provisioned(&descriptor.path, version) {
            sqlite::ensure_response_table(&mut conn).await.map_err(|e| {
                tracing::error!("Failed to provision {}: {:?}", descriptor.file_name, e);
                AppError::DatabaseUnavailable(e.to_string())
            })?;
            // Creating the table rewrites the file.
            self.mark_provisioned(&descriptor.path, modified_at(&descriptor.path).await);
            tracing::info!("Provisioned user_responses in {}", descriptor.file_name);
        }

        Ok(conn)
    }

    fn is_provisioned(&self, path: &Path, version: Option<SystemTime>) -> bool {
        let provisioned = self
            .provisioned
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        version.is_some() && provisioned.get(path) == version.as_ref()
    }

    fn mark_provisioned(&self, path: &Path, version: Option<SystemTime>) {
        let mut provisioned = self
            .provisioned
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match version {
            Some(version) => provisioned.insert(path.to_path_buf(), version),
            None => provisioned.remove(path),
        };
    }
}

async fn modified_at(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

pub fn filter_by_goal(
    candidates: &[DatabaseDescriptor],
    goal: Option<&str>,
) -> Vec<DatabaseDescriptor> {
    match goal {
        Some(goal) => {
            let goal = goal.to_lowercase();
            candidates
                .iter()
                .filter(|d| d.file_name.to_lowercase().contains(&goal))
                .cloned()
                .collect()
        }
        None => candidates.to_vec(),
    }
}

async fn contains_test(path: &Path, test_id: i64) -> Result<bool, sqlx::Error> {
    let mut conn = sqlite::connect(path).await?;
    let found = sqlx::query_scalar::<_, i64>("SELECT 1 FROM test_info WHERE id = ?")
        .bind(test_id)
        .fetch_optional(&mut conn)
        .await?;
    Ok(found.is_some())
}

/// Returns the first candidate holding `test_id`.
///
/// Candidates that fail to open are logged and skipped; only when every
/// candidate failed is `DatabaseUnavailable` returned instead of `TestNotFound`.
async fn probe_candidates(
    candidates: &[DatabaseDescriptor],
    test_id: i64,
) -> Result<DatabaseDescriptor, AppError> {
    let mut failures = 0;

    for descriptor in candidates {
        match contains_test(&descriptor.path, test_id).await {
            Ok(true) => {
                tracing::debug!("Test {} resolved to {}", test_id, descriptor.file_name);
                return Ok(descriptor.clone());
            }
            Ok(false) => {}
            Err(e) => {
                failures += 1;
                tracing::warn!(
                    "Skipping {} database {}: {:?}",
                    descriptor.category,
                    descriptor.file_name,
                    e
                );
            }
        }
    }

    if !candidates.is_empty() && failures == candidates.len() {
        return Err(AppError::DatabaseUnavailable(format!(
            "all {} test database(s) failed while looking up test {}",
            failures, test_id
        )));
    }

    Err(AppError::TestNotFound(test_id))
}
