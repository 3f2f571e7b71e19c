// src/services/discovery.rs

//! Finds the SQLite files under the storage root and classifies them by
//! quiz category. Nothing is cached: every call re-reads the directory so
//! files added or removed between requests are picked up.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::DATABASE_EXTENSION;

/// Quiz category of a database file, inferred from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Timed tests (`test_info` / `test_questions`). Name contains "test".
    Test,
    /// Account databases such as `admin_users.db`. Name contains "user".
    Users,
    /// Everything else: per-subject practice question banks.
    Mcq,
}

impl Category {
    pub fn classify(file_name: &str) -> Self {
        let name = file_name.to_lowercase();
        if name.contains("test") {
            Category::Test
        } else if name.contains("user") {
            Category::Users
        } else {
            Category::Mcq
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Test => "test",
            Category::Users => "users",
            Category::Mcq => "mcq",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered database file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseDescriptor {
    pub path: PathBuf,
    pub file_name: String,
    pub category: Category,
}

impl DatabaseDescriptor {
    pub fn new(path: PathBuf) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?.to_string();
        let category = Category::classify(&file_name);
        Some(Self {
            path,
            file_name,
            category,
        })
    }
}

/// Result of one discovery pass, grouped by category.
#[derive(Debug, Default)]
pub struct DiscoveredDatabases {
    by_category: HashMap<Category, Vec<DatabaseDescriptor>>,
}

impl DiscoveredDatabases {
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = DatabaseDescriptor>) -> Self {
        let mut by_category: HashMap<Category, Vec<DatabaseDescriptor>> = HashMap::new();
        for descriptor in descriptors {
            by_category
                .entry(descriptor.category)
                .or_default()
                .push(descriptor);
        }
        Self { by_category }
    }

    /// Descriptors of one category; empty when none were found.
    pub fn of(&self, category: Category) -> &[DatabaseDescriptor] {
        self.by_category
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn has_database_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(DATABASE_EXTENSION))
}

/// Scans `root` (non-recursively) for database files.
///
/// A missing or unreadable root yields an empty result, never an error.
/// Files are returned sorted by name within each category.
pub async fn discover(root: &Path) -> DiscoveredDatabases {
    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Cannot read data directory {}: {}", root.display(), e);
            return DiscoveredDatabases::default();
        }
    };

    let mut found = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let path = entry.path();
                let is_file = entry
                    .file_type()
                    .await
                    .map(|t| t.is_file())
                    .unwrap_or(false);
                if !is_file || !has_database_extension(&path) {
                    continue;
                }
                if let Some(descriptor) = DatabaseDescriptor::new(path) {
                    found.push(descriptor);
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Stopped scanning {}: {}", root.display(), e);
                break;
            }
        }
    }

    found.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    tracing::debug!("Discovered {} database file(s) in {}", found.len(), root.display());

    DiscoveredDatabases::from_descriptors(found)
}
