// src/services/session.rs

//! Per-user transient state carried across requests: one `AttemptState`
//! per (test, user) pair, plus the user's goal key and pending flash
//! messages. Requests of one user are assumed sequential; every operation
//! still applies all of its field changes under a single lock.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttemptKey {
    pub test_id: i64,
    pub user_id: i64,
}

impl AttemptKey {
    pub fn new(test_id: i64, user_id: i64) -> Self {
        Self { test_id, user_id }
    }
}

/// In-progress answers of one attempt.
/// A question id is never in both `answers` and `skipped`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AttemptState {
    pub database_file: Option<PathBuf>,
    pub answers: BTreeMap<i64, String>,
    pub marked: BTreeSet<i64>,
    pub skipped: BTreeSet<i64>,
    /// Set once the attempt has been scored; only a new start resets it.
    pub submitted: bool,
}

#[derive(Debug, Default)]
struct UserSession {
    goal: Option<String>,
    flashes: Vec<String>,
}

#[derive(Debug)]
struct Tracked<T> {
    value: T,
    touched_at: DateTime<Utc>,
}

impl<T: Default> Default for Tracked<T> {
    fn default() -> Self {
        Self {
            value: T::default(),
            touched_at: Utc::now(),
        }
    }
}

impl<T> Tracked<T> {
    fn touch(&mut self) -> &mut T {
        self.touched_at = Utc::now();
        &mut self.value
    }
}

#[derive(Debug, Default)]
struct Sessions {
    attempts: HashMap<AttemptKey, Tracked<AttemptState>>,
    users: HashMap<i64, Tracked<UserSession>>,
}

impl Sessions {
    fn attempt(&mut self, key: AttemptKey) -> &mut AttemptState {
        self.attempts.entry(key).or_default().touch()
    }

    fn user(&mut self, user_id: i64) -> &mut UserSession {
        self.users.entry(user_id).or_default().touch()
    }
}

#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<Mutex<Sessions>>,
}

impl SessionStore {
    fn lock(&self) -> MutexGuard<'_, Sessions> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Binds the attempt to `database_file` with empty answers, marks and
    /// skips, replacing whatever was there.
    pub fn start_attempt(&self, key: AttemptKey, database_file: PathBuf) {
        let mut sessions = self.lock();
        *sessions.attempt(key) = AttemptState {
            database_file: Some(database_file),
            ..AttemptState::default()
        };
    }

    /// Records `option` for the question. Answering un-skips it.
    pub fn record_answer(&self, key: AttemptKey, question_id: i64, option: &str) {
        let mut sessions = self.lock();
        let state = sessions.attempt(key);
        state.answers.insert(question_id, option.to_string());
        state.skipped.remove(&question_id);
    }

    /// Marks the question skipped. Skipping drops any earlier answer.
    pub fn record_skip(&self, key: AttemptKey, question_id: i64) {
        let mut sessions = self.lock();
        let state = sessions.attempt(key);
        state.skipped.insert(question_id);
        state.answers.remove(&question_id);
    }

    /// Flips the question's mark and returns whether it is now marked.
    pub fn toggle_mark(&self, key: AttemptKey, question_id: i64) -> bool {
        let mut sessions = self.lock();
        let state = sessions.attempt(key);
        if state.marked.remove(&question_id) {
            false
        } else {
            state.marked.insert(question_id);
            true
        }
    }

    /// Current state of the attempt, or empty defaults when there is none.
    pub fn snapshot(&self, key: AttemptKey) -> AttemptState {
        self.lock()
            .attempts
            .get(&key)
            .map(|tracked| tracked.value.clone())
            .unwrap_or_default()
    }

    /// Drops answers, marks and skips of the attempt after submission and
    /// flags it submitted. The database binding stays so the results can
    /// still be reviewed.
    pub fn clear(&self, key: AttemptKey) {
        let mut sessions = self.lock();
        if let Some(tracked) = sessions.attempts.get_mut(&key) {
            let state = tracked.touch();
            state.answers.clear();
            state.marked.clear();
            state.skipped.clear();
            state.submitted = true;
        }
    }

    pub fn goal(&self, user_id: i64) -> Option<String> {
        self.lock()
            .users
            .get(&user_id)
            .and_then(|tracked| tracked.value.goal.clone())
    }

    pub fn set_goal(&self, user_id: i64, goal: Option<String>) {
        self.lock().user(user_id).goal = goal;
    }

    pub fn push_flash(&self, user_id: i64, message: impl Into<String>) {
        self.lock().user(user_id).flashes.push(message.into());
    }

    /// Returns and forgets the user's pending flash messages.
    pub fn take_flashes(&self, user_id: i64) -> Vec<String> {
        self.lock()
            .users
            .get_mut(&user_id)
            .map(|tracked| std::mem::take(&mut tracked.value.flashes))
            .unwrap_or_default()
    }

    /// Forgets attempts and user sessions untouched for longer than
    /// `max_idle`. Returns how many entries were dropped.
    pub fn purge_idle(&self, max_idle: Duration) -> usize {
        let cutoff = Utc::now() - max_idle;
        let mut sessions = self.lock();
        let before = sessions.attempts.len() + sessions.users.len();
        sessions.attempts.retain(|_, tracked| tracked.touched_at >= cutoff);
        sessions.users.retain(|_, tracked| tracked.touched_at >= cutoff);
        before - sessions.attempts.len() - sessions.users.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: AttemptKey = AttemptKey {
        test_id: 1,
        user_id: 1,
    };

    #[test]
    fn skip_supersedes_answer() {
        let store = SessionStore::default();
        store.record_answer(KEY, 10, "A");
        store.record_skip(KEY, 10);

        let state = store.snapshot(KEY);
        assert!(state.skipped.contains(&10));
        assert!(!state.answers.contains_key(&10));
    }

    #[test]
    fn answer_unskips() {
        let store = SessionStore::default();
        store.record_skip(KEY, 10);
        store.record_answer(KEY, 10, "C");

        let state = store.snapshot(KEY);
        assert_eq!(state.answers.get(&10).map(String::as_str), Some("C"));
        assert!(!state.skipped.contains(&10));
    }

    #[test]
    fn double_toggle_restores_mark() {
        let store = SessionStore::default();
        assert!(store.toggle_mark(KEY, 3));
        assert!(!store.toggle_mark(KEY, 3));
        assert!(store.snapshot(KEY).marked.is_empty());

        store.toggle_mark(KEY, 4);
        store.toggle_mark(KEY, 4);
        store.toggle_mark(KEY, 4);
        assert!(store.snapshot(KEY).marked.contains(&4));
    }

    #[test]
    fn missing_attempt_snapshot_is_empty() {
        let store = SessionStore::default();
        assert_eq!(store.snapshot(KEY), AttemptState::default());
    }

    #[test]
    fn start_overwrites_previous_attempt() {
        let store = SessionStore::default();
        store.start_attempt(KEY, PathBuf::from("/data/a_test.db"));
        store.record_answer(KEY, 1, "A");
        store.toggle_mark(KEY, 2);

        store.start_attempt(KEY, PathBuf::from("/data/b_test.db"));
        let state = store.snapshot(KEY);
        assert_eq!(state.database_file, Some(PathBuf::from("/data/b_test.db")));
        assert!(state.answers.is_empty());
        assert!(state.marked.is_empty());
    }

    #[test]
    fn clear_only_touches_one_test() {
        let store = SessionStore::default();
        let other = AttemptKey::new(2, 1);
        let other_user = AttemptKey::new(1, 2);
        store.start_attempt(KEY, PathBuf::from("/data/a_test.db"));
        store.record_answer(KEY, 1, "A");
        store.record_skip(KEY, 2);
        store.toggle_mark(KEY, 3);
        store.record_answer(other, 1, "B");
        store.record_answer(other_user, 1, "D");

        store.clear(KEY);

        let cleared = store.snapshot(KEY);
        assert!(cleared.answers.is_empty());
        assert!(cleared.marked.is_empty());
        assert!(cleared.skipped.is_empty());
        assert_eq!(cleared.database_file, Some(PathBuf::from("/data/a_test.db")));
        assert!(cleared.submitted);
        assert!(!store.snapshot(other).submitted);
        assert_eq!(store.snapshot(other).answers.len(), 1);
        assert_eq!(store.snapshot(other_user).answers.len(), 1);
    }

    #[test]
    fn restart_reopens_submitted_attempt() {
        let store = SessionStore::default();
        store.start_attempt(KEY, PathBuf::from("/data/a_test.db"));
        store.record_answer(KEY, 1, "A");
        store.clear(KEY);

        store.record_answer(KEY, 1, "B");
        assert!(store.snapshot(KEY).submitted);

        store.start_attempt(KEY, PathBuf::from("/data/a_test.db"));
        let state = store.snapshot(KEY);
        assert!(!state.submitted);
        assert!(state.answers.is_empty());
    }

    #[test]
    fn clearing_unknown_attempt_creates_nothing() {
        let store = SessionStore::default();
        store.clear(KEY);
        assert_eq!(store.snapshot(KEY), AttemptState::default());
    }

    #[test]
    fn flashes_are_drained_once() {
        let store = SessionStore::default();
        store.push_flash(1, "Test session expired!");
        assert_eq!(store.take_flashes(1), vec!["Test session expired!"]);
        assert!(store.take_flashes(1).is_empty());
        assert!(store.take_flashes(42).is_empty());
    }

    #[test]
    fn goal_is_per_user() {
        let store = SessionStore::default();
        store.set_goal(1, Some("neet_ug".into()));
        assert_eq!(store.goal(1).as_deref(), Some("neet_ug"));
        assert_eq!(store.goal(2), None);
        store.set_goal(1, None);
        assert_eq!(store.goal(1), None);
    }

    #[test]
    fn purge_drops_idle_entries() {
        let store = SessionStore::default();
        store.record_answer(KEY, 1, "A");
        store.set_goal(1, Some("mbbs".into()));

        assert_eq!(store.purge_idle(Duration::minutes(5)), 0);
        assert_eq!(store.purge_idle(Duration::seconds(-1)), 2);
        assert_eq!(store.snapshot(KEY), AttemptState::default());
    }
}
