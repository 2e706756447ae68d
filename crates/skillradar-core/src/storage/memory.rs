//! In-memory backend with the same semantics as the redb store.

use super::{
    Assessment, AssessmentStore, GlobalAssessment, StoreError, User, UserDirectory,
    join_with_directory, normalize_username,
};
use crate::primitives::{AssessmentId, Clock, SystemClock, Timestamp, UserId, next_timestamp};
use crate::score::ScoreVector;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct State {
    /// Insertion order; ids are `index + 1`.
    assessments: Vec<Assessment>,
    users: Vec<User>,
    last_timestamp: Option<Timestamp>,
}

/// Volatile store. Appends serialize on a write lock.
pub struct MemoryStore {
    state: RwLock<State>,
    clock: Box<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    #[must_use]
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            state: RwLock::new(State::default()),
            clock: Box::new(clock),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>, StoreError> {
        self.state.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>, StoreError> {
        self.state.write().map_err(|_| StoreError::LockPoisoned)
    }

    fn stamp(&self, state: &mut State) -> Timestamp {
        let ts = next_timestamp(self.clock.now(), state.last_timestamp);
        state.last_timestamp = Some(ts);
        ts
    }
}

impl AssessmentStore for MemoryStore {
    fn append(&self, vector: ScoreVector) -> Result<Assessment, StoreError> {
        let mut state = self.write()?;
        let created_at = self.stamp(&mut state);
        let assessment = Assessment {
            id: AssessmentId(state.assessments.len() as u64 + 1),
            created_at,
            vector,
        };
        state.assessments.push(assessment.clone());
        tracing::debug!(
            id = assessment.id.0,
            owner = assessment.vector.owner().0,
            "appended assessment"
        );
        Ok(assessment)
    }

    fn query_recent(&self, owner: UserId, limit: usize) -> Result<Vec<Assessment>, StoreError> {
        let state = self.read()?;
        Ok(state
            .assessments
            .iter()
            .rev()
            .filter(|a| a.vector.owner() == owner)
            .take(limit)
            .cloned()
            .collect())
    }

    fn query_recent_global(
        &self,
        directory: &dyn UserDirectory,
        limit: usize,
    ) -> Result<Vec<GlobalAssessment>, StoreError> {
        // Rows are cloned in batches of the still-missing count and joined with
        // the lock released, so a directory backed by this store can take it.
        // Appends only grow the tail, so `cursor` stays valid between batches.
        let mut joined = Vec::new();
        let mut cursor = self.read()?.assessments.len();
        while cursor > 0 && joined.len() < limit {
            let wanted = limit - joined.len();
            let batch: Vec<Assessment> = {
                let state = self.read()?;
                let start = cursor.saturating_sub(wanted);
                let batch = state.assessments[start..cursor].iter().rev().cloned().collect();
                cursor = start;
                batch
            };
            joined.extend(join_with_directory(batch.into_iter().map(Ok), directory, wanted)?);
        }
        Ok(joined)
    }

    fn count(&self) -> Result<u64, StoreError> {
        Ok(self.read()?.assessments.len() as u64)
    }
}

impl UserDirectory for MemoryStore {
    fn register(&self, username: &str, is_admin: bool) -> Result<User, StoreError> {
        let username = normalize_username(username)?;
        let mut state = self.write()?;
        if state.users.iter().any(|u| u.username == username) {
            return Err(StoreError::DuplicateUser(username.to_string()));
        }
        let user = User {
            id: UserId(state.users.len() as u64 + 1),
            username: username.to_string(),
            created_at: self.clock.now(),
            is_admin,
        };
        state.users.push(user.clone());
        Ok(user)
    }

    fn find_by_name(&self, username: &str) -> Result<Option<User>, StoreError> {
        let state = self.read()?;
        Ok(state.users.iter().find(|u| u.username == username).cloned())
    }

    fn display_name(&self, id: UserId) -> Result<Option<String>, StoreError> {
        let state = self.read()?;
        Ok(state
            .users
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.username.clone()))
    }

    fn user_count(&self) -> Result<u64, StoreError> {
        Ok(self.read()?.users.len() as u64)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::RawSubmission;

    /// Clock that never advances.
    struct FrozenClock(Timestamp);

    impl Clock for FrozenClock {
        fn now(&self) -> Timestamp {
            self.0
        }
    }

    fn vector(owner: UserId, teamwork: &str, notes: &str) -> ScoreVector {
        let raw = RawSubmission::new()
            .with("teamwork", teamwork)
            .with("notes", notes);
        ScoreVector::from_raw(&raw, owner)
    }

    #[test]
    fn append_then_query_round_trips() {
        let store = MemoryStore::new();
        let alice = store.register("alice", false).map(|u| u.id).expect("register");
        let submitted = vector(alice, "8", "first");

        let stored = store.append(submitted.clone()).expect("append");
        let recent = store.query_recent(alice, 1).expect("query");

        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0], stored);
        assert_eq!(recent[0].vector, submitted);
    }

    #[test]
    fn frozen_clock_still_yields_increasing_timestamps() {
        let store = MemoryStore::with_clock(FrozenClock(Timestamp(1_000)));
        let owner = UserId(1);
        let a = store.append(vector(owner, "1", "")).expect("append");
        let b = store.append(vector(owner, "2", "")).expect("append");
        let c = store.append(vector(owner, "3", "")).expect("append");

        assert_eq!(a.created_at, Timestamp(1_000));
        assert!(b.created_at > a.created_at);
        assert!(c.created_at > b.created_at);

        let recent = store.query_recent(owner, 10).expect("query");
        let ids: Vec<u64> = recent.iter().map(|a| a.id.0).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn query_recent_filters_by_owner_and_limits() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.append(vector(UserId(1), "5", &format!("a{i}"))).expect("append");
            store.append(vector(UserId(2), "6", &format!("b{i}"))).expect("append");
        }

        let recent = store.query_recent(UserId(2), 3).expect("query");
        assert_eq!(recent.len(), 3);
        assert!(recent.iter().all(|a| a.vector.owner() == UserId(2)));
        assert_eq!(recent[0].vector.notes(), Some("b4"));

        assert!(store.query_recent(UserId(3), 10).expect("query").is_empty());
        assert!(store.query_recent(UserId(1), 0).expect("query").is_empty());
    }

    #[test]
    fn global_query_joins_usernames_and_skips_orphans() {
        let store = MemoryStore::new();
        let alice = store.register("alice", false).expect("register").id;
        let bob = store.register("bob", true).expect("register").id;

        store.append(vector(alice, "4", "a")).expect("append");
        store.append(vector(UserId(99), "9", "orphan")).expect("append");
        store.append(vector(bob, "8", "b")).expect("append");

        let global = store.query_recent_global(&store, 10).expect("query");
        let names: Vec<&str> = global.iter().map(|g| g.username.as_str()).collect();
        assert_eq!(names, vec!["bob", "alice"]);

        let limited = store.query_recent_global(&store, 1).expect("query");
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].username, "bob");
    }

    #[test]
    fn global_query_reaches_past_orphan_runs() {
        let store = MemoryStore::new();
        let alice = store.register("alice", false).expect("register").id;
        let bob = store.register("bob", false).expect("register").id;

        store.append(vector(alice, "3", "oldest")).expect("append");
        store.append(vector(alice, "4", "a")).expect("append");
        store.append(vector(UserId(98), "9", "orphan")).expect("append");
        store.append(vector(UserId(99), "9", "orphan")).expect("append");
        store.append(vector(bob, "8", "b")).expect("append");

        let global = store.query_recent_global(&store, 2).expect("query");
        let notes: Vec<Option<&str>> = global
            .iter()
            .map(|g| g.assessment.vector.notes())
            .collect();
        assert_eq!(notes, vec![Some("b"), Some("a")]);

        assert!(store.query_recent_global(&store, 0).expect("query").is_empty());
        let all = store.query_recent_global(&store, 50).expect("query");
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn register_rejects_blank_and_duplicate_names() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.register("   ", false),
            Err(StoreError::InvalidUsername)
        ));
        store.register(" carol ", false).expect("register");
        assert!(matches!(
            store.register("carol", false),
            Err(StoreError::DuplicateUser(name)) if name == "carol"
        ));
        // case-sensitive
        assert!(store.register("Carol", false).is_ok());
        assert_eq!(store.user_count().expect("count"), 2);
        assert!(store.find_by_name("carol").expect("find").is_some());
    }

    #[test]
    fn concurrent_appends_all_land() {
        let store = MemoryStore::new();
        std::thread::scope(|scope| {
            for t in 0..4_u64 {
                let store = &store;
                scope.spawn(move || {
                    for _ in 0..25 {
                        store.append(vector(UserId(t), "7", "")).expect("append");
                    }
                });
            }
        });
        assert_eq!(store.count().expect("count"), 100);
        for t in 0..4 {
            assert_eq!(store.query_recent(UserId(t), 100).expect("query").len(), 25);
        }
    }
}
