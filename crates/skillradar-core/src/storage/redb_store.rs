//! redb-backed store.
//!
//! Tables:
//! - `assessments`: id → postcard [`AssessmentRow`]
//! - `owner_index`: (owner, id) → ()
//! - `users`: id → postcard [`UserRow`]
//! - `usernames`: name → id
//! - `meta`: schema/catalog versions and id counters
//! - `clock`: last assigned timestamp
//!
//! Every mutation is a single write transaction, so an append is atomic and
//! visible to every read transaction begun after it commits.

use super::row::{self, AssessmentRow, SCHEMA_VERSION, UserRow};
use super::{
    Assessment, AssessmentStore, GlobalAssessment, StoreError, User, UserDirectory,
    join_with_directory, normalize_username, unavailable,
};
use crate::dimension::CATALOG_VERSION;
use crate::primitives::{AssessmentId, Clock, SystemClock, Timestamp, UserId, next_timestamp};
use crate::score::ScoreVector;
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, Table, TableDefinition,
};
use std::path::Path;

const ASSESSMENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("assessments");
const OWNER_INDEX: TableDefinition<(u64, u64), ()> = TableDefinition::new("owner_index");
const USERS: TableDefinition<u64, &[u8]> = TableDefinition::new("users");
const USERNAMES: TableDefinition<&str, u64> = TableDefinition::new("usernames");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");
const CLOCK: TableDefinition<&str, i64> = TableDefinition::new("clock");

const SCHEMA_VERSION_KEY: &str = "schema_version";
const CATALOG_VERSION_KEY: &str = "catalog_version";
const NEXT_ASSESSMENT_ID: &str = "next_assessment_id";
const NEXT_USER_ID: &str = "next_user_id";
const LAST_TIMESTAMP: &str = "last_timestamp";

/// Persistent store in a single redb file.
pub struct RedbStore {
    db: Database,
    clock: Box<dyn Clock>,
}

impl RedbStore {
    /// Open or create the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_clock(path, SystemClock)
    }

    /// Open or create with an explicit clock.
    pub fn open_with_clock(
        path: impl AsRef<Path>,
        clock: impl Clock + 'static,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let db = Database::create(path).map_err(unavailable)?;
        let store = Self {
            db,
            clock: Box::new(clock),
        };
        store.initialize()?;
        tracing::debug!(path = %path.display(), "opened assessment store");
        Ok(store)
    }

    /// Create missing tables and check the persisted layout versions.
    fn initialize(&self) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(unavailable)?;
        {
            txn.open_table(ASSESSMENTS).map_err(unavailable)?;
            txn.open_table(OWNER_INDEX).map_err(unavailable)?;
            txn.open_table(USERS).map_err(unavailable)?;
            txn.open_table(USERNAMES).map_err(unavailable)?;
            txn.open_table(CLOCK).map_err(unavailable)?;
            let mut meta = txn.open_table(META).map_err(unavailable)?;
            check_or_set(&mut meta, SCHEMA_VERSION_KEY, SCHEMA_VERSION)?;
            check_or_set(&mut meta, CATALOG_VERSION_KEY, CATALOG_VERSION)?;
        }
        txn.commit().map_err(unavailable)?;
        Ok(())
    }
}

/// Record `expected` under `key`, or fail if a different value is already there.
fn check_or_set(
    meta: &mut Table<'_, &'static str, u64>,
    key: &'static str,
    expected: u64,
) -> Result<(), StoreError> {
    let found = meta.get(key).map_err(unavailable)?.map(|g| g.value());
    match found {
        Some(found) if found != expected => Err(StoreError::SchemaMismatch {
            key,
            expected,
            found,
        }),
        Some(_) => Ok(()),
        None => {
            meta.insert(key, expected).map_err(unavailable)?;
            Ok(())
        }
    }
}

/// Take the next value of a counter starting at 1.
fn take_next_id(
    meta: &mut Table<'_, &'static str, u64>,
    key: &'static str,
) -> Result<u64, StoreError> {
    let id = meta.get(key).map_err(unavailable)?.map_or(1, |g| g.value());
    meta.insert(key, id.saturating_add(1)).map_err(unavailable)?;
    Ok(id)
}

impl AssessmentStore for RedbStore {
    fn append(&self, vector: ScoreVector) -> Result<Assessment, StoreError> {
        let txn = self.db.begin_write().map_err(unavailable)?;
        let assessment = {
            let mut meta = txn.open_table(META).map_err(unavailable)?;
            let mut clock = txn.open_table(CLOCK).map_err(unavailable)?;
            let mut assessments = txn.open_table(ASSESSMENTS).map_err(unavailable)?;
            let mut index = txn.open_table(OWNER_INDEX).map_err(unavailable)?;

            let last = clock
                .get(LAST_TIMESTAMP)
                .map_err(unavailable)?
                .map(|g| Timestamp::from_micros(g.value()));
            let created_at = next_timestamp(self.clock.now(), last);
            let id = take_next_id(&mut meta, NEXT_ASSESSMENT_ID)?;

            let bytes = row::encode(&AssessmentRow::from_vector(&vector, created_at))?;
            assessments
                .insert(id, bytes.as_slice())
                .map_err(unavailable)?;
            index
                .insert((vector.owner().0, id), ())
                .map_err(unavailable)?;
            clock
                .insert(LAST_TIMESTAMP, created_at.as_micros())
                .map_err(unavailable)?;

            Assessment {
                id: AssessmentId(id),
                created_at,
                vector,
            }
        };
        txn.commit().map_err(unavailable)?;

        tracing::debug!(
            id = assessment.id.0,
            owner = assessment.vector.owner().0,
            created_at = assessment.created_at.as_micros(),
            "appended assessment"
        );
        Ok(assessment)
    }

    fn query_recent(&self, owner: UserId, limit: usize) -> Result<Vec<Assessment>, StoreError> {
        let mut recent = Vec::new();
        if limit == 0 {
            return Ok(recent);
        }

        let txn = self.db.begin_read().map_err(unavailable)?;
        let index = txn.open_table(OWNER_INDEX).map_err(unavailable)?;
        let assessments = txn.open_table(ASSESSMENTS).map_err(unavailable)?;

        let entries = index
            .range((owner.0, 0)..=(owner.0, u64::MAX))
            .map_err(unavailable)?;
        for entry in entries.rev() {
            let (key, _) = entry.map_err(unavailable)?;
            let (_, id) = key.value();
            let guard = assessments
                .get(id)
                .map_err(unavailable)?
                .ok_or_else(|| {
                    StoreError::Corrupt(format!("index points at missing assessment {id}"))
                })?;
            let row: AssessmentRow = row::decode(guard.value())?;
            recent.push(row.into_assessment(AssessmentId(id))?);
            if recent.len() >= limit {
                break;
            }
        }

        tracing::trace!(owner = owner.0, rows = recent.len(), "queried owner history");
        Ok(recent)
    }

    fn query_recent_global(
        &self,
        directory: &dyn UserDirectory,
        limit: usize,
    ) -> Result<Vec<GlobalAssessment>, StoreError> {
        let txn = self.db.begin_read().map_err(unavailable)?;
        let assessments = txn.open_table(ASSESSMENTS).map_err(unavailable)?;
        let newest_first = assessments.iter().map_err(unavailable)?.rev().map(|entry| {
            let (key, value) = entry.map_err(unavailable)?;
            let row: AssessmentRow = row::decode(value.value())?;
            row.into_assessment(AssessmentId(key.value()))
        });

        let joined = join_with_directory(newest_first, directory, limit)?;
        tracing::trace!(rows = joined.len(), "queried global history");
        Ok(joined)
    }

    fn count(&self) -> Result<u64, StoreError> {
        let txn = self.db.begin_read().map_err(unavailable)?;
        let assessments = txn.open_table(ASSESSMENTS).map_err(unavailable)?;
        assessments.len().map_err(unavailable)
    }
}

impl UserDirectory for RedbStore {
    fn register(&self, username: &str, is_admin: bool) -> Result<User, StoreError> {
        let username = normalize_username(username)?;
        let txn = self.db.begin_write().map_err(unavailable)?;
        let user = {
            let mut names = txn.open_table(USERNAMES).map_err(unavailable)?;
            if names.get(username).map_err(unavailable)?.is_some() {
                return Err(StoreError::DuplicateUser(username.to_string()));
            }
            let mut meta = txn.open_table(META).map_err(unavailable)?;
            let mut users = txn.open_table(USERS).map_err(unavailable)?;

            let user = User {
                id: UserId(take_next_id(&mut meta, NEXT_USER_ID)?),
                username: username.to_string(),
                created_at: self.clock.now(),
                is_admin,
            };
            let bytes = row::encode(&UserRow::from_user(&user))?;
            users
                .insert(user.id.0, bytes.as_slice())
                .map_err(unavailable)?;
            names.insert(username, user.id.0).map_err(unavailable)?;
            user
        };
        txn.commit().map_err(unavailable)?;

        tracing::info!(id = user.id.0, username = %user.username, is_admin, "registered user");
        Ok(user)
    }

    fn find_by_name(&self, username: &str) -> Result<Option<User>, StoreError> {
        let txn = self.db.begin_read().map_err(unavailable)?;
        let names = txn.open_table(USERNAMES).map_err(unavailable)?;
        let Some(id) = names.get(username).map_err(unavailable)?.map(|g| g.value()) else {
            return Ok(None);
        };
        let users = txn.open_table(USERS).map_err(unavailable)?;
        let guard = users.get(id).map_err(unavailable)?.ok_or_else(|| {
            StoreError::Corrupt(format!("username index points at missing user {id}"))
        })?;
        let row: UserRow = row::decode(guard.value())?;
        Ok(Some(row.into_user(UserId(id))))
    }

    fn display_name(&self, id: UserId) -> Result<Option<String>, StoreError> {
        let txn = self.db.begin_read().map_err(unavailable)?;
        let users = txn.open_table(USERS).map_err(unavailable)?;
        match users.get(id.0).map_err(unavailable)? {
            Some(guard) => {
                let row: UserRow = row::decode(guard.value())?;
                Ok(Some(row.username))
            }
            None => Ok(None),
        }
    }

    fn user_count(&self) -> Result<u64, StoreError> {
        let txn = self.db.begin_read().map_err(unavailable)?;
        let users = txn.open_table(USERS).map_err(unavailable)?;
        users.len().map_err(unavailable)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregator;
    use crate::dimension::Dimension;
    use crate::score::RawSubmission;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct FrozenClock(Timestamp);

    impl Clock for FrozenClock {
        fn now(&self) -> Timestamp {
            self.0
        }
    }

    fn temp_store() -> (TempDir, RedbStore) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = RedbStore::open(dir.path().join("test.redb")).expect("open store");
        (dir, store)
    }

    fn submit(owner: UserId, pairs: &[(&str, &str)]) -> ScoreVector {
        let raw: RawSubmission = pairs.iter().copied().collect();
        ScoreVector::from_raw(&raw, owner)
    }

    #[test]
    fn append_and_query_round_trip() {
        let (_dir, store) = temp_store();
        let alice = store.register("alice", false).expect("register").id;
        let vector = submit(alice, &[("technical_skill", "9"), ("notes", " solid ")]);

        let stored = store.append(vector.clone()).expect("append");
        let recent = store.query_recent(alice, 1).expect("query");

        assert_eq!(recent, vec![stored]);
        assert_eq!(recent[0].vector.score(Dimension::TechnicalSkill).value(), 9);
        assert_eq!(recent[0].vector.notes(), Some("solid"));
        assert_eq!(recent[0].vector.owner(), alice);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("persist.redb");
        let (alice, stored) = {
            let store = RedbStore::open(&path).expect("open");
            let alice = store.register("alice", false).expect("register").id;
            let stored = store.append(submit(alice, &[("teamwork", "6")])).expect("append");
            (alice, stored)
        };

        let store = RedbStore::open(&path).expect("reopen");
        assert_eq!(store.query_recent(alice, 10).expect("query"), vec![stored]);
        assert_eq!(store.user_count().expect("count"), 1);
        assert_eq!(store.count().expect("count"), 1);

        // counters continue after reopen
        let next = store.append(submit(alice, &[])).expect("append");
        assert_eq!(next.id, AssessmentId(2));
    }

    #[test]
    fn timestamps_strictly_increase_with_frozen_clock() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store =
            RedbStore::open_with_clock(dir.path().join("t.redb"), FrozenClock(Timestamp(5_000)))
                .expect("open");

        let mut previous = None;
        for _ in 0..5 {
            let stored = store.append(submit(UserId(1), &[])).expect("append");
            if let Some(prev) = previous {
                assert!(stored.created_at > prev);
            }
            previous = Some(stored.created_at);
        }

        let recent = store.query_recent(UserId(1), 10).expect("query");
        let ids: Vec<u64> = recent.iter().map(|a| a.id.0).collect();
        assert_eq!(ids, vec![5, 4, 3, 2, 1]);
        assert!(recent.windows(2).all(|w| w[0].created_at > w[1].created_at));
    }

    #[test]
    fn owner_history_is_scoped_and_limited() {
        let (_dir, store) = temp_store();
        for i in 0..12 {
            let owner = UserId(1 + (i % 2));
            let value = (i % 10 + 1).to_string();
            store
                .append(submit(owner, &[("initiative", value.as_str())]))
                .expect("append");
        }

        let history = store.query_recent(UserId(2), 10).expect("query");
        assert_eq!(history.len(), 6);
        assert!(history.iter().all(|a| a.vector.owner() == UserId(2)));
        assert!(store.query_recent(UserId(3), 10).expect("query").is_empty());
        assert!(store.query_recent(UserId(1), 0).expect("query").is_empty());
        assert_eq!(store.query_recent(UserId(1), 2).expect("query").len(), 2);
    }

    #[test]
    fn global_query_then_aggregate() {
        let (_dir, store) = temp_store();
        let alice = store.register("alice", false).expect("register").id;
        let bob = store.register("bob", false).expect("register").id;
        store.append(submit(alice, &[("technical_skill", "4")])).expect("append");
        store.append(submit(bob, &[("technical_skill", "8")])).expect("append");

        let global = store.query_recent_global(&store, 100).expect("query");
        assert_eq!(global.len(), 2);
        assert_eq!(global[0].username, "bob");
        assert_eq!(global[1].username, "alice");

        let aggregate = Aggregator::average(global.iter().map(|g| &g.assessment.vector));
        assert_eq!(aggregate.mean(Dimension::TechnicalSkill), 6.0);
    }

    #[test]
    fn global_query_skips_unknown_owners() {
        let (_dir, store) = temp_store();
        let alice = store.register("alice", false).expect("register").id;
        store.append(submit(alice, &[])).expect("append");
        store.append(submit(UserId(404), &[])).expect("append");

        let global = store.query_recent_global(&store, 100).expect("query");
        assert_eq!(global.len(), 1);
        assert_eq!(global[0].assessment.vector.owner(), alice);
    }

    #[test]
    fn duplicate_username_is_rejected_without_side_effects() {
        let (_dir, store) = temp_store();
        store.register("dana", true).expect("register");
        assert!(matches!(
            store.register("  dana", false),
            Err(StoreError::DuplicateUser(_))
        ));
        assert_eq!(store.user_count().expect("count"), 1);

        let dana = store.find_by_name("dana").expect("find").expect("present");
        assert!(dana.is_admin);
        assert_eq!(store.display_name(dana.id).expect("name"), Some("dana".into()));
        assert_eq!(store.find_by_name("erin").expect("find"), None);
    }

    #[test]
    fn catalog_version_mismatch_is_detected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("old.redb");
        {
            let db = Database::create(&path).expect("create");
            let txn = db.begin_write().expect("write");
            {
                let mut meta = txn.open_table(META).expect("meta");
                meta.insert(CATALOG_VERSION_KEY, CATALOG_VERSION + 1).expect("insert");
            }
            txn.commit().expect("commit");
        }

        let result = RedbStore::open(&path);
        assert!(matches!(
            result,
            Err(StoreError::SchemaMismatch { key: CATALOG_VERSION_KEY, .. })
        ));
    }

    #[test]
    fn concurrent_appends_all_land() {
        let (_dir, store) = temp_store();
        let store = Arc::new(store);
        let handles: Vec<_> = (0..4_u64)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        store.append(submit(UserId(t), &[("reliability", "7")])).expect("append");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread");
        }

        assert_eq!(store.count().expect("count"), 40);
        let recent = store.query_recent(UserId(2), 100).expect("query");
        assert_eq!(recent.len(), 10);
        assert!(recent.windows(2).all(|w| w[0].created_at > w[1].created_at));
    }
}
