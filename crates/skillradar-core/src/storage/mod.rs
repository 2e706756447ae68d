//! # Storage Module
//!
//! Append-only persistence of assessments and the user directory they are
//! joined against.
//!
//! Two backends share the same contract:
//! - [`RedbStore`]: redb embedded database (ACID, crash safe, MVCC readers)
//! - [`MemoryStore`]: lock-guarded vectors for tests and embedding
//!
//! Both assign strictly increasing timestamps at append time, so newest-first
//! order by timestamp is also reverse insertion order.

mod memory;
mod redb_store;
mod row;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;
pub use row::{AssessmentRow, SCHEMA_VERSION, UserRow};

use crate::primitives::{AssessmentId, Timestamp, UserId};
use crate::score::ScoreVector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// ERRORS
// =============================================================================

/// Failures surfaced by a store. All of them are fatal to the request that
/// triggered them; no partial write is ever left behind.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(#[from] redb::Error),

    #[error("failed to encode record: {0}")]
    Encode(#[source] postcard::Error),

    #[error("failed to decode record: {0}")]
    Decode(#[source] postcard::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("{key} mismatch: store has {found}, this build expects {expected}")]
    SchemaMismatch {
        key: &'static str,
        expected: u64,
        found: u64,
    },

    #[error("username must not be empty")]
    InvalidUsername,

    #[error("user already exists: {0}")]
    DuplicateUser(String),

    #[error("store lock poisoned")]
    LockPoisoned,
}

/// Wrap any redb error type into [`StoreError::Unavailable`].
pub(crate) fn unavailable(err: impl Into<redb::Error>) -> StoreError {
    StoreError::Unavailable(err.into())
}

// =============================================================================
// RECORDS
// =============================================================================

/// A stored score vector with its store-assigned identity and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    pub id: AssessmentId,
    pub created_at: Timestamp,
    pub vector: ScoreVector,
}

/// An assessment tagged with its owner's display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalAssessment {
    pub username: String,
    pub assessment: Assessment,
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub created_at: Timestamp,
    pub is_admin: bool,
}

// =============================================================================
// TRAITS
// =============================================================================

/// The user registry the global query joins against.
pub trait UserDirectory {
    /// Register a new user. The name is trimmed and must be unique.
    fn register(&self, username: &str, is_admin: bool) -> Result<User, StoreError>;

    /// Exact (case-sensitive) lookup by name.
    fn find_by_name(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Display name for an id, `None` if the id is unknown.
    fn display_name(&self, id: UserId) -> Result<Option<String>, StoreError>;

    fn user_count(&self) -> Result<u64, StoreError>;
}

/// Durable append-only log of score vectors.
pub trait AssessmentStore {
    /// Store one vector with a fresh, strictly increasing timestamp.
    fn append(&self, vector: ScoreVector) -> Result<Assessment, StoreError>;

    /// Up to `limit` of one owner's assessments, newest first.
    fn query_recent(&self, owner: UserId, limit: usize) -> Result<Vec<Assessment>, StoreError>;

    /// Up to `limit` assessments across all owners, newest first, each tagged
    /// with the owner's display name. Rows whose owner the directory does not
    /// know are skipped.
    fn query_recent_global(
        &self,
        directory: &dyn UserDirectory,
        limit: usize,
    ) -> Result<Vec<GlobalAssessment>, StoreError>;

    /// Total number of stored assessments.
    fn count(&self) -> Result<u64, StoreError>;
}

/// Normalize a username for registration.
pub(crate) fn normalize_username(username: &str) -> Result<&str, StoreError> {
    let trimmed = username.trim();
    if trimmed.is_empty() {
        Err(StoreError::InvalidUsername)
    } else {
        Ok(trimmed)
    }
}

/// Walk newest-first assessments, join each with the directory and keep the
/// first `limit` that resolve.
pub(crate) fn join_with_directory<I>(
    newest_first: I,
    directory: &dyn UserDirectory,
    limit: usize,
) -> Result<Vec<GlobalAssessment>, StoreError>
where
    I: IntoIterator<Item = Result<Assessment, StoreError>>,
{
    let mut joined = Vec::new();
    if limit == 0 {
        return Ok(joined);
    }
    for assessment in newest_first {
        let assessment = assessment?;
        match directory.display_name(assessment.vector.owner())? {
            Some(username) => {
                joined.push(GlobalAssessment {
                    username,
                    assessment,
                });
                if joined.len() >= limit {
                    break;
                }
            }
            None => {
                tracing::warn!(
                    id = assessment.id.0,
                    owner = assessment.vector.owner().0,
                    "skipping assessment with unknown owner"
                );
            }
        }
    }
    Ok(joined)
}
