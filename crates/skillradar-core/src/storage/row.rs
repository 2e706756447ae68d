//! Persisted row layouts.
//!
//! An assessment row is the owner reference, the creation timestamp, twelve
//! integer scores in catalog order and the optional notes. Rows are postcard
//! encoded. The layout is tied to [`SCHEMA_VERSION`] and
//! [`CATALOG_VERSION`](crate::dimension::CATALOG_VERSION).

use super::{Assessment, StoreError, User};
use crate::dimension::{DIMENSION_COUNT, Dimension};
use crate::primitives::{AssessmentId, Timestamp, UserId};
use crate::score::{Score, ScoreVector};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Version of the row layouts and table set.
pub const SCHEMA_VERSION: u64 = 1;

/// One assessment as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentRow {
    pub owner: u64,
    pub created_at: i64,
    pub scores: [u8; DIMENSION_COUNT],
    pub notes: Option<String>,
}

impl AssessmentRow {
    #[must_use]
    pub fn from_vector(vector: &ScoreVector, created_at: Timestamp) -> Self {
        Self {
            owner: vector.owner().0,
            created_at: created_at.as_micros(),
            scores: vector.as_row(),
            notes: vector.notes().map(str::to_string),
        }
    }

    /// Rebuild the assessment, rejecting rows that break the score invariant.
    pub fn into_assessment(self, id: AssessmentId) -> Result<Assessment, StoreError> {
        let mut scores = [Score::clamp(1); DIMENSION_COUNT];
        for (slot, (dimension, raw)) in scores
            .iter_mut()
            .zip(Dimension::ALL.into_iter().zip(self.scores))
        {
            *slot = Score::new(raw).ok_or_else(|| {
                StoreError::Corrupt(format!(
                    "assessment {}: {} score {} out of range",
                    id, dimension, raw
                ))
            })?;
        }
        Ok(Assessment {
            id,
            created_at: Timestamp::from_micros(self.created_at),
            vector: ScoreVector::new(UserId(self.owner), scores, self.notes),
        })
    }
}

/// One user as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRow {
    pub username: String,
    pub created_at: i64,
    pub is_admin: bool,
}

impl UserRow {
    #[must_use]
    pub fn from_user(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            created_at: user.created_at.as_micros(),
            is_admin: user.is_admin,
        }
    }

    #[must_use]
    pub fn into_user(self, id: UserId) -> User {
        User {
            id,
            username: self.username,
            created_at: Timestamp::from_micros(self.created_at),
            is_admin: self.is_admin,
        }
    }
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    postcard::to_allocvec(value).map_err(StoreError::Encode)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    postcard::from_bytes(bytes).map_err(StoreError::Decode)
}

// =============================================================================
// TESTS
// =============================================================================
