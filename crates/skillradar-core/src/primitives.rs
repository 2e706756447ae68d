//! # Primitives
//!
//! Identifier newtypes, timestamps and the clock seam used by the stores.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default number of rows in a per-user history view.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Default number of rows in the administrative overview.
pub const DEFAULT_GLOBAL_LIMIT: usize = 100;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a registered user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a stored assessment. Assigned by the store in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssessmentId(pub u64);

impl fmt::Display for AssessmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// TIMESTAMP
// =============================================================================

/// Microseconds since the Unix epoch, UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// One tick of the timestamp resolution.
    pub const RESOLUTION_MICROS: i64 = 1;

    #[must_use]
    pub fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    #[must_use]
    pub fn as_micros(self) -> i64 {
        self.0
    }

    /// The next representable instant after `self`.
    #[must_use]
    pub fn successor(self) -> Self {
        Self(self.0.saturating_add(Self::RESOLUTION_MICROS))
    }

    /// Convert to a chrono datetime. `None` only for values outside chrono's range.
    #[must_use]
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_micros(self.0)
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value.timestamp_micros())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
            None => write!(f, "@{}us", self.0),
        }
    }
}

// =============================================================================
// CLOCK
// =============================================================================

/// Source of wall-clock time for store-assigned timestamps.
///
/// Stores never trust the clock to be monotonic; they enforce ordering
/// themselves.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from(Utc::now())
    }
}

/// Assign the timestamp for a new record: the clock reading, unless that
/// would not move strictly past the last assigned timestamp.
#[must_use]
pub fn next_timestamp(now: Timestamp, last: Option<Timestamp>) -> Timestamp {
    match last {
        Some(last) if now <= last => last.successor(),
        _ => now,
    }
}

// =============================================================================
// TESTS
// =============================================================================
