//! # Skillradar Core
//!
//! The assessment data model and the aggregation/visualization pipeline.
//!
//! ```text
//! raw form ──► ScoreVector::from_raw ──► AssessmentStore::append
//!                                              │
//!              query_recent / query_recent_global
//!                                              │
//!                                   Aggregator::average
//!                                              │
//!                                  RadarRenderer::render ──► PNG / data URI
//! ```
//!
//! Everything here is synchronous and free of network I/O. Authentication,
//! routing and templating are left to the caller.

pub mod aggregate;
pub mod dimension;
pub mod primitives;
pub mod radar;
pub mod score;
pub mod storage;

pub use aggregate::{AggregateVector, Aggregator};
pub use dimension::{CATALOG_VERSION, DIMENSION_COUNT, Dimension};
pub use primitives::{AssessmentId, Clock, SystemClock, Timestamp, UserId};
pub use radar::{RadarAxis, RadarGeometry, RadarImage, RadarRenderer, RadarStyle, RenderError};
pub use score::{Coercion, CoercionKind, RawSubmission, RawValue, Score, ScoreVector};
pub use storage::{
    Assessment, AssessmentStore, GlobalAssessment, MemoryStore, RedbStore, StoreError, User,
    UserDirectory,
};
