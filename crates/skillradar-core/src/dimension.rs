//! # Dimension Catalog
//!
//! The twelve capability axes, in their canonical order.
//!
//! The order of [`Dimension::ALL`] is load-bearing: it is the chart axis
//! order, the table column order and the persisted score layout. Changing
//! it (or adding or removing a variant) changes the storage format, so any
//! edit here must bump [`CATALOG_VERSION`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Version of the catalog. Persisted by the stores and checked on open.
pub const CATALOG_VERSION: u64 = 1;

/// Number of dimensions in the catalog.
pub const DIMENSION_COUNT: usize = 12;

/// One capability axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    TechnicalSkill,
    ProblemSolving,
    Communication,
    Teamwork,
    Adaptability,
    Initiative,
    Reliability,
    TimeManagement,
    Leadership,
    LearningAgility,
    SafetyAwareness,
    AttentionToDetail,
}

impl Dimension {
    /// All dimensions in canonical order.
    pub const ALL: [Dimension; DIMENSION_COUNT] = [
        Dimension::TechnicalSkill,
        Dimension::ProblemSolving,
        Dimension::Communication,
        Dimension::Teamwork,
        Dimension::Adaptability,
        Dimension::Initiative,
        Dimension::Reliability,
        Dimension::TimeManagement,
        Dimension::Leadership,
        Dimension::LearningAgility,
        Dimension::SafetyAwareness,
        Dimension::AttentionToDetail,
    ];

    /// Machine key, also the raw input key and the persisted column name.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::TechnicalSkill => "technical_skill",
            Self::ProblemSolving => "problem_solving",
            Self::Communication => "communication",
            Self::Teamwork => "teamwork",
            Self::Adaptability => "adaptability",
            Self::Initiative => "initiative",
            Self::Reliability => "reliability",
            Self::TimeManagement => "time_management",
            Self::Leadership => "leadership",
            Self::LearningAgility => "learning_agility",
            Self::SafetyAwareness => "safety_awareness",
            Self::AttentionToDetail => "attention_to_detail",
        }
    }

    /// Human-readable label for tables and chart axes.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::TechnicalSkill => "Technical skill",
            Self::ProblemSolving => "Problem solving",
            Self::Communication => "Communication",
            Self::Teamwork => "Teamwork",
            Self::Adaptability => "Adaptability",
            Self::Initiative => "Initiative",
            Self::Reliability => "Reliability",
            Self::TimeManagement => "Time management",
            Self::Leadership => "Leadership",
            Self::LearningAgility => "Learning agility",
            Self::SafetyAwareness => "Safety awareness",
            Self::AttentionToDetail => "Attention to detail",
        }
    }

    /// Position in the canonical order.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Dimension at a canonical position.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Look up a dimension by its machine key. Exact match only.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.key() == key)
    }

    /// Labels in canonical order.
    #[must_use]
    pub fn labels() -> [&'static str; DIMENSION_COUNT] {
        Self::ALL.map(Self::label)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

// =============================================================================
// TESTS
// =============================================================================
