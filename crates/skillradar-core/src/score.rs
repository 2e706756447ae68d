//! # Score Vectors
//!
//! Construction of a complete, valid [`ScoreVector`] from raw submission input.
//!
//! Construction is total: every dimension that is missing, unparsable or out
//! of range is coerced into `[1, 10]` instead of being rejected. The clamp is
//! `max(1, min(10, parsed))` with parse failures reading as `0`, so garbage
//! input lands on the floor score of 1.

use crate::dimension::{DIMENSION_COUNT, Dimension};
use crate::primitives::UserId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Raw input key that carries free-text notes.
pub const NOTES_KEY: &str = "notes";

/// Value a failed parse degrades to before clamping.
const PARSE_FAILURE_VALUE: i64 = 0;

// =============================================================================
// SCORE
// =============================================================================

/// A single dimension score. Always within `[Score::MIN, Score::MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

impl Score {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    /// Clamp an arbitrary integer into the valid range.
    #[must_use]
    pub fn clamp(value: i64) -> Self {
        Self(value.clamp(i64::from(Self::MIN), i64::from(Self::MAX)) as u8)
    }

    /// Checked constructor for values read back from storage.
    #[must_use]
    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Self(value))
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Score {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| {
            format!(
                "score {} outside {}..={}",
                value,
                Self::MIN,
                Self::MAX
            )
        })
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> Self {
        score.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// RAW INPUT
// =============================================================================

/// One raw input value as handed over by the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Form-style text, parsed leniently.
    Text(String),
    /// An already-typed integer.
    Integer(i64),
    /// A typed float. Only finite integral values parse.
    Float(f64),
    /// Anything else (booleans, nulls, nested data). Never parses.
    Other,
}

impl RawValue {
    /// Parse into an integer, or `None` if the value is not an integer.
    #[must_use]
    pub fn parse(&self) -> Option<i64> {
        match self {
            Self::Text(text) => parse_integer_text(text),
            Self::Integer(value) => Some(*value),
            Self::Float(value) => {
                if value.is_finite() && value.fract() == 0.0 {
                    // `as` saturates at the i64 bounds
                    Some(*value as i64)
                } else {
                    None
                }
            }
            Self::Other => None,
        }
    }

    /// Text form, used for notes.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// First code point of every run of ten decimal digits (Unicode `Nd`) in the
/// Basic Multilingual Plane, plus the mathematical digit styles.
const DECIMAL_ZEROS: [u32; 42] = [
    0x0030, 0x0660, 0x06F0, 0x07C0, 0x0966, 0x09E6, 0x0A66, 0x0AE6, 0x0B66, 0x0BE6, 0x0C66,
    0x0CE6, 0x0D66, 0x0DE6, 0x0E50, 0x0ED0, 0x0F20, 0x1040, 0x1090, 0x17E0, 0x1810, 0x1946,
    0x19D0, 0x1A80, 0x1A90, 0x1B50, 0x1BB0, 0x1C40, 0x1C50, 0xA620, 0xA8D0, 0xA900, 0xA9D0,
    0xA9F0, 0xAA50, 0xABF0, 0xFF10, 0x1D7CE, 0x1D7D8, 0x1D7E2, 0x1D7EC, 0x1D7F6,
];

/// Value of a decimal digit in any script listed in [`DECIMAL_ZEROS`].
fn decimal_digit(ch: char) -> Option<u32> {
    let code = u32::from(ch);
    DECIMAL_ZEROS
        .iter()
        .find_map(|&zero| code.checked_sub(zero).filter(|digit| *digit < 10))
}

/// Parse integer text the way a form handler would: surrounding whitespace
/// allowed, optional sign, decimal digits optionally grouped by single
/// underscores (`1_000`). Magnitudes beyond `i64` saturate rather than fail.
fn parse_integer_text(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    if digits.is_empty()
        || digits.starts_with('_')
        || digits.ends_with('_')
        || digits.contains("__")
    {
        return None;
    }

    let mut value: i64 = 0;
    for ch in digits.chars().filter(|ch| *ch != '_') {
        let digit = i64::from(decimal_digit(ch)?);
        value = value.saturating_mul(10);
        value = if negative {
            value.saturating_sub(digit)
        } else {
            value.saturating_add(digit)
        };
    }
    Some(value)
}

/// An unvalidated submission: dimension keys (and `notes`) to raw values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSubmission {
    fields: BTreeMap<String, RawValue>,
}

impl RawSubmission {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value for the key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<RawValue>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Builder form of [`RawSubmission::insert`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.insert(key, value);
        self
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.fields.get(key)
    }

    /// Keys that are neither a dimension nor `notes`.
    pub fn unknown_keys(&self) -> impl Iterator<Item = &str> {
        self.fields
            .keys()
            .map(String::as_str)
            .filter(|k| *k != NOTES_KEY && Dimension::from_key(k).is_none())
    }

    /// Overlay another submission; its fields win.
    pub fn merge(&mut self, other: RawSubmission) {
        self.fields.extend(other.fields);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<RawValue>> FromIterator<(K, V)> for RawSubmission {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut raw = Self::new();
        for (key, value) in iter {
            raw.insert(key, value);
        }
        raw
    }
}

// =============================================================================
// COERCION REPORT
// =============================================================================

/// Why a dimension's stored score differs from what was literally submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CoercionKind {
    /// No value was supplied.
    Missing,
    /// A value was supplied but is not an integer.
    Unparsable,
    /// Parsed below the floor.
    ClampedLow { parsed: i64 },
    /// Parsed above the ceiling.
    ClampedHigh { parsed: i64 },
}

/// One silently corrected input value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coercion {
    pub dimension: Dimension,
    pub kind: CoercionKind,
    pub stored: Score,
}

// =============================================================================
// SCORE VECTOR
// =============================================================================

/// One complete assessment: all twelve scores, the owner and optional notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreVector {
    owner: UserId,
    scores: [Score; DIMENSION_COUNT],
    notes: Option<String>,
}

impl ScoreVector {
    /// Build from already-valid scores. Notes are normalized.
    #[must_use]
    pub fn new(owner: UserId, scores: [Score; DIMENSION_COUNT], notes: Option<String>) -> Self {
        Self {
            owner,
            scores,
            notes: notes.as_deref().and_then(normalize_notes),
        }
    }

    /// Coerce raw input into a valid vector. Never fails.
    #[must_use]
    pub fn from_raw(raw: &RawSubmission, owner: UserId) -> Self {
        Self::from_raw_with_report(raw, owner).0
    }

    /// Like [`ScoreVector::from_raw`], also returning every coercion applied.
    #[must_use]
    pub fn from_raw_with_report(raw: &RawSubmission, owner: UserId) -> (Self, Vec<Coercion>) {
        let mut coercions = Vec::new();
        let scores = Dimension::ALL.map(|dimension| {
            let (parsed, failure) = match raw.get(dimension.key()) {
                None => (PARSE_FAILURE_VALUE, Some(CoercionKind::Missing)),
                Some(value) => match value.parse() {
                    Some(parsed) => (parsed, None),
                    None => (PARSE_FAILURE_VALUE, Some(CoercionKind::Unparsable)),
                },
            };
            let stored = Score::clamp(parsed);
            let kind = failure.or_else(|| {
                if parsed < i64::from(Score::MIN) {
                    Some(CoercionKind::ClampedLow { parsed })
                } else if parsed > i64::from(Score::MAX) {
                    Some(CoercionKind::ClampedHigh { parsed })
                } else {
                    None
                }
            });
            if let Some(kind) = kind {
                coercions.push(Coercion {
                    dimension,
                    kind,
                    stored,
                });
            }
            stored
        });

        for key in raw.unknown_keys() {
            tracing::debug!(key, "ignoring unknown submission field");
        }

        let notes = raw
            .get(NOTES_KEY)
            .and_then(RawValue::as_text)
            .and_then(normalize_notes);

        (
            Self {
                owner,
                scores,
                notes,
            },
            coercions,
        )
    }

    #[must_use]
    pub fn owner(&self) -> UserId {
        self.owner
    }

    #[must_use]
    pub fn score(&self, dimension: Dimension) -> Score {
        self.scores[dimension.index()]
    }

    #[must_use]
    pub fn scores(&self) -> &[Score; DIMENSION_COUNT] {
        &self.scores
    }

    /// Scores as plain integers in canonical order.
    #[must_use]
    pub fn as_row(&self) -> [u8; DIMENSION_COUNT] {
        self.scores.map(Score::value)
    }

    #[must_use]
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// `(dimension, score)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Dimension, Score)> + '_ {
        Dimension::ALL.into_iter().zip(self.scores.iter().copied())
    }
}

/// Trim notes; whitespace-only notes are absent.
fn normalize_notes(notes: &str) -> Option<String> {
    let trimmed = notes.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// =============================================================================
// TESTS
// =============================================================================
