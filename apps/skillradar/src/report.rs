//! # Report Module
//!
//! Text tables and JSON views for command output. Columns always follow the
//! canonical dimension order.

use serde::Serialize;
use serde_json::{Map, Value};
use skillradar_core::{AggregateVector, Assessment, Dimension, GlobalAssessment};
use std::path::PathBuf;

/// Three-letter column heading for a dimension.
#[must_use]
pub fn abbreviation(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::TechnicalSkill => "TEC",
        Dimension::ProblemSolving => "PRB",
        Dimension::Communication => "COM",
        Dimension::Teamwork => "TMW",
        Dimension::Adaptability => "ADP",
        Dimension::Initiative => "INI",
        Dimension::Reliability => "REL",
        Dimension::TimeManagement => "TIM",
        Dimension::Leadership => "LEA",
        Dimension::LearningAgility => "LRN",
        Dimension::SafetyAwareness => "SAF",
        Dimension::AttentionToDetail => "DET",
    }
}

// =============================================================================
// JSON VIEWS
// =============================================================================

/// One assessment as shown to users.
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentView {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub created_at: String,
    /// Dimension key to score, in catalog order.
    pub scores: Map<String, Value>,
    pub notes: Option<String>,
}

impl AssessmentView {
    #[must_use]
    pub fn from_assessment(assessment: &Assessment, username: Option<&str>) -> Self {
        let scores = assessment
            .vector
            .iter()
            .map(|(d, s)| (d.key().to_string(), Value::from(s.value())))
            .collect();
        Self {
            id: assessment.id.0,
            username: username.map(str::to_string),
            created_at: assessment.created_at.to_string(),
            scores,
            notes: assessment.vector.notes().map(str::to_string),
        }
    }

    #[must_use]
    pub fn from_global(global: &GlobalAssessment) -> Self {
        Self::from_assessment(&global.assessment, Some(&global.username))
    }
}

/// Per-dimension mean.
#[derive(Debug, Clone, Serialize)]
pub struct DimensionMean {
    pub key: &'static str,
    pub label: &'static str,
    pub mean: f64,
}

/// Output of the admin overview.
#[derive(Debug, Clone, Serialize)]
pub struct OverviewReport {
    pub population: usize,
    pub means: Vec<DimensionMean>,
    pub rows: Vec<AssessmentView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_uri: Option<String>,
}

impl OverviewReport {
    #[must_use]
    pub fn new(rows: &[GlobalAssessment], aggregate: &AggregateVector) -> Self {
        Self {
            population: aggregate.population(),
            means: aggregate
                .iter()
                .map(|(d, mean)| DimensionMean {
                    key: d.key(),
                    label: d.label(),
                    mean,
                })
                .collect(),
            rows: rows.iter().map(AssessmentView::from_global).collect(),
            chart_path: None,
            data_uri: None,
        }
    }
}

/// Output of `status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub db_path: PathBuf,
    pub schema_version: u64,
    pub catalog_version: u64,
    pub users: u64,
    pub assessments: u64,
}

// =============================================================================
// TEXT
// =============================================================================

/// Render assessments as a fixed-width table. `with_user` adds a user column.
#[must_use]
pub fn assessment_table(rows: &[AssessmentView], with_user: bool) -> String {
    let mut output = String::new();
    if with_user {
        output.push_str(&format!("{:<16} ", "User"));
    }
    output.push_str(&format!("{:<20}", "Date (UTC)"));
    for d in Dimension::ALL {
        output.push_str(&format!(" {:>3}", abbreviation(d)));
    }
    output.push_str("  Notes\n");

    if rows.is_empty() {
        output.push_str("(no assessments yet)\n");
        return output;
    }

    for row in rows {
        if with_user {
            let user = row.username.as_deref().unwrap_or("");
            output.push_str(&format!("{:<16} ", truncate(user, 16)));
        }
        output.push_str(&format!("{:<20}", row.created_at));
        for d in Dimension::ALL {
            let score = row.scores.get(d.key()).and_then(Value::as_u64).unwrap_or(0);
            output.push_str(&format!(" {:>3}", score));
        }
        output.push_str("  ");
        output.push_str(row.notes.as_deref().unwrap_or(""));
        output.push('\n');
    }
    output
}

/// One line per dimension with its mean.
#[must_use]
pub fn means_table(means: &[DimensionMean]) -> String {
    let mut output = String::new();
    for m in means {
        output.push_str(&format!(
            "{:<4}{:<22}{:>6.2}\n",
            abbreviation_for_key(m.key),
            m.label,
            m.mean
        ));
    }
    output
}

/// Abbreviation legend, one dimension per line.
#[must_use]
pub fn legend() -> String {
    let mut output = String::new();
    for d in Dimension::ALL {
        output.push_str(&format!(
            "{:>2}. {:<4}{:<22}{}\n",
            d.index() + 1,
            abbreviation(d),
            d.label(),
            d.key()
        ));
    }
    output
}

fn abbreviation_for_key(key: &str) -> &'static str {
    Dimension::from_key(key).map_or("", abbreviation)
}

fn truncate(text: &str, width: usize) -> &str {
    match text.char_indices().nth(width) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use skillradar_core::{Aggregator, AssessmentId, RawSubmission, ScoreVector, Timestamp, UserId};

    fn assessment() -> Assessment {
        let raw = RawSubmission::new()
            .with("technical_skill", "9")
            .with("notes", "good week");
        Assessment {
            id: AssessmentId(1),
            created_at: Timestamp(1_704_164_645_000_000),
            vector: ScoreVector::from_raw(&raw, UserId(1)),
        }
    }

    #[test]
    fn abbreviations_are_unique() {
        let mut all: Vec<_> = Dimension::ALL.iter().map(|d| abbreviation(*d)).collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), Dimension::ALL.len());
    }

    #[test]
    fn view_keeps_catalog_order() {
        let view = AssessmentView::from_assessment(&assessment(), None);
        let keys: Vec<&str> = view.scores.keys().map(String::as_str).collect();
        let expected: Vec<&str> = Dimension::ALL.iter().map(|d| d.key()).collect();
        assert_eq!(keys, expected);
        assert_eq!(view.created_at, "2024-01-02T03:04:05Z");
    }

    #[test]
    fn table_lists_scores_and_notes() {
        let view = AssessmentView::from_assessment(&assessment(), Some("alice"));
        let table = assessment_table(&[view], true);
        assert!(table.contains("TEC"));
        assert!(table.contains("alice"));
        assert!(table.contains("good week"));
        assert!(table.contains("  9"));
    }

    #[test]
    fn empty_table_says_so() {
        assert!(assessment_table(&[], false).contains("no assessments"));
    }

    #[test]
    fn overview_report_means() {
        let a = assessment();
        let aggregate = Aggregator::average([&a.vector]);
        let rows = [GlobalAssessment {
            username: "alice".into(),
            assessment: a,
        }];
        let report = OverviewReport::new(&rows, &aggregate);
        assert_eq!(report.population, 1);
        assert_eq!(report.means[0].mean, 9.0);
        assert!(means_table(&report.means).contains("9.00"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("ab", 5), "ab");
    }
}
