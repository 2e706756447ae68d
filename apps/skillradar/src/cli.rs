//! # CLI Module
//!
//! Command definitions and their implementations. Each `cmd_*` function opens
//! the store, does one thing, prints its result and returns it for callers
//! that want the value rather than the text.

use crate::config::{
    AppConfig, DEFAULT_CHART_SIZE, DEFAULT_DB_PATH, ENV_ADMIN_USERNAME, ENV_CHART_SIZE, ENV_DB,
    ENV_LOG,
};
use crate::report::{self, AssessmentView, OverviewReport, StatusReport};
use clap::{Parser, Subcommand};
use serde_json::Value;
use skillradar_core::primitives::{DEFAULT_GLOBAL_LIMIT, DEFAULT_HISTORY_LIMIT};
use skillradar_core::radar::{MAX_IMAGE_SIZE, MIN_IMAGE_SIZE};
use skillradar_core::score::NOTES_KEY;
use skillradar_core::storage::SCHEMA_VERSION;
use skillradar_core::{
    Aggregator, Assessment, AssessmentStore, CATALOG_VERSION, CoercionKind, Dimension,
    RadarRenderer, RadarStyle, RawSubmission, RawValue, RedbStore, RenderError, ScoreVector,
    StoreError, User, UserDirectory,
};
use std::path::{Path, PathBuf};
use thiserror::Error;

// =============================================================================
// ARGUMENTS
// =============================================================================

#[derive(Debug, Parser)]
#[command(name = "skillradar", version, about = "Skill assessments and radar charts")]
pub struct Cli {
    /// Database file.
    #[arg(long, global = true, env = ENV_DB, default_value = DEFAULT_DB_PATH)]
    pub db: PathBuf,

    /// Log filter (tracing EnvFilter syntax). Falls back to RUST_LOG.
    #[arg(long, global = true, env = ENV_LOG)]
    pub log_level: Option<String>,

    /// Chart edge length in pixels.
    #[arg(
        long,
        global = true,
        env = ENV_CHART_SIZE,
        default_value_t = DEFAULT_CHART_SIZE,
        value_parser = clap::value_parser!(u32)
            .range(i64::from(MIN_IMAGE_SIZE)..=i64::from(MAX_IMAGE_SIZE))
    )]
    pub chart_size: u32,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    #[must_use]
    pub fn config(&self) -> AppConfig {
        AppConfig::new(self.db.clone(), self.chart_size, self.log_level.clone())
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a new database.
    Init {
        /// Replace an existing database file.
        #[arg(long)]
        force: bool,
        /// Register this user as an admin after creating the database.
        #[arg(long, env = ENV_ADMIN_USERNAME)]
        admin: Option<String>,
    },
    /// Register a user.
    Register {
        username: String,
        #[arg(long)]
        admin: bool,
    },
    /// Submit an assessment.
    Submit {
        #[arg(long)]
        user: String,
        /// `dimension=value`, repeatable. Overrides values from `--input`.
        #[arg(long = "score", value_name = "KEY=VALUE")]
        scores: Vec<String>,
        #[arg(long)]
        notes: Option<String>,
        /// JSON object of dimension keys to values.
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Show a user's recent assessments.
    History {
        #[arg(long)]
        user: String,
        #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Recent assessments across all users with their average. Admins only.
    Overview {
        /// Admin user requesting the overview.
        #[arg(long = "as", value_name = "USER")]
        viewer: String,
        #[arg(long, default_value_t = DEFAULT_GLOBAL_LIMIT)]
        limit: usize,
        #[arg(long)]
        json: bool,
        /// Write the radar chart as PNG.
        #[arg(long)]
        chart: Option<PathBuf>,
        /// Include the chart as a data URI.
        #[arg(long)]
        data_uri: bool,
    },
    /// Counts and layout versions.
    Status {
        #[arg(long)]
        json: bool,
    },
    /// List the dimension catalog.
    Dimensions {
        #[arg(long)]
        json: bool,
    },
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to render chart: {0}")]
    Render(#[from] RenderError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database already exists: {} (use --force to overwrite)", .0.display())]
    AlreadyExists(PathBuf),

    #[error("database not found: {} (run `skillradar init` first)", .0.display())]
    NotInitialized(PathBuf),

    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error("user '{0}' is not an admin")]
    NotAdmin(String),

    #[error("invalid --score argument '{0}', expected KEY=VALUE")]
    InvalidScoreArg(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Run one command against the configured database.
pub fn run(command: Command, config: &AppConfig) -> Result<(), CliError> {
    let db = config.db_path.as_path();
    match command {
        Command::Init { force, admin } => cmd_init(db, force, admin.as_deref()).map(drop),
        Command::Register { username, admin } => cmd_register(db, &username, admin).map(drop),
        Command::Submit {
            user,
            scores,
            notes,
            input,
        } => cmd_submit(db, &user, &scores, notes.as_deref(), input.as_deref()).map(drop),
        Command::History { user, limit, json } => cmd_history(db, &user, limit, json).map(drop),
        Command::Overview {
            viewer,
            limit,
            json,
            chart,
            data_uri,
        } => {
            let chart = chart.as_deref();
            cmd_overview(db, &viewer, limit, config.chart_size, chart, data_uri, json).map(drop)
        }
        Command::Status { json } => cmd_status(db, json).map(drop),
        Command::Dimensions { json } => cmd_dimensions(json),
    }
}

/// Open an existing database.
pub fn open_store(db_path: &Path) -> Result<RedbStore, CliError> {
    if !db_path.exists() {
        return Err(CliError::NotInitialized(db_path.to_path_buf()));
    }
    Ok(RedbStore::open(db_path)?)
}

fn require_user(store: &RedbStore, username: &str) -> Result<User, CliError> {
    store
        .find_by_name(username.trim())?
        .ok_or_else(|| CliError::UnknownUser(username.to_string()))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// =============================================================================
// INIT / REGISTER
// =============================================================================

/// Create the database, optionally bootstrapping an admin.
pub fn cmd_init(
    db_path: &Path,
    force: bool,
    admin: Option<&str>,
) -> Result<Option<User>, CliError> {
    if db_path.exists() {
        if !force {
            return Err(CliError::AlreadyExists(db_path.to_path_buf()));
        }
        tracing::warn!(path = %db_path.display(), "removing existing database");
        std::fs::remove_file(db_path)?;
    }

    let store = RedbStore::open(db_path)?;
    tracing::info!(path = %db_path.display(), "initialized database");
    println!("Initialized database at {}", db_path.display());

    let admin = admin.map(str::trim).filter(|name| !name.is_empty());
    match admin {
        Some(name) => {
            let user = store.register(name, true)?;
            println!("Registered admin '{}' (id {})", user.username, user.id);
            Ok(Some(user))
        }
        None => Ok(None),
    }
}

pub fn cmd_register(db_path: &Path, username: &str, admin: bool) -> Result<User, CliError> {
    let store = open_store(db_path)?;
    let user = store.register(username, admin)?;
    let role = if user.is_admin { "admin" } else { "user" };
    println!("Registered {} '{}' (id {})", role, user.username, user.id);
    Ok(user)
}

// =============================================================================
// SUBMIT
// =============================================================================

/// Split a `key=value` argument.
pub fn parse_score_arg(arg: &str) -> Result<(String, String), CliError> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(CliError::InvalidScoreArg(arg.to_string())),
    }
}

/// Convert one JSON value into a raw input value.
fn raw_value(value: &Value) -> RawValue {
    match value {
        Value::String(text) => RawValue::Text(text.clone()),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => RawValue::Integer(integer),
            None => number.as_f64().map_or(RawValue::Other, RawValue::Float),
        },
        _ => RawValue::Other,
    }
}

/// Read a JSON object of raw fields.
pub fn load_submission(path: &Path) -> Result<RawSubmission, CliError> {
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;
    let Value::Object(fields) = value else {
        return Err(CliError::InvalidInput(format!(
            "{} must contain a JSON object",
            path.display()
        )));
    };
    Ok(fields
        .iter()
        .map(|(key, value)| (key.clone(), raw_value(value)))
        .collect())
}

/// Build the raw submission from a file and flag overrides.
pub fn collect_submission(
    scores: &[String],
    notes: Option<&str>,
    input: Option<&Path>,
) -> Result<RawSubmission, CliError> {
    let mut raw = match input {
        Some(path) => load_submission(path)?,
        None => RawSubmission::new(),
    };
    for arg in scores {
        let (key, value) = parse_score_arg(arg)?;
        raw.insert(key, value);
    }
    if let Some(notes) = notes {
        raw.insert(NOTES_KEY, notes);
    }
    Ok(raw)
}

pub fn cmd_submit(
    db_path: &Path,
    username: &str,
    scores: &[String],
    notes: Option<&str>,
    input: Option<&Path>,
) -> Result<Assessment, CliError> {
    let raw = collect_submission(scores, notes, input)?;
    let store = open_store(db_path)?;
    let user = require_user(&store, username)?;

    let (vector, coercions) = ScoreVector::from_raw_with_report(&raw, user.id);
    for coercion in &coercions {
        match coercion.kind {
            CoercionKind::Missing => tracing::debug!(
                dimension = coercion.dimension.key(),
                stored = coercion.stored.value(),
                "no value supplied"
            ),
            kind => tracing::warn!(
                dimension = coercion.dimension.key(),
                stored = coercion.stored.value(),
                ?kind,
                "score coerced"
            ),
        }
    }

    let assessment = store.append(vector)?;
    tracing::info!(id = assessment.id.0, user = %user.username, "assessment submitted");
    println!(
        "Stored assessment {} for '{}' at {}",
        assessment.id, user.username, assessment.created_at
    );
    Ok(assessment)
}

// =============================================================================
// HISTORY / OVERVIEW
// =============================================================================

pub fn cmd_history(
    db_path: &Path,
    username: &str,
    limit: usize,
    json: bool,
) -> Result<Vec<Assessment>, CliError> {
    let store = open_store(db_path)?;
    let user = require_user(&store, username)?;
    let history = store.query_recent(user.id, limit)?;

    let views: Vec<AssessmentView> = history
        .iter()
        .map(|a| AssessmentView::from_assessment(a, None))
        .collect();
    if json {
        print_json(&views)?;
    } else {
        println!("History for '{}' (newest first)", user.username);
        print!("{}", report::assessment_table(&views, false));
    }
    Ok(history)
}

/// Global recent rows, their aggregate and optionally the radar chart.
/// `viewer` must be a registered admin.
pub fn cmd_overview(
    db_path: &Path,
    viewer: &str,
    limit: usize,
    chart_size: u32,
    chart: Option<&Path>,
    data_uri: bool,
    json: bool,
) -> Result<OverviewReport, CliError> {
    let store = open_store(db_path)?;
    let viewer = require_user(&store, viewer)?;
    if !viewer.is_admin {
        tracing::warn!(user = %viewer.username, "overview refused for non-admin");
        return Err(CliError::NotAdmin(viewer.username));
    }
    let rows = store.query_recent_global(&store, limit)?;
    let aggregate = Aggregator::average(rows.iter().map(|g| &g.assessment.vector));
    let mut overview = OverviewReport::new(&rows, &aggregate);

    // An empty population gets no chart at all.
    if !aggregate.is_empty() && (chart.is_some() || data_uri) {
        let renderer = RadarRenderer::new(RadarStyle::default().with_size(chart_size));
        if let Some(image) = renderer.render_aggregate(&aggregate)? {
            if let Some(path) = chart {
                std::fs::write(path, image.png_bytes())?;
                tracing::info!(path = %path.display(), size = image.width(), "wrote radar chart");
                overview.chart_path = Some(path.to_path_buf());
            }
            if data_uri {
                overview.data_uri = Some(image.to_data_uri());
            }
        }
    } else if aggregate.is_empty() && chart.is_some() {
        tracing::warn!("no assessments to chart");
    }

    if json {
        print_json(&overview)?;
    } else {
        println!("Overview of {} recent assessments", overview.population);
        print!("{}", report::assessment_table(&overview.rows, true));
        println!();
        println!("Averages");
        print!("{}", report::means_table(&overview.means));
        if let Some(path) = &overview.chart_path {
            println!("Chart written to {}", path.display());
        }
        if let Some(uri) = &overview.data_uri {
            println!("{uri}");
        }
    }
    Ok(overview)
}

// =============================================================================
// STATUS / DIMENSIONS
// =============================================================================

pub fn cmd_status(db_path: &Path, json: bool) -> Result<StatusReport, CliError> {
    let store = open_store(db_path)?;
    let status = StatusReport {
        db_path: db_path.to_path_buf(),
        schema_version: SCHEMA_VERSION,
        catalog_version: CATALOG_VERSION,
        users: store.user_count()?,
        assessments: store.count()?,
    };

    if json {
        print_json(&status)?;
    } else {
        println!("Database:        {}", status.db_path.display());
        println!("Schema version:  {}", status.schema_version);
        println!("Catalog version: {}", status.catalog_version);
        println!("Users:           {}", status.users);
        println!("Assessments:     {}", status.assessments);
    }
    Ok(status)
}

pub fn cmd_dimensions(json: bool) -> Result<(), CliError> {
    if json {
        let catalog: Vec<Value> = Dimension::ALL
            .iter()
            .map(|d| serde_json::json!({ "index": d.index(), "key": d.key(), "label": d.label() }))
            .collect();
        print_json(&catalog)?;
    } else {
        print!("{}", report::legend());
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_arg_splits_on_first_equals() {
        let (key, value) = parse_score_arg("teamwork=7").expect("valid");
        assert_eq!((key.as_str(), value.as_str()), ("teamwork", "7"));

        let (_, value) = parse_score_arg("notes=a=b").expect("valid");
        assert_eq!(value, "a=b");

        assert!(matches!(parse_score_arg("teamwork"), Err(CliError::InvalidScoreArg(_))));
        assert!(matches!(parse_score_arg("=7"), Err(CliError::InvalidScoreArg(_))));
    }

    #[test]
    fn json_values_map_to_raw_values() {
        assert_eq!(raw_value(&serde_json::json!("8")), RawValue::Text("8".into()));
        assert_eq!(raw_value(&serde_json::json!(8)), RawValue::Integer(8));
        assert_eq!(raw_value(&serde_json::json!(7.5)), RawValue::Float(7.5));
        assert_eq!(raw_value(&serde_json::json!(true)), RawValue::Other);
        assert_eq!(raw_value(&serde_json::json!(null)), RawValue::Other);
    }

    #[test]
    fn flags_override_file_values() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("in.json");
        std::fs::write(&path, r#"{"teamwork": 3, "leadership": "9", "notes": "file"}"#)
            .expect("write");

        let scores = ["teamwork=6".to_string()];
        let raw = collect_submission(&scores, Some("flag"), Some(path.as_path())).expect("collect");
        assert_eq!(raw.get("teamwork"), Some(&RawValue::Text("6".into())));
        assert_eq!(raw.get("leadership"), Some(&RawValue::Text("9".into())));
        assert_eq!(raw.get(NOTES_KEY), Some(&RawValue::Text("flag".into())));
    }

    #[test]
    fn non_object_input_is_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("in.json");
        std::fs::write(&path, "[1, 2, 3]").expect("write");
        assert!(matches!(load_submission(&path), Err(CliError::InvalidInput(_))));
    }

    #[test]
    fn cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "skillradar",
            "history",
            "--user",
            "alice",
            "--db",
            "x.redb",
            "--limit",
            "3",
        ])
        .expect("parse");
        assert_eq!(cli.db, PathBuf::from("x.redb"));
        assert!(matches!(cli.command, Command::History { limit: 3, .. }));
    }

    #[test]
    fn chart_size_flag_is_bounded() {
        let parse = |size: &str| {
            Cli::try_parse_from(["skillradar", "--chart-size", size, "dimensions"])
                .map(|cli| cli.chart_size)
        };
        assert_eq!(parse("64").ok(), Some(64));
        assert_eq!(parse("4096").ok(), Some(4096));
        assert!(parse("63").is_err());
        assert!(parse("100000").is_err());
        assert!(parse("4294967295").is_err());
    }

    #[test]
    fn overview_requires_viewer() {
        assert!(Cli::try_parse_from(["skillradar", "overview"]).is_err());
        let cli = Cli::try_parse_from(["skillradar", "overview", "--as", "root"]).expect("parse");
        assert!(matches!(cli.command, Command::Overview { viewer, .. } if viewer == "root"));
    }
}
