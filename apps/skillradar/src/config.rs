//! # Configuration
//!
//! Resolved once in `main` from flags (with environment fallbacks) and
//! passed to every command.

use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Environment variable for the database path.
pub const ENV_DB: &str = "SKILLRADAR_DB";

/// Environment variable for the log filter. `RUST_LOG` is consulted after it.
pub const ENV_LOG: &str = "SKILLRADAR_LOG";

/// Environment variable for the chart edge length in pixels.
pub const ENV_CHART_SIZE: &str = "SKILLRADAR_CHART_SIZE";

/// Environment variable naming an admin to create on `init`.
pub const ENV_ADMIN_USERNAME: &str = "SKILLRADAR_ADMIN_USERNAME";

/// Default database file.
pub const DEFAULT_DB_PATH: &str = "skillradar.redb";

/// Default log filter.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default chart edge length.
pub const DEFAULT_CHART_SIZE: u32 = 750;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub chart_size: u32,
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            chart_size: DEFAULT_CHART_SIZE,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl AppConfig {
    /// Build from already-parsed global flags.
    #[must_use]
    pub fn new(db_path: PathBuf, chart_size: u32, log_level: Option<String>) -> Self {
        let log_filter = resolve_log_filter(log_level, std::env::var("RUST_LOG").ok());
        Self {
            db_path,
            chart_size,
            log_filter,
        }
    }

    /// A config pointing at `db_path` with every other setting defaulted.
    #[must_use]
    pub fn for_db(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }
}

/// First non-blank of `explicit` then `rust_log`, else the default.
fn resolve_log_filter(explicit: Option<String>, rust_log: Option<String>) -> String {
    let non_blank = |f: &String| !f.trim().is_empty();
    explicit
        .filter(non_blank)
        .or_else(|| rust_log.filter(non_blank))
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
}

/// Install the global subscriber: formatted events on stderr, filtered by
/// `filter`. An unparsable filter falls back to the default.
pub fn init_tracing(filter: &str) {
    let env_filter =
        EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_log_level_wins() {
        let config = AppConfig::new(PathBuf::from("x.redb"), 300, Some("debug".into()));
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.chart_size, 300);
        assert_eq!(config.db_path, PathBuf::from("x.redb"));
    }

    #[test]
    fn log_filter_falls_back_through_rust_log() {
        let some = |f: &str| Some(f.to_string());
        assert_eq!(resolve_log_filter(some("debug"), some("trace")), "debug");
        assert_eq!(resolve_log_filter(some(""), some("trace")), "trace");
        assert_eq!(resolve_log_filter(some("  "), some("warn")), "warn");
        assert_eq!(resolve_log_filter(None, some("warn")), "warn");
        assert_eq!(resolve_log_filter(some(""), some(" ")), DEFAULT_LOG_FILTER);
        assert_eq!(resolve_log_filter(None, None), DEFAULT_LOG_FILTER);
    }

    #[test]
    fn for_db_defaults_the_rest() {
        let config = AppConfig::for_db("y.redb");
        assert_eq!(config.chart_size, DEFAULT_CHART_SIZE);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }
}
