//! Logging initialisation via tracing-subscriber
//!
//! Call [`init`] once at startup, after configuration is resolved. Logs go to
//! stderr so command output on stdout stays clean.

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Errors raised while installing the global subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("failed to set subscriber: {0}")]
    AlreadySet(String),
}

/// Builds the filter for `level`, falling back to `RUST_LOG` when it is invalid
///
/// `level` is any `EnvFilter` directive string, e.g. `"info"` or
/// `"versebot=debug,reqwest=warn"`.
pub fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_new(level) {
        Ok(filter) if !level.trim().is_empty() => Ok(filter),
        Ok(_) => EnvFilter::try_from_default_env().map_err(|e| LoggingError::InvalidFilter {
            filter: level.to_string(),
            reason: format!("empty filter and RUST_LOG unusable: {e}"),
        }),
        Err(level_err) => {
            EnvFilter::try_from_default_env().map_err(|env_err| LoggingError::InvalidFilter {
                filter: level.to_string(),
                reason: format!("{level_err}; RUST_LOG parse failed: {env_err}"),
            })
        }
    }
}

/// Installs the global tracing subscriber
pub fn init(level: &str) -> Result<(), LoggingError> {
    let filter = build_filter(level)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| LoggingError::AlreadySet(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_accepts_levels_and_directives() {
        for level in ["error", "warn", "info", "debug", "trace", "versebot=debug,reqwest=warn"] {
            assert!(build_filter(level).is_ok(), "expected '{level}' to be valid");
        }
    }

    #[test]
    fn test_init_succeeds_or_already_set() {
        match init("info") {
            Ok(()) | Err(LoggingError::AlreadySet(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_second_init_reports_already_set() {
        let _ = init("info");
        assert!(matches!(init("debug"), Err(LoggingError::AlreadySet(_))));
    }
}
