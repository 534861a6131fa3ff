//! Immutable application configuration
//!
//! Built once in `main` from parsed CLI arguments (which fall back to
//! environment variables and `.env`) and handed to constructors. Nothing in
//! the crate reads the environment after startup.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::cache::ResultCache;
use crate::cli::Cli;

/// Cache directory used when no platform cache directory is available
const FALLBACK_CACHE_DIR: &str = ".cache";

const SYSTEM_PROMPT: &str = "You are a knowledgeable and respectful Bible teacher. \
Explain verses clearly, with historical and literary context, and note where \
interpretations differ. Keep answers focused on the verse provided.";

/// Errors raised while validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A setting is out of its accepted range
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Settings for the verse-lookup API
#[derive(Debug, Clone)]
pub struct BibleConfig {
    pub base_url: String,
    /// Translation code passed through to the API, e.g. "KJV"
    pub translation: String,
    pub timeout: Duration,
    /// Extra attempts after a transient failure
    pub max_retries: u32,
}

/// Settings for the chat-completion API
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub timeout: Duration,
    pub system_prompt: String,
}

/// Settings for the result cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub enabled: bool,
    pub dir: PathBuf,
    pub ttl: Duration,
    /// Time between background sweeps in interactive mode
    pub sweep_interval: Duration,
}

/// Complete configuration for one run
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bible: BibleConfig,
    pub llm: LlmConfig,
    pub cache: CacheConfig,
    /// Extra book aliases merged into the built-in table
    pub books_file: Option<PathBuf>,
    pub log_level: String,
}

impl AppConfig {
    /// Validates parsed CLI arguments and builds the configuration
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        require_positive("bible-timeout", cli.bible_timeout)?;
        require_positive("llm-timeout", cli.llm_timeout)?;
        require_positive("sweep-minutes", cli.sweep_minutes)?;
        if cli.max_tokens == 0 {
            return Err(invalid("max-tokens", "must be at least 1"));
        }
        if !(0.0..=2.0).contains(&cli.temperature) {
            return Err(invalid("temperature", "must be between 0 and 2"));
        }
        if !(cli.top_p > 0.0 && cli.top_p <= 1.0) {
            return Err(invalid("top-p", "must be greater than 0 and at most 1"));
        }
        if cli.translation.trim().is_empty() {
            return Err(invalid("translation", "must not be empty"));
        }

        let dir = cli
            .cache_dir
            .clone()
            .or_else(ResultCache::default_dir)
            .unwrap_or_else(|| PathBuf::from(FALLBACK_CACHE_DIR));

        Ok(Self {
            bible: BibleConfig {
                base_url: cli.bible_url.clone(),
                translation: cli.translation.trim().to_string(),
                timeout: Duration::from_secs(cli.bible_timeout),
                max_retries: cli.max_retries,
            },
            llm: LlmConfig {
                base_url: cli.llm_url.clone(),
                api_key: cli.llm_api_key.clone(),
                model: cli.model.clone(),
                max_tokens: cli.max_tokens,
                temperature: cli.temperature,
                top_p: cli.top_p,
                timeout: Duration::from_secs(cli.llm_timeout),
                system_prompt: SYSTEM_PROMPT.to_string(),
            },
            cache: CacheConfig {
                enabled: cli.enable_cache,
                dir,
                ttl: Duration::from_secs(cli.cache_ttl_hours.saturating_mul(60 * 60)),
                sweep_interval: Duration::from_secs(cli.sweep_minutes.saturating_mul(60)),
            },
            books_file: cli.books.clone(),
            log_level: cli.log_level.clone(),
        })
    }
}

fn require_positive(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(invalid(field, "must be greater than 0"));
    }
    Ok(())
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        let mut full = vec!["versebot"];
        full.extend_from_slice(args);
        full.extend_from_slice(&["resolve", "John 3:16"]);
        Cli::parse_from(full)
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_cli(&parse(&[])).expect("defaults are valid");

        assert_eq!(config.bible.base_url, "https://bible-api.com");
        assert_eq!(config.bible.translation, "KJV");
        assert_eq!(config.bible.timeout, Duration::from_secs(10));
        assert_eq!(config.bible.max_retries, 3);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl, Duration::from_secs(168 * 3600));
        assert_eq!(config.cache.sweep_interval, Duration::from_secs(3600));
        assert!(config.books_file.is_none());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_cli(&parse(&[
            "--translation",
            "web",
            "--cache",
            "false",
            "--cache-ttl-hours",
            "2",
            "--cache-dir",
            "/tmp/versebot-test",
            "--llm-api-key",
            "secret",
        ]))
        .unwrap();

        assert_eq!(config.bible.translation, "web");
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.ttl, Duration::from_secs(7200));
        assert_eq!(config.cache.dir, PathBuf::from("/tmp/versebot-test"));
        assert_eq!(config.llm.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_zero_ttl_is_allowed() {
        let config = AppConfig::from_cli(&parse(&["--cache-ttl-hours", "0"])).unwrap();
        assert_eq!(config.cache.ttl, Duration::ZERO);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        assert!(AppConfig::from_cli(&parse(&["--bible-timeout", "0"])).is_err());
        assert!(AppConfig::from_cli(&parse(&["--temperature", "3.5"])).is_err());
        assert!(AppConfig::from_cli(&parse(&["--top-p", "0"])).is_err());
        assert!(AppConfig::from_cli(&parse(&["--max-tokens", "0"])).is_err());
        assert!(AppConfig::from_cli(&parse(&["--translation", " "])).is_err());
    }

    #[test]
    fn test_error_names_the_field() {
        let error = AppConfig::from_cli(&parse(&["--sweep-minutes", "0"])).unwrap_err();
        assert!(error.to_string().contains("sweep-minutes"));
    }
}
