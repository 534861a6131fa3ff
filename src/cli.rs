//! Command-line interface parsing for versebot
//!
//! This module handles parsing of CLI arguments using clap. Every setting can
//! also come from the environment (or a `.env` file), using the variable names
//! shown in `--help`.

use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, Subcommand};
use thiserror::Error;

/// Error types for CLI argument handling
#[derive(Debug, Error)]
pub enum CliError {
    /// The text argument contained nothing but whitespace
    #[error("No text given. Try something like: versebot ask \"Explain John 3:16\"")]
    EmptyText,
}

/// versebot - find, fetch and explain scripture references
#[derive(Parser, Debug)]
#[command(name = "versebot")]
#[command(about = "Find scripture references in text, fetch the verse and explain it")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Translation code passed to the verse API
    #[arg(long, env = "BIBLE_TRANSLATION", default_value = "KJV", global = true)]
    pub translation: String,

    /// Base URL of the verse API
    #[arg(long, env = "BIBLE_API_URL", default_value = "https://bible-api.com", global = true)]
    pub bible_url: String,

    /// Verse API timeout in seconds
    #[arg(long, env = "BIBLE_API_TIMEOUT", default_value_t = 10, global = true)]
    pub bible_timeout: u64,

    /// Retries after a transient verse API failure
    #[arg(long, env = "BIBLE_API_MAX_RETRIES", default_value_t = 3, global = true)]
    pub max_retries: u32,

    /// Whether to use the result cache (true/false)
    #[arg(
        long = "cache",
        env = "BIBLE_ENABLE_CACHE",
        default_value = "true",
        value_parser = BoolishValueParser::new(),
        action = ArgAction::Set,
        global = true
    )]
    pub enable_cache: bool,

    /// Cache lifetime in hours
    #[arg(long, env = "BIBLE_CACHE_TTL_HOURS", default_value_t = 168, global = true)]
    pub cache_ttl_hours: u64,

    /// Cache directory (defaults to the platform cache directory)
    #[arg(long, env = "BIBLE_CACHE_DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Minutes between background cache sweeps in chat mode
    #[arg(long, env = "BIBLE_CACHE_SWEEP_MINUTES", default_value_t = 60, global = true)]
    pub sweep_minutes: u64,

    /// JSON file of extra book aliases, e.g. {"Matthew": ["mtt"]}
    #[arg(long, env = "BIBLE_BOOKS_FILE", global = true)]
    pub books: Option<PathBuf>,

    /// Base URL of the OpenAI-compatible chat API
    #[arg(
        long,
        env = "LLM_BASE_URL",
        default_value = "https://api.fireworks.ai/inference/v1",
        global = true
    )]
    pub llm_url: String,

    /// API key for the chat API
    #[arg(long, env = "LLM_API_KEY", hide_env_values = true, global = true)]
    pub llm_api_key: Option<String>,

    /// Model used for explanations
    #[arg(
        long,
        env = "LLM_MODEL",
        default_value = "accounts/fireworks/models/llama-v3p1-70b-instruct",
        global = true
    )]
    pub model: String,

    /// Maximum tokens per explanation
    #[arg(long, env = "LLM_MAX_TOKENS", default_value_t = 1024, global = true)]
    pub max_tokens: u32,

    /// Sampling temperature
    #[arg(long, env = "LLM_TEMPERATURE", default_value_t = 0.7, global = true)]
    pub temperature: f32,

    /// Nucleus sampling cutoff
    #[arg(long, env = "LLM_TOP_P", default_value_t = 0.9, global = true)]
    pub top_p: f32,

    /// Chat API timeout in seconds
    #[arg(long, env = "LLM_TIMEOUT", default_value_t = 60, global = true)]
    pub llm_timeout: u64,

    /// Log filter, e.g. "info" or "versebot=debug"
    #[arg(long, env = "VERSEBOT_LOG", default_value = "info", global = true)]
    pub log_level: String,
}

/// What to do
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the first scripture reference found in TEXT
    ///
    /// Exits with status 1 when the text contains no reference.
    Resolve {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Look up the reference in TEXT and explain it
    Ask {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Read questions from stdin, one per line
    Chat,
    /// Delete expired entries from the cache
    Sweep,
}

/// Joins positional words into one prompt
///
/// # Returns
/// * `Ok(String)` with the words separated by single spaces
/// * `Err(CliError::EmptyText)` if nothing but whitespace was given
pub fn join_text(words: &[String]) -> Result<String, CliError> {
    let text = words
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if text.is_empty() {
        Err(CliError::EmptyText)
    } else {
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_resolve() {
        let cli = Cli::parse_from(["versebot", "resolve", "Explain", "John", "3:16"]);
        assert_eq!(
            cli.command,
            Command::Resolve {
                text: vec!["Explain".into(), "John".into(), "3:16".into()]
            }
        );
    }

    #[test]
    fn test_cli_parse_ask_with_global_option_after_subcommand() {
        let cli = Cli::parse_from(["versebot", "ask", "--cache", "no", "Matt 7:7"]);
        assert!(matches!(cli.command, Command::Ask { .. }));
        assert!(!cli.enable_cache);
    }

    #[test]
    fn test_cli_parse_chat_and_sweep() {
        assert_eq!(Cli::parse_from(["versebot", "chat"]).command, Command::Chat);
        assert_eq!(Cli::parse_from(["versebot", "sweep"]).command, Command::Sweep);
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["versebot"]).is_err());
    }

    #[test]
    fn test_cli_resolve_requires_text() {
        assert!(Cli::try_parse_from(["versebot", "resolve"]).is_err());
    }

    #[test]
    fn test_cli_rejects_non_boolean_cache_flag() {
        assert!(Cli::try_parse_from(["versebot", "--cache", "maybe", "sweep"]).is_err());
    }

    #[test]
    fn test_join_text() {
        let words = vec!["  What does".to_string(), "".to_string(), "Rom 8:28 mean? ".to_string()];
        assert_eq!(join_text(&words).unwrap(), "What does Rom 8:28 mean?");
    }

    #[test]
    fn test_join_text_empty() {
        let result = join_text(&["  ".to_string()]);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("No text given"));
    }

    #[test]
    fn test_cli_debug_assert() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
