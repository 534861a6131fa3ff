//! Integration tests for the versebot binary
//!
//! Runs the built binary for the commands that need no network access.

use std::process::Command;

use tempfile::TempDir;

/// Settings the binary reads from the environment
const SETTINGS_ENV: [&str; 18] = [
    "BIBLE_TRANSLATION",
    "BIBLE_API_URL",
    "BIBLE_API_TIMEOUT",
    "BIBLE_API_MAX_RETRIES",
    "BIBLE_ENABLE_CACHE",
    "BIBLE_CACHE_TTL_HOURS",
    "BIBLE_CACHE_DIR",
    "BIBLE_CACHE_SWEEP_MINUTES",
    "BIBLE_BOOKS_FILE",
    "LLM_BASE_URL",
    "LLM_API_KEY",
    "LLM_MODEL",
    "LLM_MAX_TOKENS",
    "LLM_TEMPERATURE",
    "LLM_TOP_P",
    "LLM_TIMEOUT",
    "VERSEBOT_LOG",
    "RUST_LOG",
];

/// Helper to run the CLI with given args and capture output
///
/// Runs in an empty directory with the settings variables cleared, so neither
/// the caller's environment nor a stray `.env` file leaks in.
fn run_cli(args: &[&str]) -> std::process::Output {
    let work_dir = TempDir::new().expect("Failed to create temp dir");
    let mut command = Command::new(env!("CARGO_BIN_EXE_versebot"));
    command.args(args).current_dir(work_dir.path());
    for name in SETTINGS_ENV {
        command.env_remove(name);
    }
    command.output().expect("Failed to execute versebot")
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(output.status.success(), "Expected --help to exit successfully");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("versebot"), "Help should mention versebot");
    assert!(stdout.contains("resolve"), "Help should list the resolve command");
    assert!(stdout.contains("BIBLE_CACHE_TTL_HOURS"), "Help should show env names");
}

#[test]
fn test_resolve_prints_canonical_reference() {
    let output = run_cli(&["resolve", "According", "to", "Matt", "7:7,", "what?"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "Matthew 7:7");
}

#[test]
fn test_resolve_numbered_book_range() {
    let output = run_cli(&["resolve", "read 1 cor 13:4-7 today"]);
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "1 Corinthians 13:4-7"
    );
}

#[test]
fn test_resolve_without_reference_exits_with_failure() {
    let output = run_cli(&["resolve", "hello", "there"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("No scripture reference found"), "stderr: {}", stderr);
}

#[test]
fn test_resolve_uses_books_file() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let books = dir.path().join("books.json");
    std::fs::write(&books, r#"{"Matthew": ["mtt"]}"#).expect("Failed to write books file");

    let output = run_cli(&[
        "--books",
        books.to_str().expect("utf-8 path"),
        "resolve",
        "mtt 5:9",
    ]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "Matthew 5:9");
}

#[test]
fn test_invalid_config_prints_error_and_exits() {
    let output = run_cli(&["--temperature", "9", "resolve", "John 3:16"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("temperature"), "stderr: {}", stderr);
}

#[test]
fn test_dotenv_in_working_directory_is_loaded() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::write(dir.path().join(".env"), "LLM_TEMPERATURE=9\n").expect("Failed to write .env");

    let output = Command::new(env!("CARGO_BIN_EXE_versebot"))
        .args(["resolve", "John 3:16"])
        .current_dir(dir.path())
        .env_remove("LLM_TEMPERATURE")
        .output()
        .expect("Failed to execute versebot");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("temperature"));
}

#[test]
fn test_sweep_on_empty_cache_dir() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let cache_dir = dir.path().join("cache");

    let output = run_cli(&["--cache-dir", cache_dir.to_str().expect("utf-8 path"), "sweep"]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(String::from_utf8_lossy(&output.stdout).contains("kept 0"));
}

#[cfg(test)]
mod unit_tests {
    //! Library-level checks that don't require running the binary

    use clap::Parser;
    use versebot::cli::{Cli, Command};
    use versebot::config::AppConfig;
    use versebot::reference::{ReferenceResolver, Resolution};

    #[test]
    fn test_config_from_cli_feeds_resolver() {
        let cli = Cli::parse_from(["versebot", "resolve", "Explain", "Jn", "3:16"]);
        let config = AppConfig::from_cli(&cli).expect("default config is valid");
        assert!(config.books_file.is_none());

        let Command::Resolve { text } = &cli.command else {
            panic!("expected resolve");
        };
        let resolution = ReferenceResolver::default().resolve(&text.join(" "));
        assert!(matches!(resolution, Resolution::Found(ref r) if r.to_string() == "John 3:16"));
    }
}
