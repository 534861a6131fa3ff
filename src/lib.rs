//! versebot library
//!
//! Finds scripture references in free text, fetches the passage and streams an
//! explanation, caching results on disk. The binary in `main.rs` is a thin
//! shell over these modules; integration tests use them directly.

pub mod agent;
pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod logging;
pub mod reference;
