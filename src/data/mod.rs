//! Verse data and the upstream services that provide it
//!
//! This module contains the verse types returned by the verse-lookup API and
//! the clients for the two remote services: `bible` fetches verse text and
//! `llm` streams explanations from a chat-completion API.

pub mod bible;
pub mod llm;

pub use bible::{BibleClient, BibleError, VerseSource};
pub use llm::{Explainer, LlmClient, LlmError, TextStream};

use serde::{Deserialize, Serialize};

/// A passage as returned by the verse-lookup API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verse {
    /// Reference as formatted by the API, e.g. "John 3:16"
    pub reference: String,
    /// Individual verses making up the passage
    #[serde(default)]
    pub verses: Vec<VerseLine>,
    /// Full passage text
    pub text: String,
    /// Short translation code, e.g. "kjv"
    #[serde(default)]
    pub translation_id: String,
    /// Human-readable translation name
    #[serde(default)]
    pub translation_name: String,
    /// Copyright or licensing note
    #[serde(default)]
    pub translation_note: String,
}

/// A single verse within a passage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerseLine {
    pub book_id: String,
    pub book_name: String,
    pub chapter: u32,
    pub verse: u32,
    pub text: String,
}

/// Formats a passage as a heading followed by its text
pub fn format_verse_text(verse: &Verse) -> String {
    let translation = if verse.translation_name.is_empty() {
        "King James Version"
    } else {
        verse.translation_name.as_str()
    };
    format!(
        "**{}** ({})\n\n{}",
        verse.reference,
        translation,
        verse.text.trim()
    )
}
