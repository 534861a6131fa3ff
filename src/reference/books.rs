//! Book-name table used to normalise scripture references
//!
//! The built-in table covers the 66 books of the Protestant canon with their
//! common abbreviations. Extra aliases can be layered on top from a JSON file
//! so new spellings never require code changes.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use thiserror::Error;

/// A canonical book with the abbreviations that normalise to it
#[derive(Debug, Clone, Copy)]
pub struct Book {
    /// Canonical full name, as used in resolved references
    pub name: &'static str,
    /// Accepted abbreviations and alternative spellings
    pub aliases: &'static [&'static str],
}

/// Static array of all canonical books and their aliases
pub static BOOKS: [Book; 66] = [
    Book { name: "Genesis", aliases: &["gen", "ge", "gn"] },
    Book { name: "Exodus", aliases: &["exod", "exo", "ex"] },
    Book { name: "Leviticus", aliases: &["lev", "lv"] },
    Book { name: "Numbers", aliases: &["num", "nm", "nb"] },
    Book { name: "Deuteronomy", aliases: &["deut", "dt", "deu"] },
    Book { name: "Joshua", aliases: &["josh", "jos"] },
    Book { name: "Judges", aliases: &["judg", "jdg", "jdgs"] },
    Book { name: "Ruth", aliases: &["rth", "ru"] },
    Book { name: "1 Samuel", aliases: &["1 sam", "1 sa", "1 sm"] },
    Book { name: "2 Samuel", aliases: &["2 sam", "2 sa", "2 sm"] },
    Book { name: "1 Kings", aliases: &["1 kgs", "1 ki", "1 kin"] },
    Book { name: "2 Kings", aliases: &["2 kgs", "2 ki", "2 kin"] },
    Book { name: "1 Chronicles", aliases: &["1 chr", "1 chron", "1 ch"] },
    Book { name: "2 Chronicles", aliases: &["2 chr", "2 chron", "2 ch"] },
    Book { name: "Ezra", aliases: &["ezr"] },
    Book { name: "Nehemiah", aliases: &["neh", "ne"] },
    Book { name: "Esther", aliases: &["esth", "est", "es"] },
    Book { name: "Job", aliases: &["jb"] },
    Book { name: "Psalm", aliases: &["psalms", "ps", "psa", "pss", "psm"] },
    Book { name: "Proverbs", aliases: &["prov", "pro", "prv", "pr"] },
    Book { name: "Ecclesiastes", aliases: &["eccl", "ecc", "eccles", "qoh"] },
    Book { name: "Song of Solomon", aliases: &["song of songs", "song", "sos", "canticles"] },
    Book { name: "Isaiah", aliases: &["isa"] },
    Book { name: "Jeremiah", aliases: &["jer", "je", "jr"] },
    Book { name: "Lamentations", aliases: &["lam", "la"] },
    Book { name: "Ezekiel", aliases: &["ezek", "eze", "ezk"] },
    Book { name: "Daniel", aliases: &["dan", "dn", "da"] },
    Book { name: "Hosea", aliases: &["hos", "ho"] },
    Book { name: "Joel", aliases: &["jl"] },
    Book { name: "Amos", aliases: &["amo"] },
    Book { name: "Obadiah", aliases: &["obad", "ob"] },
    Book { name: "Jonah", aliases: &["jon", "jnh"] },
    Book { name: "Micah", aliases: &["mic", "mc"] },
    Book { name: "Nahum", aliases: &["nah", "na"] },
    Book { name: "Habakkuk", aliases: &["hab", "hb"] },
    Book { name: "Zephaniah", aliases: &["zeph", "zep", "zp"] },
    Book { name: "Haggai", aliases: &["hag", "hg"] },
    Book { name: "Zechariah", aliases: &["zech", "zec", "zc"] },
    Book { name: "Malachi", aliases: &["mal", "ml"] },
    Book { name: "Matthew", aliases: &["matt", "mt", "mat"] },
    Book { name: "Mark", aliases: &["mk", "mrk", "mar"] },
    Book { name: "Luke", aliases: &["lk", "luk"] },
    Book { name: "John", aliases: &["jn", "jhn", "joh"] },
    Book { name: "Acts", aliases: &["act", "ac"] },
    Book { name: "Romans", aliases: &["rom", "ro", "rm"] },
    Book { name: "1 Corinthians", aliases: &["1 cor", "1 co"] },
    Book { name: "2 Corinthians", aliases: &["2 cor", "2 co"] },
    Book { name: "Galatians", aliases: &["gal", "ga"] },
    Book { name: "Ephesians", aliases: &["eph", "ephes"] },
    Book { name: "Philippians", aliases: &["phil", "php", "pp"] },
    Book { name: "Colossians", aliases: &["col"] },
    Book { name: "1 Thessalonians", aliases: &["1 thess", "1 thes", "1 th"] },
    Book { name: "2 Thessalonians", aliases: &["2 thess", "2 thes", "2 th"] },
    Book { name: "1 Timothy", aliases: &["1 tim", "1 ti", "1 tm"] },
    Book { name: "2 Timothy", aliases: &["2 tim", "2 ti", "2 tm"] },
    Book { name: "Titus", aliases: &["tit"] },
    Book { name: "Philemon", aliases: &["philem", "phm", "pm"] },
    Book { name: "Hebrews", aliases: &["heb"] },
    Book { name: "James", aliases: &["jas", "jm"] },
    Book { name: "1 Peter", aliases: &["1 pet", "1 pe", "1 pt"] },
    Book { name: "2 Peter", aliases: &["2 pet", "2 pe", "2 pt"] },
    Book { name: "1 John", aliases: &["1 jn", "1 jhn", "1 jo"] },
    Book { name: "2 John", aliases: &["2 jn", "2 jhn", "2 jo"] },
    Book { name: "3 John", aliases: &["3 jn", "3 jhn", "3 jo"] },
    Book { name: "Jude", aliases: &["jud", "jd"] },
    Book { name: "Revelation", aliases: &["rev", "rv", "revelations"] },
];

/// Errors that can occur when loading extra aliases
#[derive(Debug, Error)]
pub enum BookTableError {
    /// The alias file could not be read
    #[error("Failed to read book alias file: {0}")]
    Io(#[from] std::io::Error),

    /// The alias file is not a JSON object of string arrays
    #[error("Failed to parse book alias file: {0}")]
    Parse(#[from] serde_json::Error),

    /// A book name or alias is empty or contains control characters
    #[error("Invalid book name or alias: {0:?}")]
    InvalidName(String),
}

/// Many-to-one mapping from normalised book tokens to canonical names
#[derive(Debug, Clone)]
pub struct BookTable {
    aliases: HashMap<String, String>,
}

impl Default for BookTable {
    fn default() -> Self {
        let mut table = Self {
            aliases: HashMap::new(),
        };
        for book in BOOKS.iter() {
            table.insert_unchecked(book.name, book.name);
            for alias in book.aliases {
                table.insert_unchecked(alias, book.name);
            }
        }
        table
    }
}

impl BookTable {
    /// Creates the built-in table merged with aliases from a JSON file
    ///
    /// The file maps canonical names to alias lists, e.g.
    /// `{"Matthew": ["mtt"], "Wisdom": ["wis"]}`. Canonical names not in the
    /// built-in table become new books.
    pub fn with_aliases_from_file(path: &Path) -> Result<Self, BookTableError> {
        let content = fs::read_to_string(path)?;
        let extra: HashMap<String, Vec<String>> = serde_json::from_str(&content)?;
        let mut table = Self::default();
        for (name, aliases) in &extra {
            table.add_book(name, aliases.iter().map(String::as_str))?;
        }
        Ok(table)
    }

    /// Registers a canonical name together with its aliases
    pub fn add_book<'a>(
        &mut self,
        name: &str,
        aliases: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), BookTableError> {
        let name = validate_name(name)?;
        self.insert_unchecked(name, name);
        for alias in aliases {
            let alias = validate_name(alias)?;
            self.insert_unchecked(alias, name);
        }
        Ok(())
    }

    /// Looks up the canonical name for a raw book token
    ///
    /// Matching is case-insensitive, ignores one trailing period and treats
    /// `1Cor`, `1 Cor` and `1 cor.` alike.
    pub fn canonical(&self, token: &str) -> Option<&str> {
        self.aliases.get(&normalize_token(token)).map(String::as_str)
    }

    fn insert_unchecked(&mut self, alias: &str, name: &str) {
        self.aliases.insert(normalize_token(alias), name.to_string());
    }
}

fn validate_name(name: &str) -> Result<&str, BookTableError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().any(char::is_control) {
        return Err(BookTableError::InvalidName(name.to_string()));
    }
    Ok(trimmed)
}

/// Normalises a book token into its lookup form
///
/// Lowercases, drops a single trailing period, separates a leading number
/// from the book word and collapses runs of whitespace.
pub fn normalize_token(token: &str) -> String {
    let lowered = token.trim().to_lowercase();
    let lowered = lowered.strip_suffix('.').unwrap_or(&lowered);

    let digits_end = lowered
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(lowered.len());
    let (number, rest) = lowered.split_at(digits_end);

    let words = rest.split_whitespace().collect::<Vec<_>>().join(" ");
    if number.is_empty() {
        words
    } else if words.is_empty() {
        number.to_string()
    } else {
        format!("{} {}", number, words)
    }
}
