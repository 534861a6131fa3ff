//! Extraction of scripture references from free-form text

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::books::BookTable;
use super::{CanonicalReference, Resolution};

/// `<book> <chapter>:<verse>[-<verse>]`, with an optional 1-3 prefix on the book
static REFERENCE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:(?P<number>[1-3])\s*)?(?P<book>[a-z]+(?:\s+of\s+[a-z]+)?)\.?\s*(?P<chapter>[0-9]+):(?P<verse>[0-9]+)(?:-(?P<end>[0-9]+))?",
    )
    .expect("reference pattern is valid")
});

/// Finds the first scripture reference in a piece of text
///
/// The resolver is pure: it holds an immutable [`BookTable`] and can be
/// shared freely between tasks.
#[derive(Debug, Clone, Default)]
pub struct ReferenceResolver {
    books: BookTable,
}

impl ReferenceResolver {
    pub fn new(books: BookTable) -> Self {
        Self { books }
    }

    /// Returns the leftmost valid reference in `text`
    ///
    /// Candidates with an unknown book, a zero or out-of-range number, or a
    /// descending verse range are skipped; scanning resumes one character
    /// after the rejected candidate started so a bad candidate never hides a
    /// later good one.
    pub fn resolve(&self, text: &str) -> Resolution {
        let mut start = 0;
        while let Some(caps) = REFERENCE_PATTERN.captures_at(text, start) {
            let Some(whole) = caps.get(0) else {
                break;
            };

            if let Some(reference) = self.candidate(&caps, text) {
                return Resolution::Found(reference);
            }

            let step = text[whole.start()..]
                .chars()
                .next()
                .map_or(1, char::len_utf8);
            start = whole.start() + step;
        }
        Resolution::NotFound
    }

    fn candidate(&self, caps: &Captures<'_>, text: &str) -> Option<CanonicalReference> {
        let whole = caps.get(0)?;
        // "John 3:16-4:2" spans chapters, which a single reference cannot express
        if caps.name("end").is_some() && text[whole.end()..].starts_with(':') {
            return None;
        }

        let book = self.book_name(caps, text)?;
        let chapter = parse_positive(caps.name("chapter")?.as_str())?;
        let verse_start = parse_positive(caps.name("verse")?.as_str())?;
        let verse_end = match caps.name("end") {
            Some(end) => Some(parse_positive(end.as_str())?),
            None => None,
        };

        CanonicalReference::new(book, chapter, verse_start, verse_end)
    }

    /// Numbered books win when the prefix forms a known name; otherwise the
    /// bare book word is tried on its own.
    fn book_name(&self, caps: &Captures<'_>, text: &str) -> Option<String> {
        let book = caps.name("book")?.as_str();
        let number = caps
            .name("number")
            .filter(|number| is_standalone_prefix(&text[..number.start()]));
        if let Some(number) = number {
            let numbered = format!("{} {}", number.as_str(), book);
            if let Some(name) = self.books.canonical(&numbered) {
                return Some(name.to_string());
            }
        }
        self.books.canonical(book).map(str::to_string)
    }
}

/// A book number must not be the tail of a preceding verse or range,
/// as in "2:1 John" or "2-3 John".
fn is_standalone_prefix(before: &str) -> bool {
    !matches!(
        before.chars().next_back(),
        Some(c) if c == ':' || c == '-' || c.is_ascii_digit()
    )
}

fn parse_positive(digits: &str) -> Option<u32> {
    digits.parse::<u32>().ok().filter(|n| *n > 0)
}
