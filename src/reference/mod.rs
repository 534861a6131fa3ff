//! Scripture reference types and resolution
//!
//! This module turns free-form text such as "what does Matt 7:7 mean?" into a
//! [`CanonicalReference`] with the book name normalised through a
//! [`BookTable`].

pub mod books;
mod resolver;

pub use books::{BookTable, BookTableError};
pub use resolver::ReferenceResolver;

use std::fmt;

use serde::{Deserialize, Serialize};

/// A normalised book/chapter/verse reference
///
/// Construct through [`CanonicalReference::new`], which enforces positive
/// chapter and verse numbers and a non-descending range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalReference {
    /// Canonical full book name, e.g. "1 Corinthians"
    pub book: String,
    /// Chapter number (1-based)
    pub chapter: u32,
    /// First verse (1-based)
    pub verse_start: u32,
    /// Last verse of a range; `None` for a single verse
    pub verse_end: Option<u32>,
}

impl CanonicalReference {
    /// Creates a reference, returning `None` for zero numbers or `end < start`
    pub fn new(
        book: impl Into<String>,
        chapter: u32,
        verse_start: u32,
        verse_end: Option<u32>,
    ) -> Option<Self> {
        if chapter == 0 || verse_start == 0 {
            return None;
        }
        if matches!(verse_end, Some(end) if end < verse_start) {
            return None;
        }
        Some(Self {
            book: book.into(),
            chapter,
            verse_start,
            verse_end,
        })
    }
}

impl fmt::Display for CanonicalReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}:{}", self.book, self.chapter, self.verse_start)?;
        if let Some(end) = self.verse_end {
            write!(f, "-{}", end)?;
        }
        Ok(())
    }
}

/// Outcome of scanning text for a reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(CanonicalReference),
    /// No valid reference in the text; a normal outcome, not an error
    NotFound,
}

impl Resolution {
    pub fn into_option(self) -> Option<CanonicalReference> {
        match self {
            Resolution::Found(reference) => Some(reference),
            Resolution::NotFound => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_single_verse() {
        let reference = CanonicalReference::new("John", 3, 16, None).unwrap();
        assert_eq!(reference.to_string(), "John 3:16");
        assert_eq!(reference.verse_end, None);
    }

    #[test]
    fn test_display_range() {
        let reference = CanonicalReference::new("1 Corinthians", 13, 4, Some(7)).unwrap();
        assert_eq!(reference.to_string(), "1 Corinthians 13:4-7");
        assert_eq!(reference.verse_end, Some(7));
    }

    #[test]
    fn test_new_rejects_zero_and_descending() {
        assert!(CanonicalReference::new("John", 0, 1, None).is_none());
        assert!(CanonicalReference::new("John", 1, 0, None).is_none());
        assert!(CanonicalReference::new("John", 3, 17, Some(16)).is_none());
        assert!(CanonicalReference::new("John", 3, 16, Some(16)).is_some());
    }

    #[test]
    fn test_equality_is_structural() {
        let a = CanonicalReference::new("Mark", 1, 1, None).unwrap();
        let b = CanonicalReference::new(String::from("Mark"), 1, 1, None).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, CanonicalReference::new("Mark", 1, 1, Some(2)).unwrap());
    }

    #[test]
    fn test_resolution_into_option() {
        let reference = CanonicalReference::new("Mark", 1, 1, None).unwrap();
        assert_eq!(Resolution::Found(reference.clone()).into_option(), Some(reference));
        assert_eq!(Resolution::NotFound.into_option(), None);
    }
}
