//! Deterministic cache keys

use std::fmt;

use sha2::{Digest, Sha256};

use crate::reference::CanonicalReference;

/// Joins key fields; cannot occur in the namespace or in a reference's text
const SEPARATOR: char = '\u{1f}';

const VERSE_NAMESPACE: &str = "verse";
const EXPLANATION_NAMESPACE: &str = "explanation";

/// Identifies one cache entry
///
/// The key string is `namespace ␟ reference ␟ query`. Only the query can
/// contain arbitrary text and it is always the last field, so two different
/// inputs never produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for a verse lookup; independent of how the question was phrased
    pub fn verse(reference: &CanonicalReference) -> Self {
        Self::build(VERSE_NAMESPACE, &reference.to_string(), "")
    }

    /// Key for a full answer to `question` about `reference`
    pub fn explanation(reference: &CanonicalReference, question: &str) -> Self {
        Self::build(EXPLANATION_NAMESPACE, &reference.to_string(), question.trim())
    }

    fn build(namespace: &str, reference: &str, query: &str) -> Self {
        Self(format!(
            "{namespace}{SEPARATOR}{reference}{SEPARATOR}{query}"
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase hex SHA-256 of the key, used as the file stem on disk
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.0.as_bytes()))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.replace(SEPARATOR, " | "))
    }
}
