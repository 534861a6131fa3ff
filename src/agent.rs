//! One conversational turn: find the reference, fetch the verse, explain it
//!
//! The agent reports progress as a sequence of [`AgentEvent`]s on an mpsc
//! channel, always ending with [`AgentEvent::Complete`]. Verse lookups and
//! finished explanations are kept in the [`ResultCache`] when one is attached.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cache::{CacheKey, ResultCache};
use crate::data::{format_verse_text, BibleError, Explainer, LlmError, Verse, VerseSource};
use crate::reference::{CanonicalReference, ReferenceResolver};

/// Cached explanations are replayed in pieces of this many characters
const REPLAY_CHUNK_CHARS: usize = 50;

const EXPLANATION_HEADER: &str = "\n## Explanation\n\n";

const NO_REFERENCE_HINT: &str = "I couldn't find a Bible verse reference in your message. \
Please include a verse like 'Matthew 7:7' or 'John 3:16'.";

const GREETING_WORDS: [&str; 5] = ["hello", "hi", "hey", "help", "about"];
const GREETING_PHRASES: [&str; 2] = ["who are you", "what can you do"];

/// Something the agent wants shown to the user
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// Introduction shown for greetings without a reference
    Greeting(String),
    /// Informational message, e.g. no reference was found
    Info(String),
    /// Progress note
    Status(String),
    /// The passage as returned by the verse source
    VerseData(Verse),
    /// The passage formatted for display
    VerseText(String),
    /// A piece of the explanation, in order
    ExplanationChunk(String),
    /// The turn failed; `code` follows HTTP conventions
    Error { message: String, code: u16 },
    /// Always the last event of a turn
    Complete,
}

/// A finished answer as stored in the cache
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedAnswer {
    reference: CanonicalReference,
    verse: Verse,
    verse_text: String,
    explanation: String,
}

#[derive(Debug, Error)]
enum TurnError {
    #[error("event receiver dropped")]
    Closed,

    #[error(transparent)]
    Bible(#[from] BibleError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

impl TurnError {
    fn code(&self) -> u16 {
        match self {
            TurnError::Bible(BibleError::NotFound(_)) => 404,
            _ => 502,
        }
    }
}

/// Answers questions about scripture references
pub struct Agent<V, E> {
    resolver: ReferenceResolver,
    verses: V,
    explainer: E,
    cache: Option<ResultCache>,
    translation: String,
}

impl<V: VerseSource, E: Explainer> Agent<V, E> {
    pub fn new(resolver: ReferenceResolver, verses: V, explainer: E) -> Self {
        Self {
            resolver,
            verses,
            explainer,
            cache: None,
            translation: "KJV".to_string(),
        }
    }

    /// Attaches a cache for verse lookups and finished explanations
    pub fn with_cache(mut self, cache: ResultCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sets the translation named in the greeting
    pub fn with_translation(mut self, translation: impl Into<String>) -> Self {
        self.translation = translation.into();
        self
    }

    /// Runs one turn for `prompt`, sending events until `Complete`
    ///
    /// Failures are reported as an `Error` event followed by `Complete`. If the
    /// receiver goes away the turn stops without further events.
    pub async fn assist(&self, prompt: &str, events: mpsc::Sender<AgentEvent>) {
        let prompt = prompt.trim();
        info!(prompt = %preview(prompt), "query received");

        match self.turn(prompt, &events).await {
            Ok(()) => {}
            Err(TurnError::Closed) => {
                debug!("event receiver dropped, abandoning turn");
                return;
            }
            Err(error) => {
                warn!(%error, "turn failed");
                let event = AgentEvent::Error {
                    message: error.to_string(),
                    code: error.code(),
                };
                if events.send(event).await.is_err() {
                    return;
                }
            }
        }
        let _ = events.send(AgentEvent::Complete).await;
    }

    async fn turn(&self, prompt: &str, events: &mpsc::Sender<AgentEvent>) -> Result<(), TurnError> {
        let Some(reference) = self.resolver.resolve(prompt).into_option() else {
            let event = if is_greeting(prompt) {
                AgentEvent::Greeting(self.greeting())
            } else {
                AgentEvent::Info(NO_REFERENCE_HINT.to_string())
            };
            return send(events, event).await;
        };
        info!(%reference, "found reference");

        let answer_key = CacheKey::explanation(&reference, prompt);
        if let Some(answer) = self.cached_answer(&answer_key).await {
            info!(%reference, "cache hit");
            send(events, AgentEvent::Status("Found cached explanation".to_string())).await?;
            send(events, AgentEvent::VerseData(answer.verse)).await?;
            send(events, AgentEvent::VerseText(answer.verse_text)).await?;
            send(events, AgentEvent::ExplanationChunk(EXPLANATION_HEADER.to_string())).await?;
            for chunk in replay_chunks(&answer.explanation, REPLAY_CHUNK_CHARS) {
                send(events, AgentEvent::ExplanationChunk(chunk)).await?;
            }
            return Ok(());
        }

        send(events, AgentEvent::Status(format!("Looking up {reference}..."))).await?;
        let verse = self.verse(&reference).await?;
        let verse_text = format_verse_text(&verse);
        send(events, AgentEvent::VerseData(verse.clone())).await?;
        send(events, AgentEvent::VerseText(verse_text.clone())).await?;

        send(events, AgentEvent::Status("Generating explanation...".to_string())).await?;
        let mut fragments = self
            .explainer
            .explain(&verse.reference, &verse.text, Some(prompt))
            .await?;
        send(events, AgentEvent::ExplanationChunk(EXPLANATION_HEADER.to_string())).await?;

        let mut explanation = String::new();
        while let Some(fragment) = fragments.next().await {
            let fragment = fragment?;
            explanation.push_str(&fragment);
            send(events, AgentEvent::ExplanationChunk(fragment)).await?;
        }

        let answer = CachedAnswer {
            reference,
            verse,
            verse_text,
            explanation,
        };
        self.store(&answer_key, &answer).await;
        info!(reference = %answer.reference, "query processed");
        Ok(())
    }

    /// Verse for `reference`, from the cache when possible
    async fn verse(&self, reference: &CanonicalReference) -> Result<Verse, BibleError> {
        let key = CacheKey::verse(reference);
        if let Some(bytes) = self.lookup(&key).await {
            match serde_json::from_slice::<Verse>(&bytes) {
                Ok(verse) => {
                    debug!(%reference, "verse served from cache");
                    return Ok(verse);
                }
                Err(error) => warn!(%key, %error, "ignoring unreadable cached verse"),
            }
        }

        let verse = self.verses.lookup(reference).await?;
        self.store(&key, &verse).await;
        Ok(verse)
    }

    async fn cached_answer(&self, key: &CacheKey) -> Option<CachedAnswer> {
        let bytes = self.lookup(key).await?;
        match serde_json::from_slice(&bytes) {
            Ok(answer) => Some(answer),
            Err(error) => {
                warn!(%key, %error, "ignoring unreadable cached answer");
                None
            }
        }
    }

    async fn lookup(&self, key: &CacheKey) -> Option<Vec<u8>> {
        self.cache.as_ref()?.get(key).await.into_option()
    }

    async fn store<T: Serialize>(&self, key: &CacheKey, value: &T) {
        let Some(cache) = &self.cache else {
            return;
        };
        let payload = match serde_json::to_vec(value) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(%key, %error, "failed to encode cache entry");
                return;
            }
        };
        if let Err(error) = cache.set(key, &payload).await {
            warn!(%key, %error, "failed to cache result");
        }
    }

    fn greeting(&self) -> String {
        format!(
            "Hello! I'm **versebot**.\n\n\
             **What I can do:**\n\
             - Fetch Bible verses from the {} translation\n\
             - Explain verses with their historical and theological context\n\
             - Answer questions about specific passages\n\n\
             **Examples:**\n\
             - \"According to Matthew 7:7, what did Jesus tell his disciples?\"\n\
             - \"Explain John 3:16\"\n\
             - \"What does Romans 8:28 mean?\"\n\n\
             **Supported formats:** full names (\"Matthew 7:7\"), abbreviations \
             (\"Matt 7:7\", \"Mt 7:7\") and verse ranges (\"John 3:16-17\").\n\n\
             What verse would you like to explore today?",
            self.translation
        )
    }
}

async fn send(events: &mpsc::Sender<AgentEvent>, event: AgentEvent) -> Result<(), TurnError> {
    events.send(event).await.map_err(|_| TurnError::Closed)
}

/// Whether `prompt` greets or asks about the bot, matching whole words only
pub fn is_greeting(prompt: &str) -> bool {
    let lower = prompt.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect();
    if GREETING_WORDS.iter().any(|greeting| words.contains(greeting)) {
        return true;
    }
    let padded = format!(" {} ", words.join(" "));
    GREETING_PHRASES
        .iter()
        .any(|phrase| padded.contains(&format!(" {phrase} ")))
}

/// Splits `text` into pieces of at most `size` characters
fn replay_chunks(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(size).map(|chunk| chunk.iter().collect()).collect()
}

fn preview(prompt: &str) -> String {
    prompt.chars().take(100).collect()
}
