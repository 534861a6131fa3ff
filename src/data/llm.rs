//! Streaming chat-completion client used to explain verses
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint (Fireworks by
//! default) and exposes the answer as a lazy stream of text fragments.

use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::LlmConfig;

/// Finite, single-pass stream of explanation fragments
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// Raw response body chunks
type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, LlmError>> + Send>>;

/// Errors that can occur when requesting an explanation
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("LLM API returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// No API key was configured
    #[error("LLM API key is not configured (set LLM_API_KEY)")]
    MissingApiKey,
}

/// Anything that can explain a verse as a stream of text
#[async_trait]
pub trait Explainer: Send + Sync {
    async fn explain(
        &self,
        reference: &str,
        verse_text: &str,
        question: Option<&str>,
    ) -> Result<TextStream, LlmError>;
}

/// Client for an OpenAI-compatible chat-completion API
#[derive(Debug, Clone)]
pub struct LlmClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    system_prompt: String,
}

impl LlmClient {
    /// Creates a client; fails if no API key is configured
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or(LlmError::MissingApiKey)?;
        let http_client = Client::builder().timeout(config.timeout).build()?;
        info!(model = %config.model, "LLM client initialised");
        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
            system_prompt: config.system_prompt.clone(),
        })
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_request<'a>(&'a self, prompt: &'a str) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &self.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            top_p: self.top_p,
            stream: true,
        }
    }
}

#[async_trait]
impl Explainer for LlmClient {
    async fn explain(
        &self,
        reference: &str,
        verse_text: &str,
        question: Option<&str>,
    ) -> Result<TextStream, LlmError> {
        let prompt = build_prompt(reference, verse_text, question);
        let response = self
            .http_client
            .post(self.chat_completions_url())
            .bearer_auth(&self.api_key)
            .json(&self.build_request(&prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), %body, "LLM API error");
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes: ByteStream = Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(LlmError::from)),
        );
        Ok(text_stream(bytes))
    }
}

/// Prompt naming the reference, quoting the verse and carrying the question
fn build_prompt(reference: &str, verse_text: &str, question: Option<&str>) -> String {
    match question.map(str::trim).filter(|q| !q.is_empty()) {
        Some(question) => format!(
            "The user asks: \"{question}\"\n\nHere is the relevant Bible verse:\n\n**{reference}**\n{verse_text}\n\nPlease provide a comprehensive explanation that addresses the user's question."
        ),
        None => format!(
            "Please explain this Bible verse:\n\n**{reference}**\n{verse_text}\n\nProvide context, meaning, and practical application."
        ),
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// A decoded server-sent event of interest
#[derive(Debug, PartialEq, Eq)]
enum SseEvent {
    Fragment(String),
    Done,
}

/// Splits a byte stream into SSE lines, tolerating arbitrary chunk boundaries
///
/// Bytes are buffered until a full line is available, so multi-byte UTF-8
/// characters split across chunks decode correctly.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            events.extend(parse_line(&line));
        }
        events
    }

    /// Flushes a final line that was not newline-terminated
    fn finish(&mut self) -> Vec<SseEvent> {
        let line = std::mem::take(&mut self.buffer);
        parse_line(&line).into_iter().collect()
    }
}

fn parse_line(line: &[u8]) -> Option<SseEvent> {
    let line = String::from_utf8_lossy(line);
    let data = line.trim().strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }

    let chunk: StreamChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            debug!(error = %e, "skipping unparseable stream line");
            return None;
        }
    };
    let content = chunk.choices.into_iter().next()?.delta.content?;
    (!content.is_empty()).then_some(SseEvent::Fragment(content))
}

struct StreamState {
    bytes: ByteStream,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    done: bool,
}

impl StreamState {
    /// Queues fragments; returns true once `[DONE]` was seen
    fn absorb(&mut self, events: Vec<SseEvent>) -> bool {
        for event in events {
            match event {
                SseEvent::Fragment(text) => self.pending.push_back(text),
                SseEvent::Done => return true,
            }
        }
        false
    }
}

/// Turns a raw SSE body into a stream of content fragments
fn text_stream(bytes: ByteStream) -> TextStream {
    let state = StreamState {
        bytes,
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        done: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(fragment) = state.pending.pop_front() {
                return Some((Ok(fragment), state));
            }
            if state.done {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let events = state.decoder.push(&chunk);
                    state.done = state.absorb(events);
                }
                Some(Err(e)) => {
                    state.done = true;
                    return Some((Err(e), state));
                }
                None => {
                    let events = state.decoder.finish();
                    state.absorb(events);
                    state.done = true;
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Drains a stream into one string, failing on the first error
    async fn collect_text(mut fragments: TextStream) -> Result<String, LlmError> {
        let mut text = String::new();
        while let Some(fragment) = fragments.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }

    fn sse(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": content}}]})
        )
    }

    fn byte_stream(chunks: Vec<&'static [u8]>) -> ByteStream {
        Box::pin(stream::iter(
            chunks.into_iter().map(|c| Ok(Bytes::from_static(c))),
        ))
    }

    fn config(base_url: &str) -> LlmConfig {
        LlmConfig {
            base_url: base_url.to_string(),
            api_key: Some("test-key".to_string()),
            model: "test-model".to_string(),
            max_tokens: 64,
            temperature: 0.5,
            top_p: 0.9,
            timeout: Duration::from_secs(5),
            system_prompt: "You explain verses.".to_string(),
        }
    }

    #[test]
    fn test_parse_line_variants() {
        assert_eq!(
            parse_line(sse("Hello").trim().as_bytes()),
            Some(SseEvent::Fragment("Hello".to_string()))
        );
        assert_eq!(parse_line(b"data: [DONE]"), Some(SseEvent::Done));
        assert_eq!(parse_line(b""), None);
        assert_eq!(parse_line(b": keep-alive"), None);
        assert_eq!(parse_line(b"data: {broken"), None);
        assert_eq!(parse_line(br#"data: {"choices": []}"#), None);
        assert_eq!(parse_line(br#"data: {"choices": [{"delta": {}}]}"#), None);
    }

    #[test]
    fn test_decoder_handles_split_lines_and_utf8() {
        let line = sse("grâce");
        let bytes = line.as_bytes();
        // Split inside the two-byte 'â'
        let split = line.find('â').unwrap() + 1;

        let mut decoder = SseDecoder::default();
        assert!(decoder.push(&bytes[..split]).is_empty());
        assert_eq!(
            decoder.push(&bytes[split..]),
            vec![SseEvent::Fragment("grâce".to_string())]
        );
    }

    #[test]
    fn test_decoder_finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: [DONE]").is_empty());
        assert_eq!(decoder.finish(), vec![SseEvent::Done]);
    }

    #[tokio::test]
    async fn test_text_stream_yields_fragments_until_done() {
        let body = format!("{}{}data: [DONE]\n\n{}", sse("For God "), sse("so loved"), sse("ignored"));
        let leaked: &'static [u8] = Box::leak(body.into_bytes().into_boxed_slice());
        let (first, rest) = leaked.split_at(7);

        let text = collect_text(text_stream(byte_stream(vec![first, rest])))
            .await
            .expect("stream should succeed");

        assert_eq!(text, "For God so loved");
    }

    #[tokio::test]
    async fn test_text_stream_without_done_ends_at_eof() {
        let body = sse("only");
        let leaked: &'static [u8] = Box::leak(body.into_bytes().into_boxed_slice());

        let fragments: Vec<_> = text_stream(byte_stream(vec![leaked])).collect().await;

        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].as_ref().unwrap(), "only");
    }

    #[test]
    fn test_build_prompt_with_and_without_question() {
        let with = build_prompt("John 3:16", "For God so loved", Some("Why love?"));
        assert!(with.contains("The user asks: \"Why love?\""));
        assert!(with.contains("**John 3:16**"));

        let without = build_prompt("John 3:16", "For God so loved", Some("  "));
        assert!(without.starts_with("Please explain this Bible verse:"));
    }

    #[test]
    fn test_new_requires_api_key() {
        let mut config = config("http://localhost");
        config.api_key = None;
        assert!(matches!(LlmClient::new(&config), Err(LlmError::MissingApiKey)));

        config.api_key = Some("   ".to_string());
        assert!(matches!(LlmClient::new(&config), Err(LlmError::MissingApiKey)));
    }

    #[tokio::test]
    async fn test_explain_streams_from_server() {
        let server = MockServer::start().await;
        let body = format!("{}{}data: [DONE]\n\n", sse("Love "), sse("given."));
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "test-model",
                "stream": true,
                "max_tokens": 64
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;
        let client = LlmClient::new(&config(&server.uri())).unwrap();

        let stream = client
            .explain("John 3:16", "For God so loved", Some("explain"))
            .await
            .expect("request should succeed");
        let text = collect_text(stream).await.unwrap();

        assert_eq!(text, "Love given.");
    }

    #[tokio::test]
    async fn test_explain_sends_system_and_user_messages() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("data: [DONE]\n\n", "text/event-stream"),
            )
            .mount(&server)
            .await;
        let client = LlmClient::new(&config(&server.uri())).unwrap();

        let stream = client
            .explain("John 3:16", "For God so loved", Some("Why?"))
            .await
            .unwrap();
        assert_eq!(collect_text(stream).await.unwrap(), "");

        let requests = server.received_requests().await.unwrap();
        let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(sent["messages"][0]["role"], "system");
        assert_eq!(sent["messages"][0]["content"], "You explain verses.");
        assert_eq!(sent["messages"][1]["role"], "user");
        let prompt = sent["messages"][1]["content"].as_str().unwrap();
        assert!(prompt.contains("**John 3:16**"));
        assert!(prompt.contains("Why?"));
    }

    #[tokio::test]
    async fn test_explain_reports_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_raw(r#"{"error":"bad key"}"#, "application/json"),
            )
            .mount(&server)
            .await;
        let client = LlmClient::new(&config(&server.uri())).unwrap();

        let result = client.explain("John 3:16", "text", None).await;

        match result {
            Err(LlmError::Status { status, body }) => {
                assert_eq!(status, 401);
                assert!(body.contains("bad key"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected an error"),
        }
    }
}
