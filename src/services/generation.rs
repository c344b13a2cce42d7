// src/services/generation.rs
//! GenerationClient: boundary adapter for the remote text/image service.
//!
//! The transport lives behind the [`RemoteApi`] trait; the production
//! implementation speaks the Gemini-style `generateContent` wire format
//! over ureq with an explicit timeout and a single bounded retry on
//! transport failure.
//!
//! Two guarantees downstream code leans on:
//! - transport/service failures from text generation come back as a tagged
//!   [`TextReply::Failed`] value, never a panic or an `Err`;
//! - image generation never fails: a cache hit, a fresh generation, or a
//!   deterministic placeholder descriptor — always a usable image.

use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

use crate::config::GenerationConfig;
use crate::errors::GenerationError;
use crate::services::blob_cache::BlobCache;

/// Template for the placeholder image served when generation fails.
const PLACEHOLDER_BASE: &str = "https://placehold.co/600x400/F5EDE6/C4785A";

/// Prompt characters carried into the placeholder URL.
const PLACEHOLDER_PROMPT_CHARS: usize = 50;

/// A transport or service failure, carried as data so callers must look at
/// it before using a reply.
#[derive(Debug, Clone)]
pub struct ApiFailure {
    pub status: Option<u16>,
    pub message: String,
}

/// Raw inline image returned by the remote service.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub data_base64: String,
    pub mime_type: String,
}

/// The remote generation endpoints. Object-safe so tests can substitute a
/// counting fake.
pub trait RemoteApi: Send + Sync {
    fn text(&self, prompt: &str, structured: bool) -> Result<String, ApiFailure>;
    fn image(&self, prompt: &str) -> Result<InlineImage, ApiFailure>;
}

/// Reply from [`GenerationClient::generate_text`]. Check the variant before
/// using the content; `Failed` is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum TextReply {
    Plain(String),
    Structured(Value),
    Failed { message: String },
}

/// A displayable image descriptor. Always usable: either real content
/// (cached or fresh) or a placeholder tagged `is_fallback`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageOutcome {
    pub id: String,
    pub url: String,
    pub prompt: String,
    pub mime_type: Option<String>,
    pub generated: bool,
    pub from_cache: bool,
    pub is_fallback: bool,
}

pub struct GenerationClient {
    api: Box<dyn RemoteApi>,
    cache: BlobCache,
}

impl GenerationClient {
    pub fn new(api: Box<dyn RemoteApi>, cache: BlobCache) -> Self {
        Self { api, cache }
    }

    /// Ask the model for text. With `structured`, the raw reply is coerced
    /// through the parse chain and returned as a JSON value; if no strategy
    /// can read it the call errs with `ResponseFormat` (callers offer a
    /// retry — malformed structured text has no safe default).
    pub fn generate_text(
        &self,
        prompt: &str,
        structured: bool,
    ) -> Result<TextReply, GenerationError> {
        match self.api.text(prompt, structured) {
            Err(failure) => {
                tracing::warn!(message = %failure.message, "text generation failed");
                Ok(TextReply::Failed {
                    message: failure.message,
                })
            }
            Ok(raw) => {
                if structured {
                    Ok(TextReply::Structured(parse_json(&raw)?))
                } else {
                    Ok(TextReply::Plain(raw))
                }
            }
        }
    }

    /// Generate an image at most once per id.
    ///
    /// A cached id short-circuits without touching the network. A fresh
    /// generation is written through to the cache before returning. Every
    /// failure path (transport, missing inline payload, cache write) yields
    /// the placeholder descriptor instead — this never errors, and
    /// placeholders are never cached.
    pub fn generate_image(&self, prompt: &str, image_id: Option<&str>) -> ImageOutcome {
        let id = image_id
            .map(str::to_string)
            .unwrap_or_else(fresh_image_id);

        match self.cache.read(&id) {
            Ok(Some(hit)) => {
                tracing::debug!(id, "image served from cache");
                return ImageOutcome {
                    url: hit.url,
                    prompt: hit.prompt.unwrap_or_else(|| prompt.to_string()),
                    mime_type: hit.mime_type,
                    generated: true,
                    from_cache: true,
                    is_fallback: false,
                    id,
                };
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(id, %err, "image cache read failed; treating as miss");
            }
        }

        match self.api.image(prompt) {
            Ok(image) => {
                let url = format!("data:{};base64,{}", image.mime_type, image.data_base64);
                match self
                    .cache
                    .write(&id, &url, Some(prompt), Some(&image.mime_type))
                {
                    Ok(_) => ImageOutcome {
                        url,
                        prompt: prompt.to_string(),
                        mime_type: Some(image.mime_type),
                        generated: true,
                        from_cache: false,
                        is_fallback: false,
                        id,
                    },
                    Err(err) => {
                        tracing::warn!(id, %err, "image cache write failed; serving placeholder");
                        placeholder_outcome(prompt, Some(&id))
                    }
                }
            }
            Err(failure) => {
                tracing::warn!(id, message = %failure.message, "image generation failed; serving placeholder");
                placeholder_outcome(prompt, image_id)
            }
        }
    }

    /// Cache-only lookup. A storage fault degrades to not-found — display
    /// code falls back to a placeholder either way.
    pub fn load_image(&self, id: &str) -> Option<ImageOutcome> {
        match self.cache.read(id) {
            Ok(Some(hit)) => Some(ImageOutcome {
                id: id.to_string(),
                url: hit.url,
                prompt: hit.prompt.unwrap_or_default(),
                mime_type: hit.mime_type,
                generated: true,
                from_cache: true,
                is_fallback: false,
            }),
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(id, %err, "image cache read failed");
                None
            }
        }
    }
}

/// Deterministic placeholder descriptor embedding the prompt text.
pub fn placeholder_outcome(prompt: &str, id: Option<&str>) -> ImageOutcome {
    let snippet: String = prompt.chars().take(PLACEHOLDER_PROMPT_CHARS).collect();
    ImageOutcome {
        id: id
            .map(str::to_string)
            .unwrap_or_else(|| format!("fallback-{}", chrono::Utc::now().timestamp_millis())),
        url: format!("{PLACEHOLDER_BASE}?text={}", percent_encode(&snippet)),
        prompt: prompt.to_string(),
        mime_type: None,
        generated: false,
        from_cache: false,
        is_fallback: true,
    }
}

fn fresh_image_id() -> String {
    let short = Uuid::new_v4().simple().to_string();
    format!(
        "img-{}-{}",
        chrono::Utc::now().timestamp_millis(),
        &short[..9]
    )
}

fn percent_encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Structured-reply recovery
// ---------------------------------------------------------------------------

/// Coerce model output into JSON via an ordered chain of strategies:
/// direct parse, fenced-marker stripping, first `{..}` region, first `[..]`
/// region wrapped as `{"scenes": [...]}`. First success wins.
pub fn parse_json(text: &str) -> Result<Value, GenerationError> {
    const STRATEGIES: &[fn(&str) -> Option<Value>] = &[
        parse_direct,
        parse_unfenced,
        parse_object_region,
        parse_array_region,
    ];
    for strategy in STRATEGIES {
        if let Some(value) = strategy(text) {
            return Ok(value);
        }
    }
    tracing::warn!(len = text.len(), "no parse strategy could read model reply");
    Err(GenerationError::ResponseFormat)
}

fn parse_direct(text: &str) -> Option<Value> {
    serde_json::from_str(text.trim()).ok()
}

fn parse_unfenced(text: &str) -> Option<Value> {
    serde_json::from_str(strip_fences(text).trim()).ok()
}

fn parse_object_region(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

fn parse_array_region(text: &str) -> Option<Value> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end <= start {
        return None;
    }
    let scenes: Value = serde_json::from_str(&text[start..=end]).ok()?;
    Some(json!({ "scenes": scenes }))
}

// Drop every ``` marker, with or without a json language tag.
fn strip_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("```") {
            rest = after;
            if rest.len() >= 4 && rest.as_bytes()[..4].eq_ignore_ascii_case(b"json") {
                rest = &rest[4..];
            }
        } else {
            let mut chars = rest.chars();
            if let Some(ch) = chars.next() {
                out.push(ch);
            }
            rest = chars.as_str();
        }
    }
    out
}

// ---------------------------------------------------------------------------
// HTTP transport
// ---------------------------------------------------------------------------

/// Production transport speaking the Gemini-style `generateContent` format.
pub struct HttpApi {
    agent: ureq::Agent,
    config: GenerationConfig,
}

impl HttpApi {
    pub fn new(config: GenerationConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();
        Self { agent, config }
    }

    fn post(&self, endpoint: &str, body: &Value) -> Result<Value, ApiFailure> {
        let url = format!("{}?key={}", endpoint, self.config.api_key);
        let mut attempt = 0;
        loop {
            match self.agent.post(&url).send_json(body) {
                Ok(response) => {
                    return response.into_json().map_err(|err| ApiFailure {
                        status: None,
                        message: format!("unreadable service response: {err}"),
                    });
                }
                Err(ureq::Error::Status(code, response)) => {
                    // The service saw the request; do not replay it.
                    let message = response
                        .into_json::<Value>()
                        .ok()
                        .and_then(|v| {
                            v.pointer("/error/message")
                                .and_then(Value::as_str)
                                .map(str::to_string)
                        })
                        .unwrap_or_else(|| format!("service returned status {code}"));
                    return Err(ApiFailure {
                        status: Some(code),
                        message,
                    });
                }
                Err(err) => {
                    if attempt < self.config.max_retries {
                        attempt += 1;
                        tracing::warn!(attempt, %err, "transport failure; retrying");
                        continue;
                    }
                    return Err(ApiFailure {
                        status: None,
                        message: format!("AI service connection failed: {err}"),
                    });
                }
            }
        }
    }
}

impl RemoteApi for HttpApi {
    fn text(&self, prompt: &str, structured: bool) -> Result<String, ApiFailure> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": 0.7,
                "topK": 40,
                "topP": 0.95,
                "maxOutputTokens": 2048,
                "responseMimeType": if structured { "application/json" } else { "text/plain" },
            }
        });
        let reply = self.post(&self.config.text_url, &body)?;
        reply
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ApiFailure {
                status: None,
                message: "invalid service response structure".into(),
            })
    }

    fn image(&self, prompt: &str) -> Result<InlineImage, ApiFailure> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseModalities": ["IMAGE"],
                "temperature": 0.4,
                "topK": 32,
                "topP": 1,
            }
        });
        let reply = self.post(&self.config.image_url, &body)?;

        let parts = reply
            .pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
            .ok_or_else(|| ApiFailure {
                status: None,
                message: "invalid service response structure".into(),
            })?;

        let inline = parts
            .iter()
            .find_map(|part| part.get("inlineData"))
            .ok_or_else(|| ApiFailure {
                status: None,
                message: "no image data in service response".into(),
            })?;

        let data = inline
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiFailure {
                status: None,
                message: "no image data in service response".into(),
            })?;
        let mime_type = inline
            .get("mimeType")
            .and_then(Value::as_str)
            .unwrap_or("image/png");

        Ok(InlineImage {
            data_base64: data.to_string(),
            mime_type: mime_type.to_string(),
        })
    }
}
