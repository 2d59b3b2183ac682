//! Text-generation oracle.
//!
//! Every non-deterministic call in the pipeline goes through the
//! [`TextOracle`] capability so tests can substitute a scripted stub.
//! Free-text responses are mined defensively: the first JSON array/object
//! substring is extracted by bracket matching, and extraction failure is an
//! empty result, never an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::OracleError;

/// Outcome of interpreting oracle output as a typed value.
///
/// Both arms must be handled at every call site; `Malformed` carries the
/// raw text for logging and triggers whichever deterministic fallback the
/// caller has.
#[derive(Debug, Clone)]
pub enum OracleResponse<T> {
    Parsed(T),
    Malformed(String),
}

impl<T: serde::de::DeserializeOwned> OracleResponse<T> {
    /// Interpret a JSON value as `T`, keeping the raw text on failure.
    pub fn from_value(value: Value) -> Self {
        let raw = value.to_string();
        match serde_json::from_value::<T>(value) {
            Ok(parsed) => OracleResponse::Parsed(parsed),
            Err(_) => OracleResponse::Malformed(raw),
        }
    }

    /// Mine free text for the first JSON array substring and parse it.
    pub fn from_text_array(text: &str) -> Self {
        match extract_first_json_array(text).and_then(|s| serde_json::from_str::<T>(s).ok()) {
            Some(parsed) => OracleResponse::Parsed(parsed),
            None => OracleResponse::Malformed(text.to_string()),
        }
    }
}

/// Capability interface over a text-generation model.
#[async_trait]
pub trait TextOracle: Send + Sync {
    /// Free-text mode: prompt + system instructions in, free text out.
    async fn generate_text(&self, system: &str, prompt: &str) -> Result<String, OracleError>;

    /// Structured mode: the response must conform to `schema`. The schema's
    /// field set is fixed per call site and never renegotiated per call.
    async fn generate_structured(
        &self,
        system: &str,
        prompt: &str,
        schema: &Value,
    ) -> Result<Value, OracleError>;
}

/// Extract the first balanced `[...]` substring, string-literal aware.
pub fn extract_first_json_array(text: &str) -> Option<&str> {
    extract_balanced(text, '[', ']')
}

/// Extract the first balanced `{...}` substring, string-literal aware.
pub fn extract_first_json_object(text: &str) -> Option<&str> {
    extract_balanced(text, '{', '}')
}

fn extract_balanced(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + idx + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// OpenAI-compatible chat-completions client.
pub struct ChatOracle {
    base_url: String,
    http_client: reqwest::Client,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

impl ChatOracle {
    pub fn new(base_url: String, http_client: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            base_url,
            http_client,
            api_key,
            model,
        }
    }

    async fn complete(
        &self,
        system: &str,
        prompt: &str,
        response_format: Option<Value>,
    ) -> Result<String, OracleError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            response_format,
        };

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(OracleError::Api { status, message });
        }

        let parsed: ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.is_empty())
            .ok_or(OracleError::Empty)
    }
}

#[async_trait]
impl TextOracle for ChatOracle {
    async fn generate_text(&self, system: &str, prompt: &str) -> Result<String, OracleError> {
        self.complete(system, prompt, None).await
    }

    async fn generate_structured(
        &self,
        system: &str,
        prompt: &str,
        schema: &Value,
    ) -> Result<Value, OracleError> {
        let format = serde_json::json!({
            "type": "json_schema",
            "json_schema": { "name": "response", "schema": schema, "strict": true }
        });
        let text = self.complete(system, prompt, Some(format)).await?;

        // Some backends wrap the object in prose despite the format hint.
        let candidate = extract_first_json_object(&text).unwrap_or(&text);
        serde_json::from_str(candidate).map_err(|_| OracleError::Empty)
    }
}
