//! Completion (text generation) providers.
//!
//! Mirrors the embedding provider layout: a [`Completer`] trait, one
//! implementation per backend, and [`create_completer`] to pick one from
//! config. The disabled provider never errors; callers check
//! [`Completer::is_enabled`] and answer with a placeholder instead.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::CompletionConfig;
use crate::llm_client::{
    api_key_from_env, build_client, gemini_model_path, post_json, JsonRequest, GEMINI_BASE_URL,
    OLLAMA_BASE_URL, OPENAI_BASE_URL,
};

/// A system instruction plus the user turn.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn len(&self) -> usize {
        self.system.len() + self.user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
pub trait Completer: Send + Sync {
    fn model_name(&self) -> &str;

    fn is_enabled(&self) -> bool {
        true
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String>;
}

// ============ Disabled Provider ============

pub struct DisabledCompleter;

#[async_trait]
impl Completer for DisabledCompleter {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    async fn complete(&self, _prompt: &Prompt) -> Result<String> {
        bail!("Completion provider is disabled")
    }
}

// ============ OpenAI Provider ============

/// Chat completions via `POST /v1/chat/completions`. Requires `OPENAI_API_KEY`.
pub struct OpenAICompleter {
    client: reqwest::Client,
    model: String,
    base_url: String,
    api_key: String,
    temperature: f32,
    max_retries: u32,
}

impl OpenAICompleter {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
            api_key: api_key_from_env("OPENAI_API_KEY")?,
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Completer for OpenAICompleter {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let req = JsonRequest {
            label: "OpenAI",
            url: format!("{}/chat/completions", self.base_url.trim_end_matches('/')),
            headers: vec![("Authorization", format!("Bearer {}", self.api_key))],
            body: serde_json::json!({
                "model": self.model,
                "temperature": self.temperature,
                "messages": [
                    { "role": "system", "content": prompt.system },
                    { "role": "user", "content": prompt.user },
                ],
            }),
        };
        let json = post_json(&self.client, &req, self.max_retries).await?;
        json.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing message content"))
    }
}

// ============ Ollama Provider ============

/// Non-streaming chat against a local Ollama instance.
pub struct OllamaCompleter {
    client: reqwest::Client,
    model: String,
    url: String,
    temperature: f32,
    max_retries: u32,
}

impl OllamaCompleter {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            model: config.model.clone().unwrap_or_else(|| "llama3.1".to_string()),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| OLLAMA_BASE_URL.to_string()),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Completer for OllamaCompleter {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let req = JsonRequest {
            label: "Ollama",
            url: format!("{}/api/chat", self.url.trim_end_matches('/')),
            headers: Vec::new(),
            body: serde_json::json!({
                "model": self.model,
                "stream": false,
                "options": { "temperature": self.temperature },
                "messages": [
                    { "role": "system", "content": prompt.system },
                    { "role": "user", "content": prompt.user },
                ],
            }),
        };
        let json = post_json(&self.client, &req, self.max_retries).await?;
        json.pointer("/message/content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing message content"))
    }
}

// ============ Gemini Provider ============

/// `generateContent` on Google's Generative Language API. Requires `GOOGLE_API_KEY`.
pub struct GeminiCompleter {
    client: reqwest::Client,
    model: String,
    base_url: String,
    api_key: String,
    temperature: f32,
    max_retries: u32,
}

impl GeminiCompleter {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config.timeout_secs)?,
            model: gemini_model_path(config.model.as_deref().unwrap_or("gemini-1.5-flash")),
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            api_key: api_key_from_env("GOOGLE_API_KEY")?,
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Completer for GeminiCompleter {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let req = JsonRequest {
            label: "Gemini",
            url: format!(
                "{}/{}:generateContent",
                self.base_url.trim_end_matches('/'),
                self.model
            ),
            headers: vec![("x-goog-api-key", self.api_key.clone())],
            body: serde_json::json!({
                "systemInstruction": { "parts": [{ "text": prompt.system }] },
                "contents": [{ "role": "user", "parts": [{ "text": prompt.user }] }],
                "generationConfig": { "temperature": self.temperature },
            }),
        };
        let json = post_json(&self.client, &req, self.max_retries).await?;
        parse_gemini_text(&json)
    }
}

/// Joins the text parts of the first candidate.
fn parse_gemini_text(json: &serde_json::Value) -> Result<String> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| {
            let reason = json
                .pointer("/promptFeedback/blockReason")
                .and_then(|r| r.as_str())
                .unwrap_or("no candidates");
            anyhow::anyhow!("Invalid Gemini response: {}", reason)
        })?;

    Ok(parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join(""))
}

/// Create the [`Completer`] named by `config.provider`.
pub fn create_completer(config: &CompletionConfig) -> Result<Arc<dyn Completer>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledCompleter)),
        "openai" => Ok(Arc::new(OpenAICompleter::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaCompleter::new(config)?)),
        "gemini" => Ok(Arc::new(GeminiCompleter::new(config)?)),
        other => bail!("Unknown completion provider: {}", other),
    }
}
