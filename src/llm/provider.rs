//! Structured extraction providers: a remote API (Gemini) and a local model server (Ollama)
//!
//! Every provider takes one prompt and returns the model's raw text reply.
//! Parsing that reply is the extractor's job.

use crate::config::{LlmConfig, ProviderKind};
use crate::error::{LlmError, Result, ScreenerError};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait StructuredExtractionProvider: Send + Sync {
    fn name(&self) -> &str;

    /// One request, one reply. No retries.
    async fn complete(&self, prompt: &str) -> std::result::Result<String, LlmError>;
}

/// Build the configured provider. A missing API key is a configuration error
/// and fails the run before any document is processed.
pub fn from_config(config: &LlmConfig) -> Result<Arc<dyn StructuredExtractionProvider>> {
    let timeout = config.timeout()?;
    match config.provider {
        ProviderKind::Gemini => {
            let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                ScreenerError::Configuration(format!(
                    "Structured extraction needs an API key in ${}",
                    config.api_key_env
                ))
            })?;
            Ok(Arc::new(GeminiProvider::new(
                &config.gemini_base_url,
                &config.gemini_model,
                api_key,
                timeout,
            )?))
        }
        ProviderKind::Ollama => Ok(Arc::new(OllamaProvider::new(
            &config.ollama_url,
            &config.ollama_model,
            timeout,
        )?)),
    }
}

fn http_client(timeout: Duration) -> std::result::Result<Client, LlmError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::Transport(format!("failed to build HTTP client: {}", e)))
}

/// Reads the body of a response, turning non-2xx statuses into transport errors.
async fn success_body(response: reqwest::Response) -> std::result::Result<String, LlmError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(LlmError::Transport(format!(
            "status {}: {}",
            status.as_u16(),
            body.chars().take(300).collect::<String>()
        )));
    }
    Ok(body)
}

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiReplyContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiReplyContent {
    #[serde(default)]
    parts: Vec<GeminiReplyPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiReplyPart {
    text: Option<String>,
}

pub struct GeminiProvider {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiProvider {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: String,
        timeout: Duration,
    ) -> std::result::Result<Self, LlmError> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: format!("{}/models/{}:generateContent", base_url.trim_end_matches('/'), model),
            model: model.to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl StructuredExtractionProvider for GeminiProvider {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> std::result::Result<String, LlmError> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;
        let body = success_body(response).await?;

        let parsed: GeminiResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::MalformedResponse(format!("unexpected Gemini payload: {}", e)))?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .and_then(|content| content.parts.into_iter().next())
            .and_then(|part| part.text)
            .ok_or_else(|| LlmError::MalformedResponse("Gemini reply has no text part".to_string()))?;

        debug!("Gemini replied with {} chars", text.len());
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: Option<OllamaReply>,
}

#[derive(Debug, Deserialize)]
struct OllamaReply {
    content: String,
}

pub struct OllamaProvider {
    client: Client,
    endpoint: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> std::result::Result<Self, LlmError> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: format!("{}/api/chat", base_url.trim_end_matches('/')),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl StructuredExtractionProvider for OllamaProvider {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> std::result::Result<String, LlmError> {
        let request = OllamaRequest {
            model: &self.model,
            messages: vec![OllamaMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
        };

        let response = self.client.post(&self.endpoint).json(&request).send().await?;
        let body = success_body(response).await?;

        let parsed: OllamaResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::MalformedResponse(format!("unexpected Ollama payload: {}", e)))?;
        let text = parsed
            .message
            .map(|message| message.content)
            .ok_or_else(|| LlmError::MalformedResponse("Ollama reply has no message".to_string()))?;

        debug!("Ollama ({}) replied with {} chars", self.model, text.len());
        Ok(text)
    }
}
