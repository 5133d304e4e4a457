//! Chat collaborator: one request in, one reply string out.
//!
//! [`ChatClient`] is the seam the rest of the crate talks to. [`HttpChatClient`]
//! implements it over the non-streaming JSON APIs of the supported
//! [`Provider`]s. Failures collapse into two user-visible kinds,
//! [`ChatError::AuthRequired`] and [`ChatError::Offline`]; both are
//! recoverable by retrying.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, warn};

use crate::chat::{Message, Role};
use crate::providers::*;

/// Anthropic requires an explicit output cap.
const ANTHROPIC_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// No API key, or the provider rejected it.
    #[error("authentication required: set a valid API key and retry")]
    AuthRequired,
    /// Connection failure, timeout, unexpected status or unreadable reply.
    #[error("assistant unreachable: {detail}")]
    Offline { detail: String },
}

impl ChatError {
    pub fn offline(detail: impl Into<String>) -> Self {
        ChatError::Offline { detail: detail.into() }
    }

    /// Map a non-success HTTP status to an error kind.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 | 403 | 404 => ChatError::AuthRequired,
            code => ChatError::offline(format!("HTTP {code}: {}", body.trim())),
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(e: reqwest::Error) -> Self {
        ChatError::offline(e.to_string())
    }
}

/// Everything a provider needs for one completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub temperature: f32,
}

impl ChatRequest {
    pub fn new(system: impl Into<String>, messages: Vec<Message>, temperature: f32) -> Self {
        ChatRequest { system: system.into(), messages, temperature }
    }

    /// A single user turn.
    pub fn single(system: impl Into<String>, prompt: &str, temperature: f32) -> Self {
        Self::new(system, vec![Message::user(prompt)], temperature)
    }
}

#[allow(async_fn_in_trait)]
pub trait ChatClient {
    async fn complete(&self, request: &ChatRequest) -> Result<String, ChatError>;

    /// Whether a request could be attempted at all. A client without
    /// credentials lets callers bail out before recording anything.
    fn has_credentials(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// HttpChatClient
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub provider: Provider,
    pub model: String,
    pub api_key: Option<String>,
    /// Overrides the provider's public endpoint (proxies, tests).
    pub base_url: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Defaults: provider model, 5 s connect timeout, 30 s request timeout.
    pub fn new(provider: Provider) -> Self {
        ClientConfig {
            provider,
            model: provider.default_model().to_string(),
            api_key: None,
            base_url: None,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        }
    }

    fn base_url(&self) -> &str {
        if let Some(url) = &self.base_url {
            return url.trim_end_matches('/');
        }
        match self.provider {
            Provider::Gemini => "https://generativelanguage.googleapis.com",
            Provider::Openai => "https://api.openai.com",
            Provider::Anthropic => "https://api.anthropic.com",
        }
    }
}

pub struct HttpChatClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl HttpChatClient {
    pub fn new(config: ClientConfig) -> Self {
        // Builder failure falls back to a default client instead of panicking.
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_default();
        HttpChatClient { config, http }
    }

    fn api_key(&self) -> Result<&str, ChatError> {
        match self.config.api_key.as_deref() {
            Some(k) if !k.trim().is_empty() => Ok(k),
            _ => Err(ChatError::AuthRequired),
        }
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ChatError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = ChatError::from_status(status, &body);
            warn!(provider = %self.config.provider, status = status.as_u16(), "chat request rejected");
            return Err(err);
        }
        Ok(response.json::<T>().await?)
    }

    async fn complete_gemini(&self, req: &ChatRequest, key: &str) -> Result<String, ChatError> {
        let contents = req
            .messages
            .iter()
            .map(|m| GeminiContent {
                role: Some(match m.role {
                    Role::User => "user".to_string(),
                    Role::Assistant => "model".to_string(),
                }),
                parts: vec![GeminiPart { text: Some(m.content.clone()) }],
            })
            .collect();
        let body = GeminiRequest {
            contents,
            system_instruction: (!req.system.is_empty()).then(|| GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: Some(req.system.clone()) }],
            }),
            generation_config: GeminiGenerationConfig { temperature: req.temperature },
        };
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url(),
            self.config.model
        );
        let resp: GeminiResponse = self
            .send_json(self.http.post(url).header("x-goog-api-key", key).json(&body))
            .await?;
        Ok(resp.text())
    }

    async fn complete_openai(&self, req: &ChatRequest, key: &str) -> Result<String, ChatError> {
        let mut messages = Vec::with_capacity(req.messages.len() + 1);
        if !req.system.is_empty() {
            messages.push(OpenAIChatMessage {
                role: "system".to_string(),
                content: Some(req.system.clone()),
            });
        }
        messages.extend(req.messages.iter().map(|m| OpenAIChatMessage {
            role: m.role.to_string(),
            content: Some(m.content.clone()),
        }));
        let body = OpenAIChatRequest {
            model: self.config.model.clone(),
            messages,
            stream: false,
            temperature: req.temperature,
        };
        let url = format!("{}/v1/chat/completions", self.config.base_url());
        let resp: OpenAIChatResponse = self
            .send_json(
                self.http
                    .post(url)
                    .header("Authorization", format!("Bearer {key}"))
                    .json(&body),
            )
            .await?;
        Ok(resp.text())
    }

    async fn complete_anthropic(&self, req: &ChatRequest, key: &str) -> Result<String, ChatError> {
        let body = AnthropicRequest {
            model: self.config.model.clone(),
            messages: req
                .messages
                .iter()
                .map(|m| AnthropicMessage { role: m.role.to_string(), content: m.content.clone() })
                .collect(),
            max_tokens: ANTHROPIC_MAX_TOKENS,
            temperature: req.temperature,
            system: (!req.system.is_empty()).then(|| req.system.clone()),
        };
        let url = format!("{}/v1/messages", self.config.base_url());
        let resp: AnthropicResponse = self
            .send_json(
                self.http
                    .post(url)
                    .header("x-api-key", key)
                    .header("anthropic-version", "2023-06-01")
                    .json(&body),
            )
            .await?;
        Ok(resp.text())
    }
}

impl ChatClient for HttpChatClient {
    fn has_credentials(&self) -> bool {
        self.api_key().is_ok()
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, ChatError> {
        let key = self.api_key()?;
        debug!(
            provider = %self.config.provider,
            model = %self.config.model,
            messages = request.messages.len(),
            "sending chat request"
        );
        match self.config.provider {
            Provider::Gemini => self.complete_gemini(request, key).await,
            Provider::Openai => self.complete_openai(request, key).await,
            Provider::Anthropic => self.complete_anthropic(request, key).await,
        }
    }
}
