//! Client side of the hosted completion endpoint.
//!
//! The endpoint takes the user's message together with the whole document and returns a reply
//! plus usage metadata. Requests are blocking; the terminal front end runs them on a worker
//! thread.

use crate::config::Config;
use crate::transcript::{StructuredAnalysis, TokenUsage};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Shown in the transcript whenever the endpoint cannot be reached.
pub const CONTINGENCY_MESSAGE: &str =
    "Desculpe, não consegui falar com o assistente agora. Tente novamente em instantes.";

/// What the endpoint is asked to do.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Answer a chat message.
    Chat,
    /// Return a structured analysis of the document.
    Analyze,
}

/// Body posted to the endpoint.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    /// Requested operation.
    pub operation: Operation,
    /// The user's message.
    pub message: String,
    /// Document being edited, if it has been saved.
    pub document_id: Option<String>,
    /// Kind of legal document (petição, contrato, ...).
    pub document_type: Option<String>,
    /// Requesting user.
    pub user_id: String,
    /// Whole document text.
    pub full_document_content: String,
    /// Recent conversation, oldest first.
    pub context: String,
}

/// Body returned by the endpoint.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CompletionReply {
    /// Generated answer.
    pub reply: String,
    /// Model that produced it.
    #[serde(default)]
    pub model_used: Option<String>,
    /// Token accounting.
    #[serde(default)]
    pub token_usage: Option<TokenUsage>,
    /// Present for `analyze` requests.
    #[serde(default)]
    pub analysis: Option<StructuredAnalysis>,
}

/// Failures talking to the endpoint.
#[derive(Debug, Error)]
pub enum LlmError {
    /// No endpoint configured.
    #[error("no completion endpoint configured")]
    NotConfigured,
    /// Connection, DNS, TLS or timeout failure.
    #[error("request failed: {0}")]
    Transport(String),
    /// The endpoint answered with an error status.
    #[error("endpoint returned {0}: {1}")]
    Status(u16, String),
    /// The body was not a completion reply.
    #[error("unreadable reply: {0}")]
    Decode(String),
}

/// Anything that can answer a completion request.
pub trait CompletionClient {
    /// Send `request` and wait for the reply.
    ///
    /// # Errors
    ///
    /// Returns an error when the endpoint cannot be reached or answers garbage.
    fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply, LlmError>;
}

/// JSON-over-HTTP client for the hosted endpoint.
pub struct HttpCompletionClient {
    endpoint: String,
    api_key: Option<String>,
    agent: ureq::Agent,
}

impl HttpCompletionClient {
    #[must_use]
    /// Client posting to `endpoint`, authenticating with `api_key` when given.
    pub fn new(endpoint: &str, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            api_key,
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }

    #[must_use]
    /// Client for the configured endpoint, `None` when none is configured.
    pub fn from_config(cfg: &Config) -> Option<Self> {
        if cfg.endpoint.trim().is_empty() {
            return None;
        }
        let api_key = std::env::var(&cfg.api_key_env).ok().filter(|key| !key.is_empty());
        Some(Self::new(
            &cfg.endpoint,
            api_key,
            Duration::from_secs(cfg.request_timeout_secs),
        ))
    }
}

impl CompletionClient for HttpCompletionClient {
    fn complete(&self, request: &CompletionRequest) -> Result<CompletionReply, LlmError> {
        let mut call = self
            .agent
            .post(&self.endpoint)
            .set("Accept", "application/json");
        if let Some(key) = &self.api_key {
            call = call.set("Authorization", &format!("Bearer {key}"));
        }
        tracing::debug!(operation = ?request.operation, "posting completion request");
        let response = call.send_json(request).map_err(|e| match e {
            ureq::Error::Status(code, response) => {
                LlmError::Status(code, response.into_string().unwrap_or_default())
            }
            ureq::Error::Transport(transport) => LlmError::Transport(transport.to_string()),
        })?;
        response
            .into_json::<CompletionReply>()
            .map_err(|e| LlmError::Decode(e.to_string()))
    }
}

/// Client used when no endpoint is configured: every request fails with
/// [`LlmError::NotConfigured`], which the assistant turns into the contingency message.
pub struct OfflineClient;

impl CompletionClient for OfflineClient {
    fn complete(&self, _request: &CompletionRequest) -> Result<CompletionReply, LlmError> {
        Err(LlmError::NotConfigured)
    }
}
