//! Model inference over an Ollama-compatible HTTP endpoint.
//!
//! The harness only needs one call: send a prompt, get back the generated
//! text and the endpoint's own duration measurement. [`InferenceClient`] is
//! the seam; [`OllamaClient`] is the blocking `ureq` implementation.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during inference
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode endpoint response: {0}")]
    Decode(#[from] std::io::Error),
}

/// Generation options forwarded to the endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Context window in tokens
    pub num_ctx: u32,
}

/// Body of a `/api/generate` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    /// Always `json`: constrain the model to emit JSON
    pub format: String,
    pub stream: bool,
    pub options: GenerateOptions,
}

impl GenerateRequest {
    /// Non-streaming JSON-format request
    #[must_use]
    pub fn new(model: &str, prompt: &str, num_ctx: u32) -> Self {
        Self {
            model: model.to_string(),
            prompt: prompt.to_string(),
            format: "json".to_string(),
            stream: false,
            options: GenerateOptions { num_ctx },
        }
    }
}

/// Endpoint reply; only `response` and `total_duration` are consumed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub model: Option<String>,
    /// Generated text
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub done: Option<bool>,
    /// Wall time reported by the endpoint, nanoseconds
    #[serde(default)]
    pub total_duration: Option<u64>,
    #[serde(default)]
    pub load_duration: Option<u64>,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u64>,
    #[serde(default)]
    pub eval_duration: Option<u64>,
}

/// Anything that can turn a prompt into a model response
pub trait InferenceClient {
    /// Run one generation
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint cannot be reached or replies with a
    /// failure status or an undecodable body.
    fn generate(&self, model: &str, prompt: &str) -> Result<GenerateResponse, InferenceError>;
}

/// Blocking client for an Ollama `/api/generate` endpoint
#[derive(Debug, Clone)]
pub struct OllamaClient {
    endpoint: String,
    num_ctx: u32,
    agent: ureq::Agent,
}

impl OllamaClient {
    /// Client for `endpoint` (e.g. `http://localhost:11434`)
    #[must_use]
    pub fn new(endpoint: &str, num_ctx: u32, timeout: Option<Duration>) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            num_ctx,
            agent: builder.build(),
        }
    }

    /// Full generate URL
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}/api/generate", self.endpoint)
    }
}

impl InferenceClient for OllamaClient {
    fn generate(&self, model: &str, prompt: &str) -> Result<GenerateResponse, InferenceError> {
        let request = GenerateRequest::new(model, prompt, self.num_ctx);
        tracing::debug!(url = %self.url(), model = %model, "Sending generate request");

        match self
            .agent
            .post(&self.url())
            .set("Content-Type", "application/json")
            .send_json(&request)
        {
            Ok(resp) => Ok(resp.into_json::<GenerateResponse>()?),
            Err(ureq::Error::Status(status, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                Err(InferenceError::Status { status, body })
            }
            Err(e) => Err(InferenceError::Transport(e.to_string())),
        }
    }
}
