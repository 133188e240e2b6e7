//! OpenAI-compatible chat completion client

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Message author as understood by the completion endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Per-request decoding options
#[derive(Debug, Clone, PartialEq)]
pub struct ChatOptions {
    /// Model identifier sent with every request
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Ask the service for a JSON object reply
    pub json_mode: bool,
}

impl ChatOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: 0.3,
            json_mode: true,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_json_mode(mut self, json_mode: bool) -> Self {
        self.json_mode = json_mode;
        self
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for a `/chat/completions` endpoint
#[derive(Debug, Clone)]
pub struct ChatClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl ChatClient {
    /// Create a new client; `timeout` bounds every request
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            base_url: base_url.into(),
            api_key,
            client,
        })
    }

    /// Endpoint URL for completions
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Send the transcript and return the text of the first choice
    pub async fn complete(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<String> {
        let body = build_request(messages, options);
        debug!(model = %options.model, messages = messages.len(), "Sending completion request");

        let mut request = self.client.post(self.completions_url()).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let payload: CompletionResponse = request
            .send()
            .await
            .context("Failed to reach completion service")?
            .error_for_status()
            .context("Completion service returned an error status")?
            .json()
            .await
            .context("Failed to parse completion response")?;

        extract_content(payload)
    }
}

fn build_request<'a>(messages: &'a [ChatMessage], options: &'a ChatOptions) -> CompletionRequest<'a> {
    CompletionRequest {
        model: &options.model,
        messages,
        temperature: options.temperature,
        stream: false,
        response_format: options.json_mode.then_some(ResponseFormat {
            format_type: "json_object",
        }),
    }
}

fn extract_content(payload: CompletionResponse) -> Result<String> {
    let Some(choice) = payload.choices.into_iter().next() else {
        bail!("Completion response contained no choices");
    };

    match choice.message.content {
        Some(content) => Ok(content),
        None => bail!("Completion response choice had no content"),
    }
}
