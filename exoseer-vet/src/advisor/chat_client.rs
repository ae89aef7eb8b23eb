//! Chat-completions advisor client
//!
//! Talks to any OpenAI-compatible `/v1/chat/completions` endpoint.
//!
//! # API Reference
//! - Endpoint: `{endpoint}/v1/chat/completions`
//! - Auth: `Authorization: Bearer <api_key>` when a key is configured

use super::{Advisor, AdvisorError, AdvisorRequest};
use async_trait::async_trait;
use exoseer_common::config::AdvisorConfig;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// User-Agent header sent with every request
const USER_AGENT: &str = concat!("exoseer-vet/", env!("CARGO_PKG_VERSION"));

pub struct ChatCompletionsAdvisor {
    http_client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Deserialize)]
struct ChatReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionsAdvisor {
    /// Build a client from the advisor configuration
    pub fn new(config: &AdvisorConfig) -> Result<Self, AdvisorError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            header::HeaderValue::from_static(USER_AGENT),
        );

        let http_client = Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .map_err(|e| AdvisorError::Unavailable(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            timeout: config.timeout(),
        })
    }

    fn url(&self) -> String {
        format!("{}/v1/chat/completions", self.endpoint)
    }
}

#[async_trait]
impl Advisor for ChatCompletionsAdvisor {
    fn name(&self) -> &str {
        &self.model
    }

    async fn consult(&self, request: AdvisorRequest) -> Result<String, AdvisorError> {
        let body = ChatRequest {
            model: &self.model,
            temperature: request.temperature,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &request.system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
        };

        debug!(model = %self.model, prompt_chars = request.prompt.len(), "Sending advisor request");

        let mut builder = self.http_client.post(self.url()).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                AdvisorError::Timeout(self.timeout)
            } else {
                AdvisorError::Network(format!("advisor request failed: {}", e))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(AdvisorError::Api { status, message });
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| AdvisorError::Network(format!("failed to read advisor response: {}", e)))?;

        reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(AdvisorError::EmptyResponse)
    }
}
