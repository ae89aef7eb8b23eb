//! External qualitative model ("advisor") integration
//!
//! The advisor is an untrusted text source. Every reply is decoded into a
//! typed structure and validated before use; any failure (transport, timeout,
//! malformed or implausible reply) surfaces as a [`ConsultError`] that the
//! calling stage converts into its default result.

pub mod chat_client;
pub mod decode;
pub mod prompts;
pub mod scripted;

pub use chat_client::ChatCompletionsAdvisor;
pub use decode::{decode, DecodeError, Validate};
pub use scripted::ScriptedAdvisor;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// One advisor call
#[derive(Debug, Clone, PartialEq)]
pub struct AdvisorRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
}

/// Advisor transport errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AdvisorError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Advisor API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Advisor did not answer within {0:?}")]
    Timeout(Duration),

    #[error("Advisor returned an empty response")]
    EmptyResponse,

    #[error("Advisor unavailable: {0}")]
    Unavailable(String),
}

/// Text-in, text-out external model
#[async_trait]
pub trait Advisor: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    async fn consult(&self, request: AdvisorRequest) -> Result<String, AdvisorError>;
}

/// Failure of a decoded advisor consultation
#[derive(Debug, Error)]
pub enum ConsultError {
    #[error(transparent)]
    Advisor(#[from] AdvisorError),

    #[error("Unusable advisor reply: {0}")]
    Decode(#[from] DecodeError),
}

/// Advisor plus the call policy (timeout, temperature) shared by all stages
#[derive(Clone)]
pub struct AdvisorSession {
    advisor: Arc<dyn Advisor>,
    timeout: Duration,
    temperature: f32,
}

impl AdvisorSession {
    pub fn new(advisor: Arc<dyn Advisor>, timeout: Duration, temperature: f32) -> Self {
        Self {
            advisor,
            timeout,
            temperature,
        }
    }

    pub fn name(&self) -> &str {
        self.advisor.name()
    }

    /// Ask for free text, bounded by the session timeout
    pub async fn ask_text(&self, prompt: String) -> Result<String, AdvisorError> {
        let request = AdvisorRequest {
            system: prompts::SYSTEM_PROMPT.to_string(),
            prompt,
            temperature: self.temperature,
        };

        match tokio::time::timeout(self.timeout, self.advisor.consult(request)).await {
            Ok(reply) => reply,
            Err(_) => Err(AdvisorError::Timeout(self.timeout)),
        }
    }

    /// Ask for a structured reply and decode it into `T`
    pub async fn consult<T>(&self, prompt: String) -> Result<T, ConsultError>
    where
        T: DeserializeOwned + Validate,
    {
        let raw = self.ask_text(prompt).await?;
        debug!(advisor = self.name(), chars = raw.len(), "Advisor replied");
        Ok(decode::<T>(&raw)?)
    }
}

impl std::fmt::Debug for AdvisorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdvisorSession")
            .field("advisor", &self.advisor.name())
            .field("timeout", &self.timeout)
            .field("temperature", &self.temperature)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Score {
        value: f64,
    }

    impl Validate for Score {
        fn validate(&self) -> Result<(), String> {
            if (0.0..=1.0).contains(&self.value) {
                Ok(())
            } else {
                Err(format!("value {} outside [0, 1]", self.value))
            }
        }
    }

    fn session(advisor: ScriptedAdvisor, timeout: Duration) -> AdvisorSession {
        AdvisorSession::new(Arc::new(advisor), timeout, 0.3)
    }

    #[tokio::test]
    async fn test_consult_decodes_fenced_reply() {
        let advisor = ScriptedAdvisor::new().with_reply("```json\n{\"value\": 0.4}\n```");
        let score: Score = session(advisor, Duration::from_secs(1))
            .consult("score it".to_string())
            .await
            .unwrap();
        assert_eq!(score.value, 0.4);
    }

    #[tokio::test]
    async fn test_consult_rejects_implausible_reply() {
        let advisor = ScriptedAdvisor::new().with_reply("{\"value\": 4.0}");
        let result = session(advisor, Duration::from_secs(1))
            .consult::<Score>("score it".to_string())
            .await;
        assert!(matches!(result, Err(ConsultError::Decode(DecodeError::Invalid(_)))));
    }

    #[tokio::test]
    async fn test_slow_advisor_times_out() {
        let advisor = ScriptedAdvisor::new()
            .with_reply("{\"value\": 0.4}")
            .with_delay(Duration::from_millis(500));
        let result = session(advisor, Duration::from_millis(20))
            .consult::<Score>("score it".to_string())
            .await;
        assert!(matches!(
            result,
            Err(ConsultError::Advisor(AdvisorError::Timeout(_)))
        ));
    }
}
