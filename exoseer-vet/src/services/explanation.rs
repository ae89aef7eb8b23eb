//! Explanation service: free-form scientific answers built on the advisor
//!
//! Consumes pipeline outputs as context only; nothing here feeds back into an
//! analysis.

use crate::advisor::decode::{self, check_unit, Validate};
use crate::advisor::{prompts, AdvisorSession};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

/// Confidence attached to an unstructured but usable reply
const RAW_TEXT_CONFIDENCE: f64 = 0.8;

/// Confidence attached to a structured reply that omits one
const DEFAULT_REPLY_CONFIDENCE: f64 = 0.7;

/// Confidence attached to the apology returned on failure
const FAILURE_CONFIDENCE: f64 = 0.3;

const APOLOGY: &str = "I apologize, but I couldn't generate an explanation at this time. \
                       Please try rephrasing your question.";

/// Number of prior conversation turns forwarded to the advisor
const HISTORY_TURNS: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: String,
    pub content: String,
}

/// Context accompanying a question
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplanationContext {
    pub candidate_name: Option<String>,
    pub period: Option<f64>,
    pub radius: Option<f64>,
    pub transit_depth: Option<f64>,
    /// Serialized slice of pipeline outputs
    pub analysis: Option<serde_json::Value>,
    pub conversation_history: Vec<ConversationTurn>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub explanation: String,
    pub confidence: f64,
    pub references: Vec<String>,
    pub key_equations: Vec<String>,
    pub observational_notes: Vec<String>,
}

impl Explanation {
    fn text(explanation: impl Into<String>, confidence: f64) -> Self {
        Self {
            explanation: explanation.into(),
            confidence,
            references: Vec::new(),
            key_equations: Vec::new(),
            observational_notes: Vec::new(),
        }
    }

    fn apology() -> Self {
        Self::text(APOLOGY, FAILURE_CONFIDENCE)
    }
}

#[derive(Debug, Deserialize)]
struct ExplanationReply {
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    references: Vec<String>,
    #[serde(default)]
    key_equations: Vec<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    observational_notes: Vec<String>,
}

/// Accepts either a single string or a list of strings
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(note) if note.trim().is_empty() => Vec::new(),
        OneOrMany::One(note) => vec![note],
        OneOrMany::Many(notes) => notes,
    })
}

impl Validate for ExplanationReply {
    fn validate(&self) -> Result<(), String> {
        match self.confidence {
            Some(confidence) => check_unit("confidence", confidence),
            None => Ok(()),
        }
    }
}

pub struct ExplanationService {
    advisor: Option<AdvisorSession>,
}

impl ExplanationService {
    pub fn new(advisor: Option<AdvisorSession>) -> Self {
        Self { advisor }
    }

    pub fn is_available(&self) -> bool {
        self.advisor.is_some()
    }

    /// Answer a question; never fails
    pub async fn explain(&self, question: &str, context: &ExplanationContext) -> Explanation {
        let Some(session) = &self.advisor else {
            return Explanation::apology();
        };

        let context_json = serde_json::to_string_pretty(&ContextSummary::from(context))
            .unwrap_or_else(|_| "{}".to_string());
        let start = context.conversation_history.len().saturating_sub(HISTORY_TURNS);
        let history = context.conversation_history[start..]
            .iter()
            .map(|turn| format!("{}: {}", turn.role, turn.content))
            .collect::<Vec<_>>()
            .join("\n");

        let raw = match session
            .ask_text(prompts::explanation(question, &context_json, &history))
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(advisor = session.name(), error = %e, "Explanation request failed");
                return Explanation::apology();
            }
        };

        match decode::decode::<ExplanationReply>(&raw) {
            Ok(reply) => Explanation {
                explanation: reply.explanation.unwrap_or_else(|| APOLOGY.to_string()),
                confidence: reply.confidence.unwrap_or(DEFAULT_REPLY_CONFIDENCE),
                references: reply.references,
                key_equations: reply.key_equations,
                observational_notes: reply.observational_notes,
            },
            Err(e) => {
                debug!(error = %e, "Explanation reply not structured, returning text");
                Explanation::text(raw.trim(), RAW_TEXT_CONFIDENCE)
            }
        }
    }
}

/// Context fields forwarded to the advisor (history is sent separately)
#[derive(Serialize)]
struct ContextSummary<'a> {
    candidate_name: Option<&'a str>,
    period: Option<f64>,
    radius: Option<f64>,
    transit_depth: Option<f64>,
    analysis: Option<&'a serde_json::Value>,
}

impl<'a> From<&'a ExplanationContext> for ContextSummary<'a> {
    fn from(context: &'a ExplanationContext) -> Self {
        Self {
            candidate_name: context.candidate_name.as_deref(),
            period: context.period,
            radius: context.radius,
            transit_depth: context.transit_depth,
            analysis: context.analysis.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::{AdvisorError, ScriptedAdvisor};
    use std::sync::Arc;
    use std::time::Duration;

    fn service(advisor: ScriptedAdvisor) -> ExplanationService {
        ExplanationService::new(Some(AdvisorSession::new(
            Arc::new(advisor),
            Duration::from_secs(1),
            0.3,
        )))
    }

    #[tokio::test]
    async fn test_structured_reply() {
        let svc = service(ScriptedAdvisor::new().with_reply(
            r#"{"explanation": "A transit is a dip.", "confidence": 0.9,
                "key_equations": ["depth = (Rp/Rs)^2"]}"#,
        ));
        let answer = svc.explain("What is a transit?", &ExplanationContext::default()).await;
        assert_eq!(answer.explanation, "A transit is a dip.");
        assert_eq!(answer.confidence, 0.9);
        assert_eq!(answer.key_equations.len(), 1);
    }

    #[tokio::test]
    async fn test_observational_notes_as_single_string() {
        let svc = service(ScriptedAdvisor::new().with_reply(
            r#"{"explanation": "Deeper transits mean larger planets.", "confidence": 0.85,
                "observational_notes": "TESS photometric precision limits small planets."}"#,
        ));
        let answer = svc.explain("Why depth?", &ExplanationContext::default()).await;
        assert_eq!(answer.explanation, "Deeper transits mean larger planets.");
        assert_eq!(answer.confidence, 0.85);
        assert_eq!(
            answer.observational_notes,
            vec!["TESS photometric precision limits small planets."]
        );
    }

    #[tokio::test]
    async fn test_observational_notes_as_list() {
        let svc = service(ScriptedAdvisor::new().with_reply(
            r#"{"explanation": "Shape matters.", "observational_notes": ["ingress", "egress"]}"#,
        ));
        let answer = svc.explain("Why shape?", &ExplanationContext::default()).await;
        assert_eq!(answer.confidence, 0.7);
        assert_eq!(answer.observational_notes, vec!["ingress", "egress"]);
    }

    #[tokio::test]
    async fn test_plain_text_reply_kept() {
        let svc = service(ScriptedAdvisor::new().with_reply("Transits are dips in brightness."));
        let answer = svc.explain("What is a transit?", &ExplanationContext::default()).await;
        assert_eq!(answer.explanation, "Transits are dips in brightness.");
        assert_eq!(answer.confidence, 0.8);
    }

    #[tokio::test]
    async fn test_failure_and_missing_advisor_apologize() {
        let svc = service(ScriptedAdvisor::new().with_error(AdvisorError::EmptyResponse));
        let answer = svc.explain("Why?", &ExplanationContext::default()).await;
        assert_eq!(answer.confidence, 0.3);

        let none = ExplanationService::new(None);
        assert!(!none.is_available());
        assert_eq!(none.explain("Why?", &ExplanationContext::default()).await.confidence, 0.3);
    }

    #[tokio::test]
    async fn test_history_is_truncated() {
        let advisor = Arc::new(ScriptedAdvisor::new().with_reply("ok"));
        let svc = ExplanationService::new(Some(AdvisorSession::new(
            advisor.clone(),
            Duration::from_secs(1),
            0.3,
        )));
        let context = ExplanationContext {
            conversation_history: (0..8)
                .map(|i| ConversationTurn {
                    role: "user".to_string(),
                    content: format!("turn {}", i),
                })
                .collect(),
            ..ExplanationContext::default()
        };

        svc.explain("Next?", &context).await;
        let prompt = &advisor.prompts()[0];
        assert!(!prompt.contains("turn 2"));
        assert!(prompt.contains("turn 3"));
        assert!(prompt.contains("turn 7"));
    }
}
