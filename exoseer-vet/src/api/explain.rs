//! POST /api/explain

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::services::explanation::ConversationTurn;
use crate::services::{Explanation, ExplanationContext};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ExplainRequest {
    #[serde(alias = "message")]
    pub question: String,
    #[serde(default)]
    pub context: ExplanationContext,
    /// History sent alongside the context rather than inside it
    #[serde(default)]
    pub conversation_history: Vec<ConversationTurn>,
}

pub async fn explain(
    State(state): State<AppState>,
    Json(request): Json<ExplainRequest>,
) -> ApiResult<Json<Explanation>> {
    let question = request.question.trim();
    if question.is_empty() {
        return Err(ApiError::BadRequest("question must not be empty".to_string()));
    }

    let mut context = request.context;
    if context.conversation_history.is_empty() {
        context.conversation_history = request.conversation_history;
    }

    Ok(Json(state.explanation.explain(question, &context).await))
}

pub fn explain_routes() -> Router<AppState> {
    Router::new().route("/api/explain", post(explain))
}
