use axum::{Json, body::Bytes, extract::State};
use serde_json::Value;
use tracing::debug;

use crate::{
    config::RECOMMENDATIONS_URL_VAR,
    error::{AppError, RelayError},
    message::{RecommendationRequest, UpstreamQuestion},
    services::upstream::post_question,
    state::SharedState,
};

const DEFAULT_PROMPT: &str =
    "Give some sample questions which might be useful to a student for college application?";

pub async fn prompt_recommendations_handler(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    // an absent or unreadable body falls back to the default prompt
    let payload: RecommendationRequest = serde_json::from_slice(&body).unwrap_or_else(|err| {
        debug!(%err, "recommendation request without a usable body");
        RecommendationRequest::default()
    });
    let prompt = payload
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PROMPT.to_string());

    fetch_recommendations(&state, &prompt)
        .await
        .map(Json)
        .map_err(AppError::Recommendations)
}

async fn fetch_recommendations(state: &SharedState, prompt: &str) -> Result<Value, RelayError> {
    let url = state
        .config
        .recommendations_url
        .as_deref()
        .ok_or(RelayError::MissingUrl(RECOMMENDATIONS_URL_VAR))?;

    let question = UpstreamQuestion {
        question: prompt,
        thread_id: None,
    };
    let retry = state.config.relay.retry_policy();
    let response = post_question(&state.http, url, &question, &retry).await?;
    Ok(response.json().await?)
}
