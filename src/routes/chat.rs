use axum::{
    Json,
    body::Body,
    extract::{State, rejection::JsonRejection},
    http::header,
    response::{IntoResponse, Response},
};
use tracing::{info, info_span};
use uuid::Uuid;

use crate::{
    config::CHATBOT_URL_VAR,
    error::{AppError, RelayError},
    message::{ChatRequest, UpstreamQuestion},
    services::{relay::spawn_relay, upstream::post_question},
    state::SharedState,
};

const DEFAULT_THREAD_ID: &str = "1";

pub async fn application_chatbot_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let url = state
        .config
        .chatbot_url
        .as_deref()
        .ok_or(RelayError::MissingUrl(CHATBOT_URL_VAR))?;

    let Json(mut payload) =
        payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    let Some(last_message) = payload.messages.pop() else {
        return Err(AppError::BadRequest("messages cannot be empty".to_string()));
    };

    let thread_id = payload
        .chat_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_THREAD_ID.to_string());

    state.metrics.record_started().await;

    let question = UpstreamQuestion {
        question: &last_message.content,
        thread_id: Some(&thread_id),
    };
    let retry = state.config.relay.retry_policy();
    let response = match post_question(&state.http, url, &question, &retry).await {
        Ok(response) => response,
        Err(err) => {
            state.metrics.record_upstream_failure().await;
            return Err(err.into());
        }
    };

    let request_id = Uuid::new_v4();
    info!(%request_id, %thread_id, "relaying application chatbot stream");
    let span = info_span!("relay", %request_id, %thread_id);

    let tokens = spawn_relay(
        response.bytes_stream(),
        state.config.relay.relay_options(),
        state.metrics.clone(),
        span,
    );

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(tokens),
    )
        .into_response())
}
