// src/error.rs
use std::time::Duration;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failures on the path between this service and an upstream chatbot.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("{0} is not defined")]
    MissingUrl(&'static str),

    #[error("Application Chatbot API error: {0}")]
    UpstreamStatus(u16),

    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream stalled for {0:?}")]
    ReadTimeout(Duration),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Chatbot(#[from] RelayError),

    #[error("Failed to fetch recommendations")]
    Recommendations(#[source] RelayError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::BadRequest(reason) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "message": format!("Error from Application Chatbot: {reason}") })),
            )
                .into_response(),
            AppError::Chatbot(err) => {
                error!(%err, "application chatbot request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "message": format!("Error from Application Chatbot: {err}") })),
                )
                    .into_response()
            }
            AppError::Recommendations(err) => {
                error!(%err, "error fetching prompt recommendations");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Failed to fetch recommendations" })),
                )
                    .into_response()
            }
        }
    }
}
