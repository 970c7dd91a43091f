// src/routes/mod.rs
pub mod admin;
pub mod chat;
pub mod recommendations;

use crate::state::SharedState;
use axum::{
    Router,
    routing::{get, post},
};
use admin::get_metrics_handler;
use chat::application_chatbot_handler;
use recommendations::prompt_recommendations_handler;
use tower_http::trace::TraceLayer;

pub fn create_router() -> Router<SharedState> {
    let admin_routes = Router::new().route("/metrics", get(get_metrics_handler));

    Router::new()
        .route("/api/chat/applicationChatbot", post(application_chatbot_handler))
        .route("/api/prompt-recommendations", post(prompt_recommendations_handler))
        .nest("/admin", admin_routes)
        .route("/health", get(|| async { "OK" }))
        .layer(TraceLayer::new_for_http())
}
