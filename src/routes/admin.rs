use axum::{
    Json,
    extract::{FromRequestParts, State},
    http::{StatusCode, request::Parts},
};
use tracing::warn;

use crate::{services::metrics_manager::MetricsData, state::SharedState};

/// Rejects the request unless `x-admin-key` matches the configured admin key.
pub struct AdminKey;

impl FromRequestParts<SharedState> for AdminKey {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.admin_key.as_deref() else {
            warn!("admin route hit but RELAY_ADMIN_KEY is not configured");
            return Err(StatusCode::UNAUTHORIZED);
        };

        match parts.headers.get("x-admin-key") {
            Some(val) if val == expected => Ok(AdminKey),
            _ => Err(StatusCode::UNAUTHORIZED),
        }
    }
}

pub async fn get_metrics_handler(
    _: AdminKey,
    State(state): State<SharedState>,
) -> Json<MetricsData> {
    Json(state.metrics.get_metrics().await)
}
