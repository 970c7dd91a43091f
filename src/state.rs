// src/state.rs
use std::sync::Arc;

use crate::config::Config;
use crate::services::metrics_manager::MetricsManager;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: Config,
    pub http: reqwest::Client,
    pub metrics: MetricsManager,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        // no overall timeout: relayed responses stay open for as long as the upstream streams.
        // read_timeout bounds each read, including the wait for response headers.
        let http = reqwest::Client::builder()
            .connect_timeout(config.relay.connect_timeout)
            .read_timeout(config.relay.read_timeout)
            .build()?;

        Ok(Self {
            config,
            http,
            metrics: MetricsManager::new(),
        })
    }
}
