// src/services/upstream.rs
use std::time::Duration;

use reqwest::{Client, Response};
use tracing::{debug, warn};

use crate::{error::RelayError, message::UpstreamQuestion};

/// How often to retry the initial upstream request after a connection failure.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: Duration,
}

/// POST a question upstream. Only connection failures are retried; any
/// non-success status is returned as [`RelayError::UpstreamStatus`].
pub async fn post_question(
    client: &Client,
    url: &str,
    question: &UpstreamQuestion<'_>,
    retry: &RetryPolicy,
) -> Result<Response, RelayError> {
    let mut attempt = 0;
    loop {
        match client.post(url).json(question).send().await {
            Ok(response) => {
                let status = response.status();
                if !status.is_success() {
                    return Err(RelayError::UpstreamStatus(status.as_u16()));
                }
                debug!(%status, attempt, "upstream accepted question");
                return Ok(response);
            }
            Err(err) if err.is_connect() && attempt < retry.retries => {
                attempt += 1;
                warn!(%err, attempt, "upstream connection failed, retrying");
                tokio::time::sleep(retry.backoff).await;
            }
            Err(err) => return Err(RelayError::Transport(err)),
        }
    }
}
