// src/services/relay.rs
use std::time::Duration;

use axum::body::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, Span, debug, error, info, warn};

use super::{
    decoder::{EventDecoder, RelayEvent},
    metrics_manager::MetricsManager,
};
use crate::error::RelayError;

#[derive(Debug, Clone)]
pub struct RelayOptions {
    pub read_timeout: Duration,
    pub max_buffer_bytes: usize,
    pub channel_capacity: usize,
}

pub type RelayStream = ReceiverStream<Result<Bytes, RelayError>>;

/// Start relaying `upstream` on its own task and return the plain-text token stream.
///
/// Dropping the returned stream cancels the task, which drops the upstream
/// body and with it the upstream connection.
pub fn spawn_relay<S>(
    upstream: S,
    options: RelayOptions,
    metrics: MetricsManager,
    span: Span,
) -> RelayStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(options.channel_capacity);
    tokio::spawn(run_relay(upstream, tx, options, metrics).instrument(span));
    ReceiverStream::new(rx)
}

async fn run_relay<S>(
    upstream: S,
    tx: mpsc::Sender<Result<Bytes, RelayError>>,
    options: RelayOptions,
    metrics: MetricsManager,
) where
    S: Stream<Item = Result<Bytes, reqwest::Error>>,
{
    let mut upstream = std::pin::pin!(upstream);
    let mut decoder = EventDecoder::new(options.max_buffer_bytes);

    loop {
        let read = tokio::select! {
            _ = tx.closed() => {
                info!("client went away, aborting upstream read");
                metrics.record_cancelled().await;
                return;
            }
            read = tokio::time::timeout(options.read_timeout, upstream.next()) => read,
        };

        let events = match read {
            Ok(Some(Ok(chunk))) => decoder.push(&chunk),
            Ok(None) => break,
            Ok(Some(Err(err))) => {
                error!(%err, "upstream stream broke mid-response");
                metrics.record_upstream_failure().await;
                let _ = tx.send(Err(RelayError::Transport(err))).await;
                return;
            }
            Err(_) => {
                warn!(timeout = ?options.read_timeout, "upstream stalled");
                metrics.record_upstream_failure().await;
                let _ = tx.send(Err(RelayError::ReadTimeout(options.read_timeout))).await;
                return;
            }
        };

        if !forward(&tx, events, &metrics).await {
            metrics.record_cancelled().await;
            return;
        }
    }

    if forward(&tx, decoder.finish(), &metrics).await {
        debug!("upstream exhausted");
        metrics.record_completed().await;
    } else {
        metrics.record_cancelled().await;
    }
}

/// Send decoded tokens downstream. Returns false once the client is gone.
async fn forward(
    tx: &mpsc::Sender<Result<Bytes, RelayError>>,
    events: Vec<RelayEvent>,
    metrics: &MetricsManager,
) -> bool {
    for event in events {
        match &event {
            RelayEvent::ParseError(failure) => {
                warn!(?failure, "dropped unparseable upstream content");
                metrics.record_parse_error().await;
            }
            RelayEvent::Handoff { advisor, .. } => {
                debug!(%advisor, "advisor handoff");
                metrics.record_handoff(*advisor).await;
            }
            RelayEvent::Message(_) => {}
        }

        let Some(token) = event.into_token() else { continue };
        if tx.send(Ok(Bytes::from(token))).await.is_err() {
            info!("client went away mid-response");
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    fn options() -> RelayOptions {
        RelayOptions {
            read_timeout: Duration::from_secs(5),
            max_buffer_bytes: 1024,
            channel_capacity: 4,
        }
    }

    async fn collect(stream: RelayStream) -> Vec<String> {
        stream
            .map(|item| String::from_utf8(item.unwrap().to_vec()).unwrap())
            .collect()
            .await
    }

    #[tokio::test]
    async fn relays_tokens_in_order() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from_static(b"{\"next\":\"GeneralAdvisor\"}\n")),
            Ok(Bytes::from_static(b"{\"message\":\"Hello\"}\n")),
        ];
        let metrics = MetricsManager::new();
        let out = spawn_relay(stream::iter(chunks), options(), metrics.clone(), Span::none());

        assert_eq!(collect(out).await, vec!["GeneralAdvisor", "Hello"]);
        let data = metrics.get_metrics().await;
        assert_eq!(data.relays_completed, 1);
        assert_eq!(data.advisor_handoffs.get("GeneralAdvisor"), Some(&1));
    }

    #[tokio::test]
    async fn stalled_upstream_times_out() {
        let upstream = stream::pending::<Result<Bytes, reqwest::Error>>();
        let metrics = MetricsManager::new();
        let opts = RelayOptions {
            read_timeout: Duration::from_millis(20),
            ..options()
        };
        let mut out = spawn_relay(upstream, opts, metrics.clone(), Span::none());

        assert!(matches!(out.next().await, Some(Err(RelayError::ReadTimeout(_)))));
        assert!(out.next().await.is_none());
        assert_eq!(metrics.get_metrics().await.upstream_failures, 1);
    }

    #[tokio::test]
    async fn dropping_the_body_cancels_the_relay() {
        let upstream = stream::pending::<Result<Bytes, reqwest::Error>>();
        let metrics = MetricsManager::new();
        let out = spawn_relay(upstream, options(), metrics.clone(), Span::none());
        drop(out);

        for _ in 0..50 {
            if metrics.get_metrics().await.relays_cancelled == 1 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("relay task did not observe the closed channel");
    }
}
