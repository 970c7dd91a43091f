use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::advisor::Advisor;

#[derive(Debug, Default, Clone, Serialize)]
pub struct MetricsData {
    pub relays_started: u64,
    pub relays_completed: u64,
    pub relays_cancelled: u64,
    pub upstream_failures: u64,
    pub parse_errors: u64,
    pub advisor_handoffs: HashMap<String, u64>,
}

#[derive(Debug, Clone)]
pub struct MetricsManager {
    inner: Arc<RwLock<MetricsData>>,
}

impl Default for MetricsManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsManager {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MetricsData::default())),
        }
    }

    pub async fn record_started(&self) {
        self.inner.write().await.relays_started += 1;
    }

    pub async fn record_completed(&self) {
        self.inner.write().await.relays_completed += 1;
    }

    pub async fn record_cancelled(&self) {
        self.inner.write().await.relays_cancelled += 1;
    }

    pub async fn record_upstream_failure(&self) {
        self.inner.write().await.upstream_failures += 1;
    }

    pub async fn record_parse_error(&self) {
        self.inner.write().await.parse_errors += 1;
    }

    pub async fn record_handoff(&self, advisor: Advisor) {
        let mut data = self.inner.write().await;
        *data.advisor_handoffs.entry(advisor.to_string()).or_insert(0) += 1;
    }

    pub async fn get_metrics(&self) -> MetricsData {
        self.inner.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn handoffs_grouped_by_canonical_name() {
        let metrics = MetricsManager::new();
        metrics.record_handoff(Advisor::General).await;
        metrics.record_handoff(Advisor::General).await;
        metrics.record_handoff(Advisor::FinancialCost).await;
        metrics.record_started().await;

        let data = metrics.get_metrics().await;
        assert_eq!(data.advisor_handoffs.get("GeneralAdvisor"), Some(&2));
        assert_eq!(data.advisor_handoffs.get("FinancialCostAdvisor"), Some(&1));
        assert_eq!(data.relays_started, 1);
        assert_eq!(data.relays_completed, 0);
    }
}
