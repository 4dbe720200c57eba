//! Prometheus-backed [`MetricsProvider`] adapter.
//!
//! Thin wrapper over the `metrics` facade: every call builds a dynamic
//! [`Key`] from `name` + the caller's label map and forwards to whatever
//! recorder is globally installed. The composition root installs a
//! [`metrics_exporter_prometheus::PrometheusRecorder`] at startup via
//! [`metrics_exporter_prometheus::PrometheusBuilder::install_recorder`];
//! this adapter never touches the exporter directly, so swapping recorders
//! (statsd, a test recorder) needs no change here.

use async_trait::async_trait;
use convocore_domain::error::Result;
use convocore_domain::ports::providers::metrics::{MetricLabels, MetricsProvider};
use metrics::{Key, Label};

fn key_for(name: &str, labels: &MetricLabels) -> Key {
    let labels: Vec<Label> = labels
        .iter()
        .map(|(k, v)| Label::new(k.clone(), v.clone()))
        .collect();
    Key::from_parts(name.to_owned(), labels)
}

/// Records every [`MetricsProvider`] call against the globally installed
/// `metrics` recorder.
#[derive(Debug, Clone, Default)]
pub struct PrometheusMetricsProvider;

impl PrometheusMetricsProvider {
    /// Builds an adapter over whichever recorder is globally installed.
    /// Does not install one itself — see the composition root.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MetricsProvider for PrometheusMetricsProvider {
    fn name(&self) -> &str {
        "prometheus"
    }

    async fn increment(&self, name: &str, labels: &MetricLabels) -> Result<()> {
        metrics::counter!(key_for(name, labels)).increment(1);
        Ok(())
    }

    async fn increment_by(&self, name: &str, value: f64, labels: &MetricLabels) -> Result<()> {
        let whole = if value < 0.0 { 0 } else { value.round() as u64 };
        metrics::counter!(key_for(name, labels)).increment(whole);
        Ok(())
    }

    async fn gauge(&self, name: &str, value: f64, labels: &MetricLabels) -> Result<()> {
        metrics::gauge!(key_for(name, labels)).set(value);
        Ok(())
    }

    async fn histogram(&self, name: &str, value: f64, labels: &MetricLabels) -> Result<()> {
        metrics::histogram!(key_for(name, labels)).record(value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn calls_never_fail_without_an_installed_recorder() {
        let provider = PrometheusMetricsProvider::new();
        let labels: HashMap<String, String> =
            [("collection".to_owned(), "tasks".to_owned())].into();
        provider.increment("convocore_search_requests_total", &labels).await.unwrap();
        provider.gauge("convocore_active_indexing_jobs", 3.0, &HashMap::new()).await.unwrap();
        provider.histogram("convocore_index_duration_seconds", 0.5, &labels).await.unwrap();
    }
}
