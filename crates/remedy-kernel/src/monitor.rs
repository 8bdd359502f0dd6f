//! Monitor phase: concurrent telemetry fan-out
//!
//! Each source fetch runs in parallel and is independently bounded by the
//! configured timeout. A failed or timed-out source marks the snapshot
//! degraded and is named in `stale_sources`; the tick always proceeds.

use remedy_core::error::TelemetryError;
use remedy_core::{
    ComplianceScore, MetricsSample, ObservationSnapshot, SourceReading, TelemetrySource,
};
use std::sync::Arc;
use std::time::Duration;

/// Pulls one observation snapshot per tick from the telemetry sources.
pub struct Monitor {
    sources: Vec<Arc<dyn TelemetrySource>>,
    timeout: Duration,
}

impl Monitor {
    /// Monitor over the given sources with a per-source fetch timeout.
    #[must_use]
    pub fn new(sources: Vec<Arc<dyn TelemetrySource>>, timeout: Duration) -> Self {
        Self { sources, timeout }
    }

    /// Assemble the tick's snapshot.
    ///
    /// The compliance index is the minimum across reporting sources (the
    /// most pessimistic view gates H0); raw metrics are averaged. With no
    /// sources or no compliance report at all, the snapshot is degraded
    /// with a zero score, which forces the safe hold downstream.
    pub async fn observe(&self) -> ObservationSnapshot {
        if self.sources.is_empty() {
            tracing::warn!("no telemetry sources configured; degraded snapshot");
            return ObservationSnapshot::degraded(
                ComplianceScore::new(0.0),
                MetricsSample::default(),
                vec!["<none>".to_string()],
            );
        }

        let fetches = self.sources.iter().map(|source| {
            let source = source.clone();
            let timeout = self.timeout;
            async move {
                let name = source.name().to_string();
                let result = match tokio::time::timeout(timeout, source.fetch()).await {
                    Ok(result) => result,
                    Err(_) => Err(TelemetryError::Timeout {
                        source: name.clone(),
                        timeout_ms: timeout.as_millis() as u64,
                    }),
                };
                (name, result)
            }
        });
        let results = futures::future::join_all(fetches).await;

        let mut stale = Vec::new();
        let mut readings: Vec<SourceReading> = Vec::new();
        for (name, result) in results {
            match result {
                Ok(reading) => readings.push(reading),
                Err(err) => {
                    tracing::warn!(source = %name, error = %err, "telemetry source degraded");
                    stale.push(name);
                }
            }
        }

        let compliance = readings
            .iter()
            .filter_map(|r| r.compliance)
            .min_by(|a, b| a.value().total_cmp(&b.value()));
        let metrics = average_metrics(&readings);

        match compliance {
            Some(compliance) if stale.is_empty() => {
                ObservationSnapshot::healthy(compliance, metrics)
            }
            Some(compliance) => ObservationSnapshot::degraded(compliance, metrics, stale),
            None => {
                stale.push("<no-compliance-report>".to_string());
                ObservationSnapshot::degraded(ComplianceScore::new(0.0), metrics, stale)
            }
        }
    }
}

fn average_metrics(readings: &[SourceReading]) -> MetricsSample {
    let mut sample = MetricsSample::default();
    let mut latency_n = 0u32;
    let mut throughput_n = 0u32;
    let mut error_n = 0u32;
    for reading in readings {
        if let Some(v) = reading.latency_ms {
            sample.latency_ms += v;
            latency_n += 1;
        }
        if let Some(v) = reading.throughput_rps {
            sample.throughput_rps += v;
            throughput_n += 1;
        }
        if let Some(v) = reading.error_rate {
            sample.error_rate += v;
            error_n += 1;
        }
    }
    if latency_n > 0 {
        sample.latency_ms /= f64::from(latency_n);
    }
    if throughput_n > 0 {
        sample.throughput_rps /= f64::from(throughput_n);
    }
    if error_n > 0 {
        sample.error_rate /= f64::from(error_n);
    }
    sample
}

#[cfg(test)]
mod tests {
    use super::*;
    use remedy_test_utils::{HangingTelemetry, ScriptedTelemetry};

    #[tokio::test]
    async fn compliance_is_the_minimum_across_sources() {
        let monitor = Monitor::new(
            vec![
                Arc::new(ScriptedTelemetry::new("a", [99.0])),
                Arc::new(ScriptedTelemetry::new("b", [96.5])),
            ],
            Duration::from_millis(500),
        );
        let snapshot = monitor.observe().await;
        assert!(!snapshot.degraded);
        assert_eq!(snapshot.compliance.value(), 96.5);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_source_degrades_but_never_aborts() {
        let monitor = Monitor::new(
            vec![
                Arc::new(ScriptedTelemetry::new("fast", [98.0])),
                Arc::new(HangingTelemetry::new("slow")),
            ],
            Duration::from_millis(500),
        );
        let snapshot = monitor.observe().await;
        assert!(snapshot.degraded);
        assert_eq!(snapshot.stale_sources, vec!["slow".to_string()]);
        assert_eq!(snapshot.compliance.value(), 98.0);
    }

    #[tokio::test]
    async fn no_sources_forces_a_zero_score_degraded_snapshot() {
        let monitor = Monitor::new(Vec::new(), Duration::from_millis(500));
        let snapshot = monitor.observe().await;
        assert!(snapshot.degraded);
        assert_eq!(snapshot.compliance.value(), 0.0);
    }
}
