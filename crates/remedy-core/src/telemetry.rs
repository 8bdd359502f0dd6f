//! Telemetry-source seam
//!
//! The metrics/telemetry producer is an external collaborator. The Monitor
//! phase consumes it through [`TelemetrySource`]; the caller applies the
//! per-source timeout and folds readings into an observation snapshot.

use crate::error::TelemetryError;
use crate::types::ComplianceScore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One structured reading pulled from a telemetry source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReading {
    /// Compliance index reported by this source, if it carries one
    pub compliance: Option<ComplianceScore>,
    /// p95 latency in milliseconds, if reported
    pub latency_ms: Option<f64>,
    /// Requests per second, if reported
    pub throughput_rps: Option<f64>,
    /// Error fraction, if reported
    pub error_rate: Option<f64>,
    /// When the source last refreshed its data
    pub sampled_at: DateTime<Utc>,
}

impl SourceReading {
    /// Whether the reading is older than the given staleness bound.
    #[must_use]
    pub fn is_stale(&self, max_age: chrono::Duration) -> bool {
        Utc::now() - self.sampled_at > max_age
    }
}

/// Pull endpoint returning a structured metrics document.
///
/// Implementations must not block indefinitely; the Monitor phase wraps
/// every fetch in a timeout and degrades the snapshot on failure.
#[async_trait::async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Stable source name, used in degraded-snapshot reporting.
    fn name(&self) -> &str;

    /// Fetch the current reading.
    async fn fetch(&self) -> Result<SourceReading, TelemetryError>;
}
