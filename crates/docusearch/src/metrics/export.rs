//! JSON and Prometheus views over a single metrics snapshot.

use chrono::{DateTime, Utc};
use prometheus::{Counter, Encoder, Gauge, Opts, Registry, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ExportError;

/// Prefix shared by every exported Prometheus metric.
pub const NAMESPACE: &str = "docusearch";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobMetrics {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub currently_processing: u64,
    pub p50_latency_seconds: f64,
    pub p95_latency_seconds: f64,
    pub avg_processing_time_seconds: f64,
    pub latency_samples: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetrics {
    pub total_processed: u64,
    pub total_successful: u64,
    pub total_failed: u64,
    pub total_skipped: u64,
    pub p50_processing_time_seconds: f64,
    pub p95_processing_time_seconds: f64,
    pub avg_processing_time_seconds: f64,
    pub total_processing_time_seconds: f64,
    pub processing_time_samples: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemMetrics {
    pub uptime_seconds: f64,
    pub metrics_collection_start: DateTime<Utc>,
}

/// Everything the metrics endpoints report, computed once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsSnapshot {
    pub jobs: JobMetrics,
    pub documents: DocumentMetrics,
    pub system: SystemMetrics,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

/// One Prometheus series and the snapshot field it is read from.
#[derive(Debug, Clone, Copy)]
pub struct ExportedMetric {
    /// Name without the namespace prefix.
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    /// JSON pointer into the serialized snapshot.
    pub pointer: &'static str,
}

impl ExportedMetric {
    pub fn full_name(&self) -> String {
        format!("{}_{}", NAMESPACE, self.name)
    }
}

const fn counter(name: &'static str, help: &'static str, pointer: &'static str) -> ExportedMetric {
    ExportedMetric {
        name,
        help,
        kind: MetricKind::Counter,
        pointer,
    }
}

const fn gauge(name: &'static str, help: &'static str, pointer: &'static str) -> ExportedMetric {
    ExportedMetric {
        name,
        help,
        kind: MetricKind::Gauge,
        pointer,
    }
}

pub const EXPORTED_METRICS: &[ExportedMetric] = &[
    counter("jobs_total", "Finished jobs", "/jobs/total"),
    counter("jobs_successful_total", "Jobs that completed", "/jobs/successful"),
    counter("jobs_failed_total", "Jobs that failed", "/jobs/failed"),
    gauge(
        "jobs_processing_current",
        "Jobs currently pending or processing",
        "/jobs/currently_processing",
    ),
    gauge(
        "job_latency_p50_seconds",
        "Median job duration over the rolling window",
        "/jobs/p50_latency_seconds",
    ),
    gauge(
        "job_latency_p95_seconds",
        "95th percentile job duration over the rolling window",
        "/jobs/p95_latency_seconds",
    ),
    gauge(
        "job_processing_time_avg_seconds",
        "Mean job duration over the rolling window",
        "/jobs/avg_processing_time_seconds",
    ),
    gauge(
        "job_latency_samples",
        "Samples in the job latency window",
        "/jobs/latency_samples",
    ),
    counter(
        "documents_processed_total",
        "Documents processed, including skipped",
        "/documents/total_processed",
    ),
    counter(
        "documents_successful_total",
        "Documents processed successfully",
        "/documents/total_successful",
    ),
    counter(
        "documents_failed_total",
        "Documents that failed processing",
        "/documents/total_failed",
    ),
    counter(
        "documents_skipped_total",
        "Documents skipped before processing",
        "/documents/total_skipped",
    ),
    counter(
        "document_processing_time_seconds_total",
        "Cumulative document processing time",
        "/documents/total_processing_time_seconds",
    ),
    gauge(
        "document_processing_time_p50_seconds",
        "Median document processing time over the rolling window",
        "/documents/p50_processing_time_seconds",
    ),
    gauge(
        "document_processing_time_p95_seconds",
        "95th percentile document processing time over the rolling window",
        "/documents/p95_processing_time_seconds",
    ),
    gauge(
        "document_processing_time_avg_seconds",
        "Mean document processing time over the rolling window",
        "/documents/avg_processing_time_seconds",
    ),
    gauge(
        "document_processing_time_samples",
        "Samples in the document processing time window",
        "/documents/processing_time_samples",
    ),
    gauge(
        "system_uptime_seconds",
        "Seconds since metrics collection started",
        "/system/uptime_seconds",
    ),
];

impl MetricsSnapshot {
    pub fn to_json_value(&self) -> Result<Value, ExportError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Renders the snapshot in the Prometheus text exposition format.
    ///
    /// Every series is read from the same serialized snapshot that backs
    /// [`MetricsSnapshot::to_json`], so both views always agree.
    pub fn to_prometheus_text(&self) -> Result<String, ExportError> {
        let value = self.to_json_value()?;
        let registry = Registry::new_custom(Some(NAMESPACE.to_string()), None)?;

        for metric in EXPORTED_METRICS {
            let reading = value
                .pointer(metric.pointer)
                .and_then(Value::as_f64)
                .unwrap_or(0.0);
            let opts = Opts::new(metric.name, metric.help);

            match metric.kind {
                MetricKind::Counter => {
                    let series = Counter::with_opts(opts)?;
                    series.inc_by(reading.max(0.0));
                    registry.register(Box::new(series))?;
                }
                MetricKind::Gauge => {
                    let series = Gauge::with_opts(opts)?;
                    series.set(reading);
                    registry.register(Box::new(series))?;
                }
            }
        }

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Parses `name value` sample lines from Prometheus text, skipping comments.
pub fn parse_prometheus_samples(text: &str) -> Vec<(String, f64)> {
    text.lines()
        .filter(|line| !line.starts_with('#') && !line.trim().is_empty())
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let name = parts.next()?;
            let value = parts.next()?.parse().ok()?;
            Some((name.to_string(), value))
        })
        .collect()
}
