//! Metrics aggregation across jobs, clearing, and the two export formats.

mod common;

use std::collections::HashMap;

use common::harness::mixed_result;
use common::TestHarness;
use docusearch::metrics::export::parse_prometheus_samples;
use docusearch::metrics::EXPORTED_METRICS;
use docusearch::{DataSource, JobStatus, MetricsStore, PersistencePolicy};

#[test]
fn test_delete_all_jobs_resets_everything() {
    let harness = TestHarness::new();
    let store = harness.new_store();

    let mut ids = Vec::new();
    for _ in 0..5 {
        let id = store.create_job(4, vec!["title".to_string()], DataSource::Local);
        for i in 0..4 {
            assert!(store.record_file_result(&id, mixed_result(i)));
        }
        ids.push(id);
    }
    for (n, id) in ids.iter().enumerate() {
        let status = if n == 4 {
            JobStatus::Failed
        } else {
            JobStatus::Completed
        };
        store.finalize_job(id, status);
    }
    for id in &ids[..2] {
        harness.write_derived_document(&format!("{}.json", id), id);
    }
    // A leftover log from a job this process never loaded.
    harness.write_results_raw(
        "orphan01",
        r#"{"job_id":"orphan01","status":"Completed","total_files":0}"#,
    );

    let before = store.metrics_snapshot();
    assert_eq!(before.jobs.total, 5);
    assert_eq!(before.jobs.successful, 4);
    assert_eq!(before.jobs.failed, 1);
    assert_eq!(before.documents.total_processed, 20);
    assert_eq!(before.documents.total_skipped, 5);
    assert_eq!(before.documents.processing_time_samples, 15);

    let summary = store.delete_all_jobs();
    assert_eq!(summary.jobs_deleted, 5);
    assert_eq!(summary.metadata_files_removed, 5);
    assert_eq!(summary.results_files_removed, 6);
    assert_eq!(summary.derived_documents_removed, 2);

    assert!(store.list_jobs().is_empty());
    assert_eq!(harness.count_files(&harness.config.metadata_dir()), 0);
    assert_eq!(harness.count_files(&harness.config.results_dir()), 0);
    assert_eq!(harness.count_files(&harness.config.parsed_documents_dir()), 0);

    let after = store.metrics_snapshot();
    assert_eq!(after.jobs.total, 0);
    assert_eq!(after.jobs.successful, 0);
    assert_eq!(after.jobs.failed, 0);
    assert_eq!(after.jobs.currently_processing, 0);
    assert_eq!(after.jobs.p95_latency_seconds, 0.0);
    assert_eq!(after.documents.total_processed, 0);
    assert_eq!(after.documents.total_processing_time_seconds, 0.0);
    assert_eq!(store.metrics().window_lengths(), (0, 0));
    assert!(after.system.metrics_collection_start >= before.system.metrics_collection_start);

    // The reset was persisted.
    let reopened = harness.open_store();
    assert!(reopened.is_empty());
    assert_eq!(reopened.metrics_snapshot().documents.total_processed, 0);
}

#[test]
fn test_prometheus_agrees_with_json() {
    let harness = TestHarness::new();
    let store = harness.new_store();

    let done = store.create_job(6, Vec::new(), DataSource::Local);
    for i in 0..6 {
        store.record_file_result(&done, mixed_result(i));
    }
    store.finalize_job(&done, JobStatus::Completed);
    let running = store.create_job(3, Vec::new(), DataSource::Local);
    store.record_file_result(&running, mixed_result(0));

    let snapshot = store.metrics_snapshot();
    let json = snapshot.to_json_value().unwrap();
    let text = snapshot.to_prometheus_text().unwrap();
    let samples: HashMap<String, f64> = parse_prometheus_samples(&text).into_iter().collect();

    assert_eq!(samples.len(), EXPORTED_METRICS.len());
    for metric in EXPORTED_METRICS {
        let from_json = json.pointer(metric.pointer).and_then(|v| v.as_f64()).unwrap();
        let from_text = samples[&metric.full_name()];
        assert!(
            (from_json - from_text).abs() < 1e-9,
            "{}: json {} vs prometheus {}",
            metric.full_name(),
            from_json,
            from_text
        );
    }
    assert_eq!(samples["docusearch_jobs_processing_current"], 1.0);
    assert_eq!(samples["docusearch_documents_processed_total"], 7.0);
}

#[test]
fn test_store_level_exports() {
    let harness = TestHarness::new();
    let store = harness.new_store();
    let id = store.create_job(2, Vec::new(), DataSource::Local);
    store.record_file_result(&id, mixed_result(0));

    let json: serde_json::Value = serde_json::from_str(&store.metrics_json()).unwrap();
    assert_eq!(json["jobs"]["currently_processing"], 1);
    assert_eq!(json["documents"]["total_successful"], 1);
    assert!(json["system"]["uptime_seconds"].as_f64().unwrap() >= 0.0);
    assert!(json["timestamp"].is_string());

    let text = store.metrics_prometheus();
    assert!(text.contains("# TYPE docusearch_documents_successful_total counter"));
    assert!(text.contains("docusearch_documents_successful_total 1"));
}

#[test]
fn test_nearest_rank_over_job_latencies() {
    let metrics = MetricsStore::in_memory(1000, 10_000);
    for d in [1.0, 2.0, 3.0, 4.0, 5.0] {
        metrics.record_job_completion(d, true);
    }

    let snapshot = metrics.snapshot(0);
    assert_eq!(snapshot.jobs.p50_latency_seconds, 3.0);
    assert_eq!(snapshot.jobs.p95_latency_seconds, 5.0);
    assert_eq!(snapshot.jobs.avg_processing_time_seconds, 3.0);
}

#[test]
fn test_debounced_metrics_flush() {
    let harness = TestHarness::new();
    let path = harness.config.metrics_path();
    let policy = PersistencePolicy::Debounced {
        interval: std::time::Duration::from_secs(3600),
    };

    let metrics = MetricsStore::open(&path, 10, 10, policy);
    metrics.record_job_completion(1.0, true);
    metrics.record_job_completion(2.0, true);
    metrics.flush();
    drop(metrics);

    let reopened = MetricsStore::open(&path, 10, 10, PersistencePolicy::EveryMutation);
    assert_eq!(reopened.snapshot(0).jobs.total, 2);
    assert_eq!(reopened.snapshot(0).jobs.avg_processing_time_seconds, 1.5);
}
