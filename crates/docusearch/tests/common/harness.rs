//! Isolated data directory for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use docusearch::{Config, FileResult, JobStore, MetricsStore, SkipReason};

pub struct TestHarness {
    temp_dir: TempDir,
    pub config: Config,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = Config::with_data_dir(temp_dir.path());
        Self { temp_dir, config }
    }

    pub fn data_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn metrics(&self) -> Arc<MetricsStore> {
        Arc::new(MetricsStore::from_config(&self.config))
    }

    /// A store without recovery, as on first start.
    pub fn new_store(&self) -> JobStore {
        JobStore::new(&self.config, self.metrics())
    }

    /// A store that recovers whatever is on disk, as after a restart.
    pub fn open_store(&self) -> JobStore {
        JobStore::open(&self.config, self.metrics())
    }

    pub fn results_log_path(&self, job_id: &str) -> PathBuf {
        self.config
            .results_dir()
            .join(format!("job_{}_results.jsonl", job_id))
    }

    pub fn write_metadata_raw(&self, job_id: &str, content: &str) {
        let dir = self.config.metadata_dir();
        std::fs::create_dir_all(&dir).expect("Failed to create metadata dir");
        std::fs::write(dir.join(format!("{}.json", job_id)), content)
            .expect("Failed to write metadata");
    }

    pub fn write_results_raw(&self, job_id: &str, content: &str) {
        std::fs::create_dir_all(self.config.results_dir()).expect("Failed to create results dir");
        std::fs::write(self.results_log_path(job_id), content).expect("Failed to write results");
    }

    /// Writes a parser output document owned by `job_id`.
    pub fn write_derived_document(&self, name: &str, job_id: &str) -> PathBuf {
        let dir = self.config.parsed_documents_dir();
        std::fs::create_dir_all(&dir).expect("Failed to create parsed documents dir");
        let path = dir.join(name);
        let body = serde_json::json!({
            "job_id": job_id,
            "filename": name,
            "content": "lorem ipsum",
        });
        std::fs::write(&path, body.to_string()).expect("Failed to write derived document");
        path
    }

    pub fn count_files(&self, dir: &Path) -> usize {
        match std::fs::read_dir(dir) {
            Ok(entries) => entries.filter_map(|e| e.ok()).count(),
            Err(_) => 0,
        }
    }
}

/// Success, failure and skip results, cycling.
pub fn mixed_result(i: usize) -> FileResult {
    let name = format!("file_{:03}.pdf", i);
    match i % 4 {
        0 | 1 => FileResult::success(&name, Some(serde_json::json!({"title": name.clone()})))
            .with_duration((i % 7 + 1) as f64 / 10.0),
        2 => FileResult::failure(&name, "parser timed out").with_duration(0.5),
        _ => FileResult::skipped(&name, SkipReason::SizeLimit, "file too large"),
    }
}
