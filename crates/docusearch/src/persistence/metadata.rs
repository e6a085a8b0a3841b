//! Per-job metadata documents (`<metadata_dir>/<job_id>.json`).

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::StorageError;
use crate::jobs::record::JobRecord;
use crate::persistence::recovery::PartialJobRecord;

pub fn metadata_path(dir: &Path, job_id: &str) -> PathBuf {
    dir.join(format!("{}.json", job_id))
}

/// Writes the record without its `results`, which live in the results log.
pub fn save_metadata(dir: &Path, record: &JobRecord) -> Result<(), StorageError> {
    let path = metadata_path(dir, &record.id);
    let mut value = serde_json::to_value(record).map_err(|e| StorageError::Encode {
        path: path.clone(),
        source: e,
    })?;
    if let Value::Object(map) = &mut value {
        map.remove("results");
    }
    super::write_json_atomic(&path, &value)
}

pub fn load_metadata(path: &Path) -> Result<Option<PartialJobRecord>, StorageError> {
    super::read_json(path)
}

pub fn remove_metadata(dir: &Path, job_id: &str) -> Result<bool, StorageError> {
    super::remove_if_exists(&metadata_path(dir, job_id))
}

/// Job ids with a metadata document in `dir`.
pub fn metadata_job_ids(dir: &Path) -> Result<Vec<String>, StorageError> {
    Ok(super::list_files(dir, "json")?
        .iter()
        .filter_map(|path| path.file_stem())
        .map(|stem| stem.to_string_lossy().to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::record::{DataSource, FileResult};
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn test_saved_metadata_omits_results() {
        let dir = TempDir::new().unwrap();
        let mut record = JobRecord::new("a1b2c3d4", 2, vec!["title".to_string()], DataSource::Local);
        record
            .apply_result(FileResult::success("one.pdf", None), Utc::now())
            .unwrap();

        save_metadata(dir.path(), &record).unwrap();

        let raw = std::fs::read_to_string(metadata_path(dir.path(), "a1b2c3d4")).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert!(value.get("results").is_none());
        assert_eq!(value["processed_files"], 1);
        assert_eq!(value["skipped_reasons"]["page_limit"], 0);
        // Pretty-printed.
        assert!(raw.contains('\n'));

        let loaded = load_metadata(&metadata_path(dir.path(), "a1b2c3d4"))
            .unwrap()
            .unwrap()
            .into_record("unused");
        assert_eq!(loaded.id, "a1b2c3d4");
        assert_eq!(loaded.status, record.status);
        assert_eq!(loaded.start_time, record.start_time);
        assert_eq!(loaded.metadata_options, vec!["title".to_string()]);
        assert!(loaded.results.is_empty());
    }

    #[test]
    fn test_remove_and_list() {
        let dir = TempDir::new().unwrap();
        for id in ["bbbb0000", "aaaa0000"] {
            save_metadata(dir.path(), &JobRecord::new(id, 1, Vec::new(), DataSource::Local))
                .unwrap();
        }

        assert_eq!(metadata_job_ids(dir.path()).unwrap(), vec!["aaaa0000", "bbbb0000"]);
        assert!(remove_metadata(dir.path(), "aaaa0000").unwrap());
        assert!(!remove_metadata(dir.path(), "aaaa0000").unwrap());
        assert_eq!(metadata_job_ids(dir.path()).unwrap(), vec!["bbbb0000"]);
    }
}
