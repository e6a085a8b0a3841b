//! Derived documents written by the parser (`<parsed_documents_dir>/*.json`).
//!
//! Each carries a top-level `job_id`; that is the only link back to its job.

use std::collections::HashSet;
use std::path::Path;

use serde_json::Value;

use crate::error::StorageError;

fn owning_job(path: &Path) -> Option<String> {
    match super::read_json::<Value>(path) {
        Ok(Some(value)) => value
            .get("job_id")
            .and_then(Value::as_str)
            .map(str::to_string),
        Ok(None) => None,
        Err(e) => {
            log::debug!("Skipping unreadable derived document: {}", e);
            None
        }
    }
}

/// Removes every derived document belonging to `job_id`. Returns how many
/// were removed.
pub fn remove_derived_documents(dir: &Path, job_id: &str) -> Result<usize, StorageError> {
    let mut ids = HashSet::new();
    ids.insert(job_id.to_string());
    remove_derived_documents_for(dir, &ids)
}

/// Removes every derived document whose `job_id` is in `job_ids`.
pub fn remove_derived_documents_for(
    dir: &Path,
    job_ids: &HashSet<String>,
) -> Result<usize, StorageError> {
    if job_ids.is_empty() {
        return Ok(0);
    }

    let mut removed = 0;
    for path in super::list_files(dir, "json")? {
        let Some(owner) = owning_job(&path) else {
            continue;
        };
        if job_ids.contains(&owner) && super::remove_if_exists(&path)? {
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_removes_only_matching_documents() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.json", r#"{"job_id": "j1", "filename": "a.pdf"}"#);
        write(dir.path(), "b.json", r#"{"job_id": "j2", "filename": "b.pdf"}"#);
        write(dir.path(), "c.json", r#"{"job_id": "j1", "filename": "c.pdf"}"#);
        write(dir.path(), "d.json", "not json");
        write(dir.path(), "e.json", r#"{"filename": "e.pdf"}"#);

        assert_eq!(remove_derived_documents(dir.path(), "j1").unwrap(), 2);
        assert!(!dir.path().join("a.json").exists());
        assert!(dir.path().join("b.json").exists());
        assert!(dir.path().join("d.json").exists());
        assert!(dir.path().join("e.json").exists());

        assert_eq!(remove_derived_documents(dir.path(), "j1").unwrap(), 0);
    }

    #[test]
    fn test_missing_directory() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("parsed_documents");
        assert_eq!(remove_derived_documents(&missing, "j1").unwrap(), 0);
    }

    #[test]
    fn test_remove_for_many_jobs() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.json", r#"{"job_id": "j1"}"#);
        write(dir.path(), "b.json", r#"{"job_id": "j2"}"#);
        write(dir.path(), "c.json", r#"{"job_id": "j3"}"#);

        let ids: HashSet<String> = ["j1", "j2"].iter().map(|s| s.to_string()).collect();
        assert_eq!(remove_derived_documents_for(dir.path(), &ids).unwrap(), 2);
        assert!(dir.path().join("c.json").exists());
    }
}
