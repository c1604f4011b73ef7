// JSON export of a run for downstream reporting and content tools.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::pipeline::RunResult;

/// Write a run result as pretty-printed JSON, creating parent directories.
pub fn write_json(result: &RunResult, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }

    let file = File::create(path)
        .with_context(|| format!("Failed to create export file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, result).context("Failed to serialize run result")?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Read a previously exported run result back.
pub fn read_json(path: &Path) -> Result<RunResult> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not a keyplot export", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Snapshot;
    use chrono::Utc;

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/run.json");
        let result = RunResult {
            snapshot: Snapshot {
                taken_at: Utc::now(),
                provider_id: "local-hash-v1/256".to_string(),
                method: "graph".to_string(),
                degraded: false,
                keyword_count: 0,
                corpus_similarity: None,
                clusters: vec![],
            },
            opportunities: vec![],
            previous_taken_at: None,
            persisted: false,
        };

        write_json(&result, &path).unwrap();
        let back = read_json(&path).unwrap();
        assert_eq!(back.snapshot.method, "graph");
        assert!(!back.persisted);
    }

    #[test]
    fn test_read_rejects_other_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.json");
        std::fs::write(&path, "{\"hello\": 1}").unwrap();
        assert!(read_json(&path).is_err());
    }
}
