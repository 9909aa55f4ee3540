//! Load history persistence.
//!
//! The most recent aggregate load is kept in `loads.json` so operators can
//! see the last known picture even while panels are unreachable. Writes go
//! to a uniquely named temp file followed by a rename, so concurrent requests
//! never leave a half-written file behind.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::scheduler::AggregateLoad;

/// Errors writing load history.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to write load history {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize load history: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Persisted load document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadRecord {
    #[serde(default)]
    pub loads: AggregateLoad,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

/// File-backed load history.
#[derive(Debug, Clone)]
pub struct LoadHistory {
    path: PathBuf,
}

impl LoadHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Last recorded load; empty when nothing usable is on disk.
    pub async fn load(&self) -> LoadRecord {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return LoadRecord::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read load history");
                return LoadRecord::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unparseable load history");
                LoadRecord::default()
            }
        }
    }

    /// Replace the recorded load.
    pub async fn record(
        &self,
        loads: AggregateLoad,
        recorded_at: DateTime<Utc>,
    ) -> Result<LoadRecord, HistoryError> {
        let record = LoadRecord {
            loads,
            recorded_at: Some(recorded_at),
        };
        let content = serde_json::to_string_pretty(&record)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| self.io_error(parent, source))?;
        }

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "loads.json".to_string());
        let tmp_path = self
            .path
            .with_file_name(format!("{file_name}.{}.tmp", Uuid::new_v4().simple()));

        tokio::fs::write(&tmp_path, content)
            .await
            .map_err(|source| self.io_error(&tmp_path, source))?;

        if let Err(source) = tokio::fs::rename(&tmp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(self.io_error(&self.path, source));
        }

        debug!(
            path = %self.path.display(),
            node_count = record.loads.len(),
            "Recorded load history"
        );

        Ok(record)
    }

    fn io_error(&self, path: &Path, source: std::io::Error) -> HistoryError {
        HistoryError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::BTreeMap;

    fn sample() -> AggregateLoad {
        let mut inbounds = BTreeMap::new();
        inbounds.insert("main".to_string(), 12);
        let mut loads = BTreeMap::new();
        loads.insert("fi-1".to_string(), inbounds);
        loads
    }

    #[tokio::test]
    async fn test_load_without_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let history = LoadHistory::new(dir.path().join("loads.json"));
        assert_eq!(history.load().await, LoadRecord::default());
    }

    #[tokio::test]
    async fn test_record_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let history = LoadHistory::new(dir.path().join("nested").join("loads.json"));
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let written = history.record(sample(), at).await.unwrap();
        let loaded = history.load().await;

        assert_eq!(written, loaded);
        assert_eq!(loaded.loads["fi-1"]["main"], 12);
        assert_eq!(loaded.recorded_at, Some(at));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_record_replaces_previous() {
        let dir = tempfile::tempdir().unwrap();
        let history = LoadHistory::new(dir.path().join("loads.json"));
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        history.record(sample(), at).await.unwrap();
        history.record(AggregateLoad::new(), at).await.unwrap();

        assert!(history.load().await.loads.is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loads.json");
        std::fs::write(&path, "garbage").unwrap();

        assert_eq!(LoadHistory::new(path).load().await, LoadRecord::default());
    }

    #[test]
    fn test_record_format() {
        let record = LoadRecord {
            loads: sample(),
            recorded_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["loads"]["fi-1"]["main"], 12);
        assert_eq!(json["recordedAt"], "2024-05-01T12:00:00Z");
    }
}
