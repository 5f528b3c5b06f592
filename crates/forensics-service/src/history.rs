use anyhow::{Context, Result};
use async_trait::async_trait;
use common::history::{HistoryEntry, HistoryWriter};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// History kept as a JSON array on local disk, newest entry first.
///
/// Every write replaces the whole file through a temp file and a rename, so
/// readers never observe a partially written list.
pub struct JsonFileHistory {
    path: PathBuf,
    limit: usize,
    // Serializes read-modify-write cycles
    write_lock: Mutex<()>,
}

impl JsonFileHistory {
    pub fn new(path: impl Into<PathBuf>, limit: usize) -> Self {
        Self {
            path: path.into(),
            limit: limit.max(1),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Vec<HistoryEntry>> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", self.path.display()))
            }
        };
        if data.is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&data)
            .with_context(|| format!("failed to parse history file {}", self.path.display()))
    }

    /// Move an unparseable history file out of the way so a fresh one can
    /// be started without losing its contents
    async fn quarantine(&self) -> Result<PathBuf> {
        let aside = self.path.with_extension("json.corrupt");
        tokio::fs::rename(&self.path, &aside)
            .await
            .with_context(|| format!("failed to move {} aside", self.path.display()))?;
        Ok(aside)
    }

    async fn store(&self, entries: &[HistoryEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_vec_pretty(entries).context("failed to serialize history")?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl HistoryWriter for JsonFileHistory {
    async fn record(&self, entry: HistoryEntry) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut entries = match self.load().await {
            Ok(entries) => entries,
            Err(e) => {
                if !tokio::fs::metadata(&self.path)
                    .await
                    .is_ok_and(|meta| meta.is_file())
                {
                    return Err(e);
                }
                let aside = self.quarantine().await?;
                warn!(error = %e, moved_to = %aside.display(), "set aside unreadable history file");
                Vec::new()
            }
        };
        debug!(entry_id = %entry.id, label = %entry.label, "recording history entry");
        entries.insert(0, entry);
        entries.truncate(self.limit);
        self.store(&entries).await
    }

    async fn list(&self) -> Result<Vec<HistoryEntry>> {
        let _guard = self.write_lock.lock().await;
        self.load().await
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.store(&[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::analysis::{CompositeResult, Verdict};
    use common::media::MediaKind;

    fn entry(name: &str, probability_ai: u8) -> HistoryEntry {
        let result = CompositeResult {
            probability_ai,
            confidence: 70,
            label: Verdict::finalized(probability_ai),
            reasoning: "summary".to_string(),
            key_features: Vec::new(),
            segments_analyzed: 1,
            total_segments: 1,
        };
        HistoryEntry::new(result, MediaKind::Image, None, "image/png", name)
    }

    #[tokio::test]
    async fn test_record_keeps_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let history = JsonFileHistory::new(dir.path().join("history.json"), DEFAULT_HISTORY_LIMIT);

        history.record(entry("first.png", 10)).await.unwrap();
        history.record(entry("second.png", 90)).await.unwrap();

        let entries = history.list().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].file_name, "second.png");
        assert_eq!(entries[0].label, Verdict::LikelyAi);
        assert_eq!(entries[1].file_name, "first.png");
    }

    #[tokio::test]
    async fn test_record_trims_to_limit() {
        let dir = tempfile::tempdir().unwrap();
        let history = JsonFileHistory::new(dir.path().join("nested/history.json"), 3);

        for i in 0..5 {
            history.record(entry(&format!("{i}.png"), 50)).await.unwrap();
        }

        let names: Vec<_> = history
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.file_name)
            .collect();
        assert_eq!(names, vec!["4.png", "3.png", "2.png"]);
        assert!(!dir.path().join("nested/history.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_file_lists_empty_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let history = JsonFileHistory::new(dir.path().join("history.json"), 10);
        assert!(history.list().await.unwrap().is_empty());

        history.record(entry("a.png", 1)).await.unwrap();
        history.clear().await.unwrap();
        assert!(history.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_set_aside_on_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "{not json").unwrap();
        let history = JsonFileHistory::new(&path, 10);

        assert!(history.list().await.is_err());
        history.record(entry("a.png", 1)).await.unwrap();
        assert_eq!(history.list().await.unwrap().len(), 1);

        let aside = dir.path().join("history.json.corrupt");
        assert_eq!(std::fs::read_to_string(aside).unwrap(), "{not json");
    }

    #[tokio::test]
    async fn test_unwritable_location_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();
        let history = JsonFileHistory::new(blocker.join("history.json"), 10);

        assert!(history.record(entry("a.png", 1)).await.is_err());
    }
}
