use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::{CompositeResult, Verdict};
use crate::media::MediaKind;

/// A finalized analysis kept for later replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub recorded_at: DateTime<Utc>,
    pub media_kind: MediaKind,
    pub label: Verdict,
    pub file_name: String,
    pub mime_type: String,

    /// Original content, kept for text items only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,

    pub result: CompositeResult,
}

impl HistoryEntry {
    pub fn new(
        result: CompositeResult,
        media_kind: MediaKind,
        raw_content: Option<String>,
        mime_type: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            recorded_at: Utc::now(),
            media_kind,
            label: result.label,
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            raw_content,
            result,
        }
    }
}

/// Persistence for finalized results. Callers treat failures as best effort.
#[async_trait]
pub trait HistoryWriter: Send + Sync {
    async fn record(&self, entry: HistoryEntry) -> Result<()>;

    /// Newest first
    async fn list(&self) -> Result<Vec<HistoryEntry>>;

    async fn clear(&self) -> Result<()>;
}

/// List of history entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryListResponse {
    pub entries: Vec<HistoryEntry>,
}
