//! Queue contracts: queued items, partial updates and the result sink.

use crate::analysis::{CompositeResult, SessionState, SessionStatus};
use crate::media::MediaKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the content of a queued item lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaSource {
    /// File on the service host (required for video)
    Path { path: PathBuf },

    /// Raw text content
    Text { text: String },

    /// Base64-encoded bytes
    Inline { data: String },
}

impl MediaSource {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Path { .. } => "path",
            Self::Text { .. } => "text",
            Self::Inline { .. } => "inline",
        }
    }
}

/// Request to add an item to the analysis queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueRequest {
    /// Caller-chosen id (a UUID is generated when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Display name of the submitted content
    pub file_name: String,

    pub media_kind: MediaKind,

    /// MIME type reported by ingestion (e.g. "video/mp4")
    pub mime_type: String,

    pub source: MediaSource,
}

/// An item in the analysis queue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    pub file_name: String,
    pub media_kind: MediaKind,
    pub mime_type: String,
    pub source: MediaSource,

    /// Lifecycle and progress of the current (or last) session
    pub state: SessionState,

    /// Latest composite result, intermediate or final
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<CompositeResult>,

    pub created_at: DateTime<Utc>,
}

impl QueueItem {
    pub fn new(id: String, request: EnqueueRequest) -> Self {
        Self {
            id,
            file_name: request.file_name,
            media_kind: request.media_kind,
            mime_type: request.mime_type,
            source: request.source,
            state: SessionState::default(),
            result: None,
            created_at: Utc::now(),
        }
    }

    /// Merge a partial update into this item
    pub fn apply(&mut self, update: ItemUpdate) {
        if let Some(status) = update.status {
            self.state.status = status;
        }
        if let Some(processed) = update.segments_processed {
            self.state.segments_processed = processed;
        }
        if let Some(total) = update.total_segments {
            self.state.total_segments = total;
        }
        if let Some(result) = update.result {
            self.result = Some(result);
        }
        if let Some(error) = update.error {
            self.state.last_error = Some(error);
        }
    }
}

/// Partial update pushed by a session; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub segments_processed: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_segments: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<CompositeResult>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemUpdate {
    pub fn status(status: SessionStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(SessionStatus::Error),
            error: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_progress(mut self, processed: u32, total: u32) -> Self {
        self.segments_processed = Some(processed);
        self.total_segments = Some(total);
        self
    }

    pub fn with_result(mut self, result: CompositeResult) -> Self {
        self.result = Some(result);
        self
    }
}

/// UI-facing store receiving lifecycle and result updates.
///
/// Publishing is fire-and-forget and must never block a session.
pub trait ResultSink: Send + Sync {
    fn publish(&self, item_id: &str, update: ItemUpdate);
}

/// List of queued items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueListResponse {
    pub items: Vec<QueueItem>,
}
