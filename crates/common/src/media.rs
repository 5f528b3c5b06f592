//! Media kinds, classifier request payloads and the media resource seam.

use crate::analysis::AnalysisConfig;
use crate::errors::CaptureError;
use crate::queue::MediaSource;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// MIME type of every frame captured from a video
pub const FRAME_MIME_TYPE: &str = "image/jpeg";

/// Kind of content submitted for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Text,
    Image,
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }

    /// Videos are analyzed progressively, one sampled frame at a time
    pub fn is_segmented(&self) -> bool {
        matches!(self, Self::Video)
    }

    /// Top-level MIME family expected for this kind (`None` for text, which
    /// accepts any `text/*` or structured text type)
    pub fn mime_prefix(&self) -> Option<&'static str> {
        match self {
            Self::Text => None,
            Self::Image => Some("image/"),
            Self::Audio => Some("audio/"),
            Self::Video => Some("video/"),
        }
    }
}

/// Content handed to the classifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaPayload {
    Text(String),
    Binary(Vec<u8>),
}

impl MediaPayload {
    pub fn len(&self) -> usize {
        match self {
            Self::Text(text) => text.len(),
            Self::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }
}

/// One classification call
#[derive(Debug, Clone)]
pub struct ClassifyRequest {
    pub media_kind: MediaKind,
    pub payload: MediaPayload,
    pub mime_type: String,
    /// Settings snapshot of the session issuing the request
    pub config: Arc<AnalysisConfig>,
}

impl ClassifyRequest {
    /// Request for a single JPEG frame sampled from a video
    pub fn frame(jpeg: Vec<u8>, config: Arc<AnalysisConfig>) -> Self {
        Self {
            media_kind: MediaKind::Image,
            payload: MediaPayload::Binary(jpeg),
            mime_type: FRAME_MIME_TYPE.to_string(),
            config,
        }
    }
}

/// Decodable video bound to one analysis session
#[async_trait]
pub trait MediaResource: Send + Sync {
    /// Total duration in seconds (never negative)
    fn duration_secs(&self) -> f64;

    /// Pixel dimensions (width, height)
    fn dimensions(&self) -> (u32, u32);

    /// Seek to `timestamp` and return a JPEG still of that instant.
    ///
    /// Must not return until the seek has settled; a frame grabbed earlier
    /// would be stale or black.
    async fn grab_frame(&self, timestamp: f64) -> Result<Vec<u8>, CaptureError>;

    /// Detach any capture resources held for this session
    async fn release(&self) {}
}

/// Turns a queued item's source into a seekable media resource
#[async_trait]
pub trait MediaOpener: Send + Sync {
    async fn open(&self, source: &MediaSource) -> Result<Arc<dyn MediaResource>, CaptureError>;
}
