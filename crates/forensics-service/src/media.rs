//! ffmpeg-backed media resources and payload loading for queued items.

use async_trait::async_trait;
use base64::Engine;
use common::errors::CaptureError;
use common::frame_extractor::{extract_frame_at, probe_video};
use common::media::{MediaKind, MediaOpener, MediaPayload, MediaResource};
use common::queue::MediaSource;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Capture settings for ffmpeg-backed resources
#[derive(Debug, Clone, Copy)]
pub struct CaptureSettings {
    /// Output width in pixels (0 = native)
    pub width: u32,
    /// JPEG quality (2-31, lower is better)
    pub quality: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            width: 0,
            quality: 4,
        }
    }
}

/// A video file on local disk, probed once when opened
pub struct FfmpegVideo {
    path: PathBuf,
    duration_secs: f64,
    width: u32,
    height: u32,
    settings: CaptureSettings,
    released: AtomicBool,
}

impl FfmpegVideo {
    pub async fn open(path: &Path, settings: CaptureSettings) -> Result<Self, CaptureError> {
        let probe = probe_video(path)
            .await
            .map_err(|e| CaptureError::Unreadable(format!("{}: {:#}", path.display(), e)))?;

        Ok(Self {
            path: path.to_path_buf(),
            duration_secs: probe.duration_secs,
            width: probe.width,
            height: probe.height,
            settings,
            released: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl MediaResource for FfmpegVideo {
    fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    async fn grab_frame(&self, timestamp: f64) -> Result<Vec<u8>, CaptureError> {
        if self.released.load(Ordering::Acquire) {
            return Err(CaptureError::frame(timestamp, "resource already released"));
        }
        if !self.path.exists() {
            return Err(CaptureError::Unreadable(format!(
                "{} no longer exists",
                self.path.display()
            )));
        }

        // ffmpeg exits only after the frame at `timestamp` is fully decoded
        extract_frame_at(&self.path, timestamp, self.settings.width, self.settings.quality)
            .await
            .map_err(|e| CaptureError::frame(timestamp, format!("{:#}", e)))
    }

    async fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            debug!(video = %self.path.display(), "released capture resource");
        }
    }
}

/// Opens queued video items from local paths with ffmpeg
#[derive(Debug, Clone, Default)]
pub struct FfmpegOpener {
    settings: CaptureSettings,
}

impl FfmpegOpener {
    pub fn new(settings: CaptureSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl MediaOpener for FfmpegOpener {
    async fn open(&self, source: &MediaSource) -> Result<Arc<dyn MediaResource>, CaptureError> {
        match source {
            MediaSource::Path { path } => {
                let video = FfmpegVideo::open(path, self.settings).await?;
                Ok(Arc::new(video))
            }
            other => Err(CaptureError::Unreadable(format!(
                "video items need a file path, got a {} source",
                other.kind_name()
            ))),
        }
    }
}

/// Load the content of a non-segmented item for a single classification call
pub async fn load_payload(source: &MediaSource, kind: MediaKind) -> Result<MediaPayload, CaptureError> {
    let payload = match source {
        MediaSource::Text { text } => MediaPayload::Text(text.clone()),
        MediaSource::Inline { data } => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(data)
                .map_err(|e| CaptureError::Unreadable(format!("invalid base64 payload: {}", e)))?;
            MediaPayload::Binary(bytes)
        }
        MediaSource::Path { path } => {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|e| CaptureError::Unreadable(format!("{}: {}", path.display(), e)))?;
            if kind == MediaKind::Text {
                let text = String::from_utf8(bytes).map_err(|_| {
                    CaptureError::Unreadable(format!("{} is not valid UTF-8 text", path.display()))
                })?;
                MediaPayload::Text(text)
            } else {
                MediaPayload::Binary(bytes)
            }
        }
    };

    if payload.is_empty() {
        return Err(CaptureError::Unreadable("content is empty".to_string()));
    }
    Ok(payload)
}
