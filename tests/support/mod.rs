//! Fakes shared by the integration tests: scripted videos, a timestamp-keyed
//! classifier and a service state wired to a temporary history file.

#![allow(dead_code)]

use async_trait::async_trait;
use common::analysis::{AnalysisConfig, FrameResult, KeyFeature};
use common::errors::{CaptureError, ClassificationError};
use common::media::{ClassifyRequest, MediaKind, MediaOpener, MediaPayload, MediaResource};
use common::queue::{EnqueueRequest, MediaSource};
use forensics_service::classifier::Classifier;
use forensics_service::history::JsonFileHistory;
use forensics_service::ForensicsServiceState;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Behaviour of one fake video file
#[derive(Debug, Clone, Default)]
pub struct VideoScript {
    pub duration: f64,
    pub failing: Vec<f64>,
    pub unreadable: bool,
}

pub struct ScriptedVideo {
    script: VideoScript,
}

#[async_trait]
impl MediaResource for ScriptedVideo {
    fn duration_secs(&self) -> f64 {
        self.script.duration
    }

    fn dimensions(&self) -> (u32, u32) {
        (1280, 720)
    }

    async fn grab_frame(&self, timestamp: f64) -> Result<Vec<u8>, CaptureError> {
        if self.script.failing.contains(&timestamp) {
            return Err(CaptureError::frame(timestamp, "seek did not settle"));
        }
        Ok(vec![0xFF, 0xD8, timestamp as u8])
    }
}

/// Opens fake videos by path; unknown paths are unreadable
#[derive(Default)]
pub struct ScriptedOpener {
    videos: HashMap<PathBuf, VideoScript>,
}

impl ScriptedOpener {
    pub fn with_video(mut self, path: &str, script: VideoScript) -> Self {
        self.videos.insert(PathBuf::from(path), script);
        self
    }
}

#[async_trait]
impl MediaOpener for ScriptedOpener {
    async fn open(&self, source: &MediaSource) -> Result<Arc<dyn MediaResource>, CaptureError> {
        let MediaSource::Path { path } = source else {
            return Err(CaptureError::Unreadable("not a path".into()));
        };
        match self.videos.get(path) {
            Some(script) if !script.unreadable => Ok(Arc::new(ScriptedVideo {
                script: script.clone(),
            })),
            _ => Err(CaptureError::Unreadable(format!("{} cannot be decoded", path.display()))),
        }
    }
}

/// Scores frames by their timestamp (third byte of the fake JPEG) and text
/// by a fixed probability. Timestamps listed in `hang_at` never answer.
pub struct TimestampClassifier {
    pub frame_scores: HashMap<u8, f64>,
    pub text_score: f64,
    pub hang_at: Vec<u8>,
    pub calls: AtomicUsize,
}

impl TimestampClassifier {
    pub fn new(frame_scores: &[(u8, f64)]) -> Self {
        Self {
            frame_scores: frame_scores.iter().copied().collect(),
            text_score: 25.0,
            hang_at: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for TimestampClassifier {
    fn id(&self) -> &'static str {
        "timestamp"
    }

    async fn classify(&self, request: &ClassifyRequest) -> Result<FrameResult, ClassificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let probability_ai = match (&request.payload, request.media_kind) {
            (MediaPayload::Text(_), _) => self.text_score,
            (MediaPayload::Binary(bytes), MediaKind::Image) if bytes.len() == 3 => {
                let second = bytes[2];
                if self.hang_at.contains(&second) {
                    std::future::pending::<()>().await;
                }
                *self.frame_scores.get(&second).ok_or_else(|| {
                    ClassificationError::Status {
                        status: 500,
                        body: format!("no score scripted for t={second}"),
                    }
                })?
            }
            _ => 50.0,
        };

        Ok(FrameResult {
            probability_ai,
            confidence: 80.0,
            reasoning: format!("scripted verdict {probability_ai}"),
            key_features: vec![KeyFeature::new("texture blur", probability_ai)],
        })
    }
}

pub struct TestService {
    pub state: ForensicsServiceState,
    pub classifier: Arc<TimestampClassifier>,
    pub history_path: PathBuf,
    _dir: TempDir,
}

pub fn service(classifier: TimestampClassifier, opener: ScriptedOpener) -> TestService {
    let dir = tempfile::tempdir().unwrap();
    let history_path = dir.path().join("history.json");
    let classifier = Arc::new(classifier);
    let state = ForensicsServiceState::new(
        "test-node".to_string(),
        classifier.clone(),
        Arc::new(JsonFileHistory::new(&history_path, 50)),
        Arc::new(opener),
        AnalysisConfig::default(),
    );
    TestService {
        state,
        classifier,
        history_path,
        _dir: dir,
    }
}

pub fn video_request(id: &str, path: &str) -> EnqueueRequest {
    EnqueueRequest {
        id: Some(id.to_string()),
        file_name: Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        media_kind: MediaKind::Video,
        mime_type: "video/mp4".to_string(),
        source: MediaSource::Path {
            path: PathBuf::from(path),
        },
    }
}

pub fn text_request(id: &str, text: &str) -> EnqueueRequest {
    EnqueueRequest {
        id: Some(id.to_string()),
        file_name: format!("{id}.txt"),
        media_kind: MediaKind::Text,
        mime_type: "text/plain".to_string(),
        source: MediaSource::Text {
            text: text.to_string(),
        },
    }
}

/// Poll `check` until it holds or roughly two seconds pass
pub async fn wait_for(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
