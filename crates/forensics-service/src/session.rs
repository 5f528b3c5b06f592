//! Analysis sessions: one controller drives one queued item from `queued`
//! to a terminal state, publishing every step to the result sink.

use crate::aggregate::{single_shot, AggregationEngine};
use crate::classifier::{classify_timed, Classifier};
use crate::media::load_payload;
use crate::sampler::{self, SampleSchedule};
use common::analysis::{AnalysisConfig, CompositeResult, FrameResult, SessionStatus};
use common::errors::AnalysisError;
use common::history::{HistoryEntry, HistoryWriter};
use common::media::{ClassifyRequest, MediaKind, MediaOpener, MediaPayload, MediaResource};
use common::queue::{ItemUpdate, MediaSource, QueueItem, ResultSink};
use std::sync::Arc;
use telemetry::metrics::{
    ACTIVE_SESSIONS, HISTORY_WRITE_FAILURES, SEGMENTS_PROCESSED, SESSIONS_COMPLETED,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Collaborators shared by every session of a service instance
#[derive(Clone)]
pub struct SessionServices {
    pub classifier: Arc<dyn Classifier>,
    pub sink: Arc<dyn ResultSink>,
    pub history: Arc<dyn HistoryWriter>,
}

/// The queued item a session works on
#[derive(Debug, Clone)]
pub struct SessionTarget {
    pub item_id: String,
    pub media_kind: MediaKind,
    pub file_name: String,
    pub mime_type: String,
}

impl From<&QueueItem> for SessionTarget {
    fn from(item: &QueueItem) -> Self {
        Self {
            item_id: item.id.clone(),
            media_kind: item.media_kind,
            file_name: item.file_name.clone(),
            mime_type: item.mime_type.clone(),
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Done(CompositeResult),
    Failed(String),
    /// The item was removed or superseded; its state is left as last published
    Cancelled,
}

impl SessionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Done(_) => "done",
            Self::Failed(_) => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Keeps the active-session gauge accurate on every exit path
struct ActiveSession;

impl ActiveSession {
    fn enter() -> Self {
        ACTIVE_SESSIONS.inc();
        Self
    }
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        ACTIVE_SESSIONS.dec();
    }
}

pub struct SessionController {
    target: SessionTarget,
    config: Arc<AnalysisConfig>,
    services: SessionServices,
    cancel: CancellationToken,
}

impl SessionController {
    /// `config` is the settings snapshot taken when the session started;
    /// later settings changes do not reach a running session.
    pub fn new(
        target: SessionTarget,
        config: Arc<AnalysisConfig>,
        services: SessionServices,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            target,
            config,
            services,
            cancel,
        }
    }

    pub fn item_id(&self) -> &str {
        &self.target.item_id
    }

    /// Analyze an already opened video, segment by segment
    #[instrument(skip_all, fields(item_id = %self.target.item_id))]
    pub async fn run(&self, resource: Arc<dyn MediaResource>) -> SessionOutcome {
        let _active = ActiveSession::enter();
        let outcome = if self.publish(ItemUpdate::status(SessionStatus::Sampling)) {
            self.progressive(resource.as_ref()).await
        } else {
            SessionOutcome::Cancelled
        };
        resource.release().await;
        self.finish(&outcome);
        outcome
    }

    /// Open the item's video through `opener`, then analyze it
    #[instrument(skip_all, fields(item_id = %self.target.item_id))]
    pub async fn run_source(&self, opener: &dyn MediaOpener, source: &MediaSource) -> SessionOutcome {
        let _active = ActiveSession::enter();
        if !self.publish(ItemUpdate::status(SessionStatus::Sampling)) {
            self.finish(&SessionOutcome::Cancelled);
            return SessionOutcome::Cancelled;
        }

        let opened = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            opened = opener.open(source) => Some(opened),
        };

        let outcome = match opened {
            None => SessionOutcome::Cancelled,
            Some(Err(err)) => SessionOutcome::Failed(err.to_string()),
            Some(Ok(resource)) => {
                let (width, height) = resource.dimensions();
                debug!(
                    duration_secs = resource.duration_secs(),
                    width,
                    height,
                    "opened video"
                );
                let outcome = self.progressive(resource.as_ref()).await;
                resource.release().await;
                outcome
            }
        };
        self.finish(&outcome);
        outcome
    }

    /// Classify a text, image or audio item with a single call
    #[instrument(skip_all, fields(item_id = %self.target.item_id, kind = self.target.media_kind.as_str()))]
    pub async fn run_single(&self, source: &MediaSource) -> SessionOutcome {
        let _active = ActiveSession::enter();
        let outcome = self.single(source).await;
        self.finish(&outcome);
        outcome
    }

    async fn progressive(&self, resource: &dyn MediaResource) -> SessionOutcome {
        let schedule = SampleSchedule::new(resource.duration_secs(), self.config.sampling_interval());
        let total = u32::try_from(schedule.len()).unwrap_or(u32::MAX);
        info!(
            total_segments = total,
            interval_secs = schedule.interval(),
            "starting progressive analysis"
        );

        if !self.publish(ItemUpdate::status(SessionStatus::Analyzing).with_progress(0, total)) {
            return SessionOutcome::Cancelled;
        }

        let failure_limit = self.config.failure_limit();
        let mut engine = AggregationEngine::new(total);
        let mut consecutive_failures = 0u32;

        for timestamp in schedule.iter() {
            if self.cancel.is_cancelled() {
                return SessionOutcome::Cancelled;
            }

            let step = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return SessionOutcome::Cancelled,
                step = self.analyze_segment(resource, timestamp) => step,
            };

            match step {
                Ok(frame) => {
                    consecutive_failures = 0;
                    SEGMENTS_PROCESSED.with_label_values(&["folded"]).inc();
                    let composite = engine.fold(&frame);
                    debug!(
                        timestamp,
                        processed = engine.count(),
                        probability_ai = composite.probability_ai,
                        "folded segment"
                    );
                    let update = ItemUpdate::default()
                        .with_progress(engine.count(), total)
                        .with_result(composite);
                    if !self.publish(update) {
                        return SessionOutcome::Cancelled;
                    }
                }
                Err(AnalysisError::Cancelled) => return SessionOutcome::Cancelled,
                Err(AnalysisError::Capture(err)) if err.is_unreadable() => {
                    SEGMENTS_PROCESSED.with_label_values(&["capture_failed"]).inc();
                    return SessionOutcome::Failed(err.to_string());
                }
                Err(err) => {
                    consecutive_failures += 1;
                    let outcome = match err {
                        AnalysisError::Capture(_) => "capture_failed",
                        _ => "classification_failed",
                    };
                    SEGMENTS_PROCESSED.with_label_values(&[outcome]).inc();
                    warn!(timestamp, error = %err, consecutive_failures, "skipping segment");

                    if failure_limit.is_some_and(|limit| consecutive_failures >= limit) {
                        return SessionOutcome::Failed(format!(
                            "aborted after {} consecutive segment failures: {}",
                            consecutive_failures, err
                        ));
                    }
                }
            }
        }

        match engine.finalize(total) {
            Ok(result) => {
                let update = ItemUpdate::status(SessionStatus::Done)
                    .with_progress(engine.count(), total)
                    .with_result(result.clone());
                if !self.publish(update) {
                    return SessionOutcome::Cancelled;
                }
                self.record_history(result.clone(), None).await;
                SessionOutcome::Done(result)
            }
            Err(_) => SessionOutcome::Failed(format!(
                "none of the {} sampled segments could be analyzed",
                total
            )),
        }
    }

    async fn analyze_segment(
        &self,
        resource: &dyn MediaResource,
        timestamp: f64,
    ) -> Result<FrameResult, AnalysisError> {
        let jpeg = sampler::capture(resource, timestamp).await?;
        if self.cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }

        let request = ClassifyRequest::frame(jpeg, Arc::clone(&self.config));
        let frame = classify_timed(self.services.classifier.as_ref(), &request).await?;
        Ok(frame)
    }

    async fn single(&self, source: &MediaSource) -> SessionOutcome {
        if !self.publish(ItemUpdate::status(SessionStatus::Analyzing).with_progress(0, 1)) {
            return SessionOutcome::Cancelled;
        }

        let loaded = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return SessionOutcome::Cancelled,
            loaded = load_payload(source, self.target.media_kind) => loaded,
        };
        let payload = match loaded {
            Ok(payload) => payload,
            Err(err) => return SessionOutcome::Failed(err.to_string()),
        };

        let raw_content = match &payload {
            MediaPayload::Text(text) => Some(text.clone()),
            MediaPayload::Binary(_) => None,
        };
        let request = ClassifyRequest {
            media_kind: self.target.media_kind,
            payload,
            mime_type: self.target.mime_type.clone(),
            config: Arc::clone(&self.config),
        };

        let classified = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return SessionOutcome::Cancelled,
            classified = classify_timed(self.services.classifier.as_ref(), &request) => classified,
        };

        match classified {
            Ok(frame) => {
                let result = single_shot(frame);
                let update = ItemUpdate::status(SessionStatus::Done)
                    .with_progress(1, 1)
                    .with_result(result.clone());
                if !self.publish(update) {
                    return SessionOutcome::Cancelled;
                }
                self.record_history(result.clone(), raw_content).await;
                SessionOutcome::Done(result)
            }
            Err(err) => SessionOutcome::Failed(err.to_string()),
        }
    }

    /// Returns false once the session is cancelled; nothing is published after that
    fn publish(&self, update: ItemUpdate) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        self.services.sink.publish(&self.target.item_id, update);
        true
    }

    async fn record_history(&self, result: CompositeResult, raw_content: Option<String>) {
        let entry = HistoryEntry::new(
            result,
            self.target.media_kind,
            raw_content,
            self.target.mime_type.clone(),
            self.target.file_name.clone(),
        );
        if let Err(e) = self.services.history.record(entry).await {
            HISTORY_WRITE_FAILURES.inc();
            warn!(error = %e, "failed to record analysis history");
        }
    }

    fn finish(&self, outcome: &SessionOutcome) {
        match outcome {
            SessionOutcome::Done(result) => info!(
                probability_ai = result.probability_ai,
                label = %result.label,
                segments = result.segments_analyzed,
                "analysis complete"
            ),
            SessionOutcome::Failed(message) => {
                warn!(error = %message, "analysis failed");
                self.publish(ItemUpdate::failed(message.clone()));
            }
            SessionOutcome::Cancelled => info!("analysis cancelled"),
        }
        SESSIONS_COMPLETED
            .with_label_values(&[self.target.media_kind.as_str(), outcome.as_str()])
            .inc();
    }
}
