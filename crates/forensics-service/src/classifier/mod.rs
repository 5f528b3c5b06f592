pub mod http;
pub mod mock;

use async_trait::async_trait;
use common::analysis::FrameResult;
use common::errors::ClassificationError;
use common::media::ClassifyRequest;
use std::time::Instant;

/// Remote "AI-generated vs human" classifier
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Short identifier used in logs and metric labels
    fn id(&self) -> &'static str;

    /// Classify one piece of content.
    ///
    /// Implementations must fail rather than hang: the session controller has
    /// no timeout of its own.
    async fn classify(&self, request: &ClassifyRequest) -> Result<FrameResult, ClassificationError>;

    /// Health check - verify the classifier is reachable
    async fn health_check(&self) -> Result<bool, ClassificationError> {
        Ok(true)
    }
}

/// Run one classification and record its latency
pub async fn classify_timed(
    classifier: &dyn Classifier,
    request: &ClassifyRequest,
) -> Result<FrameResult, ClassificationError> {
    let start = Instant::now();
    let result = classifier.classify(request).await;
    let status = if result.is_ok() { "success" } else { "error" };
    telemetry::metrics::CLASSIFICATION_LATENCY
        .with_label_values(&[classifier.id(), status])
        .observe(start.elapsed().as_secs_f64());
    result
}
