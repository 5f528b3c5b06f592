//! Deterministic classifier for standalone runs and demonstrations

use super::Classifier;
use async_trait::async_trait;
use common::analysis::{FrameResult, KeyFeature};
use common::errors::ClassificationError;
use common::media::{ClassifyRequest, MediaKind};
use serde::{Deserialize, Serialize};

const VISUAL_FEATURES: &[&str] = &[
    "skin texture smoothing",
    "inconsistent lighting",
    "warped background geometry",
    "malformed hands",
    "unnatural motion blur",
    "repeating texture patterns",
    "garbled text rendering",
    "sensor noise profile",
];

const TEXT_FEATURES: &[&str] = &[
    "uniform sentence length",
    "generic phrasing",
    "low lexical burstiness",
    "hedging patterns",
    "idiosyncratic typos",
];

const AUDIO_FEATURES: &[&str] = &[
    "flat prosody",
    "spectral artifacts",
    "missing breath sounds",
    "room tone consistency",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockClassifierConfig {
    /// Simulate network latency in milliseconds
    #[serde(default)]
    pub simulated_delay_ms: u64,
}

/// Derives scores from a digest of the payload, so the same content always
/// produces the same verdict
pub struct MockClassifier {
    config: MockClassifierConfig,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self {
            config: MockClassifierConfig::default(),
        }
    }

    pub fn with_config(config: MockClassifierConfig) -> Self {
        Self { config }
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// FNV-1a; stable across builds and platforms
fn digest(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, &b| {
        (hash ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[async_trait]
impl Classifier for MockClassifier {
    fn id(&self) -> &'static str {
        "mock"
    }

    async fn classify(&self, request: &ClassifyRequest) -> Result<FrameResult, ClassificationError> {
        if self.config.simulated_delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(
                self.config.simulated_delay_ms,
            ))
            .await;
        }

        if request.payload.is_empty() {
            return Err(ClassificationError::InvalidResponse(
                "empty payload".to_string(),
            ));
        }

        let seed = digest(request.payload.as_bytes());
        let probability_ai = (seed % 101) as f64;
        let confidence = 55.0 + ((seed >> 8) % 41) as f64;

        let catalog = match request.media_kind {
            MediaKind::Text => TEXT_FEATURES,
            MediaKind::Audio => AUDIO_FEATURES,
            MediaKind::Image | MediaKind::Video => VISUAL_FEATURES,
        };
        let feature_count = 2 + (seed >> 16) as usize % 3;
        let key_features = (0..feature_count)
            .map(|i| {
                let pick = (seed >> (20 + 4 * i)) as usize;
                KeyFeature::new(
                    catalog[(pick + i) % catalog.len()],
                    ((pick * 7 + i * 13) % 100) as f64,
                )
            })
            .collect();

        let verdict = if probability_ai > 50.0 {
            "synthetic"
        } else {
            "natural"
        };

        Ok(FrameResult {
            probability_ai,
            confidence,
            reasoning: format!(
                "Mock {} analysis ({} preset): content statistics look {}.",
                request.media_kind.as_str(),
                request.config.preset.as_str(),
                verdict
            ),
            key_features,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::analysis::AnalysisConfig;
    use common::media::MediaPayload;
    use std::sync::Arc;

    fn text_request(text: &str) -> ClassifyRequest {
        ClassifyRequest {
            media_kind: MediaKind::Text,
            payload: MediaPayload::Text(text.to_string()),
            mime_type: "text/plain".to_string(),
            config: Arc::new(AnalysisConfig::default()),
        }
    }

    #[tokio::test]
    async fn test_mock_classifier_deterministic() {
        let classifier = MockClassifier::new();
        let first = classifier.classify(&text_request("hello world")).await.unwrap();
        let second = classifier.classify(&text_request("hello world")).await.unwrap();
        assert_eq!(first, second);
        assert!(first.validate().is_ok());
        assert!((2..=4).contains(&first.key_features.len()));
    }

    #[tokio::test]
    async fn test_mock_classifier_scores_in_range() {
        let classifier = MockClassifier::new();
        for i in 0..50u8 {
            let request = ClassifyRequest::frame(vec![i; 32], Arc::new(AnalysisConfig::default()));
            let frame = classifier.classify(&request).await.unwrap();
            assert!(frame.validate().is_ok(), "payload {i}");
        }
    }

    #[tokio::test]
    async fn test_mock_classifier_rejects_empty_payload() {
        let classifier = MockClassifier::with_config(MockClassifierConfig {
            simulated_delay_ms: 1,
        });
        assert!(classifier.classify(&text_request("")).await.is_err());
    }
}
