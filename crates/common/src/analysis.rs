//! Analysis contracts for the forensics pipeline.
//!
//! This module defines the per-frame classifier output, the composite result
//! published while a video is being analyzed, the per-item session state, and
//! the analysis settings snapshot every session runs against.

use crate::errors::ClassificationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of key features surfaced in a composite result
pub const MAX_KEY_FEATURES: usize = 6;

/// Analysis depth preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisPreset {
    Quick,
    #[default]
    Standard,
    Forensic,
}

impl AnalysisPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Standard => "standard",
            Self::Forensic => "forensic",
        }
    }
}

/// Analysis settings. Sessions take an immutable snapshot of these at start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Analysis depth preset (default: standard)
    #[serde(default)]
    pub preset: AnalysisPreset,

    /// Artifacts the classifier should pay particular attention to
    #[serde(default)]
    pub focus_areas: Vec<String>,

    /// Seconds between sampled video frames (clamped to at least 1)
    #[serde(default = "default_frame_interval")]
    pub frame_interval_secs: u32,

    /// Abort a video session after this many failed frames in a row (0 = never)
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// Free-form instructions forwarded to the classifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
}

fn default_frame_interval() -> u32 {
    5
}

fn default_max_consecutive_failures() -> u32 {
    5
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            preset: AnalysisPreset::default(),
            focus_areas: Vec::new(),
            frame_interval_secs: default_frame_interval(),
            max_consecutive_failures: default_max_consecutive_failures(),
            custom_instructions: None,
        }
    }
}

impl AnalysisConfig {
    /// Sampling step in seconds, never below 1
    pub fn sampling_interval(&self) -> f64 {
        f64::from(self.frame_interval_secs.max(1))
    }

    /// `None` when consecutive failures should never abort a session
    pub fn failure_limit(&self) -> Option<u32> {
        (self.max_consecutive_failures > 0).then_some(self.max_consecutive_failures)
    }
}

/// One named finding reported by the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyFeature {
    /// Feature name; the evidence pool deduplicates on this
    pub feature: String,

    /// How strongly the feature points at the verdict (0 to 100)
    #[serde(alias = "impactScore")]
    pub impact_score: f64,
}

impl KeyFeature {
    pub fn new(feature: impl Into<String>, impact_score: f64) -> Self {
        Self {
            feature: feature.into(),
            impact_score,
        }
    }
}

/// Classifier output for one sampled frame (or one single-shot item)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
    /// Probability that the content is AI-generated (0 to 100)
    #[serde(alias = "probabilityAI")]
    pub probability_ai: f64,

    /// Classifier confidence in its own verdict (0 to 100)
    pub confidence: f64,

    /// Free-text explanation
    #[serde(default)]
    pub reasoning: String,

    /// Evidence items in classifier order
    #[serde(default, alias = "keyFeatures")]
    pub key_features: Vec<KeyFeature>,
}

impl FrameResult {
    /// Reject scores that are not finite or fall outside `[0, 100]`.
    ///
    /// Classifier clients run this before a result reaches aggregation, so
    /// folding can assume well-formed input.
    pub fn validate(&self) -> Result<(), ClassificationError> {
        check_score("probability_ai", self.probability_ai)?;
        check_score("confidence", self.confidence)?;
        for kf in &self.key_features {
            if kf.feature.trim().is_empty() {
                return Err(ClassificationError::InvalidResponse(
                    "key feature with empty name".to_string(),
                ));
            }
            check_score("impact_score", kf.impact_score)?;
        }
        Ok(())
    }
}

fn check_score(field: &str, value: f64) -> Result<(), ClassificationError> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(ClassificationError::InvalidResponse(format!(
            "{} must be within 0..=100 (got {})",
            field, value
        )))
    }
}

/// Human-facing verdict label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "Likely AI")]
    LikelyAi,
    #[serde(rename = "Mixed/Uncertain")]
    MixedUncertain,
    #[serde(rename = "Likely Human")]
    LikelyHuman,
}

impl Verdict {
    /// Label for a partial result. Partial results never claim uncertainty.
    pub fn in_progress(probability_ai: u8) -> Self {
        if probability_ai > 50 {
            Self::LikelyAi
        } else {
            Self::LikelyHuman
        }
    }

    /// Label for a completed analysis
    pub fn finalized(probability_ai: u8) -> Self {
        match probability_ai {
            p if p > 50 => Self::LikelyAi,
            p if p > 30 => Self::MixedUncertain,
            _ => Self::LikelyHuman,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LikelyAi => "Likely AI",
            Self::MixedUncertain => "Mixed/Uncertain",
            Self::LikelyHuman => "Likely Human",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Running or final classification of one queued item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeResult {
    /// Rounded mean AI probability across folded segments
    pub probability_ai: u8,

    /// Rounded mean confidence across folded segments
    pub confidence: u8,

    pub label: Verdict,

    /// Status text while in progress, summary once final
    pub reasoning: String,

    /// Strongest evidence, highest impact first
    pub key_features: Vec<KeyFeature>,

    /// Segments folded into this result
    pub segments_analyzed: u32,

    /// Segments scheduled for the item
    pub total_segments: u32,
}

/// Lifecycle of a queued item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Queued,
    Sampling,
    Analyzing,
    Done,
    Error,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// Items may start a fresh session only from these states
    pub fn is_runnable(&self) -> bool {
        matches!(self, Self::Queued | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Sampling => "sampling",
            Self::Analyzing => "analyzing",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

/// Per-item progress as seen by the queue
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub status: SessionStatus,

    /// Segments successfully folded so far
    pub segments_processed: u32,

    /// Length of the sample schedule, fixed once sampling completes
    pub total_segments: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_verdict_boundaries() {
        assert_eq!(Verdict::finalized(51), Verdict::LikelyAi);
        assert_eq!(Verdict::finalized(50), Verdict::MixedUncertain);
        assert_eq!(Verdict::finalized(31), Verdict::MixedUncertain);
        assert_eq!(Verdict::finalized(30), Verdict::LikelyHuman);
        assert_eq!(Verdict::finalized(0), Verdict::LikelyHuman);
    }

    #[test]
    fn test_in_progress_verdict_is_two_way() {
        assert_eq!(Verdict::in_progress(51), Verdict::LikelyAi);
        assert_eq!(Verdict::in_progress(50), Verdict::LikelyHuman);
        assert_eq!(Verdict::in_progress(40), Verdict::LikelyHuman);
    }

    #[test]
    fn test_verdict_serializes_as_label() {
        let json = serde_json::to_string(&Verdict::MixedUncertain).unwrap();
        assert_eq!(json, "\"Mixed/Uncertain\"");
    }

    #[test]
    fn test_frame_result_accepts_camel_case_fields() {
        let frame: FrameResult = serde_json::from_value(serde_json::json!({
            "probabilityAI": 72,
            "confidence": 64.5,
            "reasoning": "smooth skin texture",
            "keyFeatures": [{"feature": "texture blur", "impactScore": 55}]
        }))
        .unwrap();

        assert_eq!(frame.probability_ai, 72.0);
        assert_eq!(frame.key_features[0].impact_score, 55.0);
        assert!(frame.validate().is_ok());
    }

    #[test]
    fn test_frame_result_validation_rejects_out_of_range() {
        let frame = FrameResult {
            probability_ai: 101.0,
            confidence: 50.0,
            reasoning: String::new(),
            key_features: vec![],
        };
        assert!(frame.validate().is_err());

        let frame = FrameResult {
            probability_ai: 20.0,
            confidence: f64::NAN,
            reasoning: String::new(),
            key_features: vec![],
        };
        assert!(frame.validate().is_err());
    }

    #[test]
    fn test_config_defaults_and_clamping() {
        let config: AnalysisConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert_eq!(config.failure_limit(), Some(5));

        let config = AnalysisConfig {
            frame_interval_secs: 0,
            max_consecutive_failures: 0,
            ..AnalysisConfig::default()
        };
        assert_eq!(config.sampling_interval(), 1.0);
        assert_eq!(config.failure_limit(), None);
    }

    #[test]
    fn test_session_status_transitions() {
        assert!(SessionStatus::Queued.is_runnable());
        assert!(SessionStatus::Error.is_runnable());
        assert!(!SessionStatus::Analyzing.is_runnable());
        assert!(SessionStatus::Done.is_terminal());
        assert!(!SessionStatus::Sampling.is_terminal());
    }
}
