//! Running aggregation of per-frame classifications into a composite result.
//!
//! The engine is owned by exactly one session. Every `fold` recomputes the
//! composite from the running sums and the evidence pool, so a published
//! result is always a pure function of what has been folded so far.

use common::analysis::{CompositeResult, FrameResult, KeyFeature, Verdict, MAX_KEY_FEATURES};
use common::errors::AnalysisError;
use std::collections::HashMap;

/// Characters of frame reasoning quoted in progress messages
const REASONING_EXCERPT_CHARS: usize = 100;

/// Deduplicated evidence keyed by feature name.
///
/// A later reading of a name replaces the earlier one but keeps the slot the
/// name was first seen in, which is what breaks ranking ties.
#[derive(Debug, Default, Clone)]
struct EvidencePool {
    entries: Vec<KeyFeature>,
    index: HashMap<String, usize>,
}

impl EvidencePool {
    fn insert(&mut self, feature: KeyFeature) {
        match self.index.get(&feature.feature) {
            Some(&slot) => self.entries[slot] = feature,
            None => {
                self.index.insert(feature.feature.clone(), self.entries.len());
                self.entries.push(feature);
            }
        }
    }

    /// Highest impact first; `sort_by` is stable, so equal scores keep first-seen order
    fn top(&self, limit: usize) -> Vec<KeyFeature> {
        let mut ranked = self.entries.clone();
        ranked.sort_by(|a, b| b.impact_score.total_cmp(&a.impact_score));
        ranked.truncate(limit);
        ranked
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn get(&self, name: &str) -> Option<&KeyFeature> {
        self.index.get(name).map(|&slot| &self.entries[slot])
    }
}

/// Running aggregate for one video session
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    total_segments: u32,
    sum_probability_ai: f64,
    sum_confidence: f64,
    count: u32,
    evidence: EvidencePool,
}

impl AggregationEngine {
    /// Empty aggregate for a schedule of `total_segments` frames
    pub fn new(total_segments: u32) -> Self {
        Self {
            total_segments,
            sum_probability_ai: 0.0,
            sum_confidence: 0.0,
            count: 0,
            evidence: EvidencePool::default(),
        }
    }

    /// Number of frames folded so far
    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn total_segments(&self) -> u32 {
        self.total_segments
    }

    /// Number of distinct feature names seen so far
    pub fn evidence_len(&self) -> usize {
        self.evidence.len()
    }

    /// Current reading of a named feature, if it has been seen
    pub fn evidence(&self, name: &str) -> Option<&KeyFeature> {
        self.evidence.get(name)
    }

    /// Incorporate one frame and return the updated intermediate result
    pub fn fold(&mut self, frame: &FrameResult) -> CompositeResult {
        self.sum_probability_ai += frame.probability_ai;
        self.sum_confidence += frame.confidence;
        self.count += 1;

        for kf in &frame.key_features {
            self.evidence.insert(kf.clone());
        }

        let (probability_ai, confidence) = self.averages();
        CompositeResult {
            probability_ai,
            confidence,
            label: Verdict::in_progress(probability_ai),
            reasoning: format!(
                "Analyzing segment {}/{}: {}",
                self.count,
                self.total_segments,
                excerpt(&frame.reasoning, REASONING_EXCERPT_CHARS)
            ),
            key_features: self.evidence.top(MAX_KEY_FEATURES),
            segments_analyzed: self.count,
            total_segments: self.total_segments,
        }
    }

    /// Final result over everything folded.
    ///
    /// Fails with [`AnalysisError::EmptySession`] when nothing was folded.
    pub fn finalize(&self, total_segments: u32) -> Result<CompositeResult, AnalysisError> {
        if self.count == 0 {
            return Err(AnalysisError::EmptySession);
        }

        let (probability_ai, confidence) = self.averages();
        let label = Verdict::finalized(probability_ai);
        Ok(CompositeResult {
            probability_ai,
            confidence,
            label,
            reasoning: summary(self.count, total_segments, label, probability_ai, confidence),
            key_features: self.evidence.top(MAX_KEY_FEATURES),
            segments_analyzed: self.count,
            total_segments,
        })
    }

    /// Caller guarantees `count > 0`
    fn averages(&self) -> (u8, u8) {
        let count = f64::from(self.count);
        (
            score(self.sum_probability_ai / count),
            score(self.sum_confidence / count),
        )
    }
}

/// Final result for a non-segmented item classified in one call
pub fn single_shot(frame: FrameResult) -> CompositeResult {
    let mut pool = EvidencePool::default();
    for kf in frame.key_features {
        pool.insert(kf);
    }

    let probability_ai = score(frame.probability_ai);
    CompositeResult {
        probability_ai,
        confidence: score(frame.confidence),
        label: Verdict::finalized(probability_ai),
        reasoning: frame.reasoning,
        key_features: pool.top(MAX_KEY_FEATURES),
        segments_analyzed: 1,
        total_segments: 1,
    }
}

fn score(mean: f64) -> u8 {
    mean.round().clamp(0.0, 100.0) as u8
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}

fn summary(analyzed: u32, total: u32, label: Verdict, probability_ai: u8, confidence: u8) -> String {
    let coverage = if analyzed == total {
        format!("all {} sampled segments", total)
    } else {
        format!("{} of {} sampled segments", analyzed, total)
    };
    let verdict = match label {
        Verdict::LikelyAi => "the footage is likely AI-generated",
        Verdict::MixedUncertain => "the evidence is mixed and the origin is uncertain",
        Verdict::LikelyHuman => "the footage is likely authentic",
    };
    format!(
        "Video analysis complete across {}. Overall verdict: {} ({}% average AI probability, {}% average confidence).",
        coverage, verdict, probability_ai, confidence
    )
}
