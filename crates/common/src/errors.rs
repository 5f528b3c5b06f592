//! Error taxonomy shared by the analysis pipeline.
//!
//! Per-frame errors ([`CaptureError::Frame`], [`ClassificationError`]) are
//! absorbed by the session controller; session-level errors end up in the
//! item's terminal state.

use thiserror::Error;

/// A frame could not be rendered from a media resource
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CaptureError {
    /// The resource cannot be decoded at all (missing file, corrupt container)
    #[error("media resource is unreadable: {0}")]
    Unreadable(String),

    /// A single frame could not be produced; other timestamps may still work
    #[error("failed to capture frame at {timestamp:.3}s: {reason}")]
    Frame { timestamp: f64, reason: String },
}

impl CaptureError {
    pub fn frame(timestamp: f64, reason: impl Into<String>) -> Self {
        Self::Frame {
            timestamp,
            reason: reason.into(),
        }
    }

    pub fn is_unreadable(&self) -> bool {
        matches!(self, Self::Unreadable(_))
    }
}

/// The remote classifier failed for one request
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClassificationError {
    #[error("classifier request failed: {0}")]
    Transport(String),

    #[error("classifier returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode classifier response: {0}")]
    Decode(String),

    #[error("classifier response out of range: {0}")]
    InvalidResponse(String),

    #[error("classifier unavailable: {0}")]
    Unavailable(String),
}

/// Session-level failures of the aggregation pipeline
#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnalysisError {
    /// `finalize` was requested before any frame was folded
    #[error("no segments were successfully analyzed")]
    EmptySession,

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    /// Cancellation is a normal termination path; it is never shown as an item error
    #[error("analysis cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_error_display() {
        let err = CaptureError::frame(5.0, "ffmpeg exited with status 1");
        assert_eq!(
            err.to_string(),
            "failed to capture frame at 5.000s: ffmpeg exited with status 1"
        );
        assert!(!err.is_unreadable());
        assert!(CaptureError::Unreadable("missing".into()).is_unreadable());
    }

    #[test]
    fn test_analysis_error_from_capture() {
        let err: AnalysisError = CaptureError::Unreadable("corrupt".into()).into();
        assert_eq!(err.to_string(), "media resource is unreadable: corrupt");
    }

    #[test]
    fn test_frame_errors_compare_by_timestamp() {
        let err: AnalysisError = CaptureError::frame(2.5, "seek failed").into();
        assert_eq!(
            err,
            AnalysisError::Capture(CaptureError::Frame {
                timestamp: 2.5,
                reason: "seek failed".to_string(),
            })
        );
        assert_ne!(
            CaptureError::frame(2.5, "seek failed"),
            CaptureError::frame(f64::NAN, "seek failed")
        );
    }
}
