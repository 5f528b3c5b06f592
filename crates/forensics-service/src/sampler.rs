//! Frame sampling: which timestamps of a video get analyzed, and grabbing
//! the still for each of them.

use common::errors::CaptureError;
use common::media::MediaResource;
use tracing::debug;

/// Smallest sampling step, in seconds
pub const MIN_INTERVAL_SECS: f64 = 1.0;

/// Upper bound on the number of timestamps in one schedule
pub const MAX_SEGMENTS: usize = 10_000;

/// Captures are kept this far before the end of the stream; seeking exactly
/// to `duration` yields no frame in most containers.
const END_OF_STREAM_MARGIN_SECS: f64 = 0.05;

/// Ordered timestamps covering `[0, duration)` at a fixed step
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSchedule {
    interval: f64,
    timestamps: Vec<f64>,
}

impl SampleSchedule {
    /// Build the schedule for a video of `duration` seconds.
    ///
    /// `interval` is clamped to at least [`MIN_INTERVAL_SECS`]. The schedule
    /// always holds timestamp 0, even for empty or unknown-length media, and
    /// never exceeds [`MAX_SEGMENTS`] entries: longer media is sampled with a
    /// wider step.
    pub fn new(duration: f64, interval: f64) -> Self {
        let mut interval = if interval.is_finite() {
            interval.max(MIN_INTERVAL_SECS)
        } else {
            MIN_INTERVAL_SECS
        };

        let mut timestamps = vec![0.0];
        if duration.is_finite() && duration > 0.0 {
            let widest = duration / MAX_SEGMENTS as f64;
            if widest > interval {
                debug!(duration, requested = interval, widened = widest, "widening sampling interval");
                interval = widest;
            }

            // Multiplying instead of accumulating keeps long schedules free of drift
            for index in 1..MAX_SEGMENTS {
                let timestamp = index as f64 * interval;
                if timestamp >= duration {
                    break;
                }
                timestamps.push(timestamp);
            }
        }

        Self {
            interval,
            timestamps,
        }
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    pub fn timestamps(&self) -> &[f64] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.timestamps.iter().copied()
    }
}

/// Clamp `timestamp` into the seekable range of a resource
pub fn clamp_timestamp(timestamp: f64, duration: f64) -> f64 {
    let last = if duration.is_finite() {
        (duration - END_OF_STREAM_MARGIN_SECS).max(0.0)
    } else {
        0.0
    };
    if timestamp.is_finite() {
        timestamp.clamp(0.0, last)
    } else {
        0.0
    }
}

/// Capture the JPEG still at `timestamp`.
///
/// Out-of-range timestamps are clamped to the nearest valid time instead of
/// failing. The resource only returns once its seek has settled.
pub async fn capture(
    resource: &dyn MediaResource,
    timestamp: f64,
) -> Result<Vec<u8>, CaptureError> {
    let target = clamp_timestamp(timestamp, resource.duration_secs());
    if target != timestamp {
        debug!(requested = timestamp, clamped = target, "clamped capture timestamp");
    }

    let frame = resource.grab_frame(target).await?;
    if frame.is_empty() {
        return Err(CaptureError::frame(target, "empty frame data"));
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[test]
    fn test_twelve_second_video_every_five_seconds() {
        let schedule = SampleSchedule::new(12.0, 5.0);
        assert_eq!(schedule.timestamps(), &[0.0, 5.0, 10.0]);
        assert_eq!(schedule.len(), 3);
    }

    #[test]
    fn test_short_or_empty_media_yields_single_timestamp() {
        assert_eq!(SampleSchedule::new(0.0, 5.0).timestamps(), &[0.0]);
        assert_eq!(SampleSchedule::new(-3.0, 5.0).timestamps(), &[0.0]);
        assert_eq!(SampleSchedule::new(3.0, 5.0).timestamps(), &[0.0]);
        assert_eq!(SampleSchedule::new(5.0, 5.0).timestamps(), &[0.0]);
        assert_eq!(SampleSchedule::new(f64::NAN, 5.0).timestamps(), &[0.0]);
    }

    #[test]
    fn test_interval_never_below_one_second() {
        let schedule = SampleSchedule::new(3.5, 0.0);
        assert_eq!(schedule.interval(), 1.0);
        assert_eq!(schedule.timestamps(), &[0.0, 1.0, 2.0, 3.0]);

        let schedule = SampleSchedule::new(2.5, -4.0);
        assert_eq!(schedule.timestamps(), &[0.0, 1.0, 2.0]);

        let schedule = SampleSchedule::new(2.5, f64::INFINITY);
        assert_eq!(schedule.interval(), 1.0);
    }

    #[test]
    fn test_schedule_properties_hold_across_inputs() {
        for duration in [0.0, 0.5, 1.0, 7.3, 12.0, 59.99, 600.0] {
            for interval in [1.0, 1.5, 2.0, 5.0, 10.0, 30.0] {
                let schedule = SampleSchedule::new(duration, interval);
                let ts = schedule.timestamps();

                assert!(!ts.is_empty());
                assert_eq!(ts[0], 0.0);
                assert!(ts.windows(2).all(|w| w[0] < w[1]));
                if duration > interval {
                    assert!(ts.iter().all(|&t| t < duration), "{duration}/{interval}");
                }
            }
        }
    }

    #[test]
    fn test_absurd_duration_is_bounded() {
        let schedule = SampleSchedule::new(1e10, 5.0);
        let ts = schedule.timestamps();

        assert_eq!(ts.len(), MAX_SEGMENTS);
        assert_eq!(ts[0], 0.0);
        assert!(ts.windows(2).all(|w| w[0] < w[1]));
        assert!(ts.iter().all(|&t| t < 1e10));
        assert_eq!(schedule.interval(), 1e10 / MAX_SEGMENTS as f64);

        let schedule = SampleSchedule::new(f64::MAX, 1.0);
        assert_eq!(schedule.len(), MAX_SEGMENTS);
        assert!(schedule.iter().all(f64::is_finite));
    }

    #[test]
    fn test_long_media_within_cap_keeps_requested_interval() {
        let schedule = SampleSchedule::new(3600.0, 1.0);
        assert_eq!(schedule.interval(), 1.0);
        assert_eq!(schedule.len(), 3600);
    }

    #[test]
    fn test_clamp_timestamp() {
        assert_eq!(clamp_timestamp(5.0, 12.0), 5.0);
        assert_eq!(clamp_timestamp(-1.0, 12.0), 0.0);
        assert!((clamp_timestamp(30.0, 12.0) - 11.95).abs() < 1e-9);
        assert_eq!(clamp_timestamp(0.0, 0.0), 0.0);
        assert_eq!(clamp_timestamp(f64::NAN, 12.0), 0.0);
    }

    struct RecordingResource {
        duration: f64,
        seeks: Mutex<Vec<f64>>,
        frame: Vec<u8>,
    }

    #[async_trait]
    impl MediaResource for RecordingResource {
        fn duration_secs(&self) -> f64 {
            self.duration
        }

        fn dimensions(&self) -> (u32, u32) {
            (320, 240)
        }

        async fn grab_frame(&self, timestamp: f64) -> Result<Vec<u8>, CaptureError> {
            self.seeks.lock().unwrap().push(timestamp);
            Ok(self.frame.clone())
        }
    }

    #[tokio::test]
    async fn test_capture_clamps_out_of_range_timestamps() {
        let resource = RecordingResource {
            duration: 4.0,
            seeks: Mutex::new(Vec::new()),
            frame: vec![0xFF, 0xD8, 0xFF],
        };

        let frame = capture(&resource, 10.0).await.unwrap();
        assert_eq!(frame, vec![0xFF, 0xD8, 0xFF]);

        let seeks = resource.seeks.lock().unwrap().clone();
        assert_eq!(seeks.len(), 1);
        assert!(seeks[0] < 4.0);
    }

    #[tokio::test]
    async fn test_capture_rejects_empty_frames() {
        let resource = RecordingResource {
            duration: 4.0,
            seeks: Mutex::new(Vec::new()),
            frame: Vec::new(),
        };

        let err = capture(&resource, 1.0).await.unwrap_err();
        assert!(matches!(err, CaptureError::Frame { .. }));
    }
}
