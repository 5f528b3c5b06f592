//! Frame extraction utilities for video files
//!
//! This module wraps `ffprobe`/`ffmpeg` to probe a video's duration and
//! dimensions and to grab a single JPEG still at an exact timestamp.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error, warn};

/// Duration and dimensions of a probed video
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoProbe {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

/// Probe duration and dimensions of the first video stream using ffprobe
pub async fn probe_video(video_path: &Path) -> Result<VideoProbe> {
    debug!(video = %video_path.display(), "probing video");

    if !video_path.exists() {
        anyhow::bail!("video file does not exist: {}", video_path.display());
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height:format=duration",
            "-of",
            "json",
        ])
        .arg(video_path)
        .stdin(Stdio::null())
        .output()
        .await
        .context("failed to execute ffprobe")?;

    if !output.status.success() {
        anyhow::bail!("ffprobe failed: {:?}", output.status);
    }

    let probe = parse_probe_output(&output.stdout)?;

    debug!(
        video = %video_path.display(),
        duration_secs = probe.duration_secs,
        width = probe.width,
        height = probe.height,
        "probed video successfully"
    );

    Ok(probe)
}

fn parse_probe_output(stdout: &[u8]) -> Result<VideoProbe> {
    let parsed: FfprobeOutput =
        serde_json::from_slice(stdout).context("ffprobe output is not valid JSON")?;

    let stream = parsed
        .streams
        .first()
        .context("no video stream found")?;

    // Still images and some live captures report no container duration
    let duration_secs = parsed
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .unwrap_or(0.0);

    Ok(VideoProbe {
        duration_secs,
        width: stream.width.unwrap_or(0),
        height: stream.height.unwrap_or(0),
    })
}

/// Extract a single JPEG frame at `timestamp_secs`
///
/// `-ss` before `-i` seeks to the preceding key frame and decodes forward to
/// the exact timestamp, so the returned pixels belong to the requested instant.
///
/// # Arguments
/// * `video_path` - Path to the video file
/// * `timestamp_secs` - Timestamp in seconds
/// * `width` - Target width (0 = native resolution, aspect ratio preserved)
/// * `quality` - JPEG quality (2-31, lower is better quality)
pub async fn extract_frame_at(
    video_path: &Path,
    timestamp_secs: f64,
    width: u32,
    quality: u32,
) -> Result<Vec<u8>> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-ss".to_string(),
        format!("{:.3}", timestamp_secs.max(0.0)),
        "-i".to_string(),
        video_path.to_string_lossy().to_string(),
        "-frames:v".to_string(),
        "1".to_string(),
    ];

    if width > 0 {
        args.push("-vf".to_string());
        args.push(format!("scale={}:-2", width));
    }

    args.extend([
        "-q:v".to_string(),
        quality.clamp(2, 31).to_string(),
        "-c:v".to_string(),
        "mjpeg".to_string(),
        "-f".to_string(),
        "image2pipe".to_string(),
        "pipe:1".to_string(),
    ]);

    debug!(args = ?args, "spawning ffmpeg for frame extraction");

    let output = Command::new("ffmpeg")
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .context("failed to execute ffmpeg")?;

    if !output.status.success() {
        error!(
            video = %video_path.display(),
            timestamp = timestamp_secs,
            status = ?output.status,
            "ffmpeg frame extraction failed"
        );
        anyhow::bail!("ffmpeg exited with error: {:?}", output.status);
    }

    if output.stdout.is_empty() {
        warn!(
            video = %video_path.display(),
            timestamp = timestamp_secs,
            "ffmpeg returned empty frame data"
        );
        anyhow::bail!("ffmpeg returned no frame data");
    }

    debug!(
        video = %video_path.display(),
        timestamp = timestamp_secs,
        size_bytes = output.stdout.len(),
        "frame extracted successfully"
    );

    Ok(output.stdout)
}
