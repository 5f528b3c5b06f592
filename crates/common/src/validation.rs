//! Input validation for queue submissions and analysis settings
//!
//! Everything that reaches the queue or the live settings through the API
//! passes through here first, so the pipeline can rely on bounded sizes and
//! consistent media metadata.

use anyhow::{anyhow, Result};
use base64::Engine;
use std::path::Path;

use crate::analysis::AnalysisConfig;
use crate::media::MediaKind;
use crate::queue::{EnqueueRequest, MediaSource};

// ============================================================================
// CONSTANTS: Input Size Limits
// ============================================================================

/// Maximum length for item IDs
pub const MAX_ID_LENGTH: usize = 256;

/// Maximum length for file names
pub const MAX_NAME_LENGTH: usize = 512;

/// Maximum length for file paths
pub const MAX_PATH_LENGTH: usize = 4096;

/// Maximum length for MIME types
pub const MAX_MIME_LENGTH: usize = 255;

/// Maximum size of inline text submissions
pub const MAX_TEXT_LENGTH: usize = 1024 * 1024;

/// Maximum size of base64 inline payloads (encoded)
pub const MAX_INLINE_LENGTH: usize = 32 * 1024 * 1024;

/// Maximum number of focus areas in the analysis settings
pub const MAX_FOCUS_AREAS: usize = 16;

/// Maximum length of one focus area or of custom instructions
pub const MAX_INSTRUCTIONS_LENGTH: usize = 4096;

/// Longest accepted sampling interval in seconds
pub const MAX_FRAME_INTERVAL_SECS: u32 = 3600;

// ============================================================================
// String Validation
// ============================================================================

/// Validate string length against a maximum
pub fn validate_length(value: &str, max_length: usize, field_name: &str) -> Result<()> {
    if value.len() > max_length {
        return Err(anyhow!(
            "{} exceeds maximum length of {} bytes (got {})",
            field_name,
            max_length,
            value.len()
        ));
    }
    Ok(())
}

/// Validate non-empty string
pub fn validate_non_empty(value: &str, field_name: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(anyhow!("{} cannot be empty", field_name));
    }
    Ok(())
}

/// Validate an item ID
pub fn validate_id(id: &str, field_name: &str) -> Result<()> {
    validate_non_empty(id, field_name)?;
    validate_length(id, MAX_ID_LENGTH, field_name)?;

    // IDs end up in URL paths
    if id.contains("..") || id.contains('/') || id.contains('\\') {
        return Err(anyhow!(
            "{} contains invalid characters (no path separators or '..' allowed)",
            field_name
        ));
    }

    Ok(())
}

/// Validate a display name
pub fn validate_name(name: &str, field_name: &str) -> Result<()> {
    validate_non_empty(name, field_name)?;
    validate_length(name, MAX_NAME_LENGTH, field_name)?;
    Ok(())
}

/// Validate that a MIME type is well formed and matches the media kind
pub fn validate_mime_type(mime_type: &str, kind: MediaKind) -> Result<()> {
    validate_non_empty(mime_type, "mime_type")?;
    validate_length(mime_type, MAX_MIME_LENGTH, "mime_type")?;

    let essence = mime_type.split(';').next().unwrap_or_default().trim();
    let Some((top, sub)) = essence.split_once('/') else {
        return Err(anyhow!("mime_type '{}' is not of the form type/subtype", mime_type));
    };
    if top.is_empty() || sub.is_empty() {
        return Err(anyhow!("mime_type '{}' is not of the form type/subtype", mime_type));
    }

    match kind.mime_prefix() {
        Some(prefix) if !essence.starts_with(prefix) => Err(anyhow!(
            "mime_type '{}' does not match media kind '{}'",
            mime_type,
            kind.as_str()
        )),
        Some(_) => Ok(()),
        None if top == "text" || essence == "application/json" => Ok(()),
        None => Err(anyhow!(
            "mime_type '{}' does not match media kind 'text'",
            mime_type
        )),
    }
}

// ============================================================================
// Path Validation
// ============================================================================

/// Validate a media path without requiring it to exist yet
pub fn validate_media_path(path: &Path, field_name: &str) -> Result<()> {
    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow!("{} contains invalid UTF-8", field_name))?;

    validate_non_empty(path_str, field_name)?;
    validate_length(path_str, MAX_PATH_LENGTH, field_name)?;

    if !path.is_absolute() {
        return Err(anyhow!("{} must be an absolute path", field_name));
    }

    for component in path.components() {
        if component.as_os_str() == ".." {
            return Err(anyhow!(
                "{} contains '..' component (path traversal attempt)",
                field_name
            ));
        }
    }

    Ok(())
}

// ============================================================================
// Request Validation
// ============================================================================

/// Validate a queue submission
pub fn validate_enqueue_request(request: &EnqueueRequest) -> Result<()> {
    if let Some(id) = &request.id {
        validate_id(id, "id")?;
    }
    validate_name(&request.file_name, "file_name")?;
    validate_mime_type(&request.mime_type, request.media_kind)?;

    match (&request.source, request.media_kind) {
        (MediaSource::Path { path }, _) => validate_media_path(path, "source.path"),
        (_, MediaKind::Video) => Err(anyhow!("video items must reference a file path")),
        (MediaSource::Text { text }, MediaKind::Text) => {
            validate_non_empty(text, "source.text")?;
            validate_length(text, MAX_TEXT_LENGTH, "source.text")
        }
        (MediaSource::Text { .. }, kind) => Err(anyhow!(
            "text sources are only accepted for text items (got '{}')",
            kind.as_str()
        )),
        (MediaSource::Inline { data }, _) => {
            validate_non_empty(data, "source.data")?;
            validate_length(data, MAX_INLINE_LENGTH, "source.data")?;
            base64::engine::general_purpose::STANDARD
                .decode(data)
                .map_err(|e| anyhow!("source.data is not valid base64: {}", e))?;
            Ok(())
        }
    }
}

/// Validate replacement analysis settings
pub fn validate_analysis_config(config: &AnalysisConfig) -> Result<()> {
    validate_range(
        config.frame_interval_secs,
        1,
        MAX_FRAME_INTERVAL_SECS,
        "frame_interval_secs",
    )?;

    if config.focus_areas.len() > MAX_FOCUS_AREAS {
        return Err(anyhow!(
            "at most {} focus areas are allowed (got {})",
            MAX_FOCUS_AREAS,
            config.focus_areas.len()
        ));
    }
    for area in &config.focus_areas {
        validate_non_empty(area, "focus_areas[]")?;
        validate_length(area, MAX_INSTRUCTIONS_LENGTH, "focus_areas[]")?;
    }

    if let Some(instructions) = &config.custom_instructions {
        validate_length(instructions, MAX_INSTRUCTIONS_LENGTH, "custom_instructions")?;
    }

    Ok(())
}

// ============================================================================
// Numeric Validation
// ============================================================================

/// Validate value is within range
pub fn validate_range<T: PartialOrd + std::fmt::Display>(
    value: T,
    min: T,
    max: T,
    field_name: &str,
) -> Result<()> {
    if value < min || value > max {
        return Err(anyhow!(
            "{} must be between {} and {}, got {}",
            field_name,
            min,
            max,
            value
        ));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
