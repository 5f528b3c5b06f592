use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::media::CaptureSettings;
use anyhow::{Context, Result};
use common::analysis::AnalysisConfig;
use reqwest::Url;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ForensicsServiceConfig {
    /// Address to bind the HTTP server to
    pub bind_addr: String,

    /// Remote classifier base URL; the mock classifier is used when absent
    pub classifier_url: Option<Url>,

    /// Bearer token sent to the classifier
    pub classifier_api_key: Option<String>,

    pub classifier_timeout: Duration,

    /// JSON file holding finalized results
    pub history_path: PathBuf,

    pub history_limit: usize,

    /// Settings applied until replaced through the API
    pub analysis: AnalysisConfig,

    pub capture: CaptureSettings,

    /// Node ID for this service instance
    pub node_id: String,
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}: {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}

impl ForensicsServiceConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr =
            env::var("FORENSICS_ADDR").unwrap_or_else(|_| "0.0.0.0:8090".to_string());

        let classifier_url = env::var("CLASSIFIER_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(|s| Url::parse(&s).context("Invalid CLASSIFIER_URL"))
            .transpose()?;

        let classifier_api_key = env::var("CLASSIFIER_API_KEY")
            .ok()
            .filter(|s| !s.is_empty());

        let classifier_timeout = Duration::from_secs(parse_var("CLASSIFIER_TIMEOUT_SECS", 60u64)?);

        let history_path = env::var("HISTORY_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/history.json"));
        let history_limit = parse_var("HISTORY_LIMIT", DEFAULT_HISTORY_LIMIT)?;

        let defaults = AnalysisConfig::default();
        let analysis = AnalysisConfig {
            frame_interval_secs: parse_var("FRAME_INTERVAL_SECS", defaults.frame_interval_secs)?,
            max_consecutive_failures: parse_var(
                "MAX_CONSECUTIVE_FAILURES",
                defaults.max_consecutive_failures,
            )?,
            ..defaults
        };
        common::validation::validate_analysis_config(&analysis)
            .context("Invalid analysis settings in environment")?;

        let capture_defaults = CaptureSettings::default();
        let capture = CaptureSettings {
            width: parse_var("CAPTURE_WIDTH", capture_defaults.width)?,
            quality: parse_var("CAPTURE_QUALITY", capture_defaults.quality)?.clamp(2, 31),
        };

        let node_id = env::var("NODE_ID").unwrap_or_else(|_| {
            format!(
                "forensics-{}",
                hostname::get()
                    .ok()
                    .and_then(|h| h.into_string().ok())
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
            )
        });

        Ok(Self {
            bind_addr,
            classifier_url,
            classifier_api_key,
            classifier_timeout,
            history_path,
            history_limit,
            analysis,
            capture,
            node_id,
        })
    }
}
