use super::Classifier;
use async_trait::async_trait;
use base64::Engine;
use common::analysis::{AnalysisConfig, FrameResult};
use common::errors::ClassificationError;
use common::media::{ClassifyRequest, MediaKind, MediaPayload};
use reqwest::Url;
use serde::Serialize;
use std::time::Duration;
use tracing::instrument;

/// Longest slice of an error body kept in a [`ClassificationError::Status`]
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Serialize)]
struct ClassifyBody<'a> {
    media_kind: MediaKind,
    mime_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
    /// Base64-encoded binary payload
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<String>,
    config: &'a AnalysisConfig,
}

impl<'a> ClassifyBody<'a> {
    fn from_request(request: &'a ClassifyRequest) -> Self {
        let (text, data) = match &request.payload {
            MediaPayload::Text(text) => (Some(text.as_str()), None),
            MediaPayload::Binary(bytes) => (
                None,
                Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
            ),
        };
        Self {
            media_kind: request.media_kind,
            mime_type: &request.mime_type,
            text,
            data,
            config: &request.config,
        }
    }
}

/// JSON-over-HTTP client for a remote generative classifier
pub struct HttpClassifier {
    base: Url,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpClassifier {
    pub fn new(base: Url, api_key: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base,
            api_key,
            client,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClassificationError> {
        self.base
            .join(path)
            .map_err(|e| ClassificationError::Unavailable(format!("invalid classifier endpoint: {}", e)))
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

fn transport_error(err: reqwest::Error) -> ClassificationError {
    if err.is_timeout() {
        ClassificationError::Transport(format!("request timed out: {}", err))
    } else {
        ClassificationError::Transport(err.to_string())
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    fn id(&self) -> &'static str {
        "http"
    }

    #[instrument(skip_all, fields(kind = request.media_kind.as_str(), bytes = request.payload.len()))]
    async fn classify(&self, request: &ClassifyRequest) -> Result<FrameResult, ClassificationError> {
        let url = self.endpoint("v1/classify")?;
        let body = ClassifyBody::from_request(request);

        let resp = self
            .authorize(self.client.post(url))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = resp.status();
        if !status.is_success() {
            let mut body = resp.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(ClassificationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let frame: FrameResult = resp
            .json()
            .await
            .map_err(|e| ClassificationError::Decode(e.to_string()))?;
        frame.validate()?;
        Ok(frame)
    }

    async fn health_check(&self) -> Result<bool, ClassificationError> {
        let url = self.endpoint("healthz")?;
        let resp = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(transport_error)?;
        Ok(resp.status().is_success())
    }
}
