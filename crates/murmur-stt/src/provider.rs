use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use murmur_wav::EncoderError;

#[derive(Debug, Error)]
pub enum SttError {
    #[error("transcription request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider response missing transcript text")]
    MalformedResponse,
    #[error(transparent)]
    Encoder(#[from] EncoderError),
    #[error("segment io: {0}")]
    Io(#[from] std::io::Error),
}

/// The external speech-to-text service. Implementations may be slow or
/// unreliable; callers submit segments with a bounded timeout and treat
/// per-segment failure as survivable.
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    async fn transcribe(&self, audio: &Path, language: Option<&str>) -> Result<String, SttError>;
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    text: Option<String>,
}

/// Whisper-style HTTP provider: multipart upload of the WAV segment, JSON
/// `{"text": ...}` back.
pub struct HttpProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpProvider {
    pub fn new(
        endpoint: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SttError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl TranscriptionProvider for HttpProvider {
    async fn transcribe(&self, audio: &Path, language: Option<&str>) -> Result<String, SttError> {
        let bytes = tokio::fs::read(audio).await?;
        debug!(path = %audio.display(), bytes = bytes.len(), "submitting segment");

        let file_part = reqwest::multipart::Part::bytes(bytes)
            .file_name("segment.wav")
            .mime_str("audio/wav")
            .map_err(SttError::Http)?;
        let mut form = reqwest::multipart::Form::new().part("file", file_part);
        if let Some(language) = language {
            form = form.text("language", language.to_string());
        }

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?.error_for_status()?;
        let body: TranscribeResponse = response.json().await?;
        body.text.ok_or(SttError::MalformedResponse)
    }
}
