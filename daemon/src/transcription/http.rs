use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{TranscribeError, Transcriber};
use crate::audio::samples_to_wav;
use crate::config::RecognizerConfig;

const CONNECT_TIMEOUT_SECS: u64 = 10;
const MAX_ERROR_DETAIL_CHARS: usize = 200;

/// Cloud speech-to-text client for Whisper-style HTTP endpoints. Uploads
/// each phrase as a WAV attachment and reads the transcript from the
/// JSON reply.
pub struct HttpTranscriber {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    sample_rate: u32,
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

impl HttpTranscriber {
    pub fn new(config: &RecognizerConfig, sample_rate: u32) -> anyhow::Result<Self> {
        if config.endpoint.is_empty() {
            anyhow::bail!("recognizer endpoint is not configured");
        }
        if config.api_key.is_empty() {
            debug!("No API key configured, sending unauthenticated requests");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            sample_rate,
        })
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(
        &self,
        samples: &[f32],
        language: &str,
    ) -> Result<String, TranscribeError> {
        let wav = samples_to_wav(samples, self.sample_rate)
            .map_err(|e| TranscribeError::InvalidAudio(e.to_string()))?;
        debug!("Uploading {} bytes of audio to {}", wav.len(), self.endpoint);

        let file = Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| TranscribeError::Service(format!("failed to build upload: {}", e)))?;
        let mut form = Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("response_format", "json");
        if !language.is_empty() {
            form = form.text("language", language.to_string());
        }

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TranscribeError::Service(format!("request failed: {}", e)))?;

        let status = response.status();
        debug!("Transcription response status: {}", status);
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail: String = body.chars().take(MAX_ERROR_DETAIL_CHARS).collect();
            return Err(TranscribeError::Service(format!("{}: {}", status, detail)));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| TranscribeError::Service(format!("malformed response: {}", e)))?;

        let text = parsed.text.trim();
        if text.is_empty() {
            return Err(TranscribeError::Unintelligible);
        }
        Ok(text.to_string())
    }
}
