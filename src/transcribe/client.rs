use anyhow::{bail, Context, Result};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// JSON payload the transcription endpoint answers with
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Seam between the send path and the remote endpoint
///
/// Lets tests drive the session with a canned transcriber instead of a
/// live service.
#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    /// Submit one packaged WAV recording; returns the transcribed text
    async fn transcribe(&self, wav_bytes: Vec<u8>) -> Result<String>;
}

/// HTTP client for the remote transcription endpoint
///
/// Posts a multipart form with a single `audio` field and expects
/// `{ "text": string }` back. No authentication, no retry; a failed
/// request is logged by the caller and the transcript simply does not
/// update.
pub struct HttpTranscriber {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTranscriber {
    pub fn new(
        endpoint: impl Into<String>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, wav_bytes: Vec<u8>) -> Result<String> {
        debug!(
            "Sending {} bytes of audio to {}",
            wav_bytes.len(),
            self.endpoint
        );

        let audio_part = Part::bytes(wav_bytes)
            .file_name("recording.wav")
            .mime_str("audio/wav")
            .context("Failed to build audio part")?;

        let form = Form::new().part("audio", audio_part);

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .context("Transcription request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("Transcription endpoint returned {}", status);
        }

        let payload: TranscriptionResponse = response
            .json()
            .await
            .context("Malformed transcription response")?;

        Ok(payload.text)
    }
}
