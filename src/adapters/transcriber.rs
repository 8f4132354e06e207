//! Speech-to-text over an OpenAI-compatible transcription endpoint.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::llm::OpenAiCompatibleClient;

pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "FunAudioLLM/SenseVoiceSmall";

/// Turns a recording into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

/// Multipart upload to `v1/audio/transcriptions`
pub struct HttpTranscriber {
    client: OpenAiCompatibleClient,
    model: String,
}

impl HttpTranscriber {
    pub fn new(client: OpenAiCompatibleClient) -> Self {
        Self {
            client,
            model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).map(str::to_lowercase).as_deref() {
        Some("wav") => "audio/wav",
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("ogg") | Some("opus") => "audio/ogg",
        _ => "audio/mpeg",
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<String> {
        let api_key = self.client.api_key()?;

        let file_name = audio_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let file_bytes = tokio::fs::read(audio_path)
            .await
            .with_context(|| format!("Failed to read audio file: {}", audio_path.display()))?;

        let file_part = Part::bytes(file_bytes)
            .file_name(file_name)
            .mime_str(mime_for(audio_path))?;

        let form = Form::new()
            .part("file", file_part)
            .text("model", self.model.clone());

        tracing::debug!("Uploading {} for transcription", audio_path.display());

        let response = self
            .client
            .http()
            .post(self.client.endpoint("audio/transcriptions"))
            .header("Authorization", format!("Bearer {}", api_key))
            .multipart(form)
            .send()
            .await
            .context("Failed to send transcription request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Transcription API error: {} - {}", status, body);
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .context("Failed to parse transcription response")?;

        Ok(parsed.text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_for_extension() {
        assert_eq!(mime_for(Path::new("a.WAV")), "audio/wav");
        assert_eq!(mime_for(Path::new("memo.m4a")), "audio/mp4");
        assert_eq!(mime_for(Path::new("clip")), "audio/mpeg");
    }

    #[tokio::test]
    async fn test_transcribe_requires_key() {
        let t = HttpTranscriber::new(OpenAiCompatibleClient::new(None));
        assert!(t.transcribe(Path::new("missing.mp3")).await.is_err());
    }
}
