//! Audio transcription for citizen voice clips.
//!
//! A `Transcriber` trait with a `WhisperTranscriber` implementation that
//! calls an OpenAI-compatible `/audio/transcriptions` endpoint. Language is
//! pinned to French, the app's audience.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::config::TranscriptionConfig;

/// Sentinel stored as the transcript when transcription degrades. The
/// mobile app and operator console display it verbatim, so the exact value
/// is part of the contract.
pub const TRANSCRIPT_UNAVAILABLE: &str =
    "Erreur de transcription audio - contenu non disponible";

// ============================================================================
// Transcriber trait
// ============================================================================

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe an audio clip to text.
    async fn transcribe(&self, audio: &[u8], filename: &str) -> Result<String, TranscriptionError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Invalid audio payload: {0}")]
    InvalidAudio(String),
}

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
}

// ============================================================================
// WhisperTranscriber
// ============================================================================

/// Client for an OpenAI-compatible Whisper endpoint.
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    language: String,
}

impl WhisperTranscriber {
    pub fn new(config: &TranscriptionConfig) -> Result<Self, TranscriptionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            language: config.language.clone(),
        })
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(base_url: String, model: String, language: String) -> Result<Self, TranscriptionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: String::new(),
            model,
            language,
        })
    }

    fn mime_for(filename: &str) -> &'static str {
        match filename.rsplit('.').next() {
            Some("wav") => "audio/wav",
            Some("mp3") => "audio/mpeg",
            Some("ogg") => "audio/ogg",
            _ => "audio/m4a",
        }
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, audio: &[u8], filename: &str) -> Result<String, TranscriptionError> {
        let url = format!("{}/audio/transcriptions", self.base_url);

        tracing::debug!(
            bytes = audio.len(),
            model = %self.model,
            "Whisper transcription request"
        );

        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name(filename.to_string())
            .mime_str(Self::mime_for(filename))
            .map_err(|e| TranscriptionError::InvalidAudio(e.to_string()))?;

        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("language", self.language.clone());

        let mut request = self.client.post(&url).multipart(form);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!(code = status.as_u16(), message = %message, "Whisper API error");
            return Err(TranscriptionError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let result: WhisperResponse = response.json().await?;
        let text = result.text.trim().to_string();
        tracing::debug!(chars = text.len(), "Whisper transcription complete");
        Ok(text)
    }

    fn name(&self) -> &str {
        "whisper"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: String) -> WhisperTranscriber {
        WhisperTranscriber::with_base_url(base_url, "whisper-1".to_string(), "fr".to_string())
            .expect("Failed to create transcriber")
    }

    #[tokio::test]
    async fn transcribe_returns_trimmed_text() {
        let mock_server = MockServer::start().await;
        let client = test_client(mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "text": "  Il y a un feu dans mon appartement  "
            })))
            .mount(&mock_server)
            .await;

        let text = client.transcribe(b"m4a bytes", "audio_1_0_0.m4a").await.unwrap();
        assert_eq!(text, "Il y a un feu dans mon appartement");
    }

    #[tokio::test]
    async fn transcribe_surfaces_api_errors() {
        let mock_server = MockServer::start().await;
        let client = test_client(mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(400).set_body_string("unsupported format"))
            .mount(&mock_server)
            .await;

        let result = client.transcribe(b"not audio", "audio.m4a").await;
        match result {
            Err(TranscriptionError::Api { code, message }) => {
                assert_eq!(code, 400);
                assert_eq!(message, "unsupported format");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn mime_derived_from_extension() {
        assert_eq!(WhisperTranscriber::mime_for("a.wav"), "audio/wav");
        assert_eq!(WhisperTranscriber::mime_for("a.mp3"), "audio/mpeg");
        assert_eq!(WhisperTranscriber::mime_for("clip.m4a"), "audio/m4a");
        assert_eq!(WhisperTranscriber::mime_for("noext"), "audio/m4a");
    }
}
