//! Remote emergency classifier client.
//!
//! The classification model runs as a separate HTTP service (a Colab
//! notebook exposed through an ngrok tunnel in the original deployment).
//! This module provides an `EmergencyClassifier` trait so the intake
//! pipeline can be exercised with fakes, and `ColabClassifier`, the real
//! client with a bounded retry policy.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use crate::config::ClassifierConfig;

/// Liveness probes use a short timeout regardless of the analyze timeout.
const PING_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// EmergencyClassifier trait
// ============================================================================

/// Abstraction over the danger-verdict provider.
#[async_trait]
pub trait EmergencyClassifier: Send + Sync {
    /// Ask the model for a verdict on one report. Callers must treat an
    /// error as "no verdict": record the reason, never synthesize one.
    async fn analyze(
        &self,
        image_url: &str,
        transcription: &str,
        session_id: Option<i64>,
    ) -> Result<Verdict, ClassifierError>;

    /// True when the remote service answers its liveness route.
    async fn ping(&self) -> bool;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error and wire types
// ============================================================================

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Classifier rejected the request: {0}")]
    Rejected(String),

    #[error("Classifier answered success without a result payload")]
    MissingResult,

    #[error("All {attempts} retry attempts failed")]
    RetryExhausted { attempts: usize },
}

impl ClassifierError {
    /// Transport and server-side errors are worth retrying; a `success:false`
    /// envelope is the model's answer and is not.
    fn is_retryable(&self) -> bool {
        !matches!(self, ClassifierError::Rejected(_) | ClassifierError::MissingResult)
    }
}

/// The model's verdict for one report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    pub urgence_pompiers: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub niveau_danger: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    image_url: &'a str,
    transcription: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeEnvelope {
    success: bool,
    result: Option<Verdict>,
    error: Option<String>,
}

// ============================================================================
// ColabClassifier
// ============================================================================

/// HTTP client for the remote classification service.
#[derive(Debug, Clone)]
pub struct ColabClassifier {
    client: Client,
    base_url: String,
    max_retries: usize,
    retry_delay_ms: u64,
}

impl ColabClassifier {
    pub fn new(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            retry_delay_ms: config.retry_delay_ms,
        })
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(base_url: String, max_retries: usize, retry_delay_ms: u64) -> Result<Self, ClassifierError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries,
            retry_delay_ms,
        })
    }

    async fn analyze_once(
        &self,
        image_url: &str,
        transcription: &str,
        session_id: Option<i64>,
    ) -> Result<Verdict, ClassifierError> {
        let url = format!("{}/analyze", self.base_url);

        let request = AnalyzeRequest {
            image_url,
            transcription,
            session_id,
        };

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!(code = status.as_u16(), message = %message, "Classifier API error");
            return Err(ClassifierError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let envelope: AnalyzeEnvelope = response.json().await?;

        if !envelope.success {
            let reason = envelope
                .error
                .unwrap_or_else(|| "unknown classifier error".to_string());
            return Err(ClassifierError::Rejected(reason));
        }

        envelope.result.ok_or(ClassifierError::MissingResult)
    }
}

#[async_trait]
impl EmergencyClassifier for ColabClassifier {
    async fn analyze(
        &self,
        image_url: &str,
        transcription: &str,
        session_id: Option<i64>,
    ) -> Result<Verdict, ClassifierError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.max_retries);

        let result = RetryIf::spawn(
            retry_strategy,
            || self.analyze_once(image_url, transcription, session_id),
            |e: &ClassifierError| e.is_retryable(),
        )
        .await;

        match result {
            Ok(verdict) => Ok(verdict),
            Err(e @ ClassifierError::Rejected(_)) | Err(e @ ClassifierError::MissingResult) => Err(e),
            Err(e) => {
                tracing::error!(
                    attempts = self.max_retries,
                    error = %e,
                    "All classifier retry attempts failed"
                );
                Err(ClassifierError::RetryExhausted {
                    attempts: self.max_retries,
                })
            }
        }
    }

    async fn ping(&self) -> bool {
        let url = format!("{}/", self.base_url);
        match self.client.get(&url).timeout(PING_TIMEOUT).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                tracing::warn!(code = resp.status().as_u16(), "Classifier liveness route answered non-2xx");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Classifier unreachable");
                false
            }
        }
    }

    fn name(&self) -> &str {
        "colab"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: String) -> ColabClassifier {
        ColabClassifier::with_base_url(base_url, 3, 10).expect("Failed to create client")
    }

    fn fire_response() -> serde_json::Value {
        serde_json::json!({
            "success": true,
            "result": {
                "urgence_pompiers": true,
                "niveau_danger": "eleve",
                "description": "Feu d'appartement avec fumee visible",
                "justification": "Flammes visibles sur la photo"
            }
        })
    }

    #[tokio::test]
    async fn analyze_posts_payload_and_returns_verdict() {
        let mock_server = MockServer::start().await;
        let client = test_client(mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/analyze"))
            .and(body_json(serde_json::json!({
                "image_url": "https://storage.example/photo.jpg",
                "transcription": "Il y a un feu dans mon appartement",
                "session_id": 123
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(fire_response()))
            .mount(&mock_server)
            .await;

        let verdict = client
            .analyze(
                "https://storage.example/photo.jpg",
                "Il y a un feu dans mon appartement",
                Some(123),
            )
            .await
            .expect("analyze should succeed");

        assert!(verdict.urgence_pompiers);
        assert_eq!(verdict.niveau_danger.as_deref(), Some("eleve"));
    }

    #[tokio::test]
    async fn analyze_returns_non_urgent_justification() {
        let mock_server = MockServer::start().await;
        let client = test_client(mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "result": {
                    "urgence_pompiers": false,
                    "justification": "Aucune urgence detectee"
                }
            })))
            .mount(&mock_server)
            .await;

        let verdict = client.analyze("https://x/p.jpg", "rien", None).await.unwrap();
        assert!(!verdict.urgence_pompiers);
        assert_eq!(verdict.justification.as_deref(), Some("Aucune urgence detectee"));
    }

    #[tokio::test]
    async fn analyze_does_not_retry_rejected_envelope() {
        let mock_server = MockServer::start().await;
        let client = test_client(mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "error": "image inaccessible"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let result = client.analyze("https://x/p.jpg", "feu", Some(1)).await;
        match result {
            Err(ClassifierError::Rejected(reason)) => assert_eq!(reason, "image inaccessible"),
            other => panic!("Expected Rejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn analyze_exhausts_retries_on_500() {
        let mock_server = MockServer::start().await;
        let client = test_client(mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&mock_server)
            .await;

        let result = client.analyze("https://x/p.jpg", "feu", Some(1)).await;
        match result {
            Err(ClassifierError::RetryExhausted { attempts }) => assert_eq!(attempts, 3),
            other => panic!("Expected RetryExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn analyze_retries_on_503_then_succeeds() {
        let mock_server = MockServer::start().await;
        let client = test_client(mock_server.uri());

        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(fire_response()))
            .mount(&mock_server)
            .await;

        let verdict = client.analyze("https://x/p.jpg", "feu", Some(1)).await;
        assert!(verdict.is_ok(), "Expected success after retry: {:?}", verdict.err());
    }

    #[tokio::test]
    async fn ping_true_on_200() {
        let mock_server = MockServer::start().await;
        let client = test_client(mock_server.uri());

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "llava", "device": "cuda"
            })))
            .mount(&mock_server)
            .await;

        assert!(client.ping().await);
    }

    #[tokio::test]
    async fn ping_false_on_error_status() {
        let mock_server = MockServer::start().await;
        let client = test_client(mock_server.uri());

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&mock_server)
            .await;

        assert!(!client.ping().await);
    }

    #[test]
    fn verdict_serializes_without_empty_fields() {
        let verdict = Verdict {
            urgence_pompiers: true,
            niveau_danger: None,
            description: None,
            justification: None,
        };
        let json = serde_json::to_string(&verdict).unwrap();
        assert_eq!(json, "{\"urgence_pompiers\":true}");
    }
}
