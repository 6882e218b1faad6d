//! # Gemini Acknowledgement Generator
//!
//! Calls the Vertex AI `generateContent` REST endpoint to produce a short
//! acknowledgement for a new ticket.

use crate::acknowledgement::{AcknowledgementError, AcknowledgementGenerator, AcknowledgementRequest};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Connection settings for [`GeminiAcknowledgement`]
#[derive(Clone)]
pub struct GeminiConfig {
    /// Regional endpoint, e.g. `https://us-central1-aiplatform.googleapis.com/`
    pub base_url: Url,
    pub project_id: String,
    pub location: String,
    pub model: String,

    /// OAuth2 bearer token
    pub access_token: Option<String>,

    pub timeout: Duration,
}

impl GeminiConfig {
    /// Public regional endpoint for `location`
    pub fn regional_endpoint(location: &str) -> Result<Url, url::ParseError> {
        Url::parse(&format!("https://{}-aiplatform.googleapis.com/", location))
    }
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("base_url", &self.base_url.as_str())
            .field("project_id", &self.project_id)
            .field("location", &self.location)
            .field("model", &self.model)
            .field("access_token", &self.access_token.as_ref().map(|_| "<REDACTED>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

/// Vertex AI text generator
#[derive(Clone)]
pub struct GeminiAcknowledgement {
    http_client: reqwest::Client,
    endpoint: Url,
    access_token: Option<String>,
    timeout: Duration,
}

impl GeminiAcknowledgement {
    /// Create generator for the configured model
    ///
    /// # Errors
    ///
    /// Returns error if the endpoint URL cannot be built or the HTTP client
    /// cannot be created.
    pub fn new(config: GeminiConfig) -> Result<Self, AcknowledgementError> {
        let path = format!(
            "v1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
            config.project_id, config.location, config.model
        );
        let endpoint = config
            .base_url
            .join(&path)
            .map_err(|e| AcknowledgementError::Unavailable {
                message: format!("Invalid Vertex AI endpoint: {}", e),
            })?;

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AcknowledgementError::Unavailable {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            endpoint,
            access_token: config.access_token,
            timeout: config.timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl AcknowledgementGenerator for GeminiAcknowledgement {
    async fn acknowledge(
        &self,
        request: &AcknowledgementRequest,
    ) -> Result<String, AcknowledgementError> {
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.render() }]
            }]
        });

        let mut builder = self.http_client.post(self.endpoint.clone()).json(&body);
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                AcknowledgementError::Timeout {
                    timeout_ms: self.timeout.as_millis() as u64,
                }
            } else {
                AcknowledgementError::Unavailable {
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AcknowledgementError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse =
            response
                .json()
                .await
                .map_err(|e| AcknowledgementError::Unavailable {
                    message: format!("Malformed response: {}", e),
                })?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let text = text.trim();
        if text.is_empty() {
            return Err(AcknowledgementError::EmptyResponse);
        }

        debug!(chars = text.len(), "Acknowledgement generated");
        Ok(text.to_string())
    }
}

#[cfg(test)]
#[path = "gemini_tests.rs"]
mod tests;
