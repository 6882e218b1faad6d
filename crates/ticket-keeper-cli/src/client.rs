//! HTTP client for a running Ticket-Keeper service.

use crate::CliError;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::time::Duration;
use ticket_keeper_api::{AdvanceResponse, FollowUpResponse, StatusResponse, SubmitResponse};
use tracing::debug;
use url::Url;

/// Client for the agent-facing and admin endpoints
#[derive(Debug, Clone)]
pub struct TicketKeeperClient {
    http_client: reqwest::Client,
    base_url: Url,
}

impl TicketKeeperClient {
    /// Create client for the service at `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if the URL cannot be parsed or the HTTP client cannot be
    /// created.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CliError> {
        let mut base_url = Url::parse(base_url).map_err(|e| CliError::InvalidArgument {
            arg: "--server".to_string(),
            message: e.to_string(),
        })?;

        // Endpoints are joined relative to the base path
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CliError::Http {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, CliError> {
        self.base_url
            .join(path)
            .map_err(|e| CliError::InvalidArgument {
                arg: "--server".to_string(),
                message: e.to_string(),
            })
    }

    async fn post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, CliError> {
        let url = self.endpoint(path)?;
        debug!(url = %url, "POST");

        let response = self
            .http_client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| CliError::Http {
                message: format!("{}: {}", url, e),
            })?;

        response.json().await.map_err(|e| CliError::Http {
            message: format!("Unexpected response from {}: {}", url, e),
        })
    }

    /// Raise a ticket; `fields` is sent as the request body
    pub async fn submit(&self, fields: Map<String, Value>) -> Result<SubmitResponse, CliError> {
        self.post("submit", &Value::Object(fields)).await
    }

    pub async fn status(&self, id: &str) -> Result<StatusResponse, CliError> {
        self.post("status", &json!({ "id": id })).await
    }

    pub async fn advance(
        &self,
        id: &str,
        status: &str,
        source: &str,
    ) -> Result<AdvanceResponse, CliError> {
        self.post(
            "advance-status",
            &json!({ "id": id, "status": status, "source": source }),
        )
        .await
    }

    pub async fn follow_ups(&self, id: &str) -> Result<FollowUpResponse, CliError> {
        self.post("admin/follow-ups", &json!({ "id": id })).await
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
