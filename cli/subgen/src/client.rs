//! HTTP client for subscription downloads.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::error::CliError;

/// Default download timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Fetches subscription documents.
#[derive(Debug, Clone)]
pub struct SubscriptionClient {
    client: reqwest::Client,
}

impl SubscriptionClient {
    /// Create a client whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("subgen/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// GET the subscription body. Any non-2xx status is an error.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, CliError> {
        debug!(url, "downloading subscription");
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CliError::Download {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        info!(url, bytes = body.len(), "subscription downloaded");
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> SubscriptionClient {
        SubscriptionClient::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sub"))
            .respond_with(ResponseTemplate::new(200).set_body_string("dm1lc3M6Ly9hYmM="))
            .expect(1)
            .mount(&server)
            .await;

        let body = client()
            .fetch(&format!("{}/sub", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, b"dm1lc3M6Ly9hYmM=");
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let err = client()
            .fetch(&format!("{}/sub", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Download { status: 403, .. }));
    }

    #[tokio::test]
    async fn test_fetch_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let slow = SubscriptionClient::new(Duration::from_millis(200)).unwrap();
        let err = slow
            .fetch(&format!("{}/sub", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Network(_)));
    }
}
