//! HTTP health client backed by reqwest

use async_trait::async_trait;
use std::time::Duration;

use shared::ProbeFailure;

use crate::traits::HealthClient;

pub struct RealHealthClient {
    client: reqwest::Client,
}

impl RealHealthClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn classify(error: &reqwest::Error) -> ProbeFailure {
        if error.is_timeout() {
            ProbeFailure::Timeout
        } else if error.is_connect() {
            ProbeFailure::ConnectionRefused(error.to_string())
        } else {
            ProbeFailure::Request(error.to_string())
        }
    }
}

impl Default for RealHealthClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HealthClient for RealHealthClient {
    async fn check(&self, url: &str, timeout: Duration) -> Result<(), ProbeFailure> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Self::classify(&e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ProbeFailure::HttpStatus(status.as_u16()))
        }
    }
}
