//! Health probes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::config::GatewayConfig;
use crate::error::GatewayError;

/// One health round trip.
#[async_trait]
pub trait HealthProbe: Send + Sync + 'static {
    async fn probe(&self) -> Result<(), GatewayError>;
}

/// `GET <base>/v3/config`; healthy iff the gateway answers 200.
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    /// Connect timeout is capped at 3s and never exceeds the request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(3)))
            .build()
            .map_err(|e| GatewayError::Request {
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            url: format!("{}/v3/config", base_url.trim_end_matches('/')),
        })
    }

    pub fn from_config(cfg: &GatewayConfig) -> Result<Self, GatewayError> {
        Self::new(&cfg.url, cfg.timeout)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self) -> Result<(), GatewayError> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| GatewayError::Request {
                reason: e.to_string(),
            })?;
        match resp.status() {
            StatusCode::OK => Ok(()),
            other => Err(GatewayError::Unhealthy {
                status: other.as_u16(),
            }),
        }
    }
}
