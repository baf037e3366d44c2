//! HTTP implementation of [`InventoryClient`].

use async_trait::async_trait;
use edgescout_common::types::PeripheralRecord;
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::inventory::middleware::TracingMiddleware;
use crate::inventory::{DedupStatus, InventoryClient, InventoryError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Inventory API client.
pub struct HttpInventoryClient {
    http: ClientWithMiddleware,
    peripheral_url: String,
    healthcheck_url: String,
}

impl HttpInventoryClient {
    pub fn new(
        peripheral_url: impl Into<String>,
        healthcheck_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, InventoryError> {
        let http = ClientBuilder::new(
            Client::builder()
                .connect_timeout(CONNECT_TIMEOUT.min(timeout))
                .timeout(timeout)
                .build()
                .map_err(InventoryError::Client)?,
        )
        .with(TracingMiddleware)
        .build();

        Ok(Self {
            http,
            peripheral_url: peripheral_url.into(),
            healthcheck_url: healthcheck_url.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, InventoryError> {
        Self::new(
            config.peripheral_url(),
            config.healthcheck_url(),
            config.http_timeout,
        )
    }

    /// Single health check against the inventory API
    pub async fn healthcheck(&self) -> Result<(), InventoryError> {
        let response = self.http.get(&self.healthcheck_url).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(InventoryError::Status { status, body })
    }

    /// Block until the inventory API answers its health check
    ///
    /// Retries forever with a fixed `retry` delay; callers bound it by racing
    /// against shutdown.
    pub async fn wait_bootstrap(&self, retry: Duration) {
        info!(url = %self.healthcheck_url, "waiting for inventory API");

        loop {
            match self.healthcheck().await {
                Ok(()) => break,
                Err(e) => {
                    warn!(
                        error = %e,
                        retry_secs = retry.as_secs_f64(),
                        "inventory API not ready, will keep trying"
                    );
                    tokio::time::sleep(retry).await;
                }
            }
        }

        info!("inventory API is ready");
    }
}

#[async_trait]
impl InventoryClient for HttpInventoryClient {
    async fn query(&self, identifier: &str) -> Result<DedupStatus, InventoryError> {
        let response = self
            .http
            .get(&self.peripheral_url)
            .query(&[("identifier_pattern", identifier)])
            .send()
            .await?;

        let success = response.status().is_success();
        let body = response.bytes().await.map_err(InventoryError::Body)?;
        let status = DedupStatus::from_response(success, &body);

        debug!(
            %identifier,
            success,
            body = %String::from_utf8_lossy(&body),
            ?status,
            "queried inventory"
        );
        Ok(status)
    }

    async fn publish(&self, record: &PeripheralRecord) -> Result<Value, InventoryError> {
        let response = self.http.post(&self.peripheral_url).json(record).send().await?;

        let status = response.status();
        let body = response.bytes().await.map_err(InventoryError::Body)?;
        if !status.is_success() {
            return Err(InventoryError::Status {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(serde_json::from_slice(&body)?)
    }
}
