//! Remote relay service polling.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::error::RelayError;
use crate::protocol::parse_relay_devices;
use crate::types::{DeviceRecord, RelayListing};

/// Lists the devices a relay service knows about.
#[async_trait]
pub trait RelayClient: Send + Sync {
    async fn list_devices(&self) -> Result<RelayListing, RelayError>;
}

#[derive(Deserialize)]
struct RawListing {
    #[serde(default)]
    devices: Vec<Value>,
}

/// Relay client over HTTP: `GET <base>/devices` returning `{"devices": [...]}`.
pub struct HttpRelayClient {
    client: Client,
    url: String,
}

impl HttpRelayClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::Request(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: format!("{}/devices", base_url.trim_end_matches('/')),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RelayClient for HttpRelayClient {
    async fn list_devices(&self) -> Result<RelayListing, RelayError> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Status(status.as_u16()));
        }

        let raw: RawListing = response.json().await?;
        Ok(RelayListing {
            devices: parse_relay_devices(raw.devices),
        })
    }
}

/// Poll `client` after `initial_delay`, then every `interval`, forwarding each
/// successful listing. Failed fetches are logged and skipped. Returns once the
/// receiver is dropped.
pub async fn run_relay_poller(
    client: Arc<dyn RelayClient>,
    initial_delay: Duration,
    interval: Duration,
    listings: mpsc::Sender<Vec<DeviceRecord>>,
) {
    tokio::time::sleep(initial_delay).await;
    let mut ticker = tokio::time::interval(interval);
    // A slow fetch pushes the schedule back instead of triggering catch-up polls.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        match client.list_devices().await {
            Ok(listing) => {
                debug!("Relay listed {} device(s)", listing.devices.len());
                if listings.send(listing.devices).await.is_err() {
                    return;
                }
            }
            Err(e) => warn!("Relay fetch failed: {}", e),
        }
    }
}
