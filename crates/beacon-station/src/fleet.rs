//! # Fleet Dispatch
//!
//! Asks the robot fleet to bring a rack side to a station or take it back.
//! Dispatch never blocks a station and never joins a commit: the request is
//! handed to a background task and a failure is only logged.

use async_trait::async_trait;
use beacon_core::FleetRequest;
use tracing::{debug, info, warn};

use crate::config::FleetSettings;
use crate::error::{StationError, StationResult};

#[async_trait]
pub trait FleetDispatcher: Send + Sync {
    async fn dispatch(&self, request: &FleetRequest) -> StationResult<()>;
}

/// HTTP client for `POST {base_url}/fleet`.
#[derive(Debug, Clone)]
pub struct HttpFleetClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpFleetClient {
    pub fn new(settings: &FleetSettings) -> StationResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .user_agent(concat!("beacon-station/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(HttpFleetClient {
            client,
            endpoint: format!("{}/fleet", settings.base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl FleetDispatcher for HttpFleetClient {
    async fn dispatch(&self, request: &FleetRequest) -> StationResult<()> {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let request = request.clone();

        info!(
            station = %request.station,
            rack = %request.rack,
            side = %request.side,
            task = ?request.task_type,
            "Fleet dispatch"
        );

        tokio::spawn(async move {
            let result = client
                .post(&endpoint)
                .json(&request)
                .send()
                .await
                .map_err(StationError::from)
                .and_then(|r| {
                    if r.status().is_success() {
                        Ok(())
                    } else {
                        Err(StationError::Transport(format!("fleet returned {}", r.status())))
                    }
                });

            match result {
                Ok(()) => debug!(station = %request.station, "Fleet accepted dispatch"),
                Err(e) => warn!(station = %request.station, error = %e, "Fleet dispatch failed"),
            }
        });
        Ok(())
    }
}
