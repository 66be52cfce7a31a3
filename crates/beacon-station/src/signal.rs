//! # Signal Coordinator
//!
//! Lights the resolved bin on the panel and routes the panel's own
//! confirmations back to the station that is waiting on that location.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Station worker ── activate(station, cmd) ──► SignalCoordinator        │
//! │                                                 │  awaited[station]=loc │
//! │                                                 ▼                       │
//! │                                           SignalSink (HTTP POST,       │
//! │                                           fire-and-forget)             │
//! │                                                                         │
//! │  Panel WS ──► PanelListener ──► broadcast<SignalConfirmation>          │
//! │                                        │                                │
//! │                                        ▼                                │
//! │                    engine dispatch loop: stations_awaiting(loc)        │
//! │                    → one task per event → worker.confirm(loc)          │
//! │                                                                         │
//! │  Locations nobody awaits are dropped.                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use beacon_core::{SignalCommand, SignalConfirmation};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::config::LightPanelSettings;
use crate::error::{StationError, StationResult};

/// Event name the panel uses for a location confirmation.
pub const LIGHT_COMMAND_EVENT: &str = "lightCommand";

// =============================================================================
// Signal Sink
// =============================================================================

/// Something that can switch on a location light.
///
/// Implementations return as soon as the request is handed off; delivery
/// failures are logged, never reported back to the session.
#[async_trait]
pub trait SignalSink: Send + Sync {
    async fn activate(&self, command: &SignalCommand) -> StationResult<()>;
}

/// One entry of the panel's `Details` array.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct LightDetail {
    location_id: String,
    light_color: u32,
    twinkle: u8,
    is_locked: u8,
    is_must_collect: u8,
    quantity: i64,
    sub_text: String,
    batch_code: String,
    name: String,
    r1: String,
    r2: String,
    r3: String,
    sub_title: String,
    title: String,
    unit: String,
    relate_to_tower: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
struct LightRequest {
    details: Vec<LightDetail>,
}

impl LightRequest {
    fn from_command(command: &SignalCommand) -> Self {
        let payload = &command.payload;
        let line = |i: usize| payload.lines.get(i).cloned().unwrap_or_default();

        LightRequest {
            details: vec![LightDetail {
                location_id: command.location_id.clone(),
                light_color: payload.color,
                twinkle: 0,
                is_locked: 0,
                is_must_collect: 1,
                quantity: payload.quantity,
                sub_text: payload.quantity.to_string(),
                batch_code: payload.title.clone(),
                name: payload.sub_title.clone(),
                r1: line(0),
                r2: line(1),
                r3: line(2),
                sub_title: payload.sub_title.clone(),
                title: payload.title.clone(),
                unit: payload.unit.clone(),
                relate_to_tower: false,
            }],
        }
    }
}

/// HTTP client for the light panel's `Light/PostInfo` endpoint.
#[derive(Debug, Clone)]
pub struct HttpLightPanel {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpLightPanel {
    pub fn new(settings: &LightPanelSettings) -> StationResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout())
            .user_agent(concat!("beacon-station/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(HttpLightPanel {
            client,
            endpoint: format!("{}/Light/PostInfo", settings.base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(client: reqwest::Client, endpoint: String, body: LightRequest) -> StationResult<()> {
        let response = client.post(&endpoint).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(StationError::Transport(format!(
                "light panel returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SignalSink for HttpLightPanel {
    async fn activate(&self, command: &SignalCommand) -> StationResult<()> {
        let body = LightRequest::from_command(command);
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();
        let location_id = command.location_id.clone();

        tokio::spawn(async move {
            match Self::post(client, endpoint, body).await {
                Ok(()) => debug!(location_id = %location_id, "Light activated"),
                Err(e) => warn!(location_id = %location_id, error = %e, "Light activation failed"),
            }
        });
        Ok(())
    }
}

// =============================================================================
// Coordinator
// =============================================================================

/// Tracks which location each station waits on and carries the
/// confirmation stream.
pub struct SignalCoordinator {
    sink: Arc<dyn SignalSink>,
    /// station id → awaited location id
    awaited: Mutex<HashMap<String, String>>,
    confirmations: broadcast::Sender<SignalConfirmation>,
}

impl SignalCoordinator {
    pub fn new(sink: Arc<dyn SignalSink>) -> Self {
        let (confirmations, _) = broadcast::channel(256);
        SignalCoordinator {
            sink,
            awaited: Mutex::new(HashMap::new()),
            confirmations,
        }
    }

    /// Registers `station` as waiting on the command's location, then lights it.
    pub async fn activate(&self, station_id: &str, command: &SignalCommand) {
        self.awaited
            .lock()
            .insert(station_id.to_string(), command.location_id.clone());

        info!(
            station = %station_id,
            location_id = %command.location_id,
            quantity = command.payload.quantity,
            "Signalling location"
        );
        if let Err(e) = self.sink.activate(command).await {
            warn!(station = %station_id, error = %e, "Signal hand-off failed");
        }
    }

    /// Forgets whatever `station` was waiting on.
    pub fn release(&self, station_id: &str) {
        self.awaited.lock().remove(station_id);
    }

    pub fn awaited_by(&self, station_id: &str) -> Option<String> {
        self.awaited.lock().get(station_id).cloned()
    }

    /// Stations currently waiting on `location_id`.
    pub fn stations_awaiting(&self, location_id: &str) -> Vec<String> {
        let mut stations: Vec<String> = self
            .awaited
            .lock()
            .iter()
            .filter(|(_, loc)| loc.as_str() == location_id)
            .map(|(station, _)| station.clone())
            .collect();
        stations.sort();
        stations
    }

    /// Publishes a confirmation to every subscriber. Returns the number of
    /// receivers that saw it.
    pub fn publish(&self, confirmation: SignalConfirmation) -> usize {
        self.confirmations.send(confirmation).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SignalConfirmation> {
        self.confirmations.subscribe()
    }

    /// Sender for feeding confirmations from a [`PanelListener`].
    pub fn sender(&self) -> broadcast::Sender<SignalConfirmation> {
        self.confirmations.clone()
    }
}

// =============================================================================
// Panel Events
// =============================================================================

#[derive(Debug, Deserialize)]
struct PanelEvent {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Decodes a panel frame into a confirmation.
///
/// Accepts `{"event":"lightCommand","data":{"LocationId":..}}` and the
/// Socket.IO form `42["lightCommand",{"LocationId":..}]`. `LocationId` may
/// be a string or a number. Anything else yields `None`.
pub fn parse_panel_event(text: &str) -> Option<SignalConfirmation> {
    let text = text.trim();
    let (event, data) = if text.starts_with('{') {
        let parsed: PanelEvent = serde_json::from_str(text).ok()?;
        (parsed.event, parsed.data)
    } else {
        let body = text.trim_start_matches(|c: char| c.is_ascii_digit());
        let mut parts: Vec<Value> = serde_json::from_str(body).ok()?;
        if parts.len() < 2 {
            return None;
        }
        let data = parts.swap_remove(1);
        (parts.first()?.as_str()?.to_string(), data)
    };

    if event != LIGHT_COMMAND_EVENT {
        return None;
    }

    let location_id = match data.get("LocationId")? {
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Some(SignalConfirmation { location_id })
}

// =============================================================================
// Panel Listener
// =============================================================================

/// Connection settings for the panel event stream.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    pub url: String,
    pub connect_timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl ListenerConfig {
    pub fn from_settings(settings: &LightPanelSettings) -> Option<Self> {
        settings.events_url.as_ref().map(|url| ListenerConfig {
            url: url.clone(),
            connect_timeout: settings.timeout(),
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_secs(settings.max_backoff_secs),
        })
    }
}

/// Handle to a running [`PanelListener`].
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl ListenerHandle {
    pub async fn shutdown(&self) -> StationResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| StationError::ChannelError("Panel listener already stopped".into()))
    }
}

/// Consumes the panel's WebSocket and republishes confirmations, reconnecting
/// with exponential backoff.
pub struct PanelListener {
    config: ListenerConfig,
    confirmations: broadcast::Sender<SignalConfirmation>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl PanelListener {
    pub fn spawn(config: ListenerConfig, confirmations: broadcast::Sender<SignalConfirmation>) -> ListenerHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let listener = PanelListener {
            config,
            confirmations,
            shutdown_rx,
        };
        tokio::spawn(listener.run());
        ListenerHandle { shutdown_tx }
    }

    async fn run(mut self) {
        info!(url = %self.config.url, "Panel listener starting");
        let mut backoff = self.create_backoff();

        loop {
            if self.shutdown_rx.try_recv().is_ok() {
                break;
            }

            match self.connect_with_timeout().await {
                Ok(ws_stream) => {
                    info!("Panel event stream connected");
                    backoff.reset();
                    match self.read_loop(ws_stream).await {
                        Ok(true) => break,
                        Ok(false) => info!("Panel event stream closed"),
                        Err(e) => warn!(error = %e, "Panel event stream failed"),
                    }
                }
                Err(e) => error!(error = %e, "Failed to connect to panel events"),
            }

            let Some(duration) = backoff.next_backoff() else {
                error!("Backoff exhausted");
                break;
            };
            debug!(?duration, "Waiting before panel reconnect");
            tokio::select! {
                _ = tokio::time::sleep(duration) => {}
                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown during backoff");
                    break;
                }
            }
        }

        info!("Panel listener stopped");
    }

    async fn connect_with_timeout(&self) -> StationResult<WebSocketStream<MaybeTlsStream<TcpStream>>> {
        match timeout(self.config.connect_timeout, connect_async(self.config.url.as_str())).await {
            Ok(Ok((ws_stream, response))) => {
                debug!(status = ?response.status(), "Panel handshake complete");
                Ok(ws_stream)
            }
            Ok(Err(e)) => Err(StationError::from(e)),
            Err(_) => Err(StationError::Transport(format!(
                "connect timed out after {}s",
                self.config.connect_timeout.as_secs()
            ))),
        }
    }

    /// Returns `Ok(true)` when asked to shut down.
    async fn read_loop(&mut self, ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>) -> StationResult<bool> {
        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                frame = read.next() => {
                    match frame {
                        Some(Ok(WsMessage::Text(text))) => {
                            match parse_panel_event(&text) {
                                Some(confirmation) => {
                                    debug!(location_id = %confirmation.location_id, "Panel confirmation");
                                    let _ = self.confirmations.send(confirmation);
                                }
                                None => debug!("Ignoring panel frame"),
                            }
                        }
                        Some(Ok(WsMessage::Ping(data))) => {
                            write.send(WsMessage::Pong(data)).await?;
                        }
                        Some(Ok(WsMessage::Close(frame))) => {
                            info!(?frame, "Panel sent close frame");
                            return Ok(false);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(StationError::from(e)),
                        None => return Ok(false),
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    let _ = write.send(WsMessage::Close(None)).await;
                    return Ok(true);
                }
            }
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.config.initial_backoff,
            max_interval: self.config.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}
