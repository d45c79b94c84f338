use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    error::TransportError,
    transport::Transport,
    types::{Chat, ChatId, TransportEvent, TransportStatus},
};

/// Timeout for sidecar control calls (`/status`, `/chats`). Sends carry
/// the delivery deadline passed at construction instead.
const HTTP_TIMEOUT_SECS: u64 = 10;
/// Event channel capacity — events are low-rate lifecycle notices.
const EVENT_CAPACITY: usize = 16;

/// Transport backed by a messaging sidecar speaking plain HTTP.
///
/// The sidecar owns the actual chat protocol and session storage; this
/// adapter only drives it:
///
/// | Call | Sidecar endpoint |
/// |------|------------------|
/// | `connect` | `GET /status` |
/// | `list_chats` | `GET /chats` |
/// | `send_message` | `POST /send` |
///
/// `connect` doubles as a session probe: calling it while connected
/// refreshes the cached status, and a `pairing` answer surfaces the QR
/// payload as a [`TransportEvent::Qr`] so an operator can link the device
/// out of band.
pub struct BridgeTransport {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    send_timeout: Duration,
    status: RwLock<TransportStatus>,
    events: broadcast::Sender<TransportEvent>,
    last_qr: RwLock<Option<String>>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    state: String,
    qr: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    chat_id: &'a str,
    message: &'a str,
}

impl BridgeTransport {
    /// `send_timeout` bounds a single `/send` request; control calls keep
    /// the fixed client-level timeout.
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        send_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(TransportError::ConfigError(
                "bridge url must not be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| TransportError::ConfigError(e.to_string()))?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            client,
            base_url,
            token,
            send_timeout,
            status: RwLock::new(TransportStatus::Disconnected),
            events,
            last_qr: RwLock::new(None),
        })
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.apply_auth(self.client.get(format!("{}{}", self.base_url, path)))
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.apply_auth(self.client.post(format!("{}{}", self.base_url, path)))
    }

    /// Apply the bearer token when one is configured.
    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn set_status(&self, next: TransportStatus) {
        *self.status.write().unwrap() = next;
    }

    /// Record a dropped session; subscribers are notified once per transition.
    fn mark_disconnected(&self, reason: &str) {
        let was_connected = matches!(self.status(), TransportStatus::Connected);
        self.set_status(TransportStatus::Disconnected);
        if was_connected {
            let _ = self.events.send(TransportEvent::Disconnected {
                reason: reason.to_string(),
            });
        }
    }

    /// Record that the sidecar could not be queried; the session state is
    /// unknown until a probe succeeds. Notifies once per transition, like
    /// [`Self::mark_disconnected`].
    fn mark_unreachable(&self, reason: &str) {
        let was_connected = matches!(self.status(), TransportStatus::Connected);
        self.set_status(TransportStatus::Error(reason.to_string()));
        if was_connected {
            let _ = self.events.send(TransportEvent::Disconnected {
                reason: reason.to_string(),
            });
        }
    }

    /// Publish a QR payload if it differs from the last one seen.
    fn publish_qr(&self, code: String) {
        let mut last = self.last_qr.write().unwrap();
        if last.as_deref() != Some(code.as_str()) {
            info!(code = %code, "sidecar published a pairing QR payload");
            *last = Some(code.clone());
            let _ = self.events.send(TransportEvent::Qr { code });
        }
    }
}

#[async_trait]
impl Transport for BridgeTransport {
    fn name(&self) -> &str {
        "bridge"
    }

    async fn connect(&self) -> Result<(), TransportError> {
        if !self.is_connected() {
            self.set_status(TransportStatus::Connecting);
        }

        let resp = self.get("/status").send().await.map_err(|e| {
            self.mark_unreachable("status probe failed");
            TransportError::ConnectionFailed(e.to_string())
        })?;

        let http_status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            self.mark_unreachable("status probe rejected");
            return Err(TransportError::Rejected {
                status: http_status,
                body,
            });
        }

        let parsed: StatusResponse = resp.json().await.map_err(|e| {
            self.mark_unreachable("status probe unparseable");
            TransportError::ConnectionFailed(format!("status parse: {e}"))
        })?;

        match parsed.state.as_str() {
            "connected" => {
                let was = self.status();
                self.set_status(TransportStatus::Connected);
                if was != TransportStatus::Connected {
                    *self.last_qr.write().unwrap() = None;
                    let _ = self.events.send(TransportEvent::Ready);
                }
                Ok(())
            }
            "pairing" => {
                self.set_status(TransportStatus::Pairing);
                if let Some(code) = parsed.qr {
                    self.publish_qr(code);
                }
                Err(TransportError::ConnectionFailed(
                    "sidecar session awaiting QR pairing".to_string(),
                ))
            }
            other => {
                self.mark_disconnected("sidecar reports no session");
                Err(TransportError::ConnectionFailed(format!(
                    "sidecar session state: {other}"
                )))
            }
        }
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.set_status(TransportStatus::Disconnected);
        Ok(())
    }

    fn status(&self) -> TransportStatus {
        self.status.read().unwrap().clone()
    }

    async fn list_chats(&self) -> Result<Vec<Chat>, TransportError> {
        let resp = self.get("/chats").send().await.map_err(|e| {
            self.mark_unreachable("chat listing failed");
            TransportError::ConnectionFailed(e.to_string())
        })?;

        let http_status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = http_status, body = %body, "sidecar rejected chat listing");
            return Err(TransportError::Rejected {
                status: http_status,
                body,
            });
        }

        resp.json::<Vec<Chat>>()
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("chat listing parse: {e}")))
    }

    async fn send_message(&self, chat: &ChatId, text: &str) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        debug!(chat = %chat, "posting message to sidecar");
        let resp = self
            .post("/send")
            .timeout(self.send_timeout)
            .json(&SendRequest {
                chat_id: chat.as_str(),
                message: text,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout {
                        ms: self.send_timeout.as_millis() as u64,
                    }
                } else {
                    self.mark_unreachable("send transport failure");
                    TransportError::SendFailed(e.to_string())
                }
            })?;

        let http_status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = http_status, body = %body, "sidecar rejected send");
            return Err(TransportError::Rejected {
                status: http_status,
                body,
            });
        }
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }
}
