use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform-native chat identifier (e.g. `"1203...@g.us"` for a group,
/// `"9198...@c.us"` for an individual).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub String);

impl ChatId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ChatId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ChatId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A chat visible to the connected session, in the sidecar's wire shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: ChatId,
    pub name: String,
    pub is_group: bool,
}

/// Runtime session state of a transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportStatus {
    /// Session established and ready to send.
    Connected,

    /// Attempting to establish or re-establish the session.
    Connecting,

    /// The external client is waiting for a QR scan.
    Pairing,

    /// No session (initial state, or after a drop).
    Disconnected,

    /// The external client could not be queried; session state unknown.
    Error(String),
}

impl TransportStatus {
    /// Short label for logs and the health endpoint.
    pub fn label(&self) -> &'static str {
        match self {
            TransportStatus::Connected => "connected",
            TransportStatus::Connecting => "connecting",
            TransportStatus::Pairing => "pairing",
            TransportStatus::Disconnected => "disconnected",
            TransportStatus::Error(_) => "error",
        }
    }
}

/// Lifecycle notifications emitted by a transport.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// Session established.
    Ready,

    /// The external client published a pairing QR payload.
    Qr { code: String },

    /// The session dropped.
    Disconnected { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_parses_the_camel_case_wire_shape() {
        let chat: Chat =
            serde_json::from_str(r#"{"id":"123@g.us","name":"Daily Links","isGroup":true}"#)
                .unwrap();
        assert_eq!(chat.id.as_str(), "123@g.us");
        assert_eq!(chat.name, "Daily Links");
        assert!(chat.is_group);
    }

    #[test]
    fn chat_id_displays_the_raw_identifier() {
        let id = ChatId::from("456@c.us");
        assert_eq!(id.to_string(), "456@c.us");
    }

    #[test]
    fn status_labels_are_stable() {
        assert_eq!(TransportStatus::Connected.label(), "connected");
        assert_eq!(TransportStatus::Error("boom".into()).label(), "error");
    }
}
