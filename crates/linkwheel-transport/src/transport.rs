use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::{
    error::TransportError,
    types::{Chat, ChatId, TransportEvent, TransportStatus},
};

/// Common interface implemented by every messaging transport.
///
/// Implementations must be `Send + Sync` so one instance can be shared
/// between the dispatch engine and the connection supervisor behind an
/// `Arc<dyn Transport>`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Stable lowercase identifier for this transport (e.g. `"bridge"`).
    fn name(&self) -> &str;

    /// Establish (or re-establish) the session with the external client.
    ///
    /// This is intentionally `&self` (shared reference) so the supervisor
    /// can reconnect while other tasks hold the same instance; state lives
    /// behind interior mutability and transitions to
    /// [`TransportStatus::Connected`] on success.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Close the session locally.
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Return the current session state without blocking.
    ///
    /// Dispatch reads this snapshot at tick time and acts on it — it never
    /// races a send against a reconnect.
    fn status(&self) -> TransportStatus;

    fn is_connected(&self) -> bool {
        matches!(self.status(), TransportStatus::Connected)
    }

    /// List the chats visible to the connected session.
    async fn list_chats(&self) -> Result<Vec<Chat>, TransportError>;

    /// Deliver one message to a chat.
    async fn send_message(&self, chat: &ChatId, text: &str) -> Result<(), TransportError>;

    /// Subscribe to lifecycle events (session ready, QR pairing, drops).
    fn events(&self) -> broadcast::Receiver<TransportEvent>;
}
