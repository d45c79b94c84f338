pub mod bridge;
pub mod error;
pub mod supervisor;
pub mod transport;
pub mod types;

pub use bridge::BridgeTransport;
pub use error::TransportError;
pub use supervisor::{BackoffPolicy, SupervisorConfig};
pub use transport::Transport;
pub use types::{Chat, ChatId, TransportEvent, TransportStatus};
