use tracing::debug;

use linkwheel_core::config::{TargetConfig, TargetKind};
use linkwheel_transport::{ChatId, Transport};

use crate::error::{DispatchError, Result};

/// Suffix the sidecar uses for phone-derived direct chat ids.
const DIRECT_ID_SUFFIX: &str = "@c.us";

/// An abstract destination, resolved fresh on every dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchTarget {
    /// A group chat matched by exact name in the session's chat list.
    Group { name: String },

    /// A direct chat addressed by its phone-derived identifier.
    Individual { id: ChatId },
}

impl DispatchTarget {
    /// Build a target from config, validating up front so a bad value
    /// fails at startup rather than on the first tick.
    pub fn from_config(config: &TargetConfig) -> Result<Self> {
        let value = config.value.trim();
        if value.is_empty() {
            return Err(DispatchError::InvalidTarget(
                "target.value must not be empty".to_string(),
            ));
        }
        match config.kind {
            TargetKind::Group => Ok(DispatchTarget::Group {
                name: value.to_string(),
            }),
            TargetKind::Individual => Ok(DispatchTarget::Individual {
                id: direct_chat_id(value)?,
            }),
        }
    }

    /// Resolve to a concrete chat id against the live session.
    ///
    /// Groups are matched by exact name among group chats only, and the
    /// listing is fetched fresh each time so a group created after startup
    /// is found without a restart.
    pub async fn resolve(&self, transport: &dyn Transport) -> Result<ChatId> {
        match self {
            DispatchTarget::Individual { id } => Ok(id.clone()),
            DispatchTarget::Group { name } => {
                let chats = transport.list_chats().await?;
                debug!(count = chats.len(), group = %name, "searching chat listing");
                chats
                    .into_iter()
                    .find(|chat| chat.is_group && chat.name == *name)
                    .map(|chat| chat.id)
                    .ok_or_else(|| DispatchError::TargetNotFound { name: name.clone() })
            }
        }
    }

    /// Label for logs.
    pub fn describe(&self) -> String {
        match self {
            DispatchTarget::Group { name } => format!("group {name:?}"),
            DispatchTarget::Individual { id } => format!("individual {id}"),
        }
    }
}

/// Derive a direct chat id from a phone number: keep the digits, append
/// the sidecar's user suffix.
fn direct_chat_id(phone: &str) -> Result<ChatId> {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(DispatchError::InvalidTarget(format!(
            "no digits in phone number {phone:?}"
        )));
    }
    Ok(ChatId::from(format!("{digits}{DIRECT_ID_SUFFIX}")))
}
