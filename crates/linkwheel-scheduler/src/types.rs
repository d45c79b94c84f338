use linkwheel_transport::ChatId;

/// Observable result of one dispatch cycle.
///
/// Every variant is terminal for its tick. The engine logs these and never
/// propagates them, so the trigger loop survives all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The link went out.
    Sent { link: String, chat: ChatId },

    /// The transport had no live session at tick time; nothing was touched.
    SkippedDisconnected,

    /// The configured group is not visible to the session.
    TargetNotFound { name: String },

    /// Listing chats failed underneath target resolution.
    ResolveFailed { reason: String },

    /// The link source is empty; the cursor was not advanced.
    NoLinks,

    /// The cursor could not be persisted; no send was attempted.
    RotationFailed { reason: String },

    /// The transport rejected the send. The selected link is consumed.
    SendFailed { reason: String },

    /// The send exceeded its deadline. The selected link is consumed.
    SendTimeout { ms: u64 },
}

impl TickOutcome {
    /// Short label for structured logs.
    pub fn label(&self) -> &'static str {
        match self {
            TickOutcome::Sent { .. } => "sent",
            TickOutcome::SkippedDisconnected => "skipped_disconnected",
            TickOutcome::TargetNotFound { .. } => "target_not_found",
            TickOutcome::ResolveFailed { .. } => "resolve_failed",
            TickOutcome::NoLinks => "no_links",
            TickOutcome::RotationFailed { .. } => "rotation_failed",
            TickOutcome::SendFailed { .. } => "send_failed",
            TickOutcome::SendTimeout { .. } => "send_timeout",
        }
    }
}
