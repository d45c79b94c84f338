use thiserror::Error;

/// Errors that can occur during rotation operations.
///
/// Reads never error here — an unreadable source or cursor record falls back
/// softly inside the store. Only the durable cursor write can fail, which
/// aborts the selection before a link is handed out.
#[derive(Debug, Error)]
pub enum RotationError {
    /// Writing the cursor record to disk failed.
    #[error("failed to persist cursor to {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Serializing the cursor record failed.
    #[error("failed to encode cursor record: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RotationError>;
