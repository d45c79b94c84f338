use serde::{Deserialize, Serialize};

/// Whole-record cursor artifact, overwritten on every advance.
///
/// On disk this is `{"lastIndex": n}` — the same shape earlier deployments
/// of the bot left behind, so an existing record is picked up as-is. The
/// value may exceed the current list length; selection reduces it modulo
/// the length, never the record itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorRecord {
    pub last_index: u64,
}

/// One rotation pick: the link plus where it sat in the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub link: String,
    /// Effective index the link was taken from (`cursor mod len`).
    pub index: usize,
    /// List length at selection time.
    pub total: usize,
}
