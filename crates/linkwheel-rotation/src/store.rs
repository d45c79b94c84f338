use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, instrument, warn};

use crate::error::{Result, RotationError};
use crate::types::{CursorRecord, Selection};

/// Durable round-robin selector over a line-delimited link source.
///
/// The link file is re-read on every selection, so it can be edited while
/// the daemon runs; additions and removals take effect on the next pick.
/// The cursor is a whole-record JSON file overwritten on each advance, and
/// the advance is persisted before the caller sees the link: a crash after
/// the write can skip a link, but the same link is never handed out twice.
pub struct RotationStore {
    links_path: PathBuf,
    cursor_path: PathBuf,
    // Serializes the read-modify-write in next_link so two callers never
    // observe the same pre-advance cursor.
    advance: Mutex<()>,
}

impl RotationStore {
    pub fn new(links_path: impl Into<PathBuf>, cursor_path: impl Into<PathBuf>) -> Self {
        Self {
            links_path: links_path.into(),
            cursor_path: cursor_path.into(),
            advance: Mutex::new(()),
        }
    }

    /// Read the link source fresh: split on newlines, trim, drop empties.
    ///
    /// An unreadable source is not an error — it reads as an empty list so
    /// a missing or momentarily locked file never takes the daemon down.
    pub fn load_links(&self) -> Vec<String> {
        match fs::read_to_string(&self.links_path) {
            Ok(raw) => raw
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect(),
            Err(e) => {
                warn!(
                    path = %self.links_path.display(),
                    error = %e,
                    "link source unreadable, treating as empty"
                );
                Vec::new()
            }
        }
    }

    /// Read the persisted cursor, `0` when the record is missing or corrupt.
    pub fn load_cursor(&self) -> u64 {
        let raw = match fs::read_to_string(&self.cursor_path) {
            Ok(raw) => raw,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    warn!(
                        path = %self.cursor_path.display(),
                        error = %e,
                        "cursor record unreadable, rotation restarts at 0"
                    );
                }
                return 0;
            }
        };
        match serde_json::from_str::<CursorRecord>(&raw) {
            Ok(record) => record.last_index,
            Err(e) => {
                warn!(
                    path = %self.cursor_path.display(),
                    error = %e,
                    "cursor record corrupt, rotation restarts at 0"
                );
                0
            }
        }
    }

    /// Durably overwrite the whole cursor record.
    ///
    /// Writes a temp file and renames it into place, so a crash mid-write
    /// leaves the previous record intact.
    pub fn persist_cursor(&self, value: u64) -> Result<()> {
        let json = serde_json::to_string_pretty(&CursorRecord { last_index: value })?;

        let temp_path = temp_sibling(&self.cursor_path);
        fs::write(&temp_path, json).map_err(|source| RotationError::Persist {
            path: temp_path.display().to_string(),
            source,
        })?;
        fs::rename(&temp_path, &self.cursor_path).map_err(|source| RotationError::Persist {
            path: self.cursor_path.display().to_string(),
            source,
        })?;
        debug!(cursor = value, path = %self.cursor_path.display(), "cursor persisted");
        Ok(())
    }

    /// Select the next link in rotation.
    ///
    /// Returns `Ok(None)` when the source is empty, without touching the
    /// cursor. Otherwise the effective index is `cursor mod len`, the record
    /// is advanced to `effective + 1` *before* the link is returned, and the
    /// pick is handed back with its position.
    #[instrument(skip(self))]
    pub fn next_link(&self) -> Result<Option<Selection>> {
        let _guard = self.advance.lock().unwrap();

        let links = self.load_links();
        if links.is_empty() {
            return Ok(None);
        }

        let cursor = self.load_cursor();
        let index = (cursor % links.len() as u64) as usize;
        self.persist_cursor(index as u64 + 1)?;

        Ok(Some(Selection {
            link: links[index].clone(),
            index,
            total: links.len(),
        }))
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut buf = path.as_os_str().to_owned();
    buf.push(".tmp");
    PathBuf::from(buf)
}
