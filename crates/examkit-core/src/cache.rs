//! Offline progress cache.
//!
//! A `CacheManager` keeps one snapshot per exam in a `SnapshotStore`. Saving
//! and loading never fail from the caller's point of view: a broken or
//! missing snapshot reads as "no cache", and a failed write leaves the
//! previous snapshot in place.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{AnswerMap, ExamId, QuestionId};
use crate::time::Clock;

/// How long `is_saving` stays true after a successful save.
pub const SAVE_INDICATOR_MS: i64 = 500;

/// Saved copy of in-progress session state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    pub exam_id: ExamId,
    pub answers: AnswerMap,
    pub flagged: Vec<QuestionId>,
    pub current_question_index: usize,
    pub time_left_seconds: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub saved_at: DateTime<Utc>,
}

/// Storage key for an exam's snapshot.
///
/// ASCII letters, digits and `-` pass through. `_` is doubled and every other
/// byte is written as `_` plus two hex digits, so the key is file-name safe and
/// distinct exam ids never share a key.
pub fn cache_key(exam_id: &ExamId) -> String {
    let mut key = String::from("exam_cache_");
    for byte in exam_id.as_str().bytes() {
        match byte {
            b'_' => key.push_str("__"),
            b if b.is_ascii_alphanumeric() || b == b'-' => key.push(char::from(b)),
            b => key.push_str(&format!("_{b:02x}")),
        }
    }
    key
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

/// Key/value persistence for snapshots.
pub trait SnapshotStore: Send + Sync {
    /// Read a stored value. `Ok(None)` when the key does not exist.
    fn read(&self, key: &str) -> Result<Option<String>>;

    fn write(&self, key: &str, contents: &str) -> Result<()>;

    /// Remove a stored value. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// One JSON file per key inside a cache directory.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    fn write(&self, key: &str, contents: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create cache dir {}", self.dir.display()))?;

        // Write to a sibling temp file and rename, so a crash mid-write never
        // leaves a truncated snapshot behind.
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .context("failed to create temp snapshot file")?;
        tmp.write_all(contents.as_bytes())
            .context("failed to write snapshot")?;
        let path = self.path_for(key);
        tmp.persist(&path)
            .with_context(|| format!("failed to persist {}", path.display()))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
        }
    }
}

/// In-memory store, shared between clones.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|e| e.contains_key(key))
            .unwrap_or(false)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("snapshot store poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, contents: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("snapshot store poisoned"))?;
        entries.insert(key.to_string(), contents.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("snapshot store poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Cache manager
// ---------------------------------------------------------------------------

/// Snapshot persistence for one exam.
pub struct CacheManager {
    store: Arc<dyn SnapshotStore>,
    exam_id: ExamId,
    key: String,
    clock: Clock,
    last_saved_at: Option<DateTime<Utc>>,
    offline: bool,
}

impl CacheManager {
    pub fn new(store: Arc<dyn SnapshotStore>, exam_id: ExamId, clock: Clock) -> Self {
        let key = cache_key(&exam_id);
        Self {
            store,
            exam_id,
            key,
            clock,
            last_saved_at: None,
            offline: false,
        }
    }

    pub fn exam_id(&self) -> &ExamId {
        &self.exam_id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Persist a snapshot. Returns whether the write succeeded.
    ///
    /// Failures are logged and otherwise dropped; `last_saved_at` only moves
    /// on success.
    pub fn save(&mut self, snapshot: &CacheSnapshot) -> bool {
        let json = match serde_json::to_string(snapshot) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(exam_id = %self.exam_id, "failed to serialize snapshot: {e}");
                return false;
            }
        };

        match self.store.write(&self.key, &json) {
            Ok(()) => {
                self.last_saved_at = Some(self.clock.now());
                tracing::debug!(
                    exam_id = %self.exam_id,
                    time_left = snapshot.time_left_seconds,
                    "progress saved"
                );
                true
            }
            Err(e) => {
                tracing::warn!(exam_id = %self.exam_id, "autosave failed: {e:#}");
                false
            }
        }
    }

    /// Read the stored snapshot, if there is a usable one.
    pub fn load(&self) -> Option<CacheSnapshot> {
        let content = match self.store.read(&self.key) {
            Ok(Some(content)) => content,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(exam_id = %self.exam_id, "failed to read cached progress: {e:#}");
                return None;
            }
        };

        match serde_json::from_str::<CacheSnapshot>(&content) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(exam_id = %self.exam_id, "discarding unreadable cached progress: {e}");
                None
            }
        }
    }

    /// Remove the stored snapshot, logging any failure.
    pub fn clear(&mut self) {
        if let Err(e) = self.try_clear() {
            tracing::warn!(exam_id = %self.exam_id, "failed to clear cached progress: {e:#}");
        }
    }

    /// Remove the stored snapshot and report failures to the caller.
    pub fn try_clear(&mut self) -> Result<()> {
        self.store.remove(&self.key)
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.last_saved_at
    }

    /// True for a short window after each successful save.
    pub fn is_saving(&self) -> bool {
        self.last_saved_at
            .map(|at| self.clock.now() < at + Duration::milliseconds(SAVE_INDICATOR_MS))
            .unwrap_or(false)
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// Record connectivity. Informational only; saving never needs a network.
    pub fn set_offline(&mut self, offline: bool) {
        if self.offline != offline {
            tracing::info!(offline, "connectivity changed");
        }
        self.offline = offline;
    }

    #[cfg(test)]
    fn set_clock(&mut self, clock: Clock) {
        self.clock = clock;
    }
}
