//! Transcript history: every accepted final transcript with its annotation.
//!
//! [`TranscriptHistory`] is appended to by the session controller and read by
//! whatever renders the captions.  It is shared as [`SharedHistory`]
//! (`Arc<Mutex<TranscriptHistory>>`) and can be saved to / loaded from JSON.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TranscriptEntry
// ---------------------------------------------------------------------------

/// One finalized utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Session that produced the transcript.
    pub session_id: u64,
    /// Cleaned transcript as recognized.
    pub original: String,
    /// Ruby-annotated form, or `original` when annotation was skipped.
    pub annotated: String,
    /// Recognition language at the time.
    pub language: String,
    /// Wall-clock time of insertion, milliseconds since the Unix epoch.
    pub recorded_at_ms: u64,
}

impl TranscriptEntry {
    pub fn new(session_id: u64, original: String, annotated: String, language: String) -> Self {
        let recorded_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            session_id,
            original,
            annotated,
            language,
            recorded_at_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// TranscriptHistory
// ---------------------------------------------------------------------------

/// Ordered list of finalized transcripts, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptHistory {
    entries: Vec<TranscriptEntry>,
}

impl TranscriptHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Load from `path`, returning an empty history when the file is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Save to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SharedHistory
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`TranscriptHistory`].
///
/// Only the session controller writes to it; readers should keep the lock
/// for a short critical section and never across `.await`.
pub type SharedHistory = Arc<Mutex<TranscriptHistory>>;

pub fn new_shared_history(history: TranscriptHistory) -> SharedHistory {
    Arc::new(Mutex::new(history))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
