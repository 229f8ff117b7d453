//! Time-bounded set of recently finalized transcripts.
//!
//! Engines occasionally deliver the same final chunk twice within a short
//! span.  [`DedupWindow`] remembers each accepted transcript until its entry
//! expires; expiry is evaluated lazily against the monotonic clock passed in.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
pub struct DedupWindow {
    window: Duration,
    /// transcript → expiry instant
    entries: HashMap<String, Instant>,
}

impl DedupWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: HashMap::new(),
        }
    }

    /// Record `text` as finalized at `now`.
    ///
    /// Returns `false` (and leaves the existing entry untouched) when the same
    /// text is still inside its window.
    pub fn admit(&mut self, text: &str, now: Instant) -> bool {
        self.prune(now);
        if self.entries.contains_key(text) {
            return false;
        }
        self.entries.insert(text.to_string(), now + self.window);
        true
    }

    /// Only affects entries admitted afterwards.
    pub fn set_window(&mut self, window: Duration) {
        self.window = window;
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn prune(&mut self, now: Instant) {
        self.entries.retain(|_, expiry| now < *expiry);
    }
}
