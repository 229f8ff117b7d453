//! Session bookkeeping and the read-only status snapshot.
//!
//! [`SessionState`] is owned exclusively by the controller task.  Two
//! identities fence asynchronous work:
//!
//! * [`SessionId`]: allocated when the engine reports that it started.
//!   Watchdog ticks carry it and are ignored once it is no longer current.
//! * [`Epoch`]: bumped by every reset.  Deferred starts and restarts carry
//!   the epoch they were scheduled in and are dropped if anything reset the
//!   state in between.

use std::fmt;

use tokio::time::Instant;

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

/// Opaque identity of one engine session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Reset generation of the controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch(u64);

/// Progress of a start that the engine has not confirmed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPhase {
    /// Waiting out the settle delay; the engine has not been told anything.
    Settling,
    /// The start command was issued; waiting for the engine's `Start`.
    Issued,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One continuous run of the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: SessionId,
    pub started_at: Instant,
    pub last_result_at: Instant,
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct SessionState {
    session: Option<Session>,
    /// Consecutive engine errors since the last successful start.
    pub error_count: u32,
    /// Set by an explicit stop; suppresses the auto-restart on `End`.
    pub manual_stop_requested: bool,
    /// A start is in flight but not yet confirmed by the engine.
    pub pending_start: Option<StartPhase>,
    /// Last user-visible failure.
    pub last_error: Option<String>,
    /// When the engine last reported an error.
    pub last_engine_error_at: Option<Instant>,
    epoch: u64,
    next_id: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new session: fresh id, timestamps at `now`, error count
    /// cleared, any pending start or stop request consumed.
    pub fn begin(&mut self, now: Instant) -> SessionId {
        self.next_id += 1;
        let id = SessionId(self.next_id);
        self.session = Some(Session {
            id,
            started_at: now,
            last_result_at: now,
        });
        self.error_count = 0;
        self.pending_start = None;
        self.manual_stop_requested = false;
        id
    }

    /// Drop the current session and invalidate everything scheduled so far.
    ///
    /// The manual-stop flag and error count survive a reset.
    pub fn reset(&mut self) {
        self.session = None;
        self.pending_start = None;
        self.epoch = self.epoch.wrapping_add(1);
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Active, or about to be once the pending start goes through.
    pub fn is_running_or_starting(&self) -> bool {
        self.is_active() || self.pending_start.is_some()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn current_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|s| s.id)
    }

    /// Record activity on the current session and return its id, or `None`
    /// when no session is active.
    pub fn touch(&mut self, now: Instant) -> Option<SessionId> {
        let session = self.session.as_mut()?;
        session.last_result_at = now;
        Some(session.id)
    }

    /// Whether a newer session has begun since `id` was allocated.
    ///
    /// A session that merely ended is not superseded until the next one
    /// starts.
    pub fn is_superseded(&self, id: SessionId) -> bool {
        id.0 != self.next_id
    }

    pub fn epoch(&self) -> Epoch {
        Epoch(self.epoch)
    }

    pub fn is_current_epoch(&self, epoch: Epoch) -> bool {
        self.epoch == epoch.0
    }
}

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// Point-in-time snapshot returned by `status()`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub active: bool,
    /// A start has been issued but the engine has not confirmed it yet.
    pub starting: bool,
    pub session_id: Option<SessionId>,
    pub error_count: u32,
    pub language: String,
    pub started_at: Option<Instant>,
    pub last_result_at: Option<Instant>,
    pub watchdog_armed: bool,
    pub last_error: Option<String>,
    pub last_engine_error_at: Option<Instant>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn begin_allocates_unique_ids() {
        let mut state = SessionState::new();
        let now = Instant::now();
        let a = state.begin(now);
        let b = state.begin(now);
        assert_ne!(a, b);
        assert_eq!(state.current_id(), Some(b));
    }

    #[test]
    fn begin_clears_errors_and_flags() {
        let mut state = SessionState::new();
        state.error_count = 3;
        state.manual_stop_requested = true;
        state.pending_start = Some(StartPhase::Issued);

        state.begin(Instant::now());

        assert!(state.is_active());
        assert_eq!(state.error_count, 0);
        assert!(!state.manual_stop_requested);
        assert!(state.pending_start.is_none());
    }

    #[test]
    fn reset_bumps_epoch_and_keeps_error_count() {
        let mut state = SessionState::new();
        state.begin(Instant::now());
        state.error_count = 2;
        let before = state.epoch();

        state.reset();

        assert!(!state.is_active());
        assert!(!state.is_current_epoch(before));
        assert_eq!(state.error_count, 2);
    }

    #[test]
    fn touch_updates_last_result() {
        let mut state = SessionState::new();
        let start = Instant::now();
        assert_eq!(state.touch(start), None);

        let id = state.begin(start);
        let later = start + Duration::from_millis(250);
        assert_eq!(state.touch(later), Some(id));

        let session = state.session().unwrap();
        assert_eq!(session.started_at, start);
        assert_eq!(session.last_result_at, later);
    }

    #[test]
    fn starting_counts_as_running() {
        let mut state = SessionState::new();
        assert!(!state.is_running_or_starting());
        state.pending_start = Some(StartPhase::Settling);
        assert!(state.is_running_or_starting());
        assert!(!state.is_active());
    }

    #[test]
    fn only_a_newer_session_supersedes() {
        let mut state = SessionState::new();
        let first = state.begin(Instant::now());

        state.reset();
        assert!(!state.is_superseded(first));

        let second = state.begin(Instant::now());
        assert!(state.is_superseded(first));
        assert!(!state.is_superseded(second));
    }

    #[test]
    fn session_id_display() {
        let mut state = SessionState::new();
        let id = state.begin(Instant::now());
        assert_eq!(id.to_string(), "session#1");
        assert_eq!(id.value(), 1);
    }
}
