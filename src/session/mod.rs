//! Speech-session lifecycle management.
//!
//! This module keeps an unreliable continuous recognition engine running and
//! turns its raw output into deduplicated, cleaned, annotated transcripts.
//!
//! # Architecture
//!
//! ```text
//! ControllerHandle::start()
//!   └─▶ force-stop stale handle, reset               [starting: settling]
//!         └─ settle delay ─▶ set_language + start     [starting: issued]
//!               └─ engine Start ─▶ new SessionId, arm watchdog   [active]
//!
//! engine Result ──▶ fence by handle + session ──▶ interim ──▶ InterimUpdated
//!                                               └▶ final ──▶ trim ─▶ dedup
//!                                                    ─▶ strip pinyin ─▶ convert
//!                                                    ─▶ history + FinalRecognized
//!
//! engine End (unrequested) ─┐
//! restartable engine Error ─┼─▶ reset ─ restart delay ─▶ new handle ─▶ start()
//! watchdog stall ───────────┘
//! ```
//!
//! The consecutive error count is reset only by a confirmed engine start, so
//! errors that keep a new handle from ever starting accumulate until the
//! threshold stops the lineage.

pub mod controller;
pub mod dedup;
pub mod errors;
pub mod events;
pub mod handle;
pub mod state;
pub mod watchdog;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use controller::SessionController;
pub use dedup::DedupWindow;
pub use errors::{decide, ErrorCategory, ErrorRecord, RestartDecision, SessionError};
pub use events::SessionEvent;
pub use handle::ControllerHandle;
pub use state::{SessionId, SessionState, SessionStatus};
pub use watchdog::{StallReason, Watchdog};
