//! Engine error classification and the restart policy.
//!
//! | Raw code(s)                              | Category          | Restart |
//! |------------------------------------------|-------------------|---------|
//! | `not-allowed`, `service-not-allowed`     | PermissionDenied  | no      |
//! | `no-speech`                              | NoSpeech          | yes     |
//! | `aborted`                                | Aborted           | yes     |
//! | `audio-capture`                          | AudioCapture      | yes     |
//! | `network`                                | Network           | no      |
//! | `timeout`                                | Timeout           | no      |
//! | anything else                            | Unknown           | no      |
//!
//! The consecutive-error threshold is checked before restart eligibility, so a
//! restartable error can still end the session lineage.

use std::fmt;

use thiserror::Error;
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

/// Failures surfaced to callers of the controller handle.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    /// No recognition capability on this platform.  Terminal.
    #[error("speech recognition is unavailable")]
    EngineUnavailable,

    /// The engine handle could not be created for another reason.
    #[error("engine error: {0}")]
    Engine(String),

    /// The controller task is gone (destroyed runtime or dropped controller).
    #[error("session controller is no longer running")]
    ControllerClosed,
}

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    PermissionDenied,
    NoSpeech,
    Aborted,
    AudioCapture,
    Network,
    Timeout,
    Unknown,
}

impl ErrorCategory {
    /// Map a raw engine error code.
    ///
    /// ```
    /// use ruby_captions::session::ErrorCategory;
    ///
    /// assert_eq!(ErrorCategory::classify("no-speech"), ErrorCategory::NoSpeech);
    /// assert_eq!(ErrorCategory::classify("bad-grammar"), ErrorCategory::Unknown);
    /// ```
    pub fn classify(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().as_str() {
            "not-allowed" | "service-not-allowed" | "permission-denied" => {
                ErrorCategory::PermissionDenied
            }
            "no-speech" => ErrorCategory::NoSpeech,
            "aborted" => ErrorCategory::Aborted,
            "audio-capture" => ErrorCategory::AudioCapture,
            "network" => ErrorCategory::Network,
            "timeout" => ErrorCategory::Timeout,
            _ => ErrorCategory::Unknown,
        }
    }

    pub fn is_restartable(self) -> bool {
        matches!(
            self,
            ErrorCategory::NoSpeech | ErrorCategory::Aborted | ErrorCategory::AudioCapture
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            ErrorCategory::PermissionDenied => "permission-denied",
            ErrorCategory::NoSpeech => "no-speech",
            ErrorCategory::Aborted => "aborted",
            ErrorCategory::AudioCapture => "audio-capture",
            ErrorCategory::Network => "network",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// ErrorRecord / RestartDecision
// ---------------------------------------------------------------------------

/// One classified engine failure.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorRecord {
    pub code: String,
    pub message: Option<String>,
    pub category: ErrorCategory,
    pub at: Instant,
}

impl ErrorRecord {
    pub fn new(code: &str, message: Option<String>, at: Instant) -> Self {
        Self {
            code: code.to_string(),
            message,
            category: ErrorCategory::classify(code),
            at,
        }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{} ({}): {msg}", self.category, self.code),
            None => write!(f, "{} ({})", self.category, self.code),
        }
    }
}

/// What the controller does after an engine error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Threshold reached: stop for good.
    GiveUp,
    /// Schedule a recovery restart.
    Restart,
    /// Not restartable; stay stopped until the caller starts again.
    StayStopped,
}

/// Decide on a restart given the already-incremented `error_count`.
pub fn decide(category: ErrorCategory, error_count: u32, max_errors: u32) -> RestartDecision {
    if error_count >= max_errors {
        RestartDecision::GiveUp
    } else if category.is_restartable() {
        RestartDecision::Restart
    } else {
        RestartDecision::StayStopped
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_engine_codes() {
        assert_eq!(ErrorCategory::classify("not-allowed"), ErrorCategory::PermissionDenied);
        assert_eq!(
            ErrorCategory::classify("service-not-allowed"),
            ErrorCategory::PermissionDenied
        );
        assert_eq!(ErrorCategory::classify("no-speech"), ErrorCategory::NoSpeech);
        assert_eq!(ErrorCategory::classify("aborted"), ErrorCategory::Aborted);
        assert_eq!(ErrorCategory::classify("audio-capture"), ErrorCategory::AudioCapture);
        assert_eq!(ErrorCategory::classify("network"), ErrorCategory::Network);
        assert_eq!(ErrorCategory::classify("timeout"), ErrorCategory::Timeout);
        assert_eq!(ErrorCategory::classify("language-not-supported"), ErrorCategory::Unknown);
        assert_eq!(ErrorCategory::classify(" No-Speech "), ErrorCategory::NoSpeech);
    }

    #[test]
    fn restartable_set() {
        let restartable: Vec<_> = [
            ErrorCategory::PermissionDenied,
            ErrorCategory::NoSpeech,
            ErrorCategory::Aborted,
            ErrorCategory::AudioCapture,
            ErrorCategory::Network,
            ErrorCategory::Timeout,
            ErrorCategory::Unknown,
        ]
        .into_iter()
        .filter(|c| c.is_restartable())
        .collect();

        assert_eq!(
            restartable,
            vec![
                ErrorCategory::NoSpeech,
                ErrorCategory::Aborted,
                ErrorCategory::AudioCapture
            ]
        );
    }

    #[test]
    fn threshold_precedes_restart() {
        assert_eq!(decide(ErrorCategory::NoSpeech, 3, 3), RestartDecision::GiveUp);
        assert_eq!(decide(ErrorCategory::NoSpeech, 2, 3), RestartDecision::Restart);
        assert_eq!(decide(ErrorCategory::Network, 1, 3), RestartDecision::StayStopped);
        assert_eq!(decide(ErrorCategory::Network, 3, 3), RestartDecision::GiveUp);
    }

    #[test]
    fn record_display() {
        let rec = ErrorRecord::new("network", Some("offline".into()), Instant::now());
        assert_eq!(rec.category, ErrorCategory::Network);
        assert_eq!(rec.to_string(), "network (network): offline");
    }

    #[test]
    fn session_error_display() {
        assert!(SessionError::EngineUnavailable
            .to_string()
            .contains("unavailable"));
    }
}
