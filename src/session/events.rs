//! Notifications published by the session controller.

/// Events delivered to the UI / history consumers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Partial transcript of the utterance in progress.
    InterimUpdated(String),
    /// A transcript was finalized and accepted.
    FinalRecognized { original: String, annotated: String },
    /// The live interim line should be blanked.
    ClearInterim,
    /// Consecutive engine error count changed.
    ErrorCount(u32),
    /// Recognition stopped and will not recover by itself.
    Fatal(String),
}
