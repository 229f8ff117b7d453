//! Engine capability trait, event model and factory.
//!
//! # Overview
//!
//! [`RecognitionEngine`] is the handle the session controller drives.  It is
//! object-safe and `Send` so it can be held as `Box<dyn RecognitionEngine>`
//! inside the controller task.
//!
//! [`EngineFactory`] probes the platform for a recognition capability and
//! creates handles.  [`instantiate`] combines both steps and applies the
//! configured properties, which is what the controller calls.

use std::fmt;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::EngineConfig;

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// Errors raised synchronously by engine handles and factories.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// The platform offers no speech-recognition capability.
    #[error("speech recognition is not available on this platform")]
    Unavailable,

    /// The engine refused the start command.
    #[error("engine failed to start: {0}")]
    StartFailed(String),

    /// The command does not fit the engine's current state (e.g. a second
    /// `start` while already listening).
    #[error("invalid engine state: {0}")]
    InvalidState(String),
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Generation number of one engine handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineHandleId(pub u64);

impl fmt::Display for EngineHandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "engine#{}", self.0)
    }
}

/// One transcript chunk inside a result batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultChunk {
    /// Best-alternative transcript of this chunk.
    pub transcript: String,
    /// Whether the engine considers this chunk final.
    pub is_final: bool,
    /// Confidence of the best alternative, when the engine reports one.
    pub confidence: Option<f32>,
}

impl ResultChunk {
    pub fn interim(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: false,
            confidence: None,
        }
    }

    pub fn final_(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            is_final: true,
            confidence: None,
        }
    }
}

/// Lifecycle, result and error notifications an engine delivers.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The engine began listening.
    Start,
    /// The engine stopped, for any reason.
    End,
    /// A batch of partial and/or final transcript chunks.
    Result { chunks: Vec<ResultChunk> },
    /// The engine failed; `code` is the engine's raw error identifier.
    Error {
        code: String,
        message: Option<String>,
    },
    /// Audio capture began.
    AudioStart,
    /// Speech was detected.
    SpeechStart,
    /// Speech stopped being detected.
    SpeechEnd,
}

impl EngineEvent {
    pub fn error(code: impl Into<String>) -> Self {
        EngineEvent::Error {
            code: code.into(),
            message: None,
        }
    }

    pub fn result(chunks: Vec<ResultChunk>) -> Self {
        EngineEvent::Result { chunks }
    }

    /// Short name used in log lines.
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::Start => "start",
            EngineEvent::End => "end",
            EngineEvent::Result { .. } => "result",
            EngineEvent::Error { .. } => "error",
            EngineEvent::AudioStart => "audio-start",
            EngineEvent::SpeechStart => "speech-start",
            EngineEvent::SpeechEnd => "speech-end",
        }
    }
}

/// An [`EngineEvent`] tagged with the handle that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineEnvelope {
    pub handle: EngineHandleId,
    pub event: EngineEvent,
}

/// Subscription through which one engine handle reports its events.
///
/// Dropping every clone of the sink is how an engine unsubscribes.
#[derive(Debug, Clone)]
pub struct EngineEventSink {
    handle: EngineHandleId,
    tx: mpsc::UnboundedSender<EngineEnvelope>,
}

impl EngineEventSink {
    pub fn new(handle: EngineHandleId, tx: mpsc::UnboundedSender<EngineEnvelope>) -> Self {
        Self { handle, tx }
    }

    pub fn handle(&self) -> EngineHandleId {
        self.handle
    }

    /// Deliver `event`.  Returns `false` once the receiving side is gone.
    pub fn emit(&self, event: EngineEvent) -> bool {
        self.tx
            .send(EngineEnvelope {
                handle: self.handle,
                event,
            })
            .is_ok()
    }
}

// ---------------------------------------------------------------------------
// RecognitionEngine / EngineFactory
// ---------------------------------------------------------------------------

/// A continuous speech-to-text engine handle.
///
/// # Contract
///
/// - `start` issues the engine's start command; the actual transition is
///   reported later through [`EngineEvent::Start`].
/// - `stop` is a force-stop (abort): it must be a silent no-op when the
///   engine is idle, and otherwise eventually produce [`EngineEvent::End`].
/// - `detach` drops the event subscription; nothing may be emitted after it.
pub trait RecognitionEngine: Send {
    /// Apply continuous / interim / max-alternatives / language properties.
    fn apply_config(&mut self, config: &EngineConfig);

    /// Change only the recognition language.
    fn set_language(&mut self, language: &str);

    fn start(&mut self) -> Result<(), EngineError>;

    fn stop(&mut self);

    fn detach(&mut self);
}

// Compile-time assertion: Box<dyn RecognitionEngine> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn RecognitionEngine>) {}
};

/// Creates engine handles on demand.
pub trait EngineFactory: Send + Sync {
    /// Returns `true` when the platform offers a recognition capability.
    fn probe(&self) -> bool;

    /// Create a new handle that reports through `sink`.
    fn create(&self, sink: EngineEventSink) -> Result<Box<dyn RecognitionEngine>, EngineError>;
}

/// Probe, create and configure a new engine handle.
///
/// # Errors
///
/// [`EngineError::Unavailable`] when the probe fails; otherwise whatever the
/// factory reports.
pub fn instantiate(
    factory: &dyn EngineFactory,
    sink: EngineEventSink,
    config: &EngineConfig,
) -> Result<Box<dyn RecognitionEngine>, EngineError> {
    if !factory.probe() {
        return Err(EngineError::Unavailable);
    }
    let handle = sink.handle();
    let mut engine = factory.create(sink)?;
    engine.apply_config(config);
    log::debug!(
        "engine: created {handle} (lang={}, continuous={}, interim={}, alternatives={})",
        config.language,
        config.continuous,
        config.interim_results,
        config.max_alternatives
    );
    Ok(engine)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::{EngineCall, MockEngineFactory};

    fn sink(id: u64) -> (EngineEventSink, mpsc::UnboundedReceiver<EngineEnvelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (EngineEventSink::new(EngineHandleId(id), tx), rx)
    }

    #[test]
    fn sink_tags_events_with_handle() {
        let (sink, mut rx) = sink(7);
        assert!(sink.emit(EngineEvent::Start));

        let env = rx.try_recv().unwrap();
        assert_eq!(env.handle, EngineHandleId(7));
        assert_eq!(env.event, EngineEvent::Start);
    }

    #[test]
    fn sink_reports_closed_receiver() {
        let (sink, rx) = sink(1);
        drop(rx);
        assert!(!sink.emit(EngineEvent::End));
    }

    #[test]
    fn instantiate_fails_when_probe_fails() {
        let factory = MockEngineFactory::unavailable();
        let (sink, _rx) = sink(1);
        let result = instantiate(&factory, sink, &EngineConfig::default());
        assert!(matches!(result, Err(EngineError::Unavailable)));
        assert_eq!(factory.count(&EngineCall::Create), 0);
    }

    #[test]
    fn instantiate_applies_config() {
        let factory = MockEngineFactory::new();
        let (sink, _rx) = sink(1);
        let config = EngineConfig {
            language: "zh-TW".into(),
            ..EngineConfig::default()
        };

        let _engine = instantiate(&factory, sink, &config).unwrap();

        assert_eq!(
            factory.calls(),
            vec![EngineCall::Create, EngineCall::ApplyConfig("zh-TW".into())]
        );
    }

    #[test]
    fn event_names() {
        assert_eq!(EngineEvent::error("network").name(), "error");
        assert_eq!(EngineEvent::result(vec![]).name(), "result");
        assert_eq!(EngineEvent::SpeechEnd.name(), "speech-end");
    }

    #[test]
    fn engine_error_display() {
        assert!(EngineError::StartFailed("busy".into())
            .to_string()
            .contains("busy"));
        assert!(EngineError::Unavailable.to_string().contains("not available"));
    }
}
