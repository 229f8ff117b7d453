//! Test double for the recognition engine.
//!
//! [`MockEngineFactory`] hands out [`MockEngine`] handles that record every
//! call into a shared log.  With auto events enabled (the default) a handle
//! behaves like a well-mannered engine: `start` reports `Start`, `stop` on a
//! running handle reports `End`.  Tests inject everything else through
//! [`MockEngineFactory::emit`].

use std::sync::{Arc, Mutex};

use crate::config::EngineConfig;
use crate::engine::capability::{
    EngineError, EngineEvent, EngineEventSink, EngineFactory, RecognitionEngine,
};

/// One recorded interaction with a mock handle.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Create,
    ApplyConfig(String),
    SetLanguage(String),
    Start,
    Stop,
    Detach,
}

#[derive(Debug)]
struct Shared {
    calls: Vec<EngineCall>,
    available: bool,
    fail_start: bool,
    auto_events: bool,
    latest_sink: Option<EngineEventSink>,
}

/// Factory producing [`MockEngine`] handles that share one call log.
#[derive(Debug, Clone)]
pub struct MockEngineFactory {
    shared: Arc<Mutex<Shared>>,
}

impl MockEngineFactory {
    /// Available engine with auto `Start`/`End` events.
    pub fn new() -> Self {
        Self::with(true, true)
    }

    /// Engine whose lifecycle events are all injected by the test.
    pub fn manual() -> Self {
        Self::with(true, false)
    }

    /// Platform without recognition support.
    pub fn unavailable() -> Self {
        Self::with(false, true)
    }

    fn with(available: bool, auto_events: bool) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                calls: Vec::new(),
                available,
                fail_start: false,
                auto_events,
                latest_sink: None,
            })),
        }
    }

    /// Make subsequent `start` calls fail synchronously.
    pub fn set_fail_start(&self, fail: bool) {
        self.shared.lock().unwrap().fail_start = fail;
    }

    /// Emit `event` through the most recently created handle's sink.
    pub fn emit(&self, event: EngineEvent) -> bool {
        let sink = self.shared.lock().unwrap().latest_sink.clone();
        sink.map(|s| s.emit(event)).unwrap_or(false)
    }

    /// Sink of the most recently created handle, kept alive by the caller to
    /// simulate late events from a replaced handle.
    pub fn latest_sink(&self) -> Option<EngineEventSink> {
        self.shared.lock().unwrap().latest_sink.clone()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.shared.lock().unwrap().calls.clone()
    }

    pub fn count(&self, call: &EngineCall) -> usize {
        self.shared
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| *c == call)
            .count()
    }

    pub fn clear_calls(&self) {
        self.shared.lock().unwrap().calls.clear();
    }

    fn record(&self, call: EngineCall) {
        self.shared.lock().unwrap().calls.push(call);
    }
}

impl EngineFactory for MockEngineFactory {
    fn probe(&self) -> bool {
        self.shared.lock().unwrap().available
    }

    fn create(&self, sink: EngineEventSink) -> Result<Box<dyn RecognitionEngine>, EngineError> {
        {
            let mut shared = self.shared.lock().unwrap();
            if !shared.available {
                return Err(EngineError::Unavailable);
            }
            shared.calls.push(EngineCall::Create);
            shared.latest_sink = Some(sink.clone());
        }
        Ok(Box::new(MockEngine {
            factory: self.clone(),
            sink: Some(sink),
            running: false,
        }))
    }
}

/// Handle created by [`MockEngineFactory`].
pub struct MockEngine {
    factory: MockEngineFactory,
    sink: Option<EngineEventSink>,
    running: bool,
}

impl MockEngine {
    fn auto_emit(&self, event: EngineEvent) {
        let auto = self.factory.shared.lock().unwrap().auto_events;
        if auto {
            if let Some(sink) = &self.sink {
                sink.emit(event);
            }
        }
    }
}

impl RecognitionEngine for MockEngine {
    fn apply_config(&mut self, config: &EngineConfig) {
        self.factory
            .record(EngineCall::ApplyConfig(config.language.clone()));
    }

    fn set_language(&mut self, language: &str) {
        self.factory.record(EngineCall::SetLanguage(language.into()));
    }

    fn start(&mut self) -> Result<(), EngineError> {
        self.factory.record(EngineCall::Start);
        if self.factory.shared.lock().unwrap().fail_start {
            return Err(EngineError::StartFailed("mock refused to start".into()));
        }
        if self.running {
            return Err(EngineError::InvalidState("already started".into()));
        }
        self.running = true;
        self.auto_emit(EngineEvent::Start);
        Ok(())
    }

    fn stop(&mut self) {
        self.factory.record(EngineCall::Stop);
        if self.running {
            self.running = false;
            self.auto_emit(EngineEvent::End);
        }
    }

    fn detach(&mut self) {
        self.factory.record(EngineCall::Detach);
        self.running = false;
        self.sink = None;
    }
}
