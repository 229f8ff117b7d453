//! Line-oriented engine fed from the terminal.
//!
//! Each line read from stdin is treated as one recognized utterance: it is
//! published as an interim hypothesis (when interim results are enabled) and
//! then as a final chunk.  End-of-input ends the engine session.
//!
//! Useful for running the controller without a microphone:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ruby_captions::engine::{stdin_feed, ConsoleEngineFactory, EngineFactory};
//!
//! # async fn example() {
//! let (lines, _eof) = stdin_feed();
//! let factory: Arc<dyn EngineFactory> = Arc::new(ConsoleEngineFactory::new(lines));
//! # }
//! ```

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::engine::capability::{
    EngineError, EngineEvent, EngineEventSink, EngineFactory, RecognitionEngine, ResultChunk,
};

type SharedLines = Arc<Mutex<mpsc::Receiver<String>>>;

/// Spawn a task that forwards stdin lines into a channel.
///
/// The returned oneshot fires once stdin reaches end-of-input.
pub fn stdin_feed() -> (mpsc::Receiver<String>, oneshot::Receiver<()>) {
    let (line_tx, line_rx) = mpsc::channel(32);
    let (eof_tx, eof_rx) = oneshot::channel();

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line_tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    log::warn!("console: stdin read failed: {e}");
                    break;
                }
            }
        }
        log::debug!("console: stdin closed");
        let _ = eof_tx.send(());
    });

    (line_rx, eof_rx)
}

// ---------------------------------------------------------------------------
// ConsoleEngineFactory
// ---------------------------------------------------------------------------

/// Creates [`ConsoleEngine`] handles that share one line source.
pub struct ConsoleEngineFactory {
    lines: SharedLines,
}

impl ConsoleEngineFactory {
    pub fn new(lines: mpsc::Receiver<String>) -> Self {
        Self {
            lines: Arc::new(Mutex::new(lines)),
        }
    }
}

impl EngineFactory for ConsoleEngineFactory {
    fn probe(&self) -> bool {
        true
    }

    fn create(&self, sink: EngineEventSink) -> Result<Box<dyn RecognitionEngine>, EngineError> {
        Ok(Box::new(ConsoleEngine {
            lines: Arc::clone(&self.lines),
            sink: Some(sink),
            task: None,
            language: String::new(),
            interim_results: true,
        }))
    }
}

// ---------------------------------------------------------------------------
// ConsoleEngine
// ---------------------------------------------------------------------------

/// One listening handle over the shared stdin feed.
pub struct ConsoleEngine {
    lines: SharedLines,
    sink: Option<EngineEventSink>,
    task: Option<JoinHandle<()>>,
    language: String,
    interim_results: bool,
}

impl ConsoleEngine {
    fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl RecognitionEngine for ConsoleEngine {
    fn apply_config(&mut self, config: &EngineConfig) {
        self.language = config.language.clone();
        self.interim_results = config.interim_results;
    }

    fn set_language(&mut self, language: &str) {
        self.language = language.to_string();
    }

    fn start(&mut self) -> Result<(), EngineError> {
        if self.is_running() {
            return Err(EngineError::InvalidState("already listening".into()));
        }
        let sink = self
            .sink
            .clone()
            .ok_or_else(|| EngineError::InvalidState("engine detached".into()))?;

        let lines = Arc::clone(&self.lines);
        let interim = self.interim_results;
        log::debug!("console: listening ({})", self.language);

        self.task = Some(tokio::spawn(async move {
            sink.emit(EngineEvent::Start);
            sink.emit(EngineEvent::AudioStart);
            loop {
                let line = { lines.lock().await.recv().await };
                let Some(line) = line else { break };
                if line.trim().is_empty() {
                    continue;
                }
                sink.emit(EngineEvent::SpeechStart);
                if interim {
                    sink.emit(EngineEvent::result(vec![ResultChunk::interim(line.clone())]));
                }
                sink.emit(EngineEvent::result(vec![ResultChunk::final_(line)]));
                sink.emit(EngineEvent::SpeechEnd);
            }
            sink.emit(EngineEvent::End);
        }));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            let was_running = !task.is_finished();
            task.abort();
            if was_running {
                if let Some(sink) = &self.sink {
                    sink.emit(EngineEvent::End);
                }
            }
        }
    }

    fn detach(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.sink = None;
    }
}

impl Drop for ConsoleEngine {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::capability::{EngineEnvelope, EngineHandleId};

    fn engine_with_feed() -> (
        Box<dyn RecognitionEngine>,
        mpsc::Sender<String>,
        mpsc::UnboundedReceiver<EngineEnvelope>,
    ) {
        let (line_tx, line_rx) = mpsc::channel(8);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let factory = ConsoleEngineFactory::new(line_rx);
        let mut engine = factory
            .create(EngineEventSink::new(EngineHandleId(1), event_tx))
            .unwrap();
        engine.apply_config(&EngineConfig::default());
        (engine, line_tx, event_rx)
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<EngineEnvelope>) -> EngineEvent {
        rx.recv().await.expect("event").event
    }

    #[tokio::test]
    async fn line_becomes_interim_then_final() {
        let (mut engine, line_tx, mut rx) = engine_with_feed();
        engine.start().unwrap();
        line_tx.send("你好".into()).await.unwrap();

        assert_eq!(next_event(&mut rx).await, EngineEvent::Start);
        assert_eq!(next_event(&mut rx).await, EngineEvent::AudioStart);
        assert_eq!(next_event(&mut rx).await, EngineEvent::SpeechStart);
        assert_eq!(
            next_event(&mut rx).await,
            EngineEvent::result(vec![ResultChunk::interim("你好")])
        );
        assert_eq!(
            next_event(&mut rx).await,
            EngineEvent::result(vec![ResultChunk::final_("你好")])
        );
        assert_eq!(next_event(&mut rx).await, EngineEvent::SpeechEnd);
    }

    #[tokio::test]
    async fn end_of_input_ends_session() {
        let (mut engine, line_tx, mut rx) = engine_with_feed();
        engine.start().unwrap();
        drop(line_tx);

        assert_eq!(next_event(&mut rx).await, EngineEvent::Start);
        assert_eq!(next_event(&mut rx).await, EngineEvent::AudioStart);
        assert_eq!(next_event(&mut rx).await, EngineEvent::End);
    }

    #[tokio::test]
    async fn stop_on_idle_engine_is_silent() {
        let (mut engine, _line_tx, mut rx) = engine_with_feed();
        engine.stop();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn start_after_detach_fails() {
        let (mut engine, _line_tx, _rx) = engine_with_feed();
        engine.detach();
        assert!(matches!(engine.start(), Err(EngineError::InvalidState(_))));
    }
}
