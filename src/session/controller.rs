//! Session controller: the single authority over the recognition engine.
//!
//! [`SessionController`] runs as one tokio task.  Everything that can change
//! its state arrives as a message on its inbox and is handled to completion
//! before the next one is looked at:
//!
//! ```text
//!  ControllerHandle ──Command──┐
//!  EngineEventSink ──Envelope──┤
//!  deferred timers ──Deferred──┼──▶ SessionController::run ──SessionEvent──▶ UI
//!  conversion worker ─Converted┘            │
//!                                           └──ConversionJob──▶ conversion worker
//! ```
//!
//! Deferred work (settle delay, restart cooldown, language resume, watchdog
//! ticks) is never cancelled.  Instead each message carries the [`Epoch`] or
//! [`SessionId`] it was scheduled for and is dropped on arrival if the state
//! has moved on.  Engine events carry the [`EngineHandleId`] of the handle
//! that produced them and are dropped unless that handle is the current one.

use std::sync::{Arc, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::{EngineConfig, SessionConfig, SessionConfigPatch};
use crate::engine::{
    instantiate, EngineEnvelope, EngineError, EngineEvent, EngineEventSink, EngineFactory,
    EngineHandleId, RecognitionEngine, ResultChunk,
};
use crate::history::{SharedHistory, TranscriptEntry};
use crate::pronunciation::PronunciationConverter;
use crate::text::{is_han_language, strip_phonetic, trim_boundary};

use super::dedup::DedupWindow;
use super::errors::{decide, ErrorRecord, RestartDecision, SessionError};
use super::events::SessionEvent;
use super::handle::{Command, ControllerHandle};
use super::state::{Epoch, SessionId, SessionState, SessionStatus, StartPhase};
use super::watchdog::{self, Watchdog};

/// Capacity of the command channel behind [`ControllerHandle`].
const COMMAND_CAPACITY: usize = 32;

// ---------------------------------------------------------------------------
// Internal messages
// ---------------------------------------------------------------------------

/// Work scheduled for later, fenced by epoch or session id.
#[derive(Debug)]
enum Deferred {
    /// Settle delay elapsed; issue the engine's start command.
    SettledStart(Epoch),
    /// Restart cooldown elapsed; rebuild the engine and start again.
    Restart { epoch: Epoch, language: String },
    /// Language change finished stopping; start again.
    Resume(Epoch),
    WatchdogTick(SessionId),
}

/// One accepted final transcript waiting for annotation.
struct ConversionJob {
    session: SessionId,
    text: String,
    language: String,
    converter: Option<Arc<dyn PronunciationConverter>>,
}

/// Result of a [`ConversionJob`].
#[derive(Debug)]
struct Converted {
    session: SessionId,
    original: String,
    annotated: String,
    language: String,
}

struct Inbox {
    commands: mpsc::Receiver<Command>,
    engine: mpsc::UnboundedReceiver<EngineEnvelope>,
    deferred: mpsc::UnboundedReceiver<Deferred>,
    converted: mpsc::UnboundedReceiver<Converted>,
    jobs: mpsc::UnboundedReceiver<ConversionJob>,
    converted_tx: mpsc::UnboundedSender<Converted>,
}

// ---------------------------------------------------------------------------
// SessionController
// ---------------------------------------------------------------------------

/// Keeps a continuous recognition engine running across silent terminations,
/// stalls and transient errors.
///
/// Build with [`SessionController::new`], spawn [`run`](Self::run) and drive
/// it through the returned [`ControllerHandle`].
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use ruby_captions::config::{EngineConfig, SessionConfig};
/// use ruby_captions::engine::{stdin_feed, ConsoleEngineFactory};
/// use ruby_captions::history::{new_shared_history, TranscriptHistory};
/// use ruby_captions::session::SessionController;
///
/// # async fn example() -> Result<(), ruby_captions::session::SessionError> {
/// let (lines, _eof) = stdin_feed();
/// let (controller, handle, mut events) = SessionController::new(
///     Arc::new(ConsoleEngineFactory::new(lines)),
///     SessionConfig::default(),
///     EngineConfig::default(),
///     new_shared_history(TranscriptHistory::new()),
/// );
/// tokio::spawn(controller.run());
///
/// handle.start().await?;
/// while let Some(event) = events.recv().await {
///     println!("{event:?}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct SessionController {
    factory: Arc<dyn EngineFactory>,
    engine: Option<Box<dyn RecognitionEngine>>,
    handle: Option<EngineHandleId>,
    handle_seq: u64,

    config: SessionConfig,
    engine_config: EngineConfig,
    state: SessionState,
    watchdog: Watchdog,
    dedup: DedupWindow,
    converter: Option<Arc<dyn PronunciationConverter>>,
    history: SharedHistory,

    events: mpsc::UnboundedSender<SessionEvent>,
    engine_tx: mpsc::UnboundedSender<EngineEnvelope>,
    deferred_tx: mpsc::UnboundedSender<Deferred>,
    jobs_tx: Option<mpsc::UnboundedSender<ConversionJob>>,
    inbox: Option<Inbox>,
}

impl SessionController {
    /// Create a controller, the handle that drives it and the receiver for
    /// its published events.
    ///
    /// No engine handle is created until the first `start`.
    pub fn new(
        factory: Arc<dyn EngineFactory>,
        config: SessionConfig,
        engine_config: EngineConfig,
        history: SharedHistory,
    ) -> (
        Self,
        ControllerHandle,
        mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        let (command_tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (engine_tx, engine) = mpsc::unbounded_channel();
        let (deferred_tx, deferred) = mpsc::unbounded_channel();
        let (converted_tx, converted) = mpsc::unbounded_channel();
        let (jobs_tx, jobs) = mpsc::unbounded_channel();

        let controller = Self {
            factory,
            engine: None,
            handle: None,
            handle_seq: 0,
            dedup: DedupWindow::new(config.dedup_window()),
            config,
            engine_config,
            state: SessionState::new(),
            watchdog: Watchdog::new(),
            converter: None,
            history,
            events: events_tx,
            engine_tx,
            deferred_tx,
            jobs_tx: Some(jobs_tx),
            inbox: Some(Inbox {
                commands,
                engine,
                deferred,
                converted,
                jobs,
                converted_tx,
            }),
        };

        (controller, ControllerHandle::new(command_tx), events_rx)
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Process messages until every [`ControllerHandle`] has been dropped.
    ///
    /// On the way out the engine is destroyed and transcripts still queued
    /// for annotation are flushed into the history.
    pub async fn run(mut self) {
        let Some(inbox) = self.inbox.take() else {
            return;
        };
        let Inbox {
            mut commands,
            mut engine,
            mut deferred,
            mut converted,
            jobs,
            converted_tx,
        } = inbox;

        let worker = tokio::spawn(conversion_worker(jobs, converted_tx));

        loop {
            tokio::select! {
                biased;

                Some(envelope) = engine.recv() => self.dispatch_engine(envelope),
                Some(done) = converted.recv() => self.on_converted(done),
                Some(message) = deferred.recv() => self.on_deferred(message),
                command = commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => break,
                },
            }
        }

        log::info!("session: all handles dropped, controller shutting down");
        self.destroy();

        // Closing the job queue lets the worker finish what is queued and exit.
        self.jobs_tx = None;
        while let Some(done) = converted.recv().await {
            self.on_converted(done);
        }
        if let Err(e) = worker.await {
            log::warn!("session: conversion worker ended abnormally: {e}");
        }
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Start(reply) => {
                let _ = reply.send(self.start());
            }
            Command::Stop(reply) => {
                self.stop();
                let _ = reply.send(());
            }
            Command::ChangeLanguage(code, reply) => {
                self.change_language(code);
                let _ = reply.send(());
            }
            Command::SetConverter(converter, reply) => {
                log::debug!(
                    "session: pronunciation converter {}",
                    if converter.is_some() { "installed" } else { "removed" }
                );
                self.converter = converter;
                let _ = reply.send(());
            }
            Command::UpdateConfig(patch, reply) => {
                self.update_config(&patch);
                let _ = reply.send(());
            }
            Command::Status(reply) => {
                let _ = reply.send(self.status());
            }
            Command::Destroy(reply) => {
                self.destroy();
                let _ = reply.send(());
            }
        }
    }

    // -----------------------------------------------------------------------
    // Public operations
    // -----------------------------------------------------------------------

    fn start(&mut self) -> Result<(), SessionError> {
        if self.engine.is_none() {
            if let Err(e) = self.create_engine() {
                self.fail(e.to_string());
                return Err(e);
            }
        }

        if self.state.is_running_or_starting() {
            log::debug!("session: start ignored, already running");
            return Ok(());
        }

        self.reset_run_state();
        self.state.pending_start = Some(StartPhase::Settling);
        self.state.last_error = None;
        self.schedule(
            self.config.settle_delay(),
            Deferred::SettledStart(self.state.epoch()),
        );
        Ok(())
    }

    fn stop(&mut self) {
        log::debug!("session: stop requested");
        self.state.manual_stop_requested = true;
        self.reset_run_state();
        self.dedup.clear();
        self.publish(SessionEvent::ClearInterim);
    }

    /// Full reset followed by a delayed rebuild of the engine handle.
    fn restart(&mut self, reason: &str) {
        log::warn!("session: restarting ({reason})");
        let language = self.engine_config.language.clone();
        self.reset_run_state();
        self.publish(SessionEvent::ClearInterim);
        self.schedule(
            self.config.restart_delay(),
            Deferred::Restart {
                epoch: self.state.epoch(),
                language,
            },
        );
    }

    fn change_language(&mut self, code: String) {
        if code == self.engine_config.language {
            return;
        }
        log::info!(
            "session: language {} -> {code}",
            self.engine_config.language
        );

        if self.state.is_running_or_starting() {
            self.stop();
            self.engine_config.language = code;
            self.schedule(
                self.config.restart_delay(),
                Deferred::Resume(self.state.epoch()),
            );
        } else {
            self.engine_config.language = code;
        }
    }

    fn update_config(&mut self, patch: &SessionConfigPatch) {
        patch.apply_to(&mut self.config);
        self.dedup.set_window(self.config.dedup_window());
        log::debug!("session: config updated: {:?}", self.config);

        if patch.changes_watchdog_interval() {
            if let Some(id) = self.state.current_id() {
                self.arm_watchdog(id);
            }
        }
    }

    fn status(&self) -> SessionStatus {
        let session = self.state.session();
        SessionStatus {
            active: self.state.is_active(),
            starting: self.state.pending_start.is_some(),
            session_id: self.state.current_id(),
            error_count: self.state.error_count,
            language: self.engine_config.language.clone(),
            started_at: session.map(|s| s.started_at),
            last_result_at: session.map(|s| s.last_result_at),
            watchdog_armed: self.watchdog.is_armed(),
            last_error: self.state.last_error.clone(),
            last_engine_error_at: self.state.last_engine_error_at,
        }
    }

    fn destroy(&mut self) {
        self.stop();
        self.drop_engine();
    }

    // -----------------------------------------------------------------------
    // Deferred work
    // -----------------------------------------------------------------------

    fn schedule(&self, delay: Duration, message: Deferred) {
        let tx = self.deferred_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(message);
        });
    }

    fn on_deferred(&mut self, message: Deferred) {
        match message {
            Deferred::SettledStart(epoch) => {
                if !self.state.is_current_epoch(epoch) {
                    log::debug!("session: stale settled start dropped");
                    return;
                }
                self.issue_start();
            }
            Deferred::Restart { epoch, language } => {
                if !self.state.is_current_epoch(epoch) {
                    log::debug!("session: stale restart dropped");
                    return;
                }
                self.engine_config.language = language;
                self.drop_engine();
                if let Err(e) = self.start() {
                    log::error!("session: restart failed: {e}");
                }
            }
            Deferred::Resume(epoch) => {
                if !self.state.is_current_epoch(epoch) {
                    log::debug!("session: stale resume dropped");
                    return;
                }
                if let Err(e) = self.start() {
                    log::error!("session: resume after language change failed: {e}");
                }
            }
            Deferred::WatchdogTick(id) => self.on_watchdog_tick(id),
        }
    }

    fn issue_start(&mut self) {
        let language = self.engine_config.language.clone();
        let Some(engine) = self.engine.as_mut() else {
            self.state.reset();
            self.fail("no engine handle to start".to_string());
            return;
        };

        engine.set_language(&language);
        match engine.start() {
            Ok(()) => {
                self.state.pending_start = Some(StartPhase::Issued);
                log::info!("session: engine start issued (lang={language})");
            }
            Err(e) => {
                self.state.reset();
                self.watchdog.disarm();
                self.fail(e.to_string());
            }
        }
    }

    fn on_watchdog_tick(&mut self, id: SessionId) {
        let Some(session) = self.state.session() else {
            return;
        };
        if session.id != id {
            return;
        }
        let stalled = watchdog::check(
            Instant::now(),
            session.started_at,
            session.last_result_at,
            self.config.dead_time(),
            self.config.max_session(),
        );
        if let Some(reason) = stalled {
            self.restart(&format!("watchdog: {reason}"));
        }
    }

    fn arm_watchdog(&mut self, id: SessionId) {
        let tx = self.deferred_tx.clone();
        self.watchdog
            .arm(self.config.watchdog_interval(), move || {
                tx.send(Deferred::WatchdogTick(id)).is_ok()
            });
    }

    // -----------------------------------------------------------------------
    // Engine events
    // -----------------------------------------------------------------------

    fn dispatch_engine(&mut self, envelope: EngineEnvelope) {
        let EngineEnvelope { handle, event } = envelope;
        if self.handle != Some(handle) {
            log::debug!("session: dropped {} from stale {handle}", event.name());
            return;
        }

        match event {
            EngineEvent::Start => self.on_start(),
            EngineEvent::End => self.on_end(),
            EngineEvent::Result { chunks } => self.on_result(&chunks),
            EngineEvent::Error { code, message } => self.on_error(&code, message),
            diagnostic => log::debug!("session: engine {}", diagnostic.name()),
        }
    }

    fn on_start(&mut self) {
        if self.state.pending_start != Some(StartPhase::Issued) {
            // A stop overtook the start; the engine's End follows.
            log::debug!("session: engine start ignored, no start pending");
            return;
        }

        let had_errors = self.state.error_count > 0;
        let id = self.state.begin(Instant::now());
        self.arm_watchdog(id);
        if had_errors {
            self.publish(SessionEvent::ErrorCount(0));
        }
        log::info!("session: {id} started");
    }

    fn on_end(&mut self) {
        let was_active = self.state.is_active();
        let ended_early = self.state.pending_start == Some(StartPhase::Issued);

        if was_active || ended_early {
            self.state.reset();
            self.watchdog.disarm();
        }
        self.publish(SessionEvent::ClearInterim);

        if was_active && !self.state.manual_stop_requested {
            self.restart("engine ended unexpectedly");
        } else if ended_early {
            log::warn!("session: engine ended before confirming start");
        }
        self.state.manual_stop_requested = false;
    }

    fn on_result(&mut self, chunks: &[ResultChunk]) {
        let Some(session) = self.state.touch(Instant::now()) else {
            log::debug!("session: result without an active session dropped");
            return;
        };

        let mut final_text = String::new();
        let mut interim_text = String::new();
        for chunk in chunks {
            if chunk.is_final {
                final_text.push_str(&chunk.transcript);
            } else {
                interim_text.push_str(&chunk.transcript);
            }
        }

        if !interim_text.trim().is_empty() {
            self.publish(SessionEvent::InterimUpdated(interim_text));
        }
        if !final_text.is_empty() {
            self.process_final(session, &final_text);
        }
    }

    fn process_final(&mut self, session: SessionId, raw: &str) {
        let language = self.engine_config.language.clone();
        let trimmed = trim_boundary(raw, &language);
        if trimmed.is_empty() {
            return;
        }
        if !self.dedup.admit(trimmed, Instant::now()) {
            log::debug!("session: duplicate final {trimmed:?} suppressed");
            return;
        }

        let text = if is_han_language(&language) {
            trim_boundary(&strip_phonetic(trimmed), &language).to_string()
        } else {
            trimmed.to_string()
        };
        if text.is_empty() {
            return;
        }

        let job = ConversionJob {
            session,
            text,
            language,
            converter: self.converter.clone(),
        };
        let queued = self.jobs_tx.as_ref().is_some_and(|tx| tx.send(job).is_ok());
        if !queued {
            log::warn!("session: conversion worker gone, final transcript dropped");
        }
    }

    fn on_error(&mut self, code: &str, message: Option<String>) {
        if !self.state.is_running_or_starting() {
            log::debug!("session: engine error {code:?} while stopped ignored");
            return;
        }

        self.state.error_count += 1;
        self.reset_run_state();
        let count = self.state.error_count;
        self.publish(SessionEvent::ErrorCount(count));

        let record = ErrorRecord::new(code, message, Instant::now());
        self.state.last_engine_error_at = Some(record.at);
        log::warn!(
            "session: engine error {record} ({count}/{})",
            self.config.max_consecutive_errors
        );

        match decide(record.category, count, self.config.max_consecutive_errors) {
            RestartDecision::GiveUp => {
                self.stop();
                self.fail(format!("too many consecutive errors, last: {record}"));
            }
            RestartDecision::Restart => self.restart(record.category.label()),
            RestartDecision::StayStopped => self.fail(record.to_string()),
        }
    }

    fn on_converted(&mut self, done: Converted) {
        let Converted {
            session,
            original,
            annotated,
            language,
        } = done;

        if self.state.is_superseded(session) {
            log::debug!("session: annotated final from superseded {session} dropped");
            return;
        }

        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(TranscriptEntry::new(
                session.value(),
                original.clone(),
                annotated.clone(),
                language,
            ));
        self.publish(SessionEvent::FinalRecognized {
            original,
            annotated,
        });
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn create_engine(&mut self) -> Result<(), SessionError> {
        self.handle_seq += 1;
        let id = EngineHandleId(self.handle_seq);
        let sink = EngineEventSink::new(id, self.engine_tx.clone());

        match instantiate(self.factory.as_ref(), sink, &self.engine_config) {
            Ok(engine) => {
                self.engine = Some(engine);
                self.handle = Some(id);
                Ok(())
            }
            Err(EngineError::Unavailable) => Err(SessionError::EngineUnavailable),
            Err(e) => Err(SessionError::Engine(e.to_string())),
        }
    }

    fn drop_engine(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.detach();
        }
        if let Some(handle) = self.handle.take() {
            log::debug!("session: released {handle}");
        }
    }

    /// Force-stop the engine and clear run state.  Leaves the manual-stop
    /// flag and the error count alone.
    fn reset_run_state(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.stop();
        }
        self.state.reset();
        self.watchdog.disarm();
    }

    fn fail(&mut self, message: String) {
        log::error!("session: {message}");
        self.state.last_error = Some(message.clone());
        self.publish(SessionEvent::Fatal(message));
    }

    fn publish(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

// ---------------------------------------------------------------------------
// Conversion worker
// ---------------------------------------------------------------------------

/// Annotates accepted transcripts one at a time, preserving their order.
async fn conversion_worker(
    mut jobs: mpsc::UnboundedReceiver<ConversionJob>,
    done: mpsc::UnboundedSender<Converted>,
) {
    while let Some(job) = jobs.recv().await {
        let annotated = match job.converter {
            Some(converter) => annotate(converter, job.text.clone()).await,
            None => job.text.clone(),
        };
        let result = Converted {
            session: job.session,
            original: job.text,
            annotated,
            language: job.language,
        };
        if done.send(result).is_err() {
            break;
        }
    }
}

/// Run one conversion.  Any failure, including a panic inside the
/// converter, falls back to the plain text.
async fn annotate(converter: Arc<dyn PronunciationConverter>, text: String) -> String {
    let input = text.clone();
    let outcome = tokio::spawn(async move { converter.convert(&input).await }).await;

    match outcome {
        Ok(Ok(annotated)) => annotated,
        Ok(Err(e)) => {
            log::warn!("session: pronunciation failed ({e}), keeping plain text");
            text
        }
        Err(e) => {
            log::warn!("session: pronunciation task panicked: {e}");
            text
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
