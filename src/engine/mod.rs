//! Recognition engine module.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                EngineFactory (trait)                      │
//! │   probe() ── is recognition available at all?            │
//! │   create(sink) ──▶ Box<dyn RecognitionEngine>            │
//! │                          │                                │
//! │                          │ start / stop / detach          │
//! │                          ▼                                │
//! │                 EngineEventSink ──▶ controller inbox      │
//! │        (Start, End, Result, Error, AudioStart,            │
//! │         SpeechStart, SpeechEnd tagged with a handle id)   │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! An engine never calls back into the controller directly; it posts
//! [`EngineEvent`]s through the sink it was created with.  Each handle gets a
//! fresh [`EngineHandleId`] so events from a replaced handle can be dropped.

pub mod capability;
pub mod console;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use capability::{
    instantiate, EngineEnvelope, EngineError, EngineEvent, EngineEventSink, EngineFactory,
    EngineHandleId, RecognitionEngine, ResultChunk,
};
pub use console::{stdin_feed, ConsoleEngine, ConsoleEngineFactory};

#[cfg(test)]
pub mod mock;

#[cfg(test)]
pub use mock::{EngineCall, MockEngineFactory};
