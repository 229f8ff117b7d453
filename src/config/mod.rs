//! Configuration module for Ruby Captions.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for the session
//! controller, the recognition engine and the pronunciation converter,
//! `AppPaths` for cross-platform data directories, and TOML persistence via
//! `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, EngineConfig, PronunciationConfig, SessionConfig, SessionConfigPatch,
};
