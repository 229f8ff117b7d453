//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Timing and retry knobs of the session controller.
///
/// Every value is in milliseconds and can be changed while the controller is
/// running via [`SessionConfigPatch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum silence (no result of any kind) before the watchdog assumes the
    /// engine has stalled.
    pub dead_time_ms: u64,
    /// Maximum lifetime of one engine session before it is recycled.
    pub max_session_ms: u64,
    /// How often the watchdog checks the active session.
    pub watchdog_interval_ms: u64,
    /// Consecutive engine errors tolerated before giving up.
    pub max_consecutive_errors: u32,
    /// Cooldown between a failure and the recovery restart.
    pub restart_delay_ms: u64,
    /// How long a finalized transcript suppresses identical re-emissions.
    pub dedup_window_ms: u64,
    /// Pause between force-stopping a stale handle and issuing a new start.
    pub settle_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dead_time_ms: 8_000,
            max_session_ms: 60_000,
            watchdog_interval_ms: 1_000,
            max_consecutive_errors: 5,
            restart_delay_ms: 500,
            dedup_window_ms: 3_000,
            settle_delay_ms: 100,
        }
    }
}

impl SessionConfig {
    pub fn dead_time(&self) -> Duration {
        Duration::from_millis(self.dead_time_ms)
    }

    pub fn max_session(&self) -> Duration {
        Duration::from_millis(self.max_session_ms)
    }

    /// Watchdog period, clamped to at least 1 ms so a zero value cannot spin.
    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms.max(1))
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn dedup_window(&self) -> Duration {
        Duration::from_millis(self.dedup_window_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

// ---------------------------------------------------------------------------
// SessionConfigPatch
// ---------------------------------------------------------------------------

/// Partial update for [`SessionConfig`].
///
/// `None` fields leave the current value untouched.  Deserializable from JSON
/// so a host UI can send `{"dead_time_ms": 3000}` and nothing else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfigPatch {
    pub dead_time_ms: Option<u64>,
    pub max_session_ms: Option<u64>,
    pub watchdog_interval_ms: Option<u64>,
    pub max_consecutive_errors: Option<u32>,
    pub restart_delay_ms: Option<u64>,
    pub dedup_window_ms: Option<u64>,
    pub settle_delay_ms: Option<u64>,
}

impl SessionConfigPatch {
    /// Merge the set fields into `config`.
    pub fn apply_to(&self, config: &mut SessionConfig) {
        if let Some(v) = self.dead_time_ms {
            config.dead_time_ms = v;
        }
        if let Some(v) = self.max_session_ms {
            config.max_session_ms = v;
        }
        if let Some(v) = self.watchdog_interval_ms {
            config.watchdog_interval_ms = v;
        }
        if let Some(v) = self.max_consecutive_errors {
            config.max_consecutive_errors = v;
        }
        if let Some(v) = self.restart_delay_ms {
            config.restart_delay_ms = v;
        }
        if let Some(v) = self.dedup_window_ms {
            config.dedup_window_ms = v;
        }
        if let Some(v) = self.settle_delay_ms {
            config.settle_delay_ms = v;
        }
    }

    /// Returns `true` when the patch touches the watchdog period.
    pub fn changes_watchdog_interval(&self) -> bool {
        self.watchdog_interval_ms.is_some()
    }
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Properties applied to every recognition engine handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// BCP-47 language tag passed to the engine (e.g. `"zh-CN"`).
    pub language: String,
    /// Keep listening across utterances instead of stopping after one.
    pub continuous: bool,
    /// Deliver partial hypotheses while the speaker is still talking.
    pub interim_results: bool,
    /// Number of alternative transcripts requested per result chunk.
    pub max_alternatives: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            language: "zh-CN".into(),
            continuous: true,
            interim_results: true,
            max_alternatives: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// PronunciationConfig
// ---------------------------------------------------------------------------

/// Settings for the pinyin annotation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PronunciationConfig {
    /// Whether final transcripts are annotated at all.
    pub enabled: bool,
    /// Character → pinyin JSON table.  `None` uses the default data path.
    pub dictionary_path: Option<std::path::PathBuf>,
    /// Number of converted strings kept in the lookup cache.
    pub cache_size: usize,
}

impl Default for PronunciationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dictionary_path: None,
            cache_size: 256,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use ruby_captions::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Session controller timing.
    pub session: SessionConfig,
    /// Recognition engine properties.
    pub engine: EngineConfig,
    /// Pinyin annotation settings.
    pub pronunciation: PronunciationConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
