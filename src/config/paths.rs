//! Where ruby-captions keeps its files.
//!
//! Settings live in the platform config directory; everything the program
//! accumulates or ships alongside (the saved transcript history and the
//! pinyin table) lives in the local data directory:
//!
//! ```text
//! <config_dir>/ruby-captions/settings.toml
//! <data_local_dir>/ruby-captions/history.json
//! <data_local_dir>/ruby-captions/pinyin.json
//! ```

use std::path::{Path, PathBuf};

const APP_DIR: &str = "ruby-captions";
const SETTINGS_FILE: &str = "settings.toml";
const HISTORY_FILE: &str = "history.json";
const DICTIONARY_FILE: &str = "pinyin.json";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub settings_file: PathBuf,
    pub data_dir: PathBuf,
    /// Transcript history saved on exit.
    pub history_file: PathBuf,
    /// Pinyin table used when the config names none.
    pub dictionary_file: PathBuf,
}

impl AppPaths {
    /// Resolve against the platform directories, or the working directory
    /// where the platform has none.
    pub fn new() -> Self {
        let base = |dir: Option<PathBuf>| dir.unwrap_or_else(|| PathBuf::from("."));
        Self::under(
            &base(dirs::config_dir()).join(APP_DIR),
            &base(dirs::data_local_dir()).join(APP_DIR),
        )
    }

    /// Lay the files out below explicit config and data directories.
    pub fn under(config_dir: &Path, data_dir: &Path) -> Self {
        Self {
            config_dir: config_dir.to_path_buf(),
            settings_file: config_dir.join(SETTINGS_FILE),
            data_dir: data_dir.to_path_buf(),
            history_file: data_dir.join(HISTORY_FILE),
            dictionary_file: data_dir.join(DICTIONARY_FILE),
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
