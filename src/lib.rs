pub mod config;
pub mod engine;
pub mod history;
pub mod pronunciation;
pub mod session;
pub mod text;

pub use config::{AppConfig, AppPaths, SessionConfig, SessionConfigPatch};
pub use engine::{EngineEvent, EngineFactory, RecognitionEngine};
pub use history::{SharedHistory, TranscriptEntry, TranscriptHistory};
pub use pronunciation::{DictionaryConverter, PronunciationConverter};
pub use session::{ControllerHandle, SessionController, SessionError, SessionEvent, SessionStatus};
