//! Pronunciation annotation for finalized transcripts.
//!
//! This module provides:
//! * [`PronunciationConverter`]: async trait the session controller calls
//!   for every accepted final transcript.
//! * [`DictionaryConverter`]: pinyin ruby markup from a JSON
//!   character → reading table, with a bounded result cache.
//! * [`ConvertError`]: error variants for conversion.
//!
//! A failed conversion is never fatal: the controller logs it and keeps the
//! plain transcript.

pub mod dictionary;

use async_trait::async_trait;
use thiserror::Error;

pub use dictionary::DictionaryConverter;

// ---------------------------------------------------------------------------
// ConvertError
// ---------------------------------------------------------------------------

/// Errors that can occur while annotating text.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The converter has no reading table to work with.
    #[error("pronunciation table is empty")]
    EmptyTable,

    /// The backing table could not be read or parsed.
    #[error("failed to load pronunciation table: {0}")]
    Load(String),

    /// Any other backend failure.
    #[error("conversion failed: {0}")]
    Failed(String),
}

// ---------------------------------------------------------------------------
// PronunciationConverter trait
// ---------------------------------------------------------------------------

/// Turns plain text into its annotated (ruby) form.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn PronunciationConverter>` with the conversion worker.
#[async_trait]
pub trait PronunciationConverter: Send + Sync {
    async fn convert(&self, text: &str) -> Result<String, ConvertError>;
}
