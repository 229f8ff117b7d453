//! Transcript text clean-up applied before annotation.
//!
//! * [`trim_boundary`]: per-language trimming of whitespace and punctuation.
//! * [`strip_phonetic`]: removes pinyin the engine echoed into Han text.
//! * [`is_han_language`] / [`is_han`]: script and locale helpers.

pub mod han;

pub use han::{is_han, is_han_language, strip_phonetic, trim_boundary};
