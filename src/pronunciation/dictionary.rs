//! Table-driven pinyin annotation.
//!
//! [`DictionaryConverter`] reads a JSON object mapping single Han characters
//! to their reading:
//!
//! ```json
//! { "我": "wǒ", "说": "shuō", "中": "zhōng", "文": "wén" }
//! ```
//!
//! and renders every known character as `<ruby>我<rt>wǒ</rt></ruby>`.
//! Everything else is passed through HTML-escaped.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use super::{ConvertError, PronunciationConverter};
use crate::text::is_han;

// ---------------------------------------------------------------------------
// ResultCache
// ---------------------------------------------------------------------------

/// Insertion-ordered cache; the oldest entry is evicted first.
#[derive(Debug)]
struct ResultCache {
    capacity: usize,
    map: HashMap<String, String>,
    order: VecDeque<String>,
}

impl ResultCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

    fn insert(&mut self, key: String, value: String) {
        if self.capacity == 0 || self.map.contains_key(&key) {
            return;
        }
        while self.order.len() >= self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.map.remove(&old);
            }
        }
        self.order.push_back(key.clone());
        self.map.insert(key, value);
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}

// ---------------------------------------------------------------------------
// DictionaryConverter
// ---------------------------------------------------------------------------

/// [`PronunciationConverter`] backed by an in-memory character table.
#[derive(Debug)]
pub struct DictionaryConverter {
    table: HashMap<char, String>,
    cache: Mutex<ResultCache>,
}

impl DictionaryConverter {
    pub fn from_table(table: HashMap<char, String>, cache_size: usize) -> Self {
        Self {
            table,
            cache: Mutex::new(ResultCache::new(cache_size)),
        }
    }

    /// Parse a JSON object of `"字": "reading"` pairs.
    ///
    /// Keys that are not exactly one character are skipped.
    pub fn from_json_str(json: &str, cache_size: usize) -> Result<Self, ConvertError> {
        let raw: HashMap<String, String> =
            serde_json::from_str(json).map_err(|e| ConvertError::Load(e.to_string()))?;

        let mut table = HashMap::with_capacity(raw.len());
        let mut skipped = 0usize;
        for (key, reading) in raw {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if !reading.trim().is_empty() => {
                    table.insert(c, reading.trim().to_string());
                }
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            log::debug!("pronunciation: skipped {skipped} malformed table entries");
        }
        Ok(Self::from_table(table, cache_size))
    }

    /// Load a table file from disk.
    pub fn load_from(path: &Path, cache_size: usize) -> Result<Self, ConvertError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| ConvertError::Load(format!("{}: {e}", path.display())))?;
        let converter = Self::from_json_str(&data, cache_size)?;
        log::info!(
            "pronunciation: loaded {} readings from {}",
            converter.len(),
            path.display()
        );
        Ok(converter)
    }

    /// Number of characters with a known reading.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Render `text` as ruby markup without touching the cache.
    pub fn annotate(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len() * 4);
        for c in text.chars() {
            match self.table.get(&c) {
                Some(reading) if is_han(c) => {
                    out.push_str("<ruby>");
                    out.push(c);
                    out.push_str("<rt>");
                    push_escaped(&mut out, reading);
                    out.push_str("</rt></ruby>");
                }
                _ => push_escaped_char(&mut out, c),
            }
        }
        out
    }

    fn cached_len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl PronunciationConverter for DictionaryConverter {
    async fn convert(&self, text: &str) -> Result<String, ConvertError> {
        if self.table.is_empty() {
            return Err(ConvertError::EmptyTable);
        }

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(hit) = cache.get(text) {
            return Ok(hit);
        }
        let annotated = self.annotate(text);
        cache.insert(text.to_string(), annotated.clone());
        Ok(annotated)
    }
}

fn push_escaped_char(out: &mut String, c: char) {
    match c {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '"' => out.push_str("&quot;"),
        '\'' => out.push_str("&#39;"),
        _ => out.push(c),
    }
}

fn push_escaped(out: &mut String, s: &str) {
    s.chars().for_each(|c| push_escaped_char(out, c));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const TABLE: &str = r#"{"我": "wǒ", "说": "shuō", "中": "zhōng", "文": "wén", "你": "nǐ", "好": "hǎo"}"#;

    fn converter() -> DictionaryConverter {
        DictionaryConverter::from_json_str(TABLE, 4).unwrap()
    }

    #[tokio::test]
    async fn annotates_known_characters() {
        let out = converter().convert("你好").await.unwrap();
        assert_eq!(
            out,
            "<ruby>你<rt>nǐ</rt></ruby><ruby>好<rt>hǎo</rt></ruby>"
        );
    }

    #[tokio::test]
    async fn passes_unknown_characters_through_escaped() {
        let out = converter().convert("我<猫>").await.unwrap();
        assert_eq!(out, "<ruby>我<rt>wǒ</rt></ruby>&lt;猫&gt;");
    }

    #[tokio::test]
    async fn empty_table_is_an_error() {
        let conv = DictionaryConverter::from_table(HashMap::new(), 4);
        assert!(matches!(
            conv.convert("你好").await,
            Err(ConvertError::EmptyTable)
        ));
    }

    #[tokio::test]
    async fn cache_is_bounded() {
        let conv = converter();
        for text in ["我", "说", "中", "文", "你", "好"] {
            conv.convert(text).await.unwrap();
        }
        assert_eq!(conv.cached_len(), 4);

        // Repeats are served from the cache without growing it.
        conv.convert("好").await.unwrap();
        assert_eq!(conv.cached_len(), 4);
    }

    #[test]
    fn malformed_keys_are_skipped() {
        let conv =
            DictionaryConverter::from_json_str(r#"{"中文": "zhōngwén", "中": "zhōng", "文": " "}"#, 0)
                .unwrap();
        assert_eq!(conv.len(), 1);
    }

    #[test]
    fn invalid_json_is_a_load_error() {
        assert!(matches!(
            DictionaryConverter::from_json_str("not json", 0),
            Err(ConvertError::Load(_))
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("pinyin.json");
        std::fs::write(&path, TABLE).unwrap();

        let conv = DictionaryConverter::load_from(&path, 8).unwrap();
        assert_eq!(conv.len(), 6);
        assert!(!conv.is_empty());
    }

    #[test]
    fn load_missing_file_fails() {
        let dir = tempdir().expect("temp dir");
        let result = DictionaryConverter::load_from(&dir.path().join("missing.json"), 8);
        assert!(matches!(result, Err(ConvertError::Load(_))));
    }
}
