//! Han-script text rules.
//!
//! Recognition engines running in a Chinese locale sometimes echo the reading
//! of a character right after it (`我wǒ说shuō`).  Before a final transcript is
//! annotated we:
//!
//! 1. trim boundary whitespace, plus ASCII and CJK punctuation for Han
//!    languages, and
//! 2. drop Latin runs that look like pinyin and touch a Han character.

// ---------------------------------------------------------------------------
// Character classes
// ---------------------------------------------------------------------------

/// Returns `true` for CJK unified ideographs (including extensions A–F and
/// the compatibility block) and the ideographic zero `〇`.
pub fn is_han(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2A6DF}'
        | '\u{2A700}'..='\u{2EBEF}'
        | '\u{3007}')
}

/// Punctuation stripped from both ends of a Han-language transcript.
fn is_boundary_punct(c: char) -> bool {
    if c.is_ascii_punctuation() {
        return true;
    }
    match c {
        // CJK symbols and punctuation, minus 々 〆 〇
        '\u{3005}'..='\u{3007}' => false,
        '\u{3000}'..='\u{303F}' => true,
        // fullwidth forms that are punctuation
        '\u{FF01}'..='\u{FF0F}'
        | '\u{FF1A}'..='\u{FF20}'
        | '\u{FF3B}'..='\u{FF40}'
        | '\u{FF5B}'..='\u{FF65}' => true,
        // general punctuation: dashes, quotes, ellipsis, middle dot
        '\u{2010}'..='\u{2027}' | '\u{00B7}' => true,
        _ => false,
    }
}

/// Vowels carrying a pinyin tone mark, precomposed.
const TONE_VOWELS: &str = "āáǎàēéěèīíǐìōóǒòūúǔùǖǘǚǜĀÁǍÀĒÉĚÈĪÍǏÌŌÓǑÒŪÚǓÙǕǗǙǛ";

fn is_combining_mark(c: char) -> bool {
    matches!(c, '\u{0300}'..='\u{036F}')
}

fn is_tone_mark(c: char) -> bool {
    TONE_VOWELS.contains(c) || matches!(c, '\u{0300}' | '\u{0301}' | '\u{0304}' | '\u{030C}')
}

/// Latin letter, with or without diacritics, or a combining mark.
fn is_latin_letter(c: char) -> bool {
    (c.is_alphabetic() && c < '\u{0250}') || is_combining_mark(c)
}

/// A run is treated as phonetic notation when it carries a tone mark, or is
/// entirely lowercase (tone digits allowed, e.g. `wo3`).
fn looks_phonetic(run: &[char]) -> bool {
    run.iter().any(|&c| is_tone_mark(c))
        || run.iter().all(|&c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || c == 'ü' || is_combining_mark(c)
        })
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Returns `true` when `language` is a Chinese locale (`zh*`, `cmn*`, `yue*`).
///
/// ```
/// use ruby_captions::text::is_han_language;
///
/// assert!(is_han_language("zh-CN"));
/// assert!(is_han_language("cmn-Hans-CN"));
/// assert!(!is_han_language("en-US"));
/// ```
pub fn is_han_language(language: &str) -> bool {
    let lang = language.trim().to_ascii_lowercase();
    ["zh", "cmn", "yue"]
        .iter()
        .any(|p| lang == *p || lang.starts_with(&format!("{p}-")) || lang.starts_with(&format!("{p}_")))
}

/// Trim boundary whitespace, and for Han languages boundary punctuation.
///
/// ```
/// use ruby_captions::text::trim_boundary;
///
/// assert_eq!(trim_boundary("  你好。 ", "zh-CN"), "你好");
/// assert_eq!(trim_boundary(" hello. ", "en-US"), "hello.");
/// ```
pub fn trim_boundary<'a>(text: &'a str, language: &str) -> &'a str {
    if is_han_language(language) {
        text.trim_matches(|c: char| c.is_whitespace() || is_boundary_punct(c))
    } else {
        text.trim()
    }
}

/// Remove pinyin-like Latin runs that touch a Han character.
///
/// Text without any Han character is returned unchanged.  Whitespace between
/// a removed run and a neighbouring Han character (or the string boundary) is
/// removed with it.
///
/// ```
/// use ruby_captions::text::strip_phonetic;
///
/// assert_eq!(strip_phonetic("我wǒ说shuō中文"), "我说中文");
/// assert_eq!(strip_phonetic("我用iPhone"), "我用iPhone");
/// ```
pub fn strip_phonetic(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    if !chars.iter().any(|&c| is_han(c)) {
        return text.to_string();
    }

    let mut keep = vec![true; chars.len()];
    let mut i = 0;
    while i < chars.len() {
        if !is_latin_letter(chars[i]) {
            i += 1;
            continue;
        }
        let start = i;
        while i < chars.len() && (is_latin_letter(chars[i]) || chars[i].is_ascii_digit()) {
            i += 1;
        }
        let end = i;

        let left = chars[..start].iter().rposition(|c| !c.is_whitespace());
        let right = chars[end..]
            .iter()
            .position(|c| !c.is_whitespace())
            .map(|p| end + p);
        let left_han = left.is_some_and(|p| is_han(chars[p]));
        let right_han = right.is_some_and(|p| is_han(chars[p]));

        if !(left_han || right_han) || !looks_phonetic(&chars[start..end]) {
            continue;
        }

        let from = if left_han || left.is_none() {
            left.map_or(0, |p| p + 1)
        } else {
            start
        };
        let to = if right_han || right.is_none() {
            right.unwrap_or(chars.len())
        } else {
            end
        };
        keep[from..to].iter_mut().for_each(|k| *k = false);
    }

    chars
        .iter()
        .zip(keep)
        .filter_map(|(&c, k)| k.then_some(c))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn han_ranges() {
        assert!(is_han('中'));
        assert!(is_han('〇'));
        assert!(is_han('\u{3400}'));
        assert!(!is_han('a'));
        assert!(!is_han('。'));
        assert!(!is_han('ก'));
    }

    #[test]
    fn language_detection() {
        assert!(is_han_language("zh"));
        assert!(is_han_language("ZH-tw"));
        assert!(is_han_language("yue-Hant-HK"));
        assert!(is_han_language("zh_CN"));
        assert!(!is_han_language("en-US"));
        assert!(!is_han_language("zu"));
        assert!(!is_han_language("cmnx"));
    }

    #[test]
    fn trims_cjk_punctuation_for_chinese() {
        assert_eq!(trim_boundary("，你好！", "zh-CN"), "你好");
        assert_eq!(trim_boundary("「你好」", "zh-TW"), "你好");
        assert_eq!(trim_boundary("...你好?", "zh-CN"), "你好");
        assert_eq!(trim_boundary("。", "zh-CN"), "");
    }

    #[test]
    fn keeps_inner_punctuation() {
        assert_eq!(trim_boundary("你好，世界。", "zh-CN"), "你好，世界");
    }

    #[test]
    fn keeps_ideographic_zero_at_boundary() {
        assert_eq!(trim_boundary("二〇", "zh-CN"), "二〇");
    }

    #[test]
    fn other_languages_trim_whitespace_only() {
        assert_eq!(trim_boundary("  Hello, world!  ", "en-US"), "Hello, world!");
    }

    #[test]
    fn strips_interleaved_pinyin() {
        assert_eq!(strip_phonetic("我wǒ说shuō中文"), "我说中文");
    }

    #[test]
    fn strips_spaced_pinyin() {
        assert_eq!(strip_phonetic("我 wǒ 说 shuō 中文"), "我说中文");
    }

    #[test]
    fn strips_tone_digit_pinyin() {
        assert_eq!(strip_phonetic("你ni3好hao3"), "你好");
    }

    #[test]
    fn strips_trailing_capitalised_tone_marked_run() {
        assert_eq!(strip_phonetic("我Wǒ"), "我");
    }

    #[test]
    fn strips_combining_tone_marks() {
        assert_eq!(strip_phonetic("我wo\u{030C}说"), "我说");
    }

    #[test]
    fn keeps_mixed_case_words() {
        assert_eq!(strip_phonetic("我用iPhone打电话"), "我用iPhone打电话");
    }

    #[test]
    fn keeps_latin_without_han() {
        assert_eq!(strip_phonetic("hello wǒ"), "hello wǒ");
    }

    #[test]
    fn keeps_latin_not_touching_han() {
        assert_eq!(strip_phonetic("我说 wǒ hello"), "我说 hello");
    }
}
