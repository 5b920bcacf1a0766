//! Text-based language identification.
//!
//! A pure heuristic over character ranges and common function words. It is
//! used as a high-precision override for the speech engine's acoustic
//! language guess (code-switching speakers routinely defeat acoustic ID).

/// Language used when a client asks for something we don't support.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Wildcard source language meaning "let the engine decide".
pub const AUTO: &str = "auto";

/// Language codes accepted for target/native preferences.
pub const SUPPORTED_LANGUAGES: &[&str] = &[
    "auto", "en", "vi", "zh", "ja", "ko", "fr", "de", "es", "ar", "ru", "pt",
    "it", "th", "hi", "nl", "pl", "tr", "sv",
];

/// Vietnamese diacritic alphabet, the strongest single signal for `vi`.
const VIETNAMESE_CHARS: &str = "àáạảãâầấậẩẫăằắặẳẵèéẹẻẽêềếệểễìíịỉĩòóọỏõôồốộổỗơờớợởỡùúụủũưừứựửữỳýỵỷỹđ";

const RUSSIAN_CHARS: &str = "абвгдеёжзийклмнопрстуфхцчшщъыьэюя";

/// Common function words for Latin-script languages, weighted lower than
/// character evidence to avoid false positives on short fragments.
const COMMON_WORDS: &[(&str, &[&str])] = &[
    ("en", &["the", "is", "and", "to", "a", "in", "it", "you", "that", "of"]),
    ("vi", &["là", "của", "có", "và", "với", "được", "trong", "cho", "từ", "một"]),
    ("fr", &["le", "de", "et", "à", "un", "il", "être", "en", "avoir", "que"]),
    ("de", &["der", "die", "und", "in", "den", "von", "zu", "das", "mit", "sich"]),
    ("es", &["el", "de", "que", "y", "a", "en", "un", "es", "se", "no"]),
    ("pt", &["o", "de", "que", "e", "do", "a", "em", "para", "é", "com"]),
    ("it", &["il", "di", "che", "e", "la", "per", "una", "in", "del", "è"]),
];

/// Code ↔ engine language-name pairs; transcription endpoints report the
/// full lowercase name while the rest of the pipeline speaks codes.
const ENGINE_NAMES: &[(&str, &str)] = &[
    ("en", "english"),
    ("vi", "vietnamese"),
    ("zh", "chinese"),
    ("ja", "japanese"),
    ("ko", "korean"),
    ("fr", "french"),
    ("de", "german"),
    ("es", "spanish"),
    ("ar", "arabic"),
    ("ru", "russian"),
    ("pt", "portuguese"),
    ("it", "italian"),
    ("th", "thai"),
    ("hi", "hindi"),
    ("nl", "dutch"),
    ("pl", "polish"),
    ("tr", "turkish"),
    ("sv", "swedish"),
];

pub fn is_supported(code: &str) -> bool {
    SUPPORTED_LANGUAGES.contains(&code)
}

/// Maps an engine-reported language name back to its code.
pub fn code_for_engine_name(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    ENGINE_NAMES
        .iter()
        .find(|(_, n)| *n == lower)
        .map(|(code, _)| *code)
}

/// Guesses the language of `text`, returning `(code, confidence)`.
///
/// Confidence is a heuristic in [0, 1]: character-range matches score by
/// their share of the text, word matches add half their share. Empty input
/// yields `("en", 0.0)`; input with no signal yields `("en", 0.1)`.
pub fn detect(text: &str) -> (&'static str, f32) {
    if text.trim().is_empty() {
        return (DEFAULT_LANGUAGE, 0.0);
    }

    let lower = text.to_lowercase();
    let total_chars = text.chars().count() as f32;
    let mut scores: Vec<(&'static str, f32)> = Vec::new();

    let mut add = |lang: &'static str, score: f32| {
        if score <= 0.0 {
            return;
        }
        match scores.iter_mut().find(|(l, _)| *l == lang) {
            Some((_, s)) => *s += score,
            None => scores.push((lang, score)),
        }
    };

    // Unicode-range evidence for non-Latin scripts
    add("zh", range_ratio(text, total_chars, '\u{4e00}', '\u{9fff}'));
    add("ja", {
        let hiragana = count_range(text, '\u{3040}', '\u{309f}');
        let katakana = count_range(text, '\u{30a0}', '\u{30ff}');
        (hiragana + katakana) as f32 / total_chars
    });
    add("ko", range_ratio(text, total_chars, '\u{ac00}', '\u{d7af}'));
    add("ar", range_ratio(text, total_chars, '\u{0600}', '\u{06ff}'));
    add("th", range_ratio(text, total_chars, '\u{0e00}', '\u{0e7f}'));

    // Character-set evidence
    add("vi", charset_ratio(&lower, total_chars, VIETNAMESE_CHARS));
    add("ru", charset_ratio(&lower, total_chars, RUSSIAN_CHARS));

    // Word evidence for Latin scripts
    let words: Vec<&str> = lower.split_whitespace().collect();
    if !words.is_empty() {
        for (lang, list) in COMMON_WORDS {
            let hits = words.iter().filter(|w| list.contains(w)).count();
            if hits > 0 {
                add(lang, (hits as f32 / words.len() as f32) * 0.5);
            }
        }
    }

    match scores
        .into_iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    {
        Some((lang, score)) => (lang, score.min(1.0)),
        None => (DEFAULT_LANGUAGE, 0.1),
    }
}

fn count_range(text: &str, lo: char, hi: char) -> usize {
    text.chars().filter(|c| (lo..=hi).contains(c)).count()
}

fn range_ratio(text: &str, total: f32, lo: char, hi: char) -> f32 {
    count_range(text, lo, hi) as f32 / total
}

fn charset_ratio(lower: &str, total: f32, set: &str) -> f32 {
    lower.chars().filter(|c| set.contains(*c)).count() as f32 / total
}
