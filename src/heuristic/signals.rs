//! Individual checks over folded text. Every function here is pure.

use crate::evaluation::PageContext;

/// Outcome of the decisive checks. A decisive verdict skips the additive scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    Empty,
    Gibberish,
    CopiedContext,
    ExpectedTranscript,
    FarTooLong,
}

impl Verdict {
    pub(crate) fn score(self) -> u8 {
        match self {
            Verdict::Empty => 0,
            Verdict::Gibberish => 5,
            Verdict::CopiedContext => 10,
            Verdict::ExpectedTranscript => 95,
            Verdict::FarTooLong => 15,
        }
    }

    pub(crate) fn confidence(self) -> f64 {
        match self {
            Verdict::Empty => 0.95,
            Verdict::Gibberish | Verdict::CopiedContext | Verdict::ExpectedTranscript => 0.90,
            Verdict::FarTooLong => 0.85,
        }
    }

    pub(crate) fn feedback(self) -> &'static str {
        match self {
            Verdict::Empty => "No answer was given.",
            Verdict::Gibberish => "This doesn't look like words in any language. Try again.",
            Verdict::CopiedContext => "You copied the prompt instead of answering it.",
            Verdict::ExpectedTranscript => "Exactly what was said. Well done!",
            Verdict::FarTooLong => "Your answer is much longer than this exercise needs.",
        }
    }
}

/// Words longer than this with no vowel at all are treated as keyboard mashing.
const VOWELLESS_WORD_MIN_LEN: usize = 5;

/// A run of the same character this long is treated as keyboard mashing.
const REPEATED_RUN_LEN: usize = 4;

/// Answers longer than `max_plausible_words * FAR_TOO_LONG_FACTOR` are rejected outright.
const FAR_TOO_LONG_FACTOR: usize = 3;

pub(crate) fn decisive_verdict(
    text: &str,
    context: &str,
    max_words: usize,
    page: Option<PageContext>,
) -> Option<Verdict> {
    if text.is_empty() {
        return Some(Verdict::Empty);
    }
    if is_gibberish(text) {
        return Some(Verdict::Gibberish);
    }
    if !context.is_empty() && text == context {
        return Some(if page == Some(PageContext::Dictation) {
            Verdict::ExpectedTranscript
        } else {
            Verdict::CopiedContext
        });
    }
    if word_count(text) > max_words * FAR_TOO_LONG_FACTOR {
        return Some(Verdict::FarTooLong);
    }
    None
}

pub(crate) fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// No letters at all, a long run of one character, or (for Latin script) a long word
/// without vowels.
pub(crate) fn is_gibberish(text: &str) -> bool {
    if !text.chars().any(char::is_alphabetic) {
        return true;
    }
    if has_repeated_run(text, REPEATED_RUN_LEN) {
        return true;
    }
    text.split_whitespace().any(|word| {
        word.chars().count() >= VOWELLESS_WORD_MIN_LEN
            && word.chars().all(|c| c.is_ascii_alphabetic())
            && !word.chars().any(is_vowel)
    })
}

fn has_repeated_run(text: &str, run: usize) -> bool {
    let mut previous = None;
    let mut length = 0;
    for c in text.chars() {
        if Some(c) == previous && c.is_alphabetic() {
            length += 1;
            if length >= run {
                return true;
            }
        } else {
            previous = Some(c);
            length = 1;
        }
    }
    false
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y')
}

/// Share of the answer's words that also appear in the context, in `0.0..=1.0`.
pub(crate) fn context_overlap(text: &str, context: &str) -> f64 {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return 0.0;
    }
    let context_words: std::collections::HashSet<&str> = context
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .collect();
    let shared = words
        .iter()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| context_words.contains(w))
        .count();
    shared as f64 / words.len() as f64
}

/// Common function words per target language. Text is already folded, so the lists
/// carry no diacritics.
fn language_markers(language: &str) -> Option<&'static [&'static str]> {
    let primary = language.split(['-', '_']).next().unwrap_or(language);
    let markers: &'static [&'static str] = match primary {
        "es" | "spanish" | "espanol" => &[
            "el", "la", "los", "las", "de", "que", "y", "en", "un", "una", "es", "por", "con",
            "para", "me", "mi", "yo", "no", "se", "al", "del",
        ],
        "fr" | "french" | "francais" => &[
            "le", "la", "les", "de", "des", "du", "et", "un", "une", "est", "je", "tu", "il",
            "elle", "pas", "que", "en", "pour", "avec",
        ],
        "de" | "german" | "deutsch" => &[
            "der", "die", "das", "und", "ist", "ich", "du", "ein", "eine", "nicht", "mit", "zu",
            "den", "dem", "auf", "fur",
        ],
        "it" | "italian" | "italiano" => &[
            "il", "lo", "la", "gli", "le", "di", "che", "e", "un", "una", "non", "per", "con",
            "sono", "io",
        ],
        "pt" | "portuguese" | "portugues" => &[
            "o", "a", "os", "as", "de", "que", "e", "um", "uma", "nao", "em", "para", "com",
            "eu", "do", "da",
        ],
        "en" | "english" => &[
            "the", "a", "an", "and", "is", "are", "i", "you", "to", "of", "in", "it", "not",
            "with", "for",
        ],
        _ => return None,
    };
    Some(markers)
}

/// `Some(true)` if the text carries a function word of the target language,
/// `Some(false)` if it has enough words to expect one but carries none, `None` if the
/// language is unknown or the answer is too short to judge.
pub(crate) fn has_language_markers(text: &str, language: &str) -> Option<bool> {
    let markers = language_markers(language)?;
    let found = text.split_whitespace().any(|w| {
        let w = w.trim_matches(|c: char| !c.is_alphanumeric());
        markers.contains(&w)
    });
    if found {
        Some(true)
    } else if word_count(text) >= 3 {
        Some(false)
    } else {
        None
    }
}

/// Additive adjustment per practice mode. Modes with short expected answers are more
/// forgiving; review sessions are stricter.
pub(crate) fn page_adjustment(page: Option<PageContext>, words: usize) -> i16 {
    match page {
        None => 0,
        Some(PageContext::Flashcards) if words <= 3 => 5,
        Some(PageContext::Flashcards) => -5,
        Some(PageContext::Translation) => 0,
        Some(PageContext::FillInBlank) if words <= 3 => 3,
        Some(PageContext::FillInBlank) => -8,
        Some(PageContext::Conversation) if words >= 3 => 5,
        Some(PageContext::Conversation) => 0,
        Some(PageContext::Dictation) => -5,
        Some(PageContext::Review) => -3,
    }
}
