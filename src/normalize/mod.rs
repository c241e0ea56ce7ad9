//! Cache-key normalization.
//!
//! A [`CacheKey`] has two parts:
//!
//! - the **primary** component: the folded learner text, compared by edit distance
//!   in the similarity tier
//! - the **scope**: folded context prefix, target language, and optional difficulty /
//!   page-context tags; near-matches are only searched among entries with an
//!   identical scope
//!
//! Folding is lowercase + combining-mark removal (NFD) + control-character removal +
//! whitespace collapsing. The function is total: empty or garbage input produces a
//! key with an empty primary component.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::constants::DEFAULT_CONTEXT_PREFIX_LEN;
use crate::evaluation::EvaluationRequest;

#[cfg(test)]
mod tests;

/// Separates primary and scope. Control characters are stripped from every
/// component, so the separator cannot appear inside one.
const KEY_SEPARATOR: char = '\u{1f}';

/// Which request fields participate in the key. The learner text always does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizerConfig {
    /// Max characters of folded context kept. `0` drops the context entirely.
    pub context_prefix_len: usize,
    pub include_difficulty: bool,
    pub include_page_context: bool,
    pub include_target_language: bool,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            context_prefix_len: DEFAULT_CONTEXT_PREFIX_LEN,
            include_difficulty: true,
            include_page_context: true,
            include_target_language: true,
        }
    }
}

impl NormalizerConfig {
    pub fn context_prefix_len(mut self, len: usize) -> Self {
        self.context_prefix_len = len;
        self
    }

    pub fn include_difficulty(mut self, include: bool) -> Self {
        self.include_difficulty = include;
        self
    }

    pub fn include_page_context(mut self, include: bool) -> Self {
        self.include_page_context = include;
        self
    }

    pub fn include_target_language(mut self, include: bool) -> Self {
        self.include_target_language = include;
        self
    }
}

/// Canonical lookup key derived from an [`EvaluationRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    full: String,
    primary_len: usize,
}

impl CacheKey {
    fn from_parts(primary: &str, scope: &[&str]) -> Self {
        let mut full = String::with_capacity(primary.len() + 16);
        full.push_str(primary);
        for part in scope {
            full.push(KEY_SEPARATOR);
            full.push_str(part);
        }
        Self {
            full,
            primary_len: primary.len(),
        }
    }

    /// Full key string (primary and scope joined by an internal separator).
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.full
    }

    /// Folded learner text.
    #[inline]
    pub fn primary(&self) -> &str {
        &self.full[..self.primary_len]
    }

    /// Everything except the primary component.
    #[inline]
    pub fn scope(&self) -> &str {
        &self.full[self.primary_len..]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.full.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.full.is_empty()
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for c in self.full.chars() {
            if c == KEY_SEPARATOR {
                f.write_str("|")?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        Ok(())
    }
}

/// Pure request → key function.
#[derive(Debug, Clone, Default)]
pub struct KeyNormalizer {
    config: NormalizerConfig,
}

impl KeyNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    pub fn normalize(&self, request: &EvaluationRequest) -> CacheKey {
        let primary = fold_text(&request.text);
        let folded_context = fold_text(&request.context);
        let context = truncate_chars(&folded_context, self.config.context_prefix_len);

        let language = if self.config.include_target_language {
            fold_text(&request.target_language)
        } else {
            String::new()
        };
        let difficulty = if self.config.include_difficulty {
            request.difficulty.as_str()
        } else {
            ""
        };
        let page = match (self.config.include_page_context, request.page_context) {
            (true, Some(page)) => page.as_str(),
            _ => "",
        };

        CacheKey::from_parts(&primary, &[context, language.as_str(), difficulty, page])
    }
}

/// Lowercases, strips combining marks and control characters, and collapses whitespace.
pub fn fold_text(input: &str) -> String {
    let stripped: String = input
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_control() && !c.is_whitespace() { ' ' } else { c })
        .collect();

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(input: &str, max_chars: usize) -> &str {
    match input.char_indices().nth(max_chars) {
        Some((idx, _)) => input[..idx].trim_end(),
        None => input,
    }
}
