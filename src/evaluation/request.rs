use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Learner level the item was served at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }

    /// Word count above which an answer stops looking like an answer.
    pub(crate) fn max_plausible_words(&self) -> usize {
        match self {
            Difficulty::Beginner => 12,
            Difficulty::Intermediate => 25,
            Difficulty::Advanced => 60,
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            _ => Err(ParseEnumError::new("difficulty", s)),
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Practice mode that issued the evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageContext {
    Flashcards,
    Translation,
    FillInBlank,
    Conversation,
    Dictation,
    Review,
}

impl PageContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageContext::Flashcards => "flashcards",
            PageContext::Translation => "translation",
            PageContext::FillInBlank => "fill_in_blank",
            PageContext::Conversation => "conversation",
            PageContext::Dictation => "dictation",
            PageContext::Review => "review",
        }
    }
}

impl std::str::FromStr for PageContext {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "flashcards" | "flashcard" => Ok(Self::Flashcards),
            "translation" | "translate" => Ok(Self::Translation),
            "fill_in_blank" | "fill_in_the_blank" | "cloze" => Ok(Self::FillInBlank),
            "conversation" | "chat" => Ok(Self::Conversation),
            "dictation" => Ok(Self::Dictation),
            "review" => Ok(Self::Review),
            _ => Err(ParseEnumError::new("page context", s)),
        }
    }
}

impl std::fmt::Display for PageContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized enum spelling on the inbound boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind}: '{value}'")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseEnumError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

/// One learner submission plus the context it was given in.
///
/// Immutable once built; the orchestrator only ever borrows it or clones it into
/// the detached external-call task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub text: String,
    pub context: String,
    pub difficulty: Difficulty,
    pub target_language: String,
    pub page_context: Option<PageContext>,
}

impl EvaluationRequest {
    pub fn new(
        text: impl Into<String>,
        context: impl Into<String>,
        difficulty: Difficulty,
        target_language: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            context: context.into(),
            difficulty,
            target_language: target_language.into(),
            page_context: None,
        }
    }

    pub fn with_page_context(mut self, page_context: PageContext) -> Self {
        self.page_context = Some(page_context);
        self
    }
}
