use super::*;
use crate::evaluation::{Difficulty, EvaluationRequest, PageContext};

fn request(text: &str) -> EvaluationRequest {
    EvaluationRequest::new(text, "Greet your friend in Spanish.", Difficulty::Beginner, "es")
}

#[test]
fn test_fold_text_case_accents_whitespace() {
    assert_eq!(fold_text("  Héllo   WÖRLD \t\n"), "hello world");
    assert_eq!(fold_text("Árbol"), "arbol");
    assert_eq!(fold_text("mañana"), "manana");
}

#[test]
fn test_fold_text_is_idempotent() {
    for input in ["Qué TAL  estás", "  ", "ça va?", "Straße", "日本語 テスト"] {
        let once = fold_text(input);
        assert_eq!(fold_text(&once), once, "input: {input:?}");
    }
}

#[test]
fn test_fold_text_strips_control_characters() {
    assert_eq!(fold_text("ho\u{1f}la\u{0}"), "ho la");
}

#[test]
fn test_fold_text_empty() {
    assert_eq!(fold_text(""), "");
    assert_eq!(fold_text("   \t "), "");
}

#[test]
fn test_variants_share_one_key() {
    let normalizer = KeyNormalizer::default();
    let a = normalizer.normalize(&request("Hola"));
    let b = normalizer.normalize(&request("hola"));
    let c = normalizer.normalize(&request("HOLA  "));
    let d = normalizer.normalize(&request("  hólá"));

    assert_eq!(a, b);
    assert_eq!(b, c);
    assert_eq!(c, d);
}

#[test]
fn test_context_variants_share_one_key() {
    let normalizer = KeyNormalizer::default();
    let mut shouted = request("hola");
    shouted.context = "  GREET your   friend in SPÁNISH. ".to_string();

    assert_eq!(
        normalizer.normalize(&request("hola")),
        normalizer.normalize(&shouted)
    );
}

#[test]
fn test_different_text_different_key() {
    let normalizer = KeyNormalizer::default();
    assert_ne!(
        normalizer.normalize(&request("hola")),
        normalizer.normalize(&request("adios"))
    );
}

#[test]
fn test_primary_and_scope() {
    let key = KeyNormalizer::default().normalize(&request("  Buenos   Días "));
    assert_eq!(key.primary(), "buenos dias");
    assert!(key.scope().contains("greet your friend"));
    assert!(key.scope().contains("beginner"));
    assert_eq!(key.as_str().len(), key.primary().len() + key.scope().len());
}

#[test]
fn test_empty_text_normalizes_to_empty_primary() {
    let key = KeyNormalizer::default().normalize(&request("   "));
    assert_eq!(key.primary(), "");
    assert!(!key.is_empty());
}

#[test]
fn test_context_truncated_to_prefix() {
    let normalizer = KeyNormalizer::new(NormalizerConfig::default().context_prefix_len(10));
    let mut long = request("hola");
    long.context = "a".repeat(10_000);
    let mut longer = request("hola");
    longer.context = format!("{}{}", "a".repeat(10), "b".repeat(50_000));

    let key_long = normalizer.normalize(&long);
    let key_longer = normalizer.normalize(&longer);

    assert_eq!(key_long, key_longer);
    assert!(key_long.len() < 64);
}

#[test]
fn test_context_prefix_zero_ignores_context() {
    let normalizer = KeyNormalizer::new(NormalizerConfig::default().context_prefix_len(0));
    let mut other = request("hola");
    other.context = "Completely different prompt".to_string();

    assert_eq!(normalizer.normalize(&request("hola")), normalizer.normalize(&other));
}

#[test]
fn test_difficulty_participation_is_configurable() {
    let mut advanced = request("hola");
    advanced.difficulty = Difficulty::Advanced;

    let with = KeyNormalizer::default();
    assert_ne!(with.normalize(&request("hola")), with.normalize(&advanced));

    let without = KeyNormalizer::new(NormalizerConfig::default().include_difficulty(false));
    assert_eq!(without.normalize(&request("hola")), without.normalize(&advanced));
}

#[test]
fn test_page_context_participation_is_configurable() {
    let tagged = request("hola").with_page_context(PageContext::Flashcards);

    let with = KeyNormalizer::default();
    assert_ne!(with.normalize(&request("hola")), with.normalize(&tagged));

    let without = KeyNormalizer::new(NormalizerConfig::default().include_page_context(false));
    assert_eq!(without.normalize(&request("hola")), without.normalize(&tagged));
}

#[test]
fn test_target_language_participates() {
    let mut french = request("hola");
    french.target_language = "FR".to_string();
    let normalizer = KeyNormalizer::default();
    assert_ne!(normalizer.normalize(&request("hola")), normalizer.normalize(&french));
}

#[test]
fn test_display_uses_visible_separator() {
    let key = KeyNormalizer::default().normalize(&request("hola"));
    let shown = key.to_string();
    assert!(shown.starts_with("hola|"));
    assert!(!shown.contains('\u{1f}'));
}

#[test]
fn test_normalize_is_pure() {
    let normalizer = KeyNormalizer::default();
    let req = request("¿Dónde está la biblioteca?");
    let before = req.clone();
    let first = normalizer.normalize(&req);
    let second = normalizer.normalize(&req);
    assert_eq!(first, second);
    assert_eq!(req, before);
}
