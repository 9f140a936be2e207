//! Stateless checks on a candidate output.
//!
//! All functions here are pure; the postprocessor drives them. The score
//! weights and thresholds are contractual constants — downstream fallback
//! behavior depends on them exactly as written.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::analysis::sentiment::has_char_run;

/// A single character repeating this many times marks corrupted output.
const MAX_CHAR_RUN: usize = 21;
/// A word (>2 chars) taking more than this share of all words is a loop.
const MAX_WORD_SHARE: f64 = 0.3;
/// Word-share check only applies past this many words.
const WORD_SHARE_MIN_WORDS: usize = 10;

/// Markup or template debris that must never reach the user.
static CORRUPTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"<\|", r"\|>", r"\[INST\]", r"\[/INST\]", r"<<SYS>>", r"</?s>", r"\{\{", r"\}\}", r"```",
        r"�",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid regex: corruption pattern"))
    .collect()
});

/// Sentence-terminal punctuation followed by whitespace.
static SENTENCE_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?…]\s").expect("Invalid regex: sentence break"));

/// Basic validity: non-empty, carries real characters, and does not look
/// abruptly cut off mid-sentence.
pub fn is_valid(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() < 2 {
        return false;
    }
    if !trimmed.chars().any(|c| c.is_alphanumeric()) {
        return false;
    }
    !looks_truncated(trimmed)
}

/// A long answer that ends on a bare letter and never closes a sentence
/// was probably cut off by the generator. Short informal replies ("blz",
/// "pode crer") are exempt via the length guards.
fn looks_truncated(text: &str) -> bool {
    let len = text.chars().count();
    let ends_in_letter = text.chars().last().map(char::is_alphabetic).unwrap_or(false);
    ends_in_letter && len > 100 && !SENTENCE_BREAK_RE.is_match(text) && len > 150
}

/// Safety: rejects character floods, word loops and markup debris.
pub fn is_safe(text: &str) -> bool {
    if has_char_run(text, MAX_CHAR_RUN) {
        return false;
    }

    let words: Vec<String> = text
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect();
    if words.len() > WORD_SHARE_MIN_WORDS {
        let total = words.len() as f64;
        let mut counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
        for word in &words {
            if word.chars().count() > 2 {
                *counts.entry(word.as_str()).or_insert(0) += 1;
            }
        }
        if counts.values().any(|&c| c as f64 / total > MAX_WORD_SHARE) {
            return false;
        }
    }

    !CORRUPTION_PATTERNS.iter().any(|p| p.is_match(text))
}

/// Minimum linguistic plausibility: enough letters, sane vowel ratio, at
/// least one real word-like run.
pub fn has_minimum_quality(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.chars().count() < 3 {
        return false;
    }

    let letters: Vec<char> = trimmed.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.is_empty() {
        return false;
    }

    let vowels = "aeiouáàâãéêíóôõúüAEIOUÁÀÂÃÉÊÍÓÔÕÚÜ";
    let vowel_count = letters.iter().filter(|c| vowels.contains(**c)).count();
    let ratio = vowel_count as f64 / letters.len() as f64;
    if !(0.2..=0.7).contains(&ratio) {
        return false;
    }

    has_alpha_run(trimmed, 3)
}

fn has_alpha_run(text: &str, run: usize) -> bool {
    let mut count = 0;
    for c in text.chars() {
        if c.is_alphabetic() {
            count += 1;
            if count >= run {
                return true;
            }
        } else {
            count = 0;
        }
    }
    false
}

/// Continuous quality score in `[0, 1]`: length appropriateness (0.3,
/// reduced band above 500 chars), punctuation presence (0.2), lexical
/// variety (×0.3) and a flat safety bonus (0.2).
pub fn quality_score(text: &str) -> f64 {
    let mut score = 0.0;
    let len = text.chars().count();

    if (10..=500).contains(&len) {
        score += 0.3;
    } else if len > 500 {
        score += 0.2;
    }

    if text.contains(['.', '!', '?', ',']) {
        score += 0.2;
    }

    let words: Vec<String> = text
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .collect();
    if !words.is_empty() {
        let unique: HashSet<&str> = words.iter().map(|w| w.as_str()).collect();
        score += unique.len() as f64 / words.len() as f64 * 0.3;
    }

    if is_safe(text) {
        score += 0.2;
    }

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_tiny_input() {
        assert!(!is_valid(""));
        assert!(!is_valid("   "));
        assert!(!is_valid("a"));
        assert!(is_valid("oi"));
    }

    #[test]
    fn rejects_symbol_only_text() {
        assert!(!is_valid("!!! ???"));
        assert!(!is_valid("..."));
        assert!(is_valid("tá bom!"));
    }

    #[test]
    fn accepts_short_informal_endings() {
        // Ends in a letter but is short — normal informal reply.
        assert!(is_valid("pode crer mano"));
    }

    #[test]
    fn rejects_long_unpunctuated_letter_ending() {
        let truncated = "palavra ".repeat(25) + "corta";
        assert!(truncated.chars().count() > 150);
        assert!(!is_valid(&truncated));

        // The same length with a closed sentence is fine.
        let closed = format!("{}fim. ok", "palavra ".repeat(25));
        assert!(is_valid(&closed));
    }

    #[test]
    fn char_run_boundary_is_exactly_21() {
        let twenty: String = "a".repeat(20);
        let twenty_one: String = "a".repeat(21);
        assert!(is_safe(&twenty));
        assert!(!is_safe(&twenty_one));
    }

    #[test]
    fn word_loops_are_unsafe() {
        let looped = "legal ".repeat(12);
        assert!(!is_safe(&looped));

        let varied = "hoje o dia foi bem tranquilo e depois fomos ao cinema juntos";
        assert!(is_safe(varied));
    }

    #[test]
    fn markup_debris_is_unsafe() {
        assert!(!is_safe("resposta <|endoftext|>"));
        assert!(!is_safe("claro [INST] faça [/INST]"));
        assert!(!is_safe("veja ```código```"));
        assert!(is_safe("resposta normal, sem marcação"));
    }

    #[test]
    fn minimum_quality_needs_real_words() {
        assert!(!has_minimum_quality("12"));
        assert!(!has_minimum_quality("123456"));
        assert!(!has_minimum_quality("!?!?!?"));
        assert!(!has_minimum_quality("bcdfg hjklm"));
        assert!(has_minimum_quality("beleza, tudo certo"));
    }

    #[test]
    fn vowel_ratio_bounds() {
        // All vowels: ratio 1.0, outside [0.2, 0.7].
        assert!(!has_minimum_quality("aaa eee iii"));
        assert!(has_minimum_quality("massa demais"));
    }

    #[test]
    fn quality_score_is_additive_and_bounded() {
        let good = "hoje foi um dia muito bom, saímos cedo e voltamos tarde!";
        let score = quality_score(good);
        assert!(score > 0.8, "{score}");
        assert!(score <= 1.0);

        let poor = "a";
        assert!(quality_score(poor) <= 0.5);
    }

    #[test]
    fn repetition_lowers_variety_component() {
        let varied = "cada palavra aqui aparece somente uma vez nesse texto";
        let repeated = "bom bom bom bom bom bom bom bom bom";
        assert!(quality_score(varied) > quality_score(repeated));
    }

    #[test]
    fn unsafe_text_loses_the_safety_bonus() {
        let safe = "resposta tranquila e normal";
        let unsafe_text = format!("resposta tranquila e normal {}", "x".repeat(25));
        assert!(quality_score(safe) > quality_score(&unsafe_text));
    }
}
