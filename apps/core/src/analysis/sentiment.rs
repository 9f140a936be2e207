//! Sentiment scoring using a base lexicon plus local pattern adjustments.
//!
//! Tuned for the persona's locale: the lexicon and the emotion patterns are
//! bilingual (PT first, EN second), and laughter tokens ("kkkk", "rsrs")
//! carry weight. Never fails: empty or unusable input yields the neutral
//! default with zero confidence.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

/// Base word lexicon with integer valence weights.
const LEXICON: &[(&str, i32)] = &[
    // Portuguese, positive
    ("amor", 3),
    ("amo", 3),
    ("adoro", 3),
    ("adorei", 3),
    ("ótimo", 4),
    ("otimo", 4),
    ("excelente", 4),
    ("incrível", 4),
    ("incrivel", 4),
    ("maravilhoso", 4),
    ("perfeito", 4),
    ("bom", 2),
    ("boa", 2),
    ("legal", 2),
    ("massa", 3),
    ("top", 3),
    ("feliz", 3),
    ("alegre", 3),
    ("animado", 3),
    ("animada", 3),
    ("gostei", 3),
    ("curti", 3),
    ("lindo", 3),
    ("linda", 3),
    ("demais", 2),
    ("obrigado", 2),
    ("obrigada", 2),
    ("valeu", 2),
    ("divertido", 2),
    // Portuguese, negative
    ("ódio", -3),
    ("odio", -3),
    ("odeio", -3),
    ("horrível", -4),
    ("horrivel", -4),
    ("péssimo", -4),
    ("pessimo", -4),
    ("terrível", -3),
    ("terrivel", -3),
    ("ruim", -2),
    ("chato", -2),
    ("chata", -2),
    ("triste", -2),
    ("raiva", -3),
    ("bravo", -2),
    ("brava", -2),
    ("puto", -3),
    ("puta", -3),
    ("droga", -2),
    ("merda", -3),
    ("saco", -2),
    ("cansado", -1),
    ("cansada", -1),
    ("estressado", -2),
    ("estressada", -2),
    ("medo", -2),
    ("preocupado", -2),
    ("preocupada", -2),
    ("decepcionado", -3),
    ("decepcionada", -3),
    // English, positive
    ("love", 3),
    ("great", 3),
    ("awesome", 4),
    ("amazing", 4),
    ("good", 2),
    ("nice", 2),
    ("happy", 3),
    ("cool", 2),
    ("fun", 2),
    ("thanks", 2),
    // English, negative
    ("hate", -3),
    ("awful", -4),
    ("terrible", -3),
    ("bad", -2),
    ("sad", -2),
    ("angry", -3),
    ("annoying", -2),
    ("tired", -1),
    ("worried", -2),
    ("scared", -2),
];

const POSITIVE_EMOJI: &[&str] = &["😂", "❤️", "😍", "🥰", "😊", "😄", "🎉", "👍", "😁", "🤣"];
const NEGATIVE_EMOJI: &[&str] = &["😢", "😭", "😡", "💔", "👎", "😞", "😔", "😠"];

/// Bonus applied once when repeated-laughter tokens are present.
const LAUGHTER_BONUS: i32 = 2;
/// Bonus applied once for three or more exclamation marks.
const EXCLAMATION_BONUS: i32 = 2;

static LAUGHTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:k{3,}|(?:rs){2,}|ha(?:ha)+|he(?:he)+|lol|lmao)\b")
        .expect("Invalid regex: laughter pattern")
});

// Emotion-term patterns, checked in precedence order before score thresholds.
static ANGER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(raiva|ódio|odio|odeio|put[oa]|irritad[oa]|furios[oa]|angry|furious|pissed)\b")
        .expect("Invalid regex: anger terms")
});
static SADNESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(triste|chorando|deprimid[oa]|saudade|magoad[oa]|sad|crying|depressed)\b")
        .expect("Invalid regex: sadness terms")
});
static JOY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(feliz|alegre|animad[oa]|empolgad[oa]|happy|excited|thrilled)\b")
        .expect("Invalid regex: joy terms")
});
static FEAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(medo|assustad[oa]|nervos[oa]|preocupad[oa]|afraid|scared|anxious)\b")
        .expect("Invalid regex: fear terms")
});
static SURPRISE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(surpres[oa]|chocad[oa]|uau|nossa|caramba|caraca|wow|whoa)\b")
        .expect("Invalid regex: surprise terms")
});

/// Final sentiment classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentClass {
    VeryPositive,
    Positive,
    Neutral,
    Negative,
    VeryNegative,
    Angry,
    Sad,
    Happy,
    Fearful,
    Surprised,
}

impl SentimentClass {
    pub fn label(&self) -> &'static str {
        match self {
            SentimentClass::VeryPositive => "very_positive",
            SentimentClass::Positive => "positive",
            SentimentClass::Neutral => "neutral",
            SentimentClass::Negative => "negative",
            SentimentClass::VeryNegative => "very_negative",
            SentimentClass::Angry => "angry",
            SentimentClass::Sad => "sad",
            SentimentClass::Happy => "happy",
            SentimentClass::Fearful => "fearful",
            SentimentClass::Surprised => "surprised",
        }
    }
}

impl fmt::Display for SentimentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A lexicon token that contributed to the score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentKeyword {
    pub word: String,
    pub sentiment: String,
}

/// Result of sentiment analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentResult {
    /// Summed lexicon + pattern score.
    pub score: i32,
    /// Score normalized by token count.
    pub comparative: f64,
    pub classification: SentimentClass,
    /// Emotional intensity in `[0, 1]`.
    pub intensity: f64,
    /// Emotion labels; never empty (defaults to `{neutral}`).
    pub emotions: BTreeSet<String>,
    /// Up to 10 contributing lexicon tokens.
    pub keywords: Vec<SentimentKeyword>,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
}

impl SentimentResult {
    /// The zero-signal default returned for empty input.
    pub fn neutral() -> Self {
        let mut emotions = BTreeSet::new();
        emotions.insert("neutral".to_string());
        Self {
            score: 0,
            comparative: 0.0,
            classification: SentimentClass::Neutral,
            intensity: 0.0,
            emotions,
            keywords: vec![],
            confidence: 0.0,
        }
    }

    /// Whether the classification reads as positive.
    pub fn is_positive(&self) -> bool {
        matches!(
            self.classification,
            SentimentClass::VeryPositive | SentimentClass::Positive | SentimentClass::Happy
        )
    }
}

/// Sentiment analyzer. Stateless; cheap to construct.
#[derive(Default)]
pub struct SentimentAnalyzer;

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Scores a text. Never panics; empty input returns the neutral default.
    pub fn analyze(&self, text: &str) -> SentimentResult {
        if text.trim().is_empty() {
            return SentimentResult::neutral();
        }

        let tokens = tokenize(text);
        let mut score = 0i32;
        let mut keywords = Vec::new();

        for token in &tokens {
            if let Some(weight) = lexicon_weight(token) {
                score += weight;
                if keywords.len() < 10 {
                    keywords.push(SentimentKeyword {
                        word: token.clone(),
                        sentiment: if weight > 0 { "positive" } else { "negative" }.to_string(),
                    });
                }
            }
        }

        let matched = keywords.len();

        // Local pattern adjustments on top of the lexicon.
        if LAUGHTER_RE.is_match(text) {
            score += LAUGHTER_BONUS;
        }
        for emoji in POSITIVE_EMOJI {
            score += text.matches(emoji).count() as i32;
        }
        for emoji in NEGATIVE_EMOJI {
            score -= text.matches(emoji).count() as i32;
        }
        let exclamations = text.matches('!').count();
        if exclamations >= 3 {
            score += EXCLAMATION_BONUS;
        }

        let comparative = if tokens.is_empty() {
            0.0
        } else {
            f64::from(score) / tokens.len() as f64
        };

        let classification = classify(text, score);
        let intensity = intensity(text, score, exclamations);
        let emotions = emotions(text, score);

        // More matched tokens and longer messages mean more signal.
        let confidence = (0.2 + matched as f64 * 0.1 + (tokens.len() as f64 * 0.01).min(0.2))
            .clamp(0.0, 1.0);

        SentimentResult {
            score,
            comparative,
            classification,
            intensity,
            emotions,
            keywords,
            confidence,
        }
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

fn lexicon_weight(token: &str) -> Option<i32> {
    LEXICON
        .iter()
        .find(|(word, _)| *word == token)
        .map(|(_, weight)| *weight)
}

/// Explicit emotion terms win over score thresholds.
fn classify(text: &str, score: i32) -> SentimentClass {
    if ANGER_RE.is_match(text) {
        return SentimentClass::Angry;
    }
    if SADNESS_RE.is_match(text) {
        return SentimentClass::Sad;
    }
    if JOY_RE.is_match(text) {
        return SentimentClass::Happy;
    }
    if FEAR_RE.is_match(text) {
        return SentimentClass::Fearful;
    }
    if SURPRISE_RE.is_match(text) {
        return SentimentClass::Surprised;
    }

    match score {
        s if s > 3 => SentimentClass::VeryPositive,
        s if s > 1 => SentimentClass::Positive,
        s if s < -3 => SentimentClass::VeryNegative,
        s if s < -1 => SentimentClass::Negative,
        _ => SentimentClass::Neutral,
    }
}

fn intensity(text: &str, score: i32, exclamations: usize) -> f64 {
    let magnitude = (f64::from(score.abs()) / 10.0).min(1.0);

    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    let upper_ratio = if letters.is_empty() {
        0.0
    } else {
        letters.iter().filter(|c| c.is_uppercase()).count() as f64 / letters.len() as f64
    };

    let exclamation_part = (exclamations as f64 * 0.1).min(0.3);
    let repetition_part = if has_char_run(text, 3) { 0.2 } else { 0.0 };

    (magnitude * 0.5 + upper_ratio * 0.2 + exclamation_part + repetition_part).clamp(0.0, 1.0)
}

fn emotions(text: &str, score: i32) -> BTreeSet<String> {
    let mut labels = BTreeSet::new();
    if ANGER_RE.is_match(text) {
        labels.insert("anger".to_string());
    }
    if SADNESS_RE.is_match(text) {
        labels.insert("sadness".to_string());
    }
    if JOY_RE.is_match(text) {
        labels.insert("joy".to_string());
    }
    if FEAR_RE.is_match(text) {
        labels.insert("fear".to_string());
    }
    if SURPRISE_RE.is_match(text) {
        labels.insert("surprise".to_string());
    }
    if labels.is_empty() {
        if score > 1 {
            labels.insert("positive".to_string());
        } else if score < -1 {
            labels.insert("negative".to_string());
        } else {
            labels.insert("neutral".to_string());
        }
    }
    labels
}

/// True when any single character repeats `run` or more times in a row.
/// The regex crate has no backreferences, so this is a manual scan.
pub(crate) fn has_char_run(text: &str, run: usize) -> bool {
    let mut count = 0;
    let mut last: Option<char> = None;
    for c in text.chars() {
        if Some(c) == last {
            count += 1;
            if count >= run {
                return true;
            }
        } else {
            last = Some(c);
            count = 1;
        }
    }
    run <= 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_neutral_with_zero_confidence() {
        let analyzer = SentimentAnalyzer::new();
        for input in ["", "   ", "\n\t"] {
            let result = analyzer.analyze(input);
            assert_eq!(result.classification, SentimentClass::Neutral);
            assert_eq!(result.confidence, 0.0);
            assert!(result.emotions.contains("neutral"));
        }
    }

    #[test]
    fn bounds_hold_for_arbitrary_input() {
        let analyzer = SentimentAnalyzer::new();
        let inputs = [
            "oi",
            "AMO DEMAIS ISSO!!!",
            "que dia horrível, tô com muita raiva",
            "kkkkkkkk muito bom",
            "1234 !!!! ????",
            "😂😂😂",
            "a",
        ];
        for input in inputs {
            let result = analyzer.analyze(input);
            assert!((0.0..=1.0).contains(&result.intensity), "{input}");
            assert!((0.0..=1.0).contains(&result.confidence), "{input}");
            assert!(!result.emotions.is_empty(), "{input}");
            assert!(result.keywords.len() <= 10, "{input}");
        }
    }

    #[test]
    fn laughter_pushes_positive() {
        let analyzer = SentimentAnalyzer::new();
        let result = analyzer.analyze("kkkkkk essa foi boa");
        assert!(result.score > 0);
    }

    #[test]
    fn anger_terms_beat_score_thresholds() {
        let analyzer = SentimentAnalyzer::new();
        // "amo" alone would score positive, but the anger term wins.
        let result = analyzer.analyze("amo você mas tô com muita raiva agora");
        assert_eq!(result.classification, SentimentClass::Angry);
        assert!(result.emotions.contains("anger"));
    }

    #[test]
    fn strong_positive_classifies_very_positive() {
        let analyzer = SentimentAnalyzer::new();
        let result = analyzer.analyze("perfeito, excelente trabalho");
        assert_eq!(result.classification, SentimentClass::VeryPositive);
    }

    #[test]
    fn negative_emoji_subtract() {
        let analyzer = SentimentAnalyzer::new();
        let with = analyzer.analyze("hoje foi um dia 😭😭");
        let without = analyzer.analyze("hoje foi um dia");
        assert!(with.score < without.score);
    }

    #[test]
    fn uppercase_raises_intensity() {
        let analyzer = SentimentAnalyzer::new();
        let shouted = analyzer.analyze("EU ODEIO ISSO");
        let calm = analyzer.analyze("eu odeio isso");
        assert!(shouted.intensity > calm.intensity);
    }

    #[test]
    fn char_run_detection() {
        assert!(has_char_run("heeey", 3));
        assert!(!has_char_run("heey", 3));
        assert!(!has_char_run("abcabc", 2));
    }
}
