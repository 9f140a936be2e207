//! Communicative-intent classification using regex patterns and history.
//!
//! Seven sub-detectors run independently on every message; the one with the
//! highest confidence wins, ties broken by evaluation order (command >
//! farewell > greeting > question > topic_change > continuation >
//! statement). The statement fallback always answers with confidence 0.5,
//! so exactly one intent wins per message.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use crate::models::HistoryEntry;

/// Detected intent type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Command,
    Farewell,
    Greeting,
    Question,
    TopicChange,
    Continuation,
    Statement,
}

impl Intent {
    pub fn label(&self) -> &'static str {
        match self {
            Intent::Command => "command",
            Intent::Farewell => "farewell",
            Intent::Greeting => "greeting",
            Intent::Question => "question",
            Intent::TopicChange => "topic_change",
            Intent::Continuation => "continuation",
            Intent::Statement => "statement",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Result of intent classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: Intent,
    /// Confidence score (0.0 - 1.0).
    pub confidence: f64,
    /// Intent-specific details (command name, explicit marker, ...).
    pub metadata: serde_json::Value,
}

impl IntentResult {
    fn new(intent: Intent, confidence: f64) -> Self {
        Self {
            intent,
            confidence,
            metadata: serde_json::Value::Null,
        }
    }

    fn with_metadata(intent: Intent, confidence: f64, metadata: serde_json::Value) -> Self {
        Self {
            intent,
            confidence,
            metadata,
        }
    }
}

static COMMAND_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[!/](\w+)").expect("Invalid regex: command sigil"));

static FAREWELL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(tchau|falou|flw|fui|adeus|até mais|até logo|té mais|bye|goodbye|see ya|good night)\b")
        .expect("Invalid regex: farewell terms")
});

static GREETING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(oi+|olá|ola|eai|e aí|e ai|eae|opa|salve|fala|bom dia|boa tarde|boa noite|hey|hi|hello|yo)\b")
        .expect("Invalid regex: greeting terms")
});

static INTERROGATIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(o que|que|qual|quais|quando|onde|quem|como|por que|porque|será|sera|cadê|cade|what|why|how|when|where|who|which)\b")
        .expect("Invalid regex: interrogative lead words")
});

static TOPIC_CHANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(mudando de assunto|outra coisa|deixa isso|falando em|aliás|alias|by the way|btw|anyway|speaking of)\b")
        .expect("Invalid regex: topic change markers")
});

static CONTINUATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(além disso|alem disso|e também|e tambem|continuando|como eu disse|como eu falei|voltando|sobre isso|also|as i said|back to)\b")
        .expect("Invalid regex: continuation markers")
});

/// Minimal everyday-topic vocabulary for the overlap heuristics. Small on
/// purpose; thresholds downstream assume exactly this granularity.
const TOPIC_KEYWORDS: &[&str] = &[
    "jogo", "filme", "música", "trabalho", "escola", "comida", "festa", "viagem", "game", "movie",
    "music", "work", "school", "food", "party", "trip",
];

/// Topics from the fixed vocabulary present in a text.
pub(crate) fn known_topics(text: &str) -> BTreeSet<&'static str> {
    let lower = text.to_lowercase();
    let tokens: BTreeSet<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    TOPIC_KEYWORDS
        .iter()
        .filter(|topic| tokens.contains(**topic))
        .copied()
        .collect()
}

/// How many trailing history entries the overlap heuristics look at.
const OVERLAP_WINDOW: usize = 3;

/// Intent detector. Stateless; patterns are compiled once.
#[derive(Default)]
pub struct IntentDetector;

impl IntentDetector {
    pub fn new() -> Self {
        Self
    }

    /// Classifies a message given recent history. Always returns exactly
    /// one result: the maximum-confidence sub-detector, earlier detectors
    /// winning ties.
    pub fn detect(&self, message: &str, history: &[HistoryEntry]) -> IntentResult {
        let text = message.trim();

        let candidates = [
            self.detect_command(text),
            self.detect_farewell(text, history),
            self.detect_greeting(text),
            self.detect_question(text),
            self.detect_topic_change(text, history),
            self.detect_continuation(text, history),
            IntentResult::new(Intent::Statement, 0.5),
        ];

        let mut best = candidates[0].clone();
        for candidate in &candidates[1..] {
            if candidate.confidence > best.confidence {
                best = candidate.clone();
            }
        }
        best
    }

    fn detect_command(&self, text: &str) -> IntentResult {
        match COMMAND_RE.captures(text) {
            Some(caps) => {
                let name = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                IntentResult::with_metadata(Intent::Command, 1.0, json!({ "command": name }))
            }
            None => IntentResult::new(Intent::Command, 0.0),
        }
    }

    fn detect_farewell(&self, text: &str, history: &[HistoryEntry]) -> IntentResult {
        if !FAREWELL_RE.is_match(text) {
            return IntentResult::new(Intent::Farewell, 0.0);
        }
        let short = word_count(text) <= 3;
        // A short goodbye at the end of a real conversation is near-certain.
        let confidence = if history.len() > 3 && short { 0.95 } else { 0.8 };
        IntentResult::with_metadata(Intent::Farewell, confidence, json!({ "short": short }))
    }

    fn detect_greeting(&self, text: &str) -> IntentResult {
        if !GREETING_RE.is_match(text) {
            return IntentResult::new(Intent::Greeting, 0.0);
        }
        let confidence = if word_count(text) <= 3 { 0.95 } else { 0.7 };
        IntentResult::new(Intent::Greeting, confidence)
    }

    fn detect_question(&self, text: &str) -> IntentResult {
        if text.ends_with('?') {
            return IntentResult::with_metadata(
                Intent::Question,
                0.95,
                json!({ "explicit": true }),
            );
        }
        if let Some(caps) = INTERROGATIVE_RE.captures(text) {
            let lead = caps.get(1).map(|m| m.as_str().to_lowercase());
            return IntentResult::with_metadata(
                Intent::Question,
                0.85,
                json!({ "explicit": false, "lead": lead }),
            );
        }
        IntentResult::new(Intent::Question, 0.0)
    }

    fn detect_topic_change(&self, text: &str, history: &[HistoryEntry]) -> IntentResult {
        if TOPIC_CHANGE_RE.is_match(text) {
            return IntentResult::with_metadata(
                Intent::TopicChange,
                0.9,
                json!({ "explicit": true }),
            );
        }
        match topic_overlap(text, history) {
            Some(overlap) if overlap.is_empty() => IntentResult::with_metadata(
                Intent::TopicChange,
                0.6,
                json!({ "explicit": false }),
            ),
            _ => IntentResult::new(Intent::TopicChange, 0.0),
        }
    }

    fn detect_continuation(&self, text: &str, history: &[HistoryEntry]) -> IntentResult {
        if CONTINUATION_RE.is_match(text) {
            return IntentResult::with_metadata(
                Intent::Continuation,
                0.85,
                json!({ "explicit": true }),
            );
        }
        match topic_overlap(text, history) {
            Some(overlap) if !overlap.is_empty() => IntentResult::with_metadata(
                Intent::Continuation,
                0.65,
                json!({ "explicit": false, "shared": overlap }),
            ),
            _ => IntentResult::new(Intent::Continuation, 0.0),
        }
    }
}

/// Shared topics between the message and the last few history entries.
/// `None` when either side has no recognized topics (no signal).
fn topic_overlap(text: &str, history: &[HistoryEntry]) -> Option<Vec<&'static str>> {
    let message_topics = known_topics(text);
    if message_topics.is_empty() {
        return None;
    }

    let mut history_topics = BTreeSet::new();
    for entry in history.iter().rev().take(OVERLAP_WINDOW) {
        history_topics.extend(known_topics(&entry.content));
    }
    if history_topics.is_empty() {
        return None;
    }

    Some(
        message_topics
            .intersection(&history_topics)
            .copied()
            .collect(),
    )
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// True only for a confident farewell or a confident topic change — the two
/// signals that the running conversation context should be dropped.
pub fn should_clear_context(result: &IntentResult) -> bool {
    match result.intent {
        Intent::Farewell => result.confidence > 0.8,
        Intent::TopicChange => result.confidence > 0.85,
        _ => false,
    }
}
