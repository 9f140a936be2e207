//! Style enforcement toward the persona's informal register.
//!
//! A deterministic lexical pass (substitution table + punctuation
//! softening) runs first; when it under-performs and the caller allows it,
//! an external assist gets one time-bounded shot at a rewrite, accepted
//! only if it scores strictly better. Casual particles are sprinkled last,
//! governed by `slang_intensity`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use crate::traits::StyleAssist;

/// Below this register score the deterministic result is offered to the
/// external assist.
const ASSIST_THRESHOLD: f64 = 0.6;
/// Probability that a sentence boundary is softened into a comma.
const SOFTEN_PROBABILITY: f64 = 0.7;
/// Default bound on the external assist call.
const DEFAULT_ASSIST_TIMEOUT: Duration = Duration::from_secs(5);

/// Formal → informal substitutions, applied in order with word-boundary
/// matching. Later entries may act on earlier replacements, so every entry
/// must be substitution-safe (no target is another entry's source).
static SUBSTITUTIONS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        ("entretanto", "mas"),
        ("todavia", "mas"),
        ("contudo", "mas"),
        ("portanto", "então"),
        ("certamente", "com certeza"),
        ("realmente", "de verdade"),
        ("compreendo", "entendi"),
        ("compreender", "entender"),
        ("desculpe-me", "foi mal"),
        ("desculpe", "foi mal"),
        ("agradeço", "valeu"),
        ("obrigado", "valeu"),
        ("obrigada", "valeu"),
        ("olá", "oi"),
        ("adeus", "tchau"),
        ("você", "vc"),
        ("vocês", "vcs"),
        ("está", "tá"),
        ("estou", "tô"),
        ("estava", "tava"),
        ("estamos", "tamo"),
        ("para", "pra"),
        ("também", "tbm"),
    ]
    .iter()
    .map(|(from, to)| {
        let pattern = format!(r"(?i)\b{}\b", from);
        (
            Regex::new(&pattern).expect("Invalid regex: substitution entry"),
            *to,
        )
    })
    .collect()
});

static MULTI_EXCLAMATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!{2,}").expect("Invalid regex: exclamation run"));
static MULTI_QUESTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\?{2,}").expect("Invalid regex: question run"));

// Register-classifier marker tables.
const CASUAL_MARKERS: &[&str] = &[
    "kkk", "rsrs", "haha", "mano", "cara", "tipo", "né", "pô", "opa", "massa", "top", "demais",
    "beleza", "valeu",
];
const CONTRACTIONS: &[&str] = &[
    "tá", "tô", "pra", "vc", "vcs", "pq", "tbm", "tava", "tamo", "mt", "blz",
];
const FORMAL_PATTERNS: &[&str] = &[
    "prezado",
    "prezada",
    "cordialmente",
    "atenciosamente",
    "outrossim",
    "todavia",
    "entretanto",
    "contudo",
    "venho por meio desta",
];
const CORPORATE_PHRASES: &[&str] = &[
    "não hesite em",
    "estou à disposição",
    "estamos à disposição",
    "agradecemos o contato",
    "conforme solicitado",
    "segue em anexo",
];

const OPENERS: &[&str] = &["pô", "ah", "então", "olha"];
const CLOSERS: &[&str] = &["né", "haha", "kkk", "sabe"];

/// Scores how well a text matches the target informal register, in
/// `[0, 1]`. The thresholds built on top of this score are contractual.
pub fn analyze_style(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let mut score: f64 = 0.5;

    let casual_hits: usize = CASUAL_MARKERS.iter().map(|m| lower.matches(m).count()).sum();
    score += (casual_hits as f64 * 0.1).min(0.3);

    let contraction_hits: usize = CONTRACTIONS
        .iter()
        .map(|c| count_word(&lower, c))
        .sum();
    score += (contraction_hits as f64 * 0.1).min(0.2);

    for pattern in FORMAL_PATTERNS {
        if lower.contains(pattern) {
            score -= 0.3;
        }
    }
    for phrase in CORPORATE_PHRASES {
        if lower.contains(phrase) {
            score -= 0.2;
        }
    }

    if count_word(&lower, "você") > 2 {
        score -= 0.15;
    }

    if lower.contains("...") {
        score += 0.05;
    }
    if text.matches('!').count() == 1 {
        score += 0.05;
    }

    score.clamp(0.0, 1.0)
}

fn count_word(haystack: &str, word: &str) -> usize {
    haystack
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| *t == word)
        .count()
}

/// Options for one enforcement pass.
#[derive(Debug, Clone)]
pub struct EnforceOptions {
    /// Whether the external assist may be consulted.
    pub use_ai: bool,
    /// Probability weight for the casual-particle pass.
    pub slang_intensity: f64,
}

pub struct StyleEnforcer {
    assist: Option<Arc<dyn StyleAssist>>,
    assist_timeout: Duration,
    rng: Mutex<StdRng>,
}

impl StyleEnforcer {
    pub fn new(assist: Option<Arc<dyn StyleAssist>>) -> Self {
        Self {
            assist,
            assist_timeout: DEFAULT_ASSIST_TIMEOUT,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Fixes the RNG seed; used by tests to pin the probabilistic passes.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn with_assist_timeout(mut self, timeout: Duration) -> Self {
        self.assist_timeout = timeout;
        self
    }

    /// Rewrites a text toward the informal register. Assist failures and
    /// timeouts degrade silently to the deterministic result.
    pub async fn enforce(&self, text: &str, options: &EnforceOptions) -> String {
        let mut styled = apply_substitutions(text);
        styled = collapse_punctuation(&styled);
        styled = self.soften_sentence_breaks(&styled);

        let deterministic_score = analyze_style(&styled);
        if deterministic_score < ASSIST_THRESHOLD && options.use_ai {
            if let Some(assist) = &self.assist {
                match timeout(self.assist_timeout, assist.rewrite(&styled)).await {
                    Ok(Ok(candidate)) => {
                        if analyze_style(&candidate) > deterministic_score {
                            styled = candidate;
                        } else {
                            debug!("style assist output discarded (no improvement)");
                        }
                    }
                    Ok(Err(e)) => debug!("style assist failed: {e}"),
                    Err(_) => debug!("style assist timed out"),
                }
            }
        }

        self.sprinkle_particles(styled, options.slang_intensity)
    }

    /// Converts "…. Capital" boundaries into ", lowercase" continuations
    /// with probability [`SOFTEN_PROBABILITY`] per boundary.
    fn soften_sentence_breaks(&self, text: &str) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut rng = self.rng.lock().expect("rng mutex poisoned");
        let mut out = String::with_capacity(text.len());

        let mut i = 0;
        while i < chars.len() {
            let boundary = chars[i] == '.'
                && i + 2 < chars.len()
                && chars[i + 1] == ' '
                && chars[i + 2].is_uppercase();
            if boundary && rng.gen_bool(SOFTEN_PROBABILITY) {
                out.push(',');
                out.push(' ');
                for lc in chars[i + 2].to_lowercase() {
                    out.push(lc);
                }
                i += 3;
            } else {
                out.push(chars[i]);
                i += 1;
            }
        }
        out
    }

    /// Prepends/appends at most one casual particle each, skipping when an
    /// equivalent particle is already there.
    fn sprinkle_particles(&self, text: String, intensity: f64) -> String {
        let intensity = intensity.clamp(0.0, 1.0);
        if intensity == 0.0 || text.is_empty() {
            return text;
        }

        let mut rng = self.rng.lock().expect("rng mutex poisoned");
        let mut out = text;

        let lower = out.to_lowercase();
        let already_opened = OPENERS
            .iter()
            .any(|o| lower.starts_with(&format!("{o} ")) || lower.starts_with(&format!("{o},")));
        if !already_opened && rng.gen_bool(intensity) {
            let opener = OPENERS[rng.gen_range(0..OPENERS.len())];
            out = format!("{opener}, {out}");
        }

        let lower = out.to_lowercase();
        let trimmed = lower.trim_end_matches(['.', '!', '?', ' ']);
        let already_closed = CLOSERS.iter().any(|c| trimmed.ends_with(c));
        if !already_closed && rng.gen_bool(intensity) {
            let closer = CLOSERS[rng.gen_range(0..CLOSERS.len())];
            out = format!("{out} {closer}");
        }

        out
    }
}

fn apply_substitutions(text: &str) -> String {
    let mut out = text.to_string();
    for (pattern, replacement) in SUBSTITUTIONS.iter() {
        out = pattern.replace_all(&out, *replacement).into_owned();
    }
    out
}

fn collapse_punctuation(text: &str) -> String {
    let out = MULTI_EXCLAMATION_RE.replace_all(text, "!");
    MULTI_QUESTION_RE.replace_all(&out, "?").into_owned()
}
