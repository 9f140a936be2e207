//! Output-side orchestrator.
//!
//! Drives validate → style-enforce → finalize → log over one raw
//! candidate, with an explicit state machine for the tiered fallback
//! cascade. Failures that affect what the user sees are resolved here via
//! fallback levels; nothing from this stage is surfaced as an error.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Instant;
use tracing::{debug, error, instrument, warn};
use uuid::Uuid;

use crate::analysis::sentiment::SentimentClass;
use crate::clock::Clock;
use crate::error::PipelineError;
use crate::metrics::MetricsCollector;
use crate::models::{
    GeneratedCandidate, GenerationRequest, InteractionRecord, PostprocessResult, ResponseMetrics,
    ResponseStatus,
};
use crate::output::enforcer::{analyze_style, EnforceOptions, StyleEnforcer};
use crate::output::validator;
use crate::traits::FallbackWriter;

/// Register score below which the style enforcer runs at all.
const ENFORCE_THRESHOLD: f64 = 0.7;
/// Register score below which the enforcer may consult the external assist.
const ASSIST_OPT_IN_THRESHOLD: f64 = 0.5;
/// Slang intensity used for the enforcement pass.
const ENFORCE_SLANG_INTENSITY: f64 = 0.3;
/// Hard cap on the final response length, in characters.
const MAX_RESPONSE_CHARS: usize = 500;
/// A sentence boundary is preferred only beyond this share of the cap.
const BOUNDARY_SHARE: f64 = 0.7;
/// Emoji appended at most when fewer than this many are already present.
const MAX_EXISTING_EMOJI: usize = 2;

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex: whitespace run"));

const KNOWN_EMOJI: &[&str] = &[
    "😄", "🎉", "😊", "😂", "🤣", "😁", "🙂", "😅", "🥺", "😕", "😤", "😱", "👀", "❤️", "👍",
];

/// Lifecycle of one candidate through postprocessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseState {
    RawReceived,
    Validated,
    Styled,
    Finalized,
    Fallback(u8),
}

/// Validation outcomes that drive state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateEvent {
    MissingCandidate,
    ValidationFailed,
    ValidationPassed,
    StyleApplied,
    StyleSkipped,
    SafetyFailed,
    Accepted,
    PipelineErrored,
}

impl ResponseState {
    /// The transition table. Unknown pairs keep the current state, so the
    /// driver can apply events unconditionally.
    pub fn on(self, event: StateEvent) -> ResponseState {
        use ResponseState::*;
        use StateEvent::*;
        match (self, event) {
            (RawReceived, MissingCandidate) => Fallback(1),
            (RawReceived, ValidationFailed) => Fallback(1),
            (RawReceived, ValidationPassed) => Validated,
            (Validated, StyleApplied) => Styled,
            (Validated, StyleSkipped) => Styled,
            (Styled, SafetyFailed) => Fallback(2),
            (Styled, Accepted) => Finalized,
            (state, PipelineErrored) => match state {
                Fallback(level) => Fallback(level),
                _ => Fallback(2),
            },
            (state, _) => state,
        }
    }

    pub fn fallback_level(self) -> u8 {
        match self {
            ResponseState::Fallback(level) => level,
            _ => 0,
        }
    }
}

pub struct Postprocessor {
    enforcer: StyleEnforcer,
    fallback: Arc<dyn FallbackWriter>,
    metrics: Arc<MetricsCollector>,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
}

impl Postprocessor {
    pub fn new(
        enforcer: StyleEnforcer,
        fallback: Arc<dyn FallbackWriter>,
        metrics: Arc<MetricsCollector>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            enforcer,
            fallback,
            metrics,
            clock,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Fixes the RNG seed; used by tests to pin the emoji gates.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Validates and stylizes a raw candidate into the final deliverable.
    /// Never fails: every problem routes through the fallback cascade.
    #[instrument(skip(self, raw, request), fields(message_id = %request.metadata.message_id))]
    pub async fn process(
        &self,
        raw: Option<GeneratedCandidate>,
        request: &GenerationRequest,
    ) -> PostprocessResult {
        let started = Instant::now();

        match self.run(raw.as_ref(), request, started).await {
            Ok(result) => result,
            Err(e) => {
                error!("postprocessing failed ({e}), degrading to level-2 fallback");
                let state = ResponseState::Styled.on(StateEvent::PipelineErrored);
                self.handle_fallback(state.fallback_level(), raw.as_ref(), request, started)
                    .await
            }
        }
    }

    async fn run(
        &self,
        raw: Option<&GeneratedCandidate>,
        request: &GenerationRequest,
        started: Instant,
    ) -> Result<PostprocessResult, PipelineError> {
        let mut state = ResponseState::RawReceived;

        // 1-2. Presence and validity gates.
        let candidate = match raw {
            Some(c) if !c.content.trim().is_empty() => c,
            _ => {
                state = state.on(StateEvent::MissingCandidate);
                return Ok(self
                    .handle_fallback(state.fallback_level(), raw, request, started)
                    .await);
            }
        };
        if !validator::is_valid(&candidate.content) {
            state = state.on(StateEvent::ValidationFailed);
            return Ok(self
                .handle_fallback(state.fallback_level(), raw, request, started)
                .await);
        }
        state = state.on(StateEvent::ValidationPassed);

        // 3. Style enforcement when the register is off.
        let style_score = analyze_style(&candidate.content);
        let styled = if style_score < ENFORCE_THRESHOLD {
            let options = EnforceOptions {
                use_ai: style_score < ASSIST_OPT_IN_THRESHOLD,
                slang_intensity: ENFORCE_SLANG_INTENSITY,
            };
            let styled = self.enforcer.enforce(&candidate.content, &options).await;
            state = state.on(StateEvent::StyleApplied);
            styled
        } else {
            state = state.on(StateEvent::StyleSkipped);
            candidate.content.clone()
        };

        // 4. Final transformations.
        let finalized = self.finalize(&styled, request.metadata.sentiment.classification);

        // 5. Safety gate on the transformed text.
        if !validator::is_safe(&finalized) {
            warn!("finalized text failed the safety check");
            state = state.on(StateEvent::SafetyFailed);
            return Ok(self
                .handle_fallback(state.fallback_level(), raw, request, started)
                .await);
        }

        // 6. Success: score, log, deliver.
        state = state.on(StateEvent::Accepted);
        debug_assert_eq!(state, ResponseState::Finalized);

        let quality = validator::quality_score(&finalized);
        let final_style = analyze_style(&finalized);
        let metrics = ResponseMetrics {
            response_time_ms: candidate.metrics.response_time_ms,
            tokens_used: candidate.metrics.tokens_used,
            postprocessing_ms: started.elapsed().as_millis() as u64,
            style_score: final_style,
            quality_score: quality,
            fallback_used: false,
            fallback_source: None,
        };

        self.log_outcome(request, &finalized, Some(candidate), true, 0)
            .await;

        Ok(PostprocessResult {
            content: finalized,
            status: ResponseStatus::Validated,
            fallback_level: 0,
            metrics,
        })
    }

    /// Delegates text to the fallback collaborator and logs the failure.
    /// Always succeeds; there is nothing beneath this.
    pub async fn handle_fallback(
        &self,
        level: u8,
        raw: Option<&GeneratedCandidate>,
        request: &GenerationRequest,
        started: Instant,
    ) -> PostprocessResult {
        debug!(level, "generating fallback response");
        let text = self.fallback.generate(level, request).await;

        self.log_outcome(request, &text.content, raw, false, level)
            .await;

        let metrics = ResponseMetrics {
            response_time_ms: raw.map(|c| c.metrics.response_time_ms).unwrap_or(0),
            tokens_used: raw.map(|c| c.metrics.tokens_used).unwrap_or(0),
            postprocessing_ms: started.elapsed().as_millis() as u64,
            style_score: analyze_style(&text.content),
            quality_score: validator::quality_score(&text.content),
            fallback_used: true,
            fallback_source: Some(text.source),
        };

        PostprocessResult {
            content: text.content,
            status: ResponseStatus::Fallback,
            fallback_level: level,
            metrics,
        }
    }

    /// Final transformations: contextual emoji, length cap, whitespace.
    fn finalize(&self, text: &str, sentiment: SentimentClass) -> String {
        let mut out = text.to_string();

        if let Some(emoji) = self.pick_emoji(&out, sentiment) {
            out.push(' ');
            out.push_str(emoji);
        }

        out = truncate_preferring_sentence(&out, MAX_RESPONSE_CHARS);
        WHITESPACE_RE.replace_all(&out, " ").trim().to_string()
    }

    /// One contextual emoji, only for upbeat or surprised answers, only
    /// when the text is not already emoji-heavy, behind two independent
    /// random gates (30% and 50%).
    fn pick_emoji(&self, text: &str, sentiment: SentimentClass) -> Option<&'static str> {
        let pool: &[&str] = match sentiment {
            SentimentClass::VeryPositive | SentimentClass::Positive | SentimentClass::Happy => {
                &["😄", "🎉", "😊"]
            }
            SentimentClass::Surprised => &["😱", "👀"],
            _ => return None,
        };

        let existing: usize = KNOWN_EMOJI.iter().map(|e| text.matches(e).count()).sum();
        if existing >= MAX_EXISTING_EMOJI {
            return None;
        }

        let mut rng = self.rng.lock().expect("rng mutex poisoned");
        if rng.gen_bool(0.3) && rng.gen_bool(0.5) {
            Some(pool[rng.gen_range(0..pool.len())])
        } else {
            None
        }
    }

    async fn log_outcome(
        &self,
        request: &GenerationRequest,
        output: &str,
        raw: Option<&GeneratedCandidate>,
        success: bool,
        fallback_level: u8,
    ) {
        let record = InteractionRecord {
            id: Uuid::new_v4().to_string(),
            timestamp: self.clock.now(),
            user_id: request.metadata.user_id.clone(),
            guild_id: request.metadata.guild_id.clone(),
            input: request.prompt.user.clone(),
            output: output.to_string(),
            model: raw
                .map(|c| c.model.clone())
                .unwrap_or_else(|| "fallback".to_string()),
            response_time_ms: raw.map(|c| c.metrics.response_time_ms).unwrap_or(0),
            tokens_used: raw.map(|c| c.metrics.tokens_used).unwrap_or(0),
            success,
            fallback_level,
            metadata: serde_json::json!({
                "intent": request.metadata.intent.intent.label(),
                "sentiment": request.metadata.sentiment.classification.label(),
                "temperature": request.parameters.temperature,
            }),
        };
        self.metrics.log_interaction(record).await;
    }
}

/// Truncates to `max` characters, preferring the last sentence boundary
/// past 70% of the cap; otherwise hard-truncates with an ellipsis. Text at
/// or under the cap is returned untouched.
fn truncate_preferring_sentence(text: &str, max: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max {
        return text.to_string();
    }

    let min_boundary = (max as f64 * BOUNDARY_SHARE) as usize;
    let mut boundary = None;
    for i in (min_boundary..max).rev() {
        if matches!(chars[i], '.' | '!' | '?') {
            boundary = Some(i);
            break;
        }
    }

    match boundary {
        Some(i) => chars[..=i].iter().collect(),
        None => {
            let mut out: String = chars[..max - 3].iter().collect();
            out.push_str("...");
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table_covers_the_cascade() {
        use ResponseState::*;
        use StateEvent::*;

        assert_eq!(RawReceived.on(MissingCandidate), Fallback(1));
        assert_eq!(RawReceived.on(ValidationFailed), Fallback(1));
        assert_eq!(RawReceived.on(ValidationPassed), Validated);
        assert_eq!(Validated.on(StyleApplied), Styled);
        assert_eq!(Validated.on(StyleSkipped), Styled);
        assert_eq!(Styled.on(SafetyFailed), Fallback(2));
        assert_eq!(Styled.on(Accepted), Finalized);
        assert_eq!(Validated.on(PipelineErrored), Fallback(2));
        assert_eq!(Fallback(1).on(PipelineErrored), Fallback(1));
        // Nonsense pairs keep their state.
        assert_eq!(Finalized.on(ValidationPassed), Finalized);
    }

    #[test]
    fn fallback_level_reads_zero_outside_fallback() {
        assert_eq!(ResponseState::Finalized.fallback_level(), 0);
        assert_eq!(ResponseState::Fallback(2).fallback_level(), 2);
    }

    #[test]
    fn truncation_leaves_text_at_the_cap_untouched() {
        let exactly: String = "a".repeat(500);
        assert_eq!(truncate_preferring_sentence(&exactly, 500), exactly);
    }

    #[test]
    fn one_char_over_triggers_truncation() {
        let over: String = "a".repeat(501);
        let out = truncate_preferring_sentence(&over, 500);
        assert_eq!(out.chars().count(), 500);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn truncation_prefers_a_late_sentence_boundary() {
        // A period at char 400 (80% of the cap) should win.
        let mut text = "b".repeat(400);
        text.push('.');
        text.push_str(&"c".repeat(200));

        let out = truncate_preferring_sentence(&text, 500);
        assert_eq!(out.chars().count(), 401);
        assert!(out.ends_with('.'));
    }

    #[test]
    fn early_boundary_is_ignored() {
        // A period at char 100 is before the 70% mark; hard truncation wins.
        let mut text = "b".repeat(100);
        text.push('.');
        text.push_str(&"c".repeat(500));

        let out = truncate_preferring_sentence(&text, 500);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), 500);
    }
}
