//! Input-side orchestrator.
//!
//! Coordinates context building and the analyzers, merges the two history
//! sources into one hybrid timeline, caches user profiles, derives model
//! parameters and assembles the generation request package. Unlike the
//! context builder, this stage does not swallow errors: an incomplete
//! request cannot be safely used, so failures are logged and re-thrown.

use chrono::Duration as ChronoDuration;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};
use tracing::{debug, error, instrument, warn};

use crate::analysis::entities::EntityRecognizer;
use crate::analysis::intent::{Intent, IntentDetector, IntentResult};
use crate::analysis::pronouns::PronounResolver;
use crate::analysis::sentiment::{SentimentAnalyzer, SentimentResult};
use crate::cache::TtlCache;
use crate::clock::Clock;
use crate::context::builder::ContextBuilder;
use crate::context::snapshot::{ChannelInfo, Mood, TemporalContext};
use crate::error::PipelineError;
use crate::models::{
    ActiveMemory, GenerationRequest, GuildDescriptor, HistoryEntry, InboundMessage,
    ModelParameters, RequestMetadata, TurnSource, UserProfile,
};
use crate::traits::{ProfileStore, PromptContext, PromptRenderer, Reasoner, ReasonerContext};

/// Sampling floor when the temperature is reduced by context signals.
const TEMPERATURE_FLOOR: f64 = 0.6;
/// Token budgets for long-form vs short replies.
const MAX_TOKENS_EXPANDED: u32 = 350;
const MAX_TOKENS_DEFAULT: u32 = 256;
/// Channel turns kept immediately before the memory thread in the hybrid
/// timeline.
const HYBRID_CHANNEL_TURNS: usize = 3;
/// Profile cache sizing.
const PROFILE_CACHE_CAPACITY: usize = 256;
const PROFILE_TTL_MINUTES: i64 = 10;

static MENTION_MARKUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<@[!&]?\d+>|<#\d+>").expect("Invalid regex: mention markup")
});

/// Per-request inputs that the platform connector supplies alongside the
/// message itself.
pub struct ProcessOptions {
    pub channel: ChannelInfo,
    pub guild: Option<GuildDescriptor>,
    pub active_memory: ActiveMemory,
    /// Memory-thread turns, already tagged with [`TurnSource::Memory`].
    pub memory_turns: Vec<HistoryEntry>,
    pub history_limit: usize,
}

pub struct Preprocessor {
    profiles: Arc<dyn ProfileStore>,
    reasoner: Arc<dyn Reasoner>,
    renderer: Arc<dyn PromptRenderer>,
    context: ContextBuilder,
    sentiment: SentimentAnalyzer,
    intent: IntentDetector,
    entities: EntityRecognizer,
    pronouns: PronounResolver,
    profile_cache: TtlCache<(String, String), UserProfile>,
    clock: Arc<dyn Clock>,
}

impl Preprocessor {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        reasoner: Arc<dyn Reasoner>,
        renderer: Arc<dyn PromptRenderer>,
        context: ContextBuilder,
        entities: EntityRecognizer,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let profile_cache = TtlCache::new(
            PROFILE_CACHE_CAPACITY,
            ChronoDuration::minutes(PROFILE_TTL_MINUTES),
            clock.clone(),
        );
        Self {
            profiles,
            reasoner,
            renderer,
            context,
            sentiment: SentimentAnalyzer::new(),
            intent: IntentDetector::new(),
            entities,
            pronouns: PronounResolver::new(),
            profile_cache,
            clock,
        }
    }

    /// Builds the generation request for one message. Any failure here is
    /// logged and propagated to the caller.
    #[instrument(skip(self, message, options), fields(message_id = %message.id, user_id = %message.author.id))]
    pub async fn process(
        &self,
        message: &InboundMessage,
        options: &ProcessOptions,
    ) -> Result<GenerationRequest, PipelineError> {
        let result = self.run(message, options).await;
        if let Err(e) = &result {
            error!("preprocessing failed: {e}");
        }
        result
    }

    async fn run(
        &self,
        message: &InboundMessage,
        options: &ProcessOptions,
    ) -> Result<GenerationRequest, PipelineError> {
        // 1. Profile, through the 10-minute cache.
        let profile = self
            .load_profile(&message.author.id, message.guild_id.as_deref(), &message.author.name)
            .await;

        // 2. Persona summary for prompt enrichment.
        let persona_summary = self.renderer.persona_summary(&profile);

        // 3. Ambient context (history fetch degrades internally).
        let snapshot = self
            .context
            .build(
                message,
                &options.channel,
                options.guild.as_ref(),
                options.history_limit,
            )
            .await;

        // 4. Hybrid timeline of channel chatter + memory thread.
        let history = hybrid_history(&snapshot.history, &options.memory_turns);

        // 5. Platform mention markup is noise for the analyzers.
        let clean = strip_mention_markup(&message.content);

        // 6. Linguistic analysis.
        let entities = self.entities.extract(&clean, Some(&message.author.id));
        let pronouns = self.pronouns.resolve(&clean, &options.active_memory);
        let intent = self.intent.detect(&clean, &history);

        // 7. Sentiment.
        let sentiment = self.sentiment.analyze(&clean);

        // 8. External reasoning; its output is opaque but its activity is
        //    worth a debug line.
        let reasoning = self
            .reasoner
            .analyze(
                &clean,
                ReasonerContext {
                    history: &history,
                    active_memory: &options.active_memory,
                    entities: &entities,
                    sentiment: &sentiment,
                    intent: &intent,
                },
            )
            .await?;
        debug!(
            active_reasoners = reasoning.active_reasoners,
            confidence = reasoning.confidence,
            "reasoning complete"
        );

        // 9. Prompt construction is delegated entirely.
        let prompt = self
            .renderer
            .build_prompt(
                &profile,
                &clean,
                PromptContext {
                    snapshot: &snapshot,
                    history: &history,
                    sentiment: &sentiment,
                    intent: &intent,
                    entities: &entities,
                    pronouns: &pronouns,
                    reasoning: &reasoning,
                    active_memory: &options.active_memory,
                    persona_summary: &persona_summary,
                },
            )
            .await?;

        // 10. Model parameters.
        let base = self.renderer.base_temperature(&profile.persona);
        let parameters = derive_parameters(
            base,
            &sentiment,
            &snapshot.temporal,
            &intent,
            history.len(),
        );

        // 11. Metadata assembly.
        let recent_topics = recent_topics(&clean, &history);
        let metadata = RequestMetadata {
            user_id: message.author.id.clone(),
            username: message.author.name.clone(),
            guild_id: message.guild_id.clone(),
            channel_id: message.channel_id.clone(),
            message_id: message.id.clone(),
            timestamp: self.clock.now(),
            personality: persona_summary,
            sentiment,
            intent,
            entities,
            pronouns,
            reasoning,
            context: snapshot,
            active_memory: options.active_memory.clone(),
            recent_topics,
        };

        Ok(GenerationRequest {
            prompt,
            parameters,
            metadata,
        })
    }

    /// Loads a profile through the cache. Store failures get one uncached
    /// retry and then degrade to a neutral default — never fatal.
    async fn load_profile(
        &self,
        user_id: &str,
        guild_id: Option<&str>,
        username: &str,
    ) -> UserProfile {
        let key = (
            user_id.to_string(),
            guild_id.unwrap_or("dm").to_string(),
        );

        if let Some(profile) = self.profile_cache.get(&key) {
            return profile;
        }

        match self.profiles.get(user_id, guild_id).await {
            Ok(profile) => {
                self.profile_cache.set(key, profile.clone());
                profile
            }
            Err(first) => {
                warn!("profile load failed ({first}), retrying uncached");
                match self.profiles.get(user_id, guild_id).await {
                    Ok(profile) => profile,
                    Err(second) => {
                        warn!("uncached profile retry failed ({second}), using default");
                        UserProfile::fallback_for(user_id, username)
                    }
                }
            }
        }
    }
}

/// Merges channel chatter and the memory thread into one ascending
/// timeline. With no memory turns the channel history is used verbatim;
/// otherwise the last few non-bot channel turns plus all memory turns are
/// interleaved by timestamp. Returns a new vector; inputs are untouched.
pub fn hybrid_history(channel: &[HistoryEntry], memory: &[HistoryEntry]) -> Vec<HistoryEntry> {
    if memory.is_empty() {
        return channel.to_vec();
    }

    let filtered: Vec<HistoryEntry> = channel
        .iter()
        .filter(|e| !e.is_bot)
        .cloned()
        .collect();
    let start = filtered.len().saturating_sub(HYBRID_CHANNEL_TURNS);
    let recent_channel: Vec<HistoryEntry> = filtered[start..].to_vec();

    let mut merged = recent_channel;
    merged.extend(memory.iter().cloned());
    merged.sort_by_key(|e| e.timestamp);
    merged
}

/// Removes platform mention markup (`<@id>`, `<@!id>`, `<@&id>`, `<#id>`).
pub fn strip_mention_markup(text: &str) -> String {
    let stripped = MENTION_MARKUP_RE.replace_all(text, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Temperature and token budget from the renderer's base plus context
/// signals. Both reductions share one floor; the result has 2 decimals.
fn derive_parameters(
    base_temperature: f64,
    sentiment: &SentimentResult,
    temporal: &TemporalContext,
    intent: &IntentResult,
    history_len: usize,
) -> ModelParameters {
    let mut temperature = base_temperature;
    if sentiment.intensity > 0.7 {
        temperature = (temperature - 0.1).max(TEMPERATURE_FLOOR);
    }
    if temporal.mood == Mood::Sleepy {
        temperature = (temperature - 0.1).max(TEMPERATURE_FLOOR);
    }
    temperature = (temperature * 100.0).round() / 100.0;

    let max_tokens = if intent.intent == Intent::Question || history_len > 5 {
        MAX_TOKENS_EXPANDED
    } else {
        MAX_TOKENS_DEFAULT
    };

    ModelParameters {
        temperature,
        max_tokens,
        top_p: 0.9,
        frequency_penalty: 0.5,
        presence_penalty: 0.5,
    }
}

/// Topics from the fixed vocabulary seen in the current message or the
/// hybrid history, message topics first.
fn recent_topics(message: &str, history: &[HistoryEntry]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut topics = Vec::new();

    for topic in crate::analysis::intent::known_topics(message) {
        if seen.insert(topic) {
            topics.push(topic.to_string());
        }
    }
    for entry in history.iter().rev() {
        for topic in crate::analysis::intent::known_topics(&entry.content) {
            if seen.insert(topic) {
                topics.push(topic.to_string());
            }
        }
    }

    topics.truncate(5);
    topics
}

/// Builds a memory-thread entry; a convenience for connectors that keep
/// the user-bot thread outside the platform history.
pub fn memory_turn(
    id: impl Into<String>,
    author: impl Into<String>,
    author_id: impl Into<String>,
    content: impl Into<String>,
    timestamp: chrono::DateTime<chrono::Utc>,
    is_bot: bool,
) -> HistoryEntry {
    HistoryEntry {
        id: id.into(),
        author: author.into(),
        author_id: author_id.into(),
        content: content.into(),
        timestamp,
        is_bot,
        source: TurnSource::Memory,
    }
}
