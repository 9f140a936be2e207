//! Contracts for the external collaborators.
//!
//! The pipeline core never talks to the chat platform, the store, or the
//! model directly; everything goes through these narrow interfaces so
//! backends can be swapped (and mocked in tests).

use async_trait::async_trait;

use crate::analysis::entities::EntitySet;
use crate::analysis::intent::IntentResult;
use crate::analysis::sentiment::SentimentResult;
use crate::context::snapshot::ContextSnapshot;
use crate::error::PipelineError;
use crate::models::{
    ActiveMemory, FallbackText, GeneratedCandidate, GenerationRequest, HistoryEntry, PersonaParams,
    Prompt, RawMessage, ReasoningOutput, UserProfile,
};
use crate::analysis::pronouns::PronounResolution;

/// History-fetch capability of the chat platform connector. May fail
/// transiently; the context builder retries with backoff.
#[async_trait]
pub trait HistorySource: Send + Sync + 'static {
    /// Fetches up to `limit` messages posted before `before` (newest first
    /// or oldest first — the caller re-sorts).
    async fn fetch(
        &self,
        channel_id: &str,
        limit: usize,
        before: Option<&str>,
    ) -> Result<Vec<RawMessage>, PipelineError>;
}

/// The persistent profile store.
#[async_trait]
pub trait ProfileStore: Send + Sync + 'static {
    async fn get(
        &self,
        user_id: &str,
        guild_id: Option<&str>,
    ) -> Result<UserProfile, PipelineError>;
}

/// Borrowed view of everything the reasoning collaborator may look at.
pub struct ReasonerContext<'a> {
    pub history: &'a [HistoryEntry],
    pub active_memory: &'a ActiveMemory,
    pub entities: &'a EntitySet,
    pub sentiment: &'a SentimentResult,
    pub intent: &'a IntentResult,
}

/// The external reasoning collaborator. Its output is opaque to the core:
/// it is passed through to the prompt renderer and request metadata.
#[async_trait]
pub trait Reasoner: Send + Sync + 'static {
    async fn analyze(
        &self,
        message: &str,
        context: ReasonerContext<'_>,
    ) -> Result<ReasoningOutput, PipelineError>;
}

/// Borrowed view of the enrichment handed to the prompt renderer.
pub struct PromptContext<'a> {
    pub snapshot: &'a ContextSnapshot,
    pub history: &'a [HistoryEntry],
    pub sentiment: &'a SentimentResult,
    pub intent: &'a IntentResult,
    pub entities: &'a EntitySet,
    pub pronouns: &'a PronounResolution,
    pub reasoning: &'a ReasoningOutput,
    pub active_memory: &'a ActiveMemory,
    pub persona_summary: &'a str,
}

/// The external prompt-template renderer.
#[async_trait]
pub trait PromptRenderer: Send + Sync + 'static {
    async fn build_prompt(
        &self,
        profile: &UserProfile,
        message: &str,
        context: PromptContext<'_>,
    ) -> Result<Prompt, PipelineError>;

    /// One-line persona description derived from the stored profile.
    fn persona_summary(&self, profile: &UserProfile) -> String;

    /// Base sampling temperature for the given personality parameters.
    fn base_temperature(&self, persona: &PersonaParams) -> f64;
}

/// The external generation service. `Ok(None)` and `Err` are both treated
/// as generation failure by the caller.
#[async_trait]
pub trait GenerationService: Send + Sync + 'static {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<Option<GeneratedCandidate>, PipelineError>;
}

/// The canned-response collaborator. Must always succeed; there is no
/// further fallback beneath it.
#[async_trait]
pub trait FallbackWriter: Send + Sync + 'static {
    async fn generate(&self, level: u8, request: &GenerationRequest) -> FallbackText;
}

/// Optional secondary pass for the style enforcer. Calls are raced against
/// a timeout; failures degrade silently to the deterministic result.
#[async_trait]
pub trait StyleAssist: Send + Sync + 'static {
    async fn rewrite(&self, text: &str) -> Result<String, PipelineError>;
}

/// Optional named-entity output of an external linguistic toolkit.
/// Implementations must not panic; absence of the tagger degrades entity
/// recognition to patterns and gazetteer only.
pub trait NamedEntityTagger: Send + Sync + 'static {
    fn people(&self, text: &str) -> Vec<String>;
    fn places(&self, text: &str) -> Vec<String>;
    fn dates(&self, text: &str) -> Vec<String>;
}
