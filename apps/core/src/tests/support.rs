//! Shared mock collaborators and fixtures for the cross-module tests.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::analysis::entities::EntityRecognizer;
use crate::clock::{Clock, ManualClock};
use crate::context::builder::ContextBuilder;
use crate::context::snapshot::ChannelInfo;
use crate::error::PipelineError;
use crate::metrics::MetricsCollector;
use crate::models::{
    ActiveMemory, Author, FallbackText, GeneratedCandidate, GenerationMetrics, GenerationRequest,
    InboundMessage, PersonaParams, Prompt, RawMessage, ReasoningOutput, UserProfile,
};
use crate::output::enforcer::StyleEnforcer;
use crate::pipeline::{Postprocessor, Preprocessor, ProcessOptions, ResponsePipeline};
use crate::traits::{
    FallbackWriter, GenerationService, HistorySource, ProfileStore, PromptContext, PromptRenderer,
    Reasoner, ReasonerContext,
};

pub struct StaticHistory {
    pub messages: Vec<RawMessage>,
}

#[async_trait]
impl HistorySource for StaticHistory {
    async fn fetch(
        &self,
        _channel_id: &str,
        _limit: usize,
        _before: Option<&str>,
    ) -> Result<Vec<RawMessage>, PipelineError> {
        Ok(self.messages.clone())
    }
}

/// Counts calls so tests can assert on cache behavior.
pub struct CountingProfiles {
    pub calls: AtomicU32,
    pub fail: bool,
}

impl CountingProfiles {
    pub fn succeeding() -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail: true,
        }
    }
}

#[async_trait]
impl ProfileStore for CountingProfiles {
    async fn get(
        &self,
        user_id: &str,
        _guild_id: Option<&str>,
    ) -> Result<UserProfile, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(PipelineError::Collaborator("store offline".to_string()));
        }
        Ok(UserProfile {
            user_id: user_id.to_string(),
            username: "ana".to_string(),
            persona: PersonaParams::default(),
            interaction_count: 12,
            preferred_topics: vec!["música".to_string()],
        })
    }
}

pub struct StubReasoner;

#[async_trait]
impl Reasoner for StubReasoner {
    async fn analyze(
        &self,
        _message: &str,
        _context: ReasonerContext<'_>,
    ) -> Result<ReasoningOutput, PipelineError> {
        Ok(ReasoningOutput {
            content: serde_json::json!({"mode": "stub"}),
            active_reasoners: 3,
            confidence: 0.9,
        })
    }
}

pub struct PlainRenderer;

#[async_trait]
impl PromptRenderer for PlainRenderer {
    async fn build_prompt(
        &self,
        _profile: &UserProfile,
        message: &str,
        context: PromptContext<'_>,
    ) -> Result<Prompt, PipelineError> {
        Ok(Prompt {
            system: format!("persona: {}", context.persona_summary),
            user: message.to_string(),
        })
    }

    fn persona_summary(&self, profile: &UserProfile) -> String {
        format!("{} (zoeira alta)", profile.username)
    }

    fn base_temperature(&self, persona: &PersonaParams) -> f64 {
        0.9 - persona.formality * 0.2
    }
}

/// What the scripted generator should do for every request.
#[derive(Clone)]
pub enum GeneratorScript {
    Reply(String),
    Empty,
    Fail,
}

pub struct ScriptedGenerator {
    pub script: GeneratorScript,
}

#[async_trait]
impl GenerationService for ScriptedGenerator {
    async fn generate(
        &self,
        _request: &GenerationRequest,
    ) -> Result<Option<GeneratedCandidate>, PipelineError> {
        match &self.script {
            GeneratorScript::Reply(content) => Ok(Some(GeneratedCandidate {
                content: content.clone(),
                model: "gen-1".to_string(),
                metrics: GenerationMetrics {
                    response_time_ms: 120,
                    tokens_used: 42,
                },
            })),
            GeneratorScript::Empty => Ok(Some(GeneratedCandidate {
                content: String::new(),
                model: "gen-1".to_string(),
                metrics: GenerationMetrics::default(),
            })),
            GeneratorScript::Fail => {
                Err(PipelineError::Collaborator("model unavailable".to_string()))
            }
        }
    }
}

pub struct CannedFallback;

#[async_trait]
impl FallbackWriter for CannedFallback {
    async fn generate(&self, level: u8, _request: &GenerationRequest) -> FallbackText {
        FallbackText {
            content: format!("foi mal, deu ruim aqui... tenta de novo? (nível {level})"),
            source: format!("canned_l{level}"),
        }
    }
}

pub fn fixed_clock() -> Arc<ManualClock> {
    // 15:00 UTC = 12:00 at the persona's UTC-3 home: afternoon/active.
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 10, 15, 0, 0).unwrap(),
    ))
}

pub fn inbound(content: &str) -> InboundMessage {
    InboundMessage {
        id: "m-1".to_string(),
        content: content.to_string(),
        author: Author {
            id: "u1".to_string(),
            name: "ana".to_string(),
            is_bot: false,
        },
        channel_id: "c1".to_string(),
        guild_id: Some("g1".to_string()),
        user_mentions: vec![],
        role_mentions: vec![],
        created_at: Utc.with_ymd_and_hms(2024, 6, 10, 14, 59, 0).unwrap(),
    }
}

pub fn channel() -> ChannelInfo {
    ChannelInfo {
        id: "c1".to_string(),
        name: "geral".to_string(),
        kind: "text".to_string(),
        is_dm: false,
        is_thread: false,
        nsfw: false,
    }
}

pub fn options() -> ProcessOptions {
    ProcessOptions {
        channel: channel(),
        guild: None,
        active_memory: ActiveMemory::default(),
        memory_turns: vec![],
        history_limit: 5,
    }
}

pub struct PipelineFixture {
    pub pipeline: ResponsePipeline,
    pub profiles: Arc<CountingProfiles>,
    pub metrics: Arc<MetricsCollector>,
    pub clock: Arc<ManualClock>,
}

/// Wires a full pipeline against the scripted generator, file-only
/// metrics and a pinned clock/RNG.
pub fn fixture(metrics_dir: &Path, script: GeneratorScript, profiles: CountingProfiles) -> PipelineFixture {
    let clock = fixed_clock();
    let clock_dyn: Arc<dyn Clock> = clock.clone();

    let profiles = Arc::new(profiles);
    let history = Arc::new(StaticHistory { messages: vec![] });
    let context = ContextBuilder::new(history, clock_dyn.clone(), "bot-1", -3);
    let entities = EntityRecognizer::new(None, clock_dyn.clone());

    let preprocessor = Preprocessor::new(
        profiles.clone(),
        Arc::new(StubReasoner),
        Arc::new(PlainRenderer),
        context,
        entities,
        clock_dyn.clone(),
    );

    let metrics = Arc::new(MetricsCollector::new(metrics_dir, None, clock_dyn.clone()));
    let enforcer = StyleEnforcer::new(None).with_rng_seed(11);
    let postprocessor =
        Postprocessor::new(enforcer, Arc::new(CannedFallback), metrics.clone(), clock_dyn)
            .with_rng_seed(11);

    let pipeline = ResponsePipeline::new(
        preprocessor,
        Arc::new(ScriptedGenerator { script }),
        postprocessor,
    );

    PipelineFixture {
        pipeline,
        profiles,
        metrics,
        clock,
    }
}
