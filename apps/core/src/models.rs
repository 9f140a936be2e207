//! Shared data model for the response pipeline.
//!
//! Everything that crosses a component boundary lives here: inbound
//! platform messages, history entries, user profiles, the generation
//! request package and the postprocessing result, plus the append-only
//! interaction record the metrics collector persists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::entities::EntitySet;
use crate::analysis::intent::IntentResult;
use crate::analysis::pronouns::PronounResolution;
use crate::analysis::sentiment::SentimentResult;
use crate::context::snapshot::ContextSnapshot;

// --- Inbound platform shapes ---

/// Author of a platform message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,
    pub is_bot: bool,
}

/// A user/role reference carried by a message's mention collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MentionRef {
    pub id: String,
    pub name: String,
}

/// The triggering message, as handed over by the platform connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: String,
    pub content: String,
    pub author: Author,
    pub channel_id: String,
    pub guild_id: Option<String>,
    pub user_mentions: Vec<MentionRef>,
    pub role_mentions: Vec<MentionRef>,
    pub created_at: DateTime<Utc>,
}

/// A raw history record as returned by the platform's history fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: String,
    pub author: Author,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Guild descriptor supplied by the connector; `None` means a DM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuildDescriptor {
    pub id: String,
    pub name: String,
    pub member_count: u64,
}

// --- History ---

/// Which timeline a history entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnSource {
    /// Ambient channel chatter.
    Channel,
    /// The dedicated user-bot memory thread.
    Memory,
}

/// One prior conversational turn. Content is truncated to 200 characters
/// at construction; merged timelines are kept ascending by timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub author: String,
    pub author_id: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_bot: bool,
    pub source: TurnSource,
}

// --- Profiles & memory ---

/// Behavioral tuning values derived from a user's stored profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaParams {
    pub humor: f64,
    pub formality: f64,
    pub energy: f64,
}

impl Default for PersonaParams {
    fn default() -> Self {
        Self {
            humor: 0.8,
            formality: 0.1,
            energy: 0.7,
        }
    }
}

/// Opaque-ish record from the external profile store. Cached per
/// (user, guild) with a 10-minute TTL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub persona: PersonaParams,
    #[serde(default)]
    pub interaction_count: u64,
    #[serde(default)]
    pub preferred_topics: Vec<String>,
}

impl UserProfile {
    /// Neutral profile used when the store cannot be reached at all.
    pub fn fallback_for(user_id: &str, username: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            username: username.to_string(),
            ..Self::default()
        }
    }
}

/// Externally supplied state describing what is currently salient in an
/// ongoing conversation with one user. Sequences are ordered by recency,
/// most recent last.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActiveMemory {
    pub people: Vec<String>,
    pub events: Vec<String>,
    pub objects: Vec<String>,
    pub topic: Option<String>,
}

// --- Generation request ---

/// Prompt pair produced by the external renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Model sampling parameters derived by the preprocessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
}

/// Output of the external reasoning collaborator. Passed through to the
/// prompt renderer and request metadata, never validated here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReasoningOutput {
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default)]
    pub active_reasoners: u32,
    #[serde(default)]
    pub confidence: f64,
}

/// Everything the generation service needs to know about one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub user_id: String,
    pub username: String,
    pub guild_id: Option<String>,
    pub channel_id: String,
    pub message_id: String,
    pub timestamp: DateTime<Utc>,
    pub personality: String,
    pub sentiment: SentimentResult,
    pub intent: IntentResult,
    pub entities: EntitySet,
    pub pronouns: PronounResolution,
    pub reasoning: ReasoningOutput,
    pub context: ContextSnapshot,
    pub active_memory: ActiveMemory,
    pub recent_topics: Vec<String>,
}

/// The package handed to the generation service. Built once by the
/// preprocessor and consumed exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: Prompt,
    pub parameters: ModelParameters,
    pub metadata: RequestMetadata,
}

// --- Generation output & postprocessing ---

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationMetrics {
    pub response_time_ms: u64,
    pub tokens_used: u32,
}

/// Raw candidate returned by the generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedCandidate {
    pub content: String,
    pub model: String,
    #[serde(default)]
    pub metrics: GenerationMetrics,
}

/// Canned text from the fallback-text collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackText {
    pub content: String,
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Validated,
    Fallback,
}

/// Timing and quality figures attached to a postprocessed response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetrics {
    pub response_time_ms: u64,
    pub tokens_used: u32,
    pub postprocessing_ms: u64,
    pub style_score: f64,
    pub quality_score: f64,
    pub fallback_used: bool,
    pub fallback_source: Option<String>,
}

/// The final deliverable of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostprocessResult {
    pub content: String,
    pub status: ResponseStatus,
    pub fallback_level: u8,
    pub metrics: ResponseMetrics,
}

// --- Metrics record ---

/// Append-only record of one interaction, written to both the daily file
/// partition and the relational table. Never updated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub guild_id: Option<String>,
    pub input: String,
    pub output: String,
    pub model: String,
    pub response_time_ms: u64,
    pub tokens_used: u32,
    pub success: bool,
    pub fallback_level: u8,
    pub metadata: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persona_defaults_lean_informal() {
        let persona = PersonaParams::default();
        assert!(persona.formality < 0.5);
        assert!(persona.humor > 0.5);
    }

    #[test]
    fn fallback_profile_keeps_identity() {
        let profile = UserProfile::fallback_for("42", "ana");
        assert_eq!(profile.user_id, "42");
        assert_eq!(profile.username, "ana");
        assert_eq!(profile.interaction_count, 0);
    }

    #[test]
    fn turn_source_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&TurnSource::Memory).unwrap(),
            "\"memory\""
        );
        assert_eq!(
            serde_json::to_string(&TurnSource::Channel).unwrap(),
            "\"channel\""
        );
    }

    #[test]
    fn interaction_record_round_trips() {
        let record = InteractionRecord {
            id: "abc".to_string(),
            timestamp: Utc::now(),
            user_id: "u1".to_string(),
            guild_id: None,
            input: "oi".to_string(),
            output: "oi, tudo bom?".to_string(),
            model: "gen-1".to_string(),
            response_time_ms: 120,
            tokens_used: 40,
            success: true,
            fallback_level: 0,
            metadata: serde_json::json!({"intent": "greeting"}),
        };

        let json = serde_json::to_string(&record).unwrap();
        let parsed: InteractionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, record.id);
        assert!(parsed.success);
        assert_eq!(parsed.fallback_level, 0);
    }
}
