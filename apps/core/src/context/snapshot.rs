//! Context snapshot — the ambient-context structure built per request.
//!
//! Built fresh for every message and never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::HistoryEntry;

/// Part of the day in the persona's home timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayPeriod {
    Morning,
    Afternoon,
    Evening,
    Night,
}

/// The persona's energy for a given day period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Energetic,
    Active,
    Relaxed,
    Sleepy,
}

/// Temporal context derived from the fixed regional clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalContext {
    pub hour: u32,
    pub period: DayPeriod,
    pub mood: Mood,
    pub day_of_week: String,
    pub is_weekend: bool,
    pub timestamp: DateTime<Utc>,
}

/// Channel descriptor, as supplied by the platform connector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
    pub kind: String,
    pub is_dm: bool,
    pub is_thread: bool,
    pub nsfw: bool,
}

/// Guild context; DMs have none.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GuildContext {
    Guild {
        id: String,
        name: String,
        member_count: u64,
    },
    Dm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionKind {
    User,
    Role,
}

/// A user or role mention carried by the triggering message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mention {
    pub kind: MentionKind,
    pub id: String,
    pub name: String,
}

/// The assembled ambient context of one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub temporal: TemporalContext,
    pub channel: ChannelInfo,
    /// Prior messages, oldest first.
    pub history: Vec<HistoryEntry>,
    pub guild: GuildContext,
    pub mentions: Vec<Mention>,
}

impl ContextSnapshot {
    /// One-line summary for logging.
    pub fn summary(&self) -> String {
        format!(
            "period={:?} mood={:?} channel={} history={} mentions={}",
            self.temporal.period,
            self.temporal.mood,
            self.channel.name,
            self.history.len(),
            self.mentions.len()
        )
    }
}
