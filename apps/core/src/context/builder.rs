//! Context builder.
//!
//! Derives the temporal mood from a fixed regional clock, fetches recent
//! channel history with retry + exponential backoff (degrading to an empty
//! history, never failing the request), and collects mentions.

use chrono::{Datelike, FixedOffset, Timelike, Weekday};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::context::snapshot::{
    ChannelInfo, ContextSnapshot, DayPeriod, GuildContext, Mention, MentionKind, Mood,
    TemporalContext,
};
use crate::models::{GuildDescriptor, HistoryEntry, InboundMessage, TurnSource};
use crate::traits::HistorySource;

/// History fetch attempts before giving up.
const MAX_FETCH_ATTEMPTS: u32 = 3;
/// First backoff delay; doubles per attempt (1s, 2s, 4s).
const BACKOFF_BASE_MS: u64 = 1000;
/// History entries keep at most this many characters of content.
const CONTENT_TRUNCATE_CHARS: usize = 200;

pub struct ContextBuilder {
    history_source: Arc<dyn HistorySource>,
    clock: Arc<dyn Clock>,
    /// The responding bot's own user id; its prior turns are excluded.
    bot_id: String,
    offset: FixedOffset,
}

impl ContextBuilder {
    pub fn new(
        history_source: Arc<dyn HistorySource>,
        clock: Arc<dyn Clock>,
        bot_id: impl Into<String>,
        utc_offset_hours: i32,
    ) -> Self {
        let offset = FixedOffset::east_opt(utc_offset_hours * 3600)
            .expect("UTC offset is within a day");
        Self {
            history_source,
            clock,
            bot_id: bot_id.into(),
            offset,
        }
    }

    /// Assembles the full context snapshot for one triggering message.
    pub async fn build(
        &self,
        message: &InboundMessage,
        channel: &ChannelInfo,
        guild: Option<&GuildDescriptor>,
        history_limit: usize,
    ) -> ContextSnapshot {
        let temporal = self.temporal_context();
        let history = self.message_history(message, history_limit).await;
        let guild = match guild {
            Some(g) => GuildContext::Guild {
                id: g.id.clone(),
                name: g.name.clone(),
                member_count: g.member_count,
            },
            None => GuildContext::Dm,
        };
        let mentions = extract_mentions(message);

        ContextSnapshot {
            temporal,
            channel: channel.clone(),
            history,
            guild,
            mentions,
        }
    }

    /// Temporal mood from the hour of day in the persona's home timezone.
    pub fn temporal_context(&self) -> TemporalContext {
        let now = self.clock.now();
        let local = now.with_timezone(&self.offset);
        let hour = local.hour();

        let (period, mood) = match hour {
            5..=11 => (DayPeriod::Morning, Mood::Energetic),
            12..=17 => (DayPeriod::Afternoon, Mood::Active),
            18..=21 => (DayPeriod::Evening, Mood::Relaxed),
            _ => (DayPeriod::Night, Mood::Sleepy),
        };

        let weekday = local.weekday();
        TemporalContext {
            hour,
            period,
            mood,
            day_of_week: weekday.to_string(),
            is_weekend: matches!(weekday, Weekday::Sat | Weekday::Sun),
            timestamp: now,
        }
    }

    /// Fetches up to `limit` prior messages, retrying transient failures
    /// with exponential backoff. Exhausting all attempts yields an empty
    /// history; this never fails the request.
    pub async fn message_history(
        &self,
        message: &InboundMessage,
        limit: usize,
    ) -> Vec<HistoryEntry> {
        let mut attempt = 0u32;
        let raw = loop {
            attempt += 1;
            match self
                .history_source
                .fetch(&message.channel_id, limit + 1, Some(&message.id))
                .await
            {
                Ok(raw) => break raw,
                Err(e) if attempt < MAX_FETCH_ATTEMPTS => {
                    let delay = Duration::from_millis(BACKOFF_BASE_MS * 2u64.pow(attempt - 1));
                    debug!(
                        "history fetch attempt {attempt} failed ({e}), retrying in {:?}",
                        delay
                    );
                    sleep(delay).await;
                }
                Err(e) => {
                    warn!("history fetch failed after {attempt} attempts: {e}");
                    return Vec::new();
                }
            }
        };

        let mut entries: Vec<HistoryEntry> = raw
            .into_iter()
            .filter(|m| m.id != message.id)
            .filter(|m| !(m.author.is_bot && m.author.id == self.bot_id))
            .map(|m| HistoryEntry {
                id: m.id,
                author: m.author.name,
                author_id: m.author.id,
                content: truncate_chars(&m.content, CONTENT_TRUNCATE_CHARS),
                timestamp: m.created_at,
                is_bot: m.author.is_bot,
                source: TurnSource::Channel,
            })
            .collect();

        entries.sort_by_key(|e| e.timestamp);
        if entries.len() > limit {
            entries.drain(..entries.len() - limit);
        }
        entries
    }

}

fn extract_mentions(message: &InboundMessage) -> Vec<Mention> {
    let users = message.user_mentions.iter().map(|m| Mention {
        kind: MentionKind::User,
        id: m.id.clone(),
        name: m.name.clone(),
    });
    let roles = message.role_mentions.iter().map(|m| Mention {
        kind: MentionKind::Role,
        id: m.id.clone(),
        name: m.name.clone(),
    });
    users.chain(roles).collect()
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
