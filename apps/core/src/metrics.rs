//! Metrics Collector
//!
//! Dual-sink structured logging of every interaction: a date-partitioned
//! JSON file (one partition per calendar day, human-inspectable, append
//! semantics) and, when a store handle is available, the relational
//! `interactions` table. Observability failures are logged and swallowed —
//! they must never fail a user-facing request. Daily and cross-partition
//! aggregates are recomputed from the file partitions.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, warn};

use crate::clock::Clock;
use crate::database;
use crate::error::PipelineError;
use crate::models::InteractionRecord;

const PARTITION_PREFIX: &str = "interactions-";
const PARTITION_SUFFIX: &str = ".json";

/// Aggregates for one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub total: u64,
    pub successes: u64,
    pub success_rate: f64,
    pub avg_response_time_ms: f64,
    pub model_usage: HashMap<String, u64>,
    pub fallback_levels: HashMap<u8, u64>,
    pub total_tokens: u64,
}

impl DailyStats {
    /// The fixed zeroed structure returned when no partition exists.
    pub fn zeroed(date: NaiveDate) -> Self {
        Self {
            date,
            total: 0,
            successes: 0,
            success_rate: 0.0,
            avg_response_time_ms: 0.0,
            model_usage: HashMap::new(),
            fallback_levels: HashMap::new(),
            total_tokens: 0,
        }
    }
}

/// Aggregates across every partition found on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedStats {
    pub days: Vec<DailyStats>,
    pub total: u64,
    pub success_rate: f64,
    pub total_tokens: u64,
}

pub struct MetricsCollector {
    dir: PathBuf,
    pool: Option<SqlitePool>,
    clock: Arc<dyn Clock>,
}

impl MetricsCollector {
    pub fn new(dir: impl Into<PathBuf>, pool: Option<SqlitePool>, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.into(),
            pool,
            clock,
        }
    }

    /// Writes both representations of one record. Neither sink failing is
    /// surfaced to the caller.
    pub async fn log_interaction(&self, record: InteractionRecord) {
        if let Err(e) = self.append_to_partition(&record) {
            error!("failed to append metrics partition: {e}");
        }

        if let Some(pool) = &self.pool {
            if let Err(e) = database::insert_interaction(pool, &record).await {
                error!("failed to insert interaction row: {e}");
            }
        }
    }

    fn append_to_partition(&self, record: &InteractionRecord) -> Result<(), PipelineError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.partition_path(self.clock.now().date_naive());

        // Read-modify-append; a corrupt or missing partition starts fresh.
        let mut records: Vec<InteractionRecord> = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("corrupt partition {:?}, starting fresh: {e}", path);
                Vec::new()
            }),
            Err(_) => Vec::new(),
        };
        records.push(record.clone());

        fs::write(&path, serde_json::to_string_pretty(&records)?)?;
        Ok(())
    }

    fn partition_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!(
            "{PARTITION_PREFIX}{}{PARTITION_SUFFIX}",
            date.format("%Y-%m-%d")
        ))
    }

    /// Recomputes aggregates from one day's partition. Today when `date`
    /// is not given; zeroed when the partition does not exist.
    pub fn daily_stats(&self, date: Option<NaiveDate>) -> DailyStats {
        let date = date.unwrap_or_else(|| self.clock.now().date_naive());
        match self.read_partition(&self.partition_path(date)) {
            Some(records) => aggregate_day(date, &records),
            None => DailyStats::zeroed(date),
        }
    }

    /// Deletes partitions older than the cutoff, parsed from the filename.
    /// Returns how many were removed.
    pub fn clean_old_logs(&self, days_to_keep: i64) -> usize {
        let cutoff = self.clock.now().date_naive() - chrono::Duration::days(days_to_keep);
        let mut removed = 0;

        for (date, path) in self.partitions() {
            if date < cutoff {
                match fs::remove_file(&path) {
                    Ok(()) => removed += 1,
                    Err(e) => warn!("failed to remove old partition {:?}: {e}", path),
                }
            }
        }
        removed
    }

    /// Aggregates across every partition on disk, oldest day first.
    pub fn export_stats(&self) -> ExportedStats {
        let mut days: Vec<DailyStats> = self
            .partitions()
            .into_iter()
            .filter_map(|(date, path)| {
                self.read_partition(&path)
                    .map(|records| aggregate_day(date, &records))
            })
            .collect();
        days.sort_by_key(|d| d.date);

        let total: u64 = days.iter().map(|d| d.total).sum();
        let successes: u64 = days.iter().map(|d| d.successes).sum();
        let total_tokens: u64 = days.iter().map(|d| d.total_tokens).sum();
        let success_rate = if total == 0 {
            0.0
        } else {
            successes as f64 / total as f64
        };

        ExportedStats {
            days,
            total,
            success_rate,
            total_tokens,
        }
    }

    fn read_partition(&self, path: &Path) -> Option<Vec<InteractionRecord>> {
        let raw = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(records) => Some(records),
            Err(e) => {
                warn!("unreadable partition {:?}: {e}", path);
                None
            }
        }
    }

    /// All partitions on disk with their embedded dates.
    fn partitions(&self) -> Vec<(NaiveDate, PathBuf)> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                let name = path.file_name()?.to_str()?;
                let date_part = name
                    .strip_prefix(PARTITION_PREFIX)?
                    .strip_suffix(PARTITION_SUFFIX)?;
                let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;
                Some((date, path))
            })
            .collect()
    }
}

fn aggregate_day(date: NaiveDate, records: &[InteractionRecord]) -> DailyStats {
    let total = records.len() as u64;
    let successes = records.iter().filter(|r| r.success).count() as u64;

    let mut model_usage: HashMap<String, u64> = HashMap::new();
    let mut fallback_levels: HashMap<u8, u64> = HashMap::new();
    let mut response_time_sum = 0u64;
    let mut total_tokens = 0u64;

    for record in records {
        *model_usage.entry(record.model.clone()).or_insert(0) += 1;
        *fallback_levels.entry(record.fallback_level).or_insert(0) += 1;
        response_time_sum += record.response_time_ms;
        total_tokens += u64::from(record.tokens_used);
    }

    DailyStats {
        date,
        total,
        successes,
        success_rate: if total == 0 {
            0.0
        } else {
            successes as f64 / total as f64
        },
        avg_response_time_ms: if total == 0 {
            0.0
        } else {
            response_time_sum as f64 / total as f64
        },
        model_usage,
        fallback_levels,
        total_tokens,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::TempDir;

    fn record(id: &str, success: bool, level: u8, ms: u64, tokens: u32) -> InteractionRecord {
        InteractionRecord {
            id: id.to_string(),
            timestamp: Utc::now(),
            user_id: "u1".to_string(),
            guild_id: None,
            input: "oi".to_string(),
            output: "opa".to_string(),
            model: if success { "gen-1" } else { "fallback" }.to_string(),
            response_time_ms: ms,
            tokens_used: tokens,
            success,
            fallback_level: level,
            metadata: serde_json::json!({}),
        }
    }

    fn collector(dir: &TempDir) -> (MetricsCollector, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap(),
        ));
        (
            MetricsCollector::new(dir.path(), None, clock.clone()),
            clock,
        )
    }

    #[tokio::test]
    async fn writes_and_reads_a_daily_partition() {
        let dir = TempDir::new().unwrap();
        let (collector, _clock) = collector(&dir);

        collector.log_interaction(record("a", true, 0, 100, 40)).await;
        collector.log_interaction(record("b", false, 1, 0, 0)).await;

        let stats = collector.daily_stats(None);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.successes, 1);
        assert!((stats.success_rate - 0.5).abs() < f64::EPSILON);
        assert_eq!(stats.model_usage.get("gen-1"), Some(&1));
        assert_eq!(stats.fallback_levels.get(&1), Some(&1));
        assert_eq!(stats.total_tokens, 40);
    }

    #[tokio::test]
    async fn corrupt_partition_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let (collector, clock) = collector(&dir);

        let path = collector.partition_path(clock.now().date_naive());
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(&path, "not json at all {{{").unwrap();

        collector.log_interaction(record("a", true, 0, 100, 10)).await;

        let stats = collector.daily_stats(None);
        assert_eq!(stats.total, 1);
    }

    #[test]
    fn missing_partition_yields_zeroed_stats() {
        let dir = TempDir::new().unwrap();
        let (collector, _clock) = collector(&dir);

        let stats = collector.daily_stats(None);
        assert_eq!(stats.total, 0);
        assert_eq!(stats.success_rate, 0.0);
        assert!(stats.model_usage.is_empty());
    }

    #[tokio::test]
    async fn partitions_split_by_calendar_day() {
        let dir = TempDir::new().unwrap();
        let (collector, clock) = collector(&dir);

        collector.log_interaction(record("a", true, 0, 100, 10)).await;
        clock.advance(Duration::days(1));
        collector.log_interaction(record("b", true, 0, 100, 10)).await;

        let today = collector.daily_stats(None);
        assert_eq!(today.total, 1);

        let yesterday =
            collector.daily_stats(Some(clock.now().date_naive() - Duration::days(1)));
        assert_eq!(yesterday.total, 1);
    }

    #[tokio::test]
    async fn clean_old_logs_respects_the_cutoff() {
        let dir = TempDir::new().unwrap();
        let (collector, clock) = collector(&dir);

        collector.log_interaction(record("a", true, 0, 100, 10)).await;
        clock.advance(Duration::days(10));
        collector.log_interaction(record("b", true, 0, 100, 10)).await;

        let removed = collector.clean_old_logs(7);
        assert_eq!(removed, 1);

        let remaining = collector.export_stats();
        assert_eq!(remaining.total, 1);
    }

    #[tokio::test]
    async fn export_aggregates_across_partitions() {
        let dir = TempDir::new().unwrap();
        let (collector, clock) = collector(&dir);

        collector.log_interaction(record("a", true, 0, 100, 30)).await;
        clock.advance(Duration::days(1));
        collector.log_interaction(record("b", true, 0, 200, 30)).await;
        collector.log_interaction(record("c", false, 2, 0, 0)).await;

        let exported = collector.export_stats();
        assert_eq!(exported.days.len(), 2);
        assert_eq!(exported.total, 3);
        assert_eq!(exported.total_tokens, 60);
        assert!((exported.success_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!(exported.days[0].date < exported.days[1].date);
    }

    #[tokio::test]
    async fn relational_sink_receives_the_same_record() {
        let dir = TempDir::new().unwrap();
        let pool = database::init_db(Some(":memory:")).await.unwrap();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap(),
        ));
        let collector = MetricsCollector::new(dir.path(), Some(pool.clone()), clock);

        collector.log_interaction(record("a", true, 0, 100, 10)).await;

        assert_eq!(database::total_tokens(&pool).await.unwrap(), 10);
        assert_eq!(collector.daily_stats(None).total, 1);
    }
}
