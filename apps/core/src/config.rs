//! Pipeline configuration.
//!
//! All tunables come from the environment (a `.env` file is honored when
//! present) with defaults that match the persona's home deployment. The
//! structure is plain data; components receive the values they need at
//! construction time rather than reading the environment themselves.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default UTC offset of the persona's home region (no DST handling).
const DEFAULT_UTC_OFFSET_HOURS: i32 = -3;
/// How many prior channel messages a context snapshot carries.
const DEFAULT_HISTORY_LIMIT: usize = 10;
/// Upper bound on the external style-assist call.
const DEFAULT_ASSIST_TIMEOUT_SECS: u64 = 5;
/// Probability weight for the casual-particle pass.
const DEFAULT_SLANG_INTENSITY: f64 = 0.3;
/// Profile cache TTL in minutes.
const DEFAULT_PROFILE_TTL_MIN: i64 = 10;
/// Entity accumulation cache TTL in minutes.
const DEFAULT_ENTITY_TTL_MIN: i64 = 60;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root directory for everything the pipeline persists (logs, sqlite).
    pub data_dir: PathBuf,
    pub history_limit: usize,
    pub utc_offset_hours: i32,
    pub assist_timeout: Duration,
    pub slang_intensity: f64,
    pub profile_ttl_minutes: i64,
    pub entity_ttl_minutes: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("papo_data"),
            history_limit: DEFAULT_HISTORY_LIMIT,
            utc_offset_hours: DEFAULT_UTC_OFFSET_HOURS,
            assist_timeout: Duration::from_secs(DEFAULT_ASSIST_TIMEOUT_SECS),
            slang_intensity: DEFAULT_SLANG_INTENSITY,
            profile_ttl_minutes: DEFAULT_PROFILE_TTL_MIN,
            entity_ttl_minutes: DEFAULT_ENTITY_TTL_MIN,
        }
    }
}

impl PipelineConfig {
    /// Loads configuration from the environment, falling back to defaults
    /// for anything unset or unparseable.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        Self {
            data_dir: env::var("PAPO_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            history_limit: parse_var("PAPO_HISTORY_LIMIT", defaults.history_limit),
            utc_offset_hours: parse_var("PAPO_UTC_OFFSET_HOURS", defaults.utc_offset_hours),
            assist_timeout: Duration::from_secs(parse_var(
                "PAPO_ASSIST_TIMEOUT_SECS",
                DEFAULT_ASSIST_TIMEOUT_SECS,
            )),
            slang_intensity: parse_var("PAPO_SLANG_INTENSITY", defaults.slang_intensity),
            profile_ttl_minutes: parse_var("PAPO_PROFILE_TTL_MIN", defaults.profile_ttl_minutes),
            entity_ttl_minutes: parse_var("PAPO_ENTITY_TTL_MIN", defaults.entity_ttl_minutes),
        }
    }

    /// Directory holding the daily metrics partitions.
    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    /// Path of the sqlite database file.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("papo.sqlite")
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = PipelineConfig::default();
        assert_eq!(config.history_limit, 10);
        assert_eq!(config.utc_offset_hours, -3);
        assert_eq!(config.assist_timeout, Duration::from_secs(5));
        assert!((config.slang_intensity - 0.3).abs() < f64::EPSILON);
        assert_eq!(config.logs_dir(), PathBuf::from("papo_data/logs"));
    }

    #[test]
    fn unparseable_env_falls_back() {
        assert_eq!(parse_var("PAPO_TEST_MISSING_VAR", 7usize), 7);
    }
}
