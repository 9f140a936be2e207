//! Sqlite side of the metrics sink.
//!
//! One append-only `interactions` table plus a couple of aggregate
//! helpers. The pool is optional everywhere upstream: without it the
//! metrics collector degrades to file-only logging.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::info;

use crate::models::InteractionRecord;

/// Opens (and migrates) the interactions database. `Some(":memory:")`
/// yields an in-memory database for tests.
pub async fn init_db(path: Option<&str>) -> Result<SqlitePool, sqlx::Error> {
    let (db_url, max_connections) = match path {
        Some(":memory:") => ("sqlite::memory:".to_string(), 1),
        Some(p) => (format!("sqlite://{}", p), 5),
        None => ("sqlite://papo_data/papo.sqlite".to_string(), 5),
    };

    info!("Initializing database at: {}", db_url);

    let options = SqliteConnectOptions::from_str(&db_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS interactions (
            id TEXT PRIMARY KEY,
            timestamp TEXT NOT NULL,
            user_id TEXT NOT NULL,
            guild_id TEXT,
            input TEXT NOT NULL,
            output TEXT NOT NULL,
            model TEXT NOT NULL,
            response_time_ms INTEGER NOT NULL,
            tokens_used INTEGER NOT NULL,
            success INTEGER NOT NULL,
            fallback_level INTEGER NOT NULL,
            metadata JSON NOT NULL
        );
        "#,
    )
    .execute(&pool)
    .await?;

    info!("Database initialized and migrations applied.");

    Ok(pool)
}

/// Inserts one interaction record. Append-only; records are never updated.
pub async fn insert_interaction(
    pool: &SqlitePool,
    record: &InteractionRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO interactions
            (id, timestamp, user_id, guild_id, input, output, model,
             response_time_ms, tokens_used, success, fallback_level, metadata)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.id)
    .bind(record.timestamp.to_rfc3339())
    .bind(&record.user_id)
    .bind(&record.guild_id)
    .bind(&record.input)
    .bind(&record.output)
    .bind(&record.model)
    .bind(record.response_time_ms as i64)
    .bind(record.tokens_used as i64)
    .bind(record.success)
    .bind(record.fallback_level as i64)
    .bind(record.metadata.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

/// Totals for a day prefix (`YYYY-MM-DD`): (interactions, successes).
pub async fn day_totals(pool: &SqlitePool, day: &str) -> Result<(i64, i64), sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT COUNT(*) AS total,
               COALESCE(SUM(CASE WHEN success THEN 1 ELSE 0 END), 0) AS successes
        FROM interactions
        WHERE timestamp LIKE ?
        "#,
    )
    .bind(format!("{day}%"))
    .fetch_one(pool)
    .await?;

    Ok((row.get("total"), row.get("successes")))
}

/// Total tokens spent across all recorded interactions.
pub async fn total_tokens(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COALESCE(SUM(tokens_used), 0) FROM interactions")
        .fetch_one(pool)
        .await
}
