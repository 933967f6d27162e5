//! Database schema initialization
//!
//! Idempotent DDL executed by both services at startup. Whichever process
//! starts first creates the tables; the other finds them in place.

use sqlx::{Pool, Sqlite};
use tracing::info;

use crate::Result;

/// Create all karat tables if they do not exist yet.
pub async fn init_schema(pool: &Pool<Sqlite>) -> Result<()> {
    info!("Initializing database schema");

    // Cache entries: one row per key, absolute expiry timestamp.
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS cache_entries (
            key         TEXT PRIMARY KEY,
            value       TEXT NOT NULL,
            expires_at  INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    // Appraisal jobs: claimed_until is 0 for unclaimed rows and an
    // absolute timestamp while a worker holds the claim. Rows whose
    // claim expired become claimable again (at-least-once redelivery).
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS appraisal_jobs (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            payload        TEXT NOT NULL,
            enqueued_at    INTEGER NOT NULL,
            claimed_until  INTEGER NOT NULL DEFAULT 0
        )",
    )
    .execute(pool)
    .await?;

    // Progress events: append-only per-channel percent strings. The API
    // streams rows in id order per channel.
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS progress_events (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            channel       TEXT NOT NULL,
            percent       TEXT NOT NULL,
            published_at  INTEGER NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_progress_events_channel
         ON progress_events (channel, id)",
    )
    .execute(pool)
    .await?;

    // Projects known to the system, with the size figure the eligibility
    // gate checks. Populated externally (GitHub sync is out of scope).
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS projects (
            owner  TEXT NOT NULL,
            name   TEXT NOT NULL,
            size   INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (owner, name)
        )",
    )
    .execute(pool)
    .await?;

    Ok(())
}
