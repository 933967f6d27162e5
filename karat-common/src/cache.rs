//! Appraisal cache store
//!
//! Key/value store with per-entry TTL over the shared database. `get` on
//! an expired or absent key returns `None`, never an error; `set`
//! overwrites unconditionally (last writer wins). Store failures surface
//! as `Error::Database` so the read path can downgrade them to a miss.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::Result;

#[derive(Clone)]
pub struct CacheStore {
    pool: SqlitePool,
}

impl CacheStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch a live entry. Expired rows read as absent; they are lazily
    /// replaced by the next `set` on the same key.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = sqlx::query_scalar(
            "SELECT value FROM cache_entries WHERE key = ? AND expires_at > ?",
        )
        .bind(key)
        .bind(Utc::now().timestamp())
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }

    /// Write an entry, replacing any previous value at the key.
    pub async fn set(&self, key: &str, value: &str, ttl_secs: i64) -> Result<()> {
        let expires_at = Utc::now().timestamp() + ttl_secs;

        sqlx::query(
            "INSERT INTO cache_entries (key, value, expires_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                 value = excluded.value,
                 expires_at = excluded.expires_at",
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        debug!(key = %key, ttl_secs, "Cache entry written");
        Ok(())
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM cache_entries WHERE key = ? AND expires_at > ?)",
        )
        .bind(key)
        .bind(Utc::now().timestamp())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// All live keys, in key order.
    pub async fn keys(&self) -> Result<Vec<String>> {
        let keys: Vec<String> = sqlx::query_scalar(
            "SELECT key FROM cache_entries WHERE expires_at > ? ORDER BY key",
        )
        .bind(Utc::now().timestamp())
        .fetch_all(&self.pool)
        .await?;

        Ok(keys)
    }

    /// Delete every entry, expired rows included. Returns the row count.
    pub async fn wipe(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cache_entries")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
