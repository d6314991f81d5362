//! Event cache rows.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::store::CacheEntry;

/// Insert or refresh a cache row. See [`crate::CacheStore::upsert_cache`].
pub async fn upsert(pool: &PgPool, entry: &CacheEntry) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO cache (key, value, created_at, observed_at, expires_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (key) DO UPDATE SET
            value = CASE WHEN EXCLUDED.created_at >= cache.created_at
                         THEN EXCLUDED.value ELSE cache.value END,
            created_at = GREATEST(cache.created_at, EXCLUDED.created_at),
            observed_at = EXCLUDED.observed_at,
            expires_at = GREATEST(cache.expires_at, EXCLUDED.expires_at)
        "#,
    )
    .bind(&entry.key)
    .bind(&entry.value)
    .bind(entry.created_at)
    .bind(entry.observed_at)
    .bind(entry.expires_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find(pool: &PgPool, key: &str) -> Result<Option<CacheEntry>, sqlx::Error> {
    sqlx::query_as::<_, CacheEntry>(
        "SELECT key, value, created_at, observed_at, expires_at FROM cache WHERE key = $1",
    )
    .bind(key)
    .fetch_optional(pool)
    .await
}

/// Rows whose key starts with `prefix`, newest event first.
pub async fn scan_prefix(pool: &PgPool, prefix: &str, limit: i64) -> Result<Vec<CacheEntry>, sqlx::Error> {
    sqlx::query_as::<_, CacheEntry>(
        r#"
        SELECT key, value, created_at, observed_at, expires_at
        FROM cache
        WHERE key LIKE $1 ESCAPE '\'
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(like_prefix(prefix))
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn delete(pool: &PgPool, key: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM cache WHERE key = $1")
        .bind(key)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn delete_expired(pool: &PgPool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cache WHERE expires_at < $1")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// `LIKE` pattern matching every string that starts with `prefix`.
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
