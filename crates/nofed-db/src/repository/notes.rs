//! Note mappings between Nostr event ids and ActivityPub note URLs.

use sqlx::PgPool;

pub async fn insert(pool: &PgPool, event_id: &str, note_url: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO notes (nostr_event_id, pub_note_url)
        VALUES ($1, $2)
        ON CONFLICT (nostr_event_id) DO NOTHING
        "#,
    )
    .bind(event_id)
    .bind(note_url)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_url(pool: &PgPool, event_id: &str) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT pub_note_url FROM notes WHERE nostr_event_id = $1")
        .bind(event_id)
        .fetch_optional(pool)
        .await
}

/// The oldest event mapped to `note_url`.
pub async fn find_event_id(pool: &PgPool, note_url: &str) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT nostr_event_id FROM notes
        WHERE pub_note_url = $1
        ORDER BY created_at ASC, nostr_event_id ASC
        LIMIT 1
        "#,
    )
    .bind(note_url)
    .fetch_optional(pool)
    .await
}

/// Delete every mapping for `note_url`, returning the removed event ids.
pub async fn delete_by_url(pool: &PgPool, note_url: &str) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("DELETE FROM notes WHERE pub_note_url = $1 RETURNING nostr_event_id")
        .bind(note_url)
        .fetch_all(pool)
        .await
}
