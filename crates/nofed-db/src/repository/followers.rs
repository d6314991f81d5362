//! Follow edges: which ActivityPub actors follow which Nostr keys.

use sqlx::PgPool;

pub async fn insert(pool: &PgPool, pubkey: &str, actor_url: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO followers (nostr_pubkey, pub_actor_url)
        VALUES ($1, $2)
        ON CONFLICT (nostr_pubkey, pub_actor_url) DO NOTHING
        "#,
    )
    .bind(pubkey)
    .bind(actor_url)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete(pool: &PgPool, pubkey: &str, actor_url: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM followers WHERE nostr_pubkey = $1 AND pub_actor_url = $2")
        .bind(pubkey)
        .bind(actor_url)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_for_pubkey(pool: &PgPool, pubkey: &str) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT pub_actor_url FROM followers WHERE nostr_pubkey = $1 ORDER BY created_at ASC",
    )
    .bind(pubkey)
    .fetch_all(pool)
    .await
}
