//! Identity mappings between ActivityPub actors and derived Nostr keys.

use sqlx::PgPool;

/// Persist a derived key pair. Existing mappings are left untouched.
pub async fn insert(
    pool: &PgPool,
    pubkey: &str,
    privkey: &str,
    actor_url: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO keys (pub_actor_url, nostr_privkey, nostr_pubkey)
        VALUES ($1, $2, $3)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(actor_url)
    .bind(privkey)
    .bind(pubkey)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_actor_url(pool: &PgPool, pubkey: &str) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT pub_actor_url FROM keys WHERE nostr_pubkey = $1")
        .bind(pubkey)
        .fetch_optional(pool)
        .await
}

pub async fn find_pubkey(pool: &PgPool, actor_url: &str) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT nostr_pubkey FROM keys WHERE pub_actor_url = $1")
        .bind(actor_url)
        .fetch_optional(pool)
        .await
}
