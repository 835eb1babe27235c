//! Inbound Message Queries
//!
//! Uses runtime queries (`sqlx::query` / `sqlx::query_as`) to avoid
//! requiring a live database at compile time.

use sqlx::PgPool;
use uuid::Uuid;

use super::models::{InboundMessageRecord, InboundStatus};

/// Record a received message.
///
/// Returns `Some(id)` for a first delivery and `None` when the provider
/// message ID was already logged (a re-delivery).
pub async fn record_inbound_message(
    pool: &PgPool,
    wa_message_id: &str,
    phone: &str,
    message_type: &str,
) -> sqlx::Result<Option<Uuid>> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        r"
        INSERT INTO inbound_messages (id, wa_message_id, phone, message_type)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (wa_message_id) DO NOTHING
        RETURNING id
        ",
    )
    .bind(Uuid::now_v7())
    .bind(wa_message_id)
    .bind(phone)
    .bind(message_type)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.0))
}

/// Store the processing outcome of a logged message.
pub async fn update_inbound_status(
    pool: &PgPool,
    id: Uuid,
    status: InboundStatus,
    error: Option<&str>,
) -> sqlx::Result<()> {
    sqlx::query(
        r"
        UPDATE inbound_messages
        SET status = $2, error = $3, updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id)
    .bind(status.as_str())
    .bind(error)
    .execute(pool)
    .await?;

    Ok(())
}

/// Look up a logged message by provider message ID.
pub async fn find_inbound_message(
    pool: &PgPool,
    wa_message_id: &str,
) -> sqlx::Result<Option<InboundMessageRecord>> {
    sqlx::query_as::<_, InboundMessageRecord>(
        r"
        SELECT id, wa_message_id, phone, message_type, status, error, received_at, updated_at
        FROM inbound_messages
        WHERE wa_message_id = $1
        ",
    )
    .bind(wa_message_id)
    .fetch_optional(pool)
    .await
}
