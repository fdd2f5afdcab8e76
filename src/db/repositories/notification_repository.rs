use crate::db::connection::DbPool;
use crate::db::models::{Notification, NotificationKind};
use sqlx::{Error, Postgres, Transaction};
use uuid::Uuid;

/// Fire-and-forget from the caller's perspective, but written inside the same
/// transaction as the state change it reports: a vote can never commit as
/// resolved without its notifications.
#[allow(clippy::too_many_arguments)]
pub async fn notify(
    tx: &mut Transaction<'_, Postgres>,
    recipient_id: Uuid,
    sender_id: Uuid,
    kind: NotificationKind,
    title: &str,
    message: &str,
    section_id: Option<Uuid>,
    vote_id: Option<Uuid>,
) -> Result<(), Error> {
    let notification_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO notifications
         (id, recipient_id, sender_id, notification_type, title, message, section_id, vote_id)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(notification_id)
    .bind(recipient_id)
    .bind(sender_id)
    .bind(kind.as_str())
    .bind(title)
    .bind(message)
    .bind(section_id)
    .bind(vote_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn list_for_user(pool: &DbPool, user_id: Uuid) -> Result<Vec<Notification>, Error> {
    let rows = sqlx::query_as::<_, Notification>(
        "SELECT id, recipient_id, sender_id, notification_type, title, message,
                section_id, vote_id, is_read, created_at
         FROM notifications
         WHERE recipient_id = $1
         ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns false when the notification does not exist or belongs to someone
/// else; the recipient check is part of the WHERE clause on purpose.
pub async fn mark_read(pool: &DbPool, notification_id: Uuid, user_id: Uuid) -> Result<bool, Error> {
    let result = sqlx::query(
        "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND recipient_id = $2",
    )
    .bind(notification_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn mark_all_read(pool: &DbPool, user_id: Uuid) -> Result<u64, Error> {
    let result = sqlx::query(
        "UPDATE notifications SET is_read = TRUE WHERE recipient_id = $1 AND is_read = FALSE",
    )
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn unread_count(pool: &DbPool, user_id: Uuid) -> Result<i64, Error> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND is_read = FALSE",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}
