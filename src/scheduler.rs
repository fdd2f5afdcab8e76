//! Per-vote expiry triggers. Each active vote gets a spawned task that sleeps
//! until the deadline and then resolves it. Triggers are not durable across
//! restarts on their own, so startup re-arms every active vote and a periodic
//! sweep in `startup` catches anything both of those miss. Resolution is
//! idempotent, so a vote firing more than once is harmless.

use crate::db::connection::DbPool;
use crate::db::repositories::vote_repository;
use crate::error::ServiceError;
use crate::resolver;
use chrono::{DateTime, Utc};
use tokio::time::sleep;
use tracing::{error, info};
use uuid::Uuid;

/// Arms a one-shot resolution trigger for a vote. A deadline already in the
/// past fires immediately.
pub fn schedule_resolution(pool: DbPool, vote_id: Uuid, ends_at: DateTime<Utc>) {
    tokio::spawn(async move {
        let delay = (ends_at - Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);
        sleep(delay).await;

        match resolver::resolve_vote(&pool, vote_id).await {
            Ok(outcome) => info!("Vote {vote_id} resolution fired: {outcome:?}"),
            // Deleted before expiry is normal; anything else gets retried by
            // the sweep.
            Err(ServiceError::VoteNotFound) => {}
            Err(e) => error!("Vote {vote_id} resolution failed: {e}"),
        }
    });
}

/// Re-arms a trigger for every vote still active in the database. Called once
/// at startup so votes survive a process restart.
pub async fn restore_pending(pool: &DbPool) -> Result<(), ServiceError> {
    let active = vote_repository::list_active(pool).await?;
    let count = active.len();

    for vote in active {
        schedule_resolution(pool.clone(), vote.id, vote.ends_at);
    }

    if count > 0 {
        info!("Re-armed expiry triggers for {count} active votes");
    }

    Ok(())
}
