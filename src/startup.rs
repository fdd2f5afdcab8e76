use crate::db::connection::DbPool;
use crate::resolver;
use tokio::time::{interval, Duration};

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
}

impl AppState {
    /// Builds the shared state and starts the resolution sweep: a periodic
    /// pass over expired votes whose per-vote trigger was lost (restart races,
    /// clock skew). The sweep and the triggers are both safe to fire on the
    /// same vote.
    pub async fn new(db: DbPool) -> Self {
        let db_clone = db.clone();
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                resolver::resolve_due_votes(&db_clone).await;
            }
        });

        AppState { db }
    }
}
