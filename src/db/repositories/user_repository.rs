use crate::db::connection::DbPool;
use crate::db::models::User;
use sqlx::Error;
use uuid::Uuid;

pub async fn get_user(pool: &DbPool, user_id: Uuid) -> Result<Option<User>, Error> {
    let row = sqlx::query_as::<_, User>(
        "SELECT id, university_id, full_name, user_type FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
