use crate::db::connection::DbPool;
use crate::db::models::Period;
use sqlx::Error;

/// Reference period table. Period 16 is the early-morning overflow slot and
/// is excluded from the regular scheduling range.
const DEFAULT_PERIODS: [(i32, &str, &str, bool); 16] = [
    (1, "07:00", "07:50", false),
    (2, "08:00", "08:50", false),
    (3, "09:00", "09:50", false),
    (4, "10:00", "10:50", false),
    (5, "11:00", "11:50", false),
    (6, "12:20", "13:10", false),
    (7, "13:20", "14:10", false),
    (8, "14:20", "15:10", false),
    (9, "15:30", "16:20", true),
    (10, "16:30", "17:20", true),
    (11, "17:30", "18:20", true),
    (12, "18:30", "19:20", true),
    (13, "19:30", "20:20", true),
    (14, "20:30", "21:20", true),
    (15, "21:30", "22:20", true),
    (16, "06:00", "06:50", false),
];

pub async fn seed_periods(pool: &DbPool) -> Result<(), Error> {
    for (number, start, end, is_online) in DEFAULT_PERIODS {
        sqlx::query(
            "INSERT INTO periods (number, start_time, end_time, is_online)
             VALUES ($1, $2::time, $3::time, $4)
             ON CONFLICT (number) DO NOTHING",
        )
        .bind(number)
        .bind(start)
        .bind(end)
        .bind(is_online)
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn get_period(pool: &DbPool, number: i32) -> Result<Option<Period>, Error> {
    let row = sqlx::query_as::<_, Period>(
        "SELECT number, start_time, end_time, is_online FROM periods WHERE number = $1",
    )
    .bind(number)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Periods in the regular 1..=15 range, ordered by number.
pub async fn list_regular_periods(pool: &DbPool, max_number: i32) -> Result<Vec<Period>, Error> {
    let rows = sqlx::query_as::<_, Period>(
        "SELECT number, start_time, end_time, is_online
         FROM periods WHERE number <= $1 ORDER BY number",
    )
    .bind(max_number)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
