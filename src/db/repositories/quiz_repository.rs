use crate::db::connection::DbPool;
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use sqlx::{Error, Postgres, Transaction};
use uuid::Uuid;

/// Inserts the confirmed quiz inside the caller's transaction so the quiz and
/// the vote state change commit or roll back together. The unique constraint
/// on (section, date, period) rejects a concurrent double-booking.
pub async fn create_quiz(
    tx: &mut Transaction<'_, Postgres>,
    section_id: Uuid,
    date: NaiveDate,
    period_number: i32,
    room: &str,
) -> Result<Uuid, Error> {
    let quiz_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO quizzes (id, section_id, date, period_number, room)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(quiz_id)
    .bind(section_id)
    .bind(date)
    .bind(period_number)
    .bind(room)
    .execute(&mut **tx)
    .await?;

    Ok(quiz_id)
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StudentQuizRow {
    pub course_code: String,
    pub course_name: String,
    pub section_number: String,
    pub date: NaiveDate,
    pub period_number: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub room: String,
}

pub async fn upcoming_for_student(
    pool: &DbPool,
    student_id: Uuid,
    from: NaiveDate,
) -> Result<Vec<StudentQuizRow>, Error> {
    let rows = sqlx::query_as::<_, StudentQuizRow>(
        "SELECT c.code AS course_code, c.name AS course_name, s.section_number,
                q.date, q.period_number, p.start_time, p.end_time, q.room
         FROM quizzes q
         JOIN sections s ON s.id = q.section_id
         JOIN courses c ON c.id = s.course_id
         JOIN periods p ON p.number = q.period_number
         JOIN section_students ss ON ss.section_id = q.section_id
         WHERE ss.student_id = $1 AND q.date >= $2
         ORDER BY q.date, q.period_number",
    )
    .bind(student_id)
    .bind(from)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
