use crate::db::connection::DbPool;
use crate::db::models::{Section, SectionWithCourse, User};
use chrono::NaiveDate;
use sqlx::Error;
use uuid::Uuid;

pub async fn get_section(pool: &DbPool, section_id: Uuid) -> Result<Option<Section>, Error> {
    let row = sqlx::query_as::<_, Section>(
        "SELECT id, course_id, section_number, activity_type, professor_id
         FROM sections WHERE id = $1",
    )
    .bind(section_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn get_section_with_course(
    pool: &DbPool,
    section_id: Uuid,
) -> Result<Option<SectionWithCourse>, Error> {
    let row = sqlx::query_as::<_, SectionWithCourse>(
        "SELECT s.id, c.code AS course_code, c.name AS course_name,
                s.section_number, s.activity_type, s.professor_id
         FROM sections s
         JOIN courses c ON c.id = s.course_id
         WHERE s.id = $1",
    )
    .bind(section_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn list_students(pool: &DbPool, section_id: Uuid) -> Result<Vec<User>, Error> {
    let rows = sqlx::query_as::<_, User>(
        "SELECT u.id, u.university_id, u.full_name, u.user_type
         FROM users u
         JOIN section_students ss ON ss.student_id = u.id
         WHERE ss.section_id = $1
         ORDER BY u.university_id",
    )
    .bind(section_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn is_enrolled(pool: &DbPool, section_id: Uuid, student_id: Uuid) -> Result<bool, Error> {
    let row = sqlx::query(
        "SELECT 1 AS one FROM section_students WHERE section_id = $1 AND student_id = $2",
    )
    .bind(section_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.is_some())
}

/// Every recurring weekly slot committed by any of the given students, across
/// all sections they are enrolled in. Fetched in one pass so availability
/// checks run in memory instead of one query per student per period.
pub async fn weekly_commitments(
    pool: &DbPool,
    student_ids: &[Uuid],
) -> Result<Vec<(Uuid, i32, i32)>, Error> {
    let rows = sqlx::query_as::<_, (Uuid, i32, i32)>(
        "SELECT ss.student_id, sc.day_of_week, sc.period_number
         FROM schedules sc
         JOIN section_students ss ON ss.section_id = sc.section_id
         WHERE ss.student_id = ANY($1)",
    )
    .bind(student_ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Confirmed quiz slots on the given dates for any of the given students,
/// through any section they belong to.
pub async fn quiz_commitments(
    pool: &DbPool,
    student_ids: &[Uuid],
    dates: &[NaiveDate],
) -> Result<Vec<(Uuid, NaiveDate, i32)>, Error> {
    let rows = sqlx::query_as::<_, (Uuid, NaiveDate, i32)>(
        "SELECT ss.student_id, q.date, q.period_number
         FROM quizzes q
         JOIN section_students ss ON ss.section_id = q.section_id
         WHERE ss.student_id = ANY($1) AND q.date = ANY($2)",
    )
    .bind(student_ids)
    .bind(dates)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
