use crate::db::connection::DbPool;
use crate::db::models::{OptionTally, User, Vote, VoteOption, VoteStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{Error, PgExecutor, Postgres, Transaction};
use uuid::Uuid;

const VOTE_COLUMNS: &str = "id, section_id, professor_id, created_at, duration_days, ends_at, \
                            is_active, selected_option_id, room, needs_room";

pub async fn insert_vote(
    tx: &mut Transaction<'_, Postgres>,
    vote_id: Uuid,
    section_id: Uuid,
    professor_id: Uuid,
    duration_days: i32,
    ends_at: DateTime<Utc>,
) -> Result<(), Error> {
    sqlx::query(
        "INSERT INTO votes (id, section_id, professor_id, duration_days, ends_at, is_active)
         VALUES ($1, $2, $3, $4, $5, TRUE)",
    )
    .bind(vote_id)
    .bind(section_id)
    .bind(professor_id)
    .bind(duration_days)
    .bind(ends_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn insert_option(
    tx: &mut Transaction<'_, Postgres>,
    vote_id: Uuid,
    date: NaiveDate,
    period_number: i32,
    position: i32,
) -> Result<Uuid, Error> {
    let option_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO vote_options (id, vote_id, date, period_number, position)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(option_id)
    .bind(vote_id)
    .bind(date)
    .bind(period_number)
    .bind(position)
    .execute(&mut **tx)
    .await?;

    Ok(option_id)
}

pub async fn get_vote(pool: &DbPool, vote_id: Uuid) -> Result<Option<Vote>, Error> {
    let row = sqlx::query_as::<_, Vote>(&format!(
        "SELECT {VOTE_COLUMNS} FROM votes WHERE id = $1"
    ))
    .bind(vote_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Row-locked fetch used by the resolver so two trigger firings cannot both
/// see the vote as active.
pub async fn get_vote_for_update(
    tx: &mut Transaction<'_, Postgres>,
    vote_id: Uuid,
) -> Result<Option<Vote>, Error> {
    let row = sqlx::query_as::<_, Vote>(&format!(
        "SELECT {VOTE_COLUMNS} FROM votes WHERE id = $1 FOR UPDATE"
    ))
    .bind(vote_id)
    .fetch_optional(&mut **tx)
    .await?;

    Ok(row)
}

pub async fn get_option(pool: &DbPool, option_id: Uuid) -> Result<Option<VoteOption>, Error> {
    let row = sqlx::query_as::<_, VoteOption>(
        "SELECT id, vote_id, date, period_number, position FROM vote_options WHERE id = $1",
    )
    .bind(option_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Ballot counts per option, in option creation order. Options nobody voted
/// for tally as zero.
pub async fn tally_options<'e, E: PgExecutor<'e>>(
    executor: E,
    vote_id: Uuid,
) -> Result<Vec<OptionTally>, Error> {
    let rows = sqlx::query_as::<_, OptionTally>(
        "SELECT vo.id, vo.vote_id, vo.date, vo.period_number, vo.position,
                COUNT(sb.id) AS ballots
         FROM vote_options vo
         LEFT JOIN student_ballots sb ON sb.option_id = vo.id
         WHERE vo.vote_id = $1
         GROUP BY vo.id, vo.vote_id, vo.date, vo.period_number, vo.position
         ORDER BY vo.position",
    )
    .bind(vote_id)
    .fetch_all(executor)
    .await?;

    Ok(rows)
}

pub async fn has_ballot(pool: &DbPool, vote_id: Uuid, student_id: Uuid) -> Result<bool, Error> {
    let row = sqlx::query("SELECT id FROM student_ballots WHERE vote_id = $1 AND student_id = $2")
        .bind(vote_id)
        .bind(student_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.is_some())
}

/// A duplicate cast surfaces as a unique violation on (vote_id, student_id);
/// the caller maps that to `AlreadyVoted`.
pub async fn insert_ballot(
    pool: &DbPool,
    vote_id: Uuid,
    student_id: Uuid,
    option_id: Uuid,
) -> Result<(), Error> {
    let ballot_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO student_ballots (id, vote_id, student_id, option_id)
         VALUES ($1, $2, $3, $4)",
    )
    .bind(ballot_id)
    .bind(vote_id)
    .bind(student_id)
    .bind(option_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Moves a vote out of `Active`. With a selected option and a room this is a
/// confirmation; with a selected option and `needs_room` the quiz is deferred;
/// with no selected option the vote failed. The room is only overwritten when
/// one is supplied.
pub async fn mark_resolved(
    tx: &mut Transaction<'_, Postgres>,
    vote_id: Uuid,
    selected_option_id: Option<Uuid>,
    room: Option<&str>,
    needs_room: bool,
) -> Result<(), Error> {
    sqlx::query(
        "UPDATE votes
         SET is_active = FALSE, selected_option_id = $2,
             room = COALESCE($3, room), needs_room = $4
         WHERE id = $1",
    )
    .bind(vote_id)
    .bind(selected_option_id)
    .bind(room)
    .bind(needs_room)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Cascades the vote's notifications, ballots, and options before removing
/// the vote row, all inside the caller's transaction.
pub async fn delete_vote(tx: &mut Transaction<'_, Postgres>, vote_id: Uuid) -> Result<(), Error> {
    sqlx::query("DELETE FROM notifications WHERE vote_id = $1")
        .bind(vote_id)
        .execute(&mut **tx)
        .await?;

    sqlx::query("DELETE FROM student_ballots WHERE vote_id = $1")
        .bind(vote_id)
        .execute(&mut **tx)
        .await?;

    sqlx::query("DELETE FROM vote_options WHERE vote_id = $1")
        .bind(vote_id)
        .execute(&mut **tx)
        .await?;

    sqlx::query("DELETE FROM votes WHERE id = $1")
        .bind(vote_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

pub async fn list_expired_active(pool: &DbPool, now: DateTime<Utc>) -> Result<Vec<Vote>, Error> {
    let rows = sqlx::query_as::<_, Vote>(&format!(
        "SELECT {VOTE_COLUMNS} FROM votes WHERE is_active = TRUE AND ends_at <= $1"
    ))
    .bind(now)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn list_active(pool: &DbPool) -> Result<Vec<Vote>, Error> {
    let rows = sqlx::query_as::<_, Vote>(&format!(
        "SELECT {VOTE_COLUMNS} FROM votes WHERE is_active = TRUE"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// A vote joined with its section and course, as listed to users.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct VoteWithSection {
    pub id: Uuid,
    pub section_id: Uuid,
    pub course_code: String,
    pub course_name: String,
    pub section_number: String,
    pub professor_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_active: bool,
    pub selected_option_id: Option<Uuid>,
    pub room: Option<String>,
    pub needs_room: bool,
}

impl VoteWithSection {
    pub fn status(&self) -> VoteStatus {
        if self.is_active {
            VoteStatus::Active
        } else if self.selected_option_id.is_some() {
            if self.needs_room {
                VoteStatus::ResolvedNeedsRoom
            } else {
                VoteStatus::ResolvedConfirmed
            }
        } else {
            VoteStatus::Failed
        }
    }
}

const VOTE_SECTION_COLUMNS: &str =
    "v.id, v.section_id, c.code AS course_code, c.name AS course_name, s.section_number, \
     v.professor_id, v.created_at, v.ends_at, v.is_active, v.selected_option_id, v.room, \
     v.needs_room";

pub async fn list_for_professor(
    pool: &DbPool,
    professor_id: Uuid,
    is_active: bool,
) -> Result<Vec<VoteWithSection>, Error> {
    let rows = sqlx::query_as::<_, VoteWithSection>(&format!(
        "SELECT {VOTE_SECTION_COLUMNS}
         FROM votes v
         JOIN sections s ON s.id = v.section_id
         JOIN courses c ON c.id = s.course_id
         WHERE v.professor_id = $1 AND v.is_active = $2
         ORDER BY v.created_at DESC"
    ))
    .bind(professor_id)
    .bind(is_active)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn list_for_student(
    pool: &DbPool,
    student_id: Uuid,
    is_active: bool,
) -> Result<Vec<VoteWithSection>, Error> {
    let rows = sqlx::query_as::<_, VoteWithSection>(&format!(
        "SELECT {VOTE_SECTION_COLUMNS}
         FROM votes v
         JOIN sections s ON s.id = v.section_id
         JOIN courses c ON c.id = s.course_id
         JOIN section_students ss ON ss.section_id = v.section_id
         WHERE ss.student_id = $1 AND v.is_active = $2
         ORDER BY v.created_at DESC"
    ))
    .bind(student_id)
    .bind(is_active)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn voters_for_option(pool: &DbPool, option_id: Uuid) -> Result<Vec<User>, Error> {
    let rows = sqlx::query_as::<_, User>(
        "SELECT u.id, u.university_id, u.full_name, u.user_type
         FROM users u
         JOIN student_ballots sb ON sb.student_id = u.id
         WHERE sb.option_id = $1
         ORDER BY u.university_id",
    )
    .bind(option_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
