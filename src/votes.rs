//! Vote lifecycle operations: creation, ballot casting, early confirmation,
//! deletion, and the read-side queries. Each operation commits as a single
//! transaction, with its notifications inside.

use crate::actor::actor_id;
use crate::availability::{self, ONLINE_PERIOD_THRESHOLD};
use crate::db::models::{NotificationKind, Period};
use crate::db::repositories::{
    notification_repository, period_repository, quiz_repository, section_repository,
    user_repository, vote_repository,
};
use crate::error::{is_unique_violation, ServiceError};
use crate::scheduler;
use crate::startup::AppState;
use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

// Request DTOs
#[derive(Debug, Deserialize)]
pub struct VoteOptionRequest {
    pub date: NaiveDate,
    pub period_number: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateVoteRequest {
    pub section_id: Uuid,
    pub options: Vec<VoteOptionRequest>,
    #[serde(default = "default_duration")]
    pub duration_days: i32,
}

fn default_duration() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct CastBallotRequest {
    pub option_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmVoteRequest {
    pub option_id: Uuid,
    pub room: String,
}

/// Deadline for a vote opened at `now`. None when the duration pushes the
/// timestamp out of the representable range.
pub(crate) fn vote_deadline(now: DateTime<Utc>, duration_days: i32) -> Option<DateTime<Utc>> {
    now.checked_add_signed(Duration::days(duration_days as i64))
}

pub(crate) fn vote_completed_message(
    course_code: &str,
    date: NaiveDate,
    period: &Period,
    room: &str,
) -> String {
    let online_text = if period.number >= ONLINE_PERIOD_THRESHOLD {
        " (Online)"
    } else {
        ""
    };
    format!(
        "Quiz for {} has been scheduled:\nDate: {}\nTime: {} - {}\nRoom: {}{}",
        course_code,
        date.format("%A, %B %d"),
        period.start_time.format("%H:%M"),
        period.end_time.format("%H:%M"),
        room,
        online_text
    )
}

/// Create a vote with its options (section owner only). The vote, its
/// options, and the vote-created notifications commit atomically; the expiry
/// trigger is armed after the commit.
pub async fn create_vote(
    Extension(app_state): Extension<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateVoteRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let user_id = actor_id(&headers)?;

    let section = section_repository::get_section_with_course(&app_state.db, payload.section_id)
        .await?
        .ok_or(ServiceError::SectionNotFound)?;

    if section.professor_id != user_id {
        return Err(ServiceError::NotAuthorized);
    }

    if payload.duration_days < 1 {
        return Err(ServiceError::InvalidRequest(
            "Duration must be at least one day".to_string(),
        ));
    }

    if payload.options.is_empty() {
        return Err(ServiceError::InvalidRequest(
            "At least one option is required".to_string(),
        ));
    }

    for option in &payload.options {
        if period_repository::get_period(&app_state.db, option.period_number)
            .await?
            .is_none()
        {
            return Err(ServiceError::InvalidRequest(format!(
                "Unknown period {}",
                option.period_number
            )));
        }
    }

    let students = section_repository::list_students(&app_state.db, section.id).await?;

    let vote_id = Uuid::new_v4();
    let ends_at = vote_deadline(Utc::now(), payload.duration_days).ok_or_else(|| {
        ServiceError::InvalidRequest("Duration is out of range".to_string())
    })?;

    let mut tx = app_state.db.begin().await?;

    vote_repository::insert_vote(
        &mut tx,
        vote_id,
        section.id,
        user_id,
        payload.duration_days,
        ends_at,
    )
    .await?;

    for (position, option) in payload.options.iter().enumerate() {
        vote_repository::insert_option(
            &mut tx,
            vote_id,
            option.date,
            option.period_number,
            position as i32,
        )
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::InvalidRequest("Duplicate options in vote".to_string())
            } else {
                e.into()
            }
        })?;
    }

    let message = format!(
        "A new vote has been created for {} - Section {}",
        section.course_code, section.section_number
    );
    for student in &students {
        notification_repository::notify(
            &mut tx,
            student.id,
            user_id,
            NotificationKind::VoteCreated,
            "New Quiz Vote Available",
            &message,
            Some(section.id),
            Some(vote_id),
        )
        .await?;
    }

    tx.commit().await?;

    scheduler::schedule_resolution(app_state.db.clone(), vote_id, ends_at);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "message": "Vote created successfully",
            "vote_id": vote_id,
            "ends_at": ends_at
        })),
    ))
}

/// Cast a ballot on an active vote (enrolled students only, one per student)
pub async fn cast_ballot(
    Extension(app_state): Extension<AppState>,
    headers: HeaderMap,
    Path(vote_id): Path<Uuid>,
    Json(payload): Json<CastBallotRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let user_id = actor_id(&headers)?;

    let vote = vote_repository::get_vote(&app_state.db, vote_id)
        .await?
        .ok_or(ServiceError::VoteNotFound)?;

    if !vote.is_active || vote.is_expired(Utc::now()) {
        return Err(ServiceError::VoteNotActive);
    }

    if !section_repository::is_enrolled(&app_state.db, vote.section_id, user_id).await? {
        return Err(ServiceError::NotEnrolled);
    }

    if vote_repository::has_ballot(&app_state.db, vote_id, user_id).await? {
        return Err(ServiceError::AlreadyVoted);
    }

    let option = vote_repository::get_option(&app_state.db, payload.option_id)
        .await?
        .filter(|option| option.vote_id == vote.id)
        .ok_or(ServiceError::InvalidOption)?;

    // The unique constraint on (vote, student) is the real double-vote guard;
    // the has_ballot check above only gives the friendlier common-case error.
    vote_repository::insert_ballot(&app_state.db, vote_id, user_id, option.id)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::AlreadyVoted
            } else {
                e.into()
            }
        })?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "message": "Vote cast successfully"
        })),
    ))
}

/// Confirm a still-active vote manually with a room (proposer only). Runs the
/// same conflict validation as automatic resolution; the vote update, quiz
/// row, and completion notifications commit or roll back together.
pub async fn confirm_vote(
    Extension(app_state): Extension<AppState>,
    headers: HeaderMap,
    Path(vote_id): Path<Uuid>,
    Json(payload): Json<ConfirmVoteRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let user_id = actor_id(&headers)?;

    let vote = vote_repository::get_vote(&app_state.db, vote_id)
        .await?
        .ok_or(ServiceError::VoteNotFound)?;

    if vote.professor_id != user_id {
        return Err(ServiceError::NotAuthorized);
    }

    if !vote.is_active {
        return Err(ServiceError::VoteNotActive);
    }

    let room = payload.room.trim();
    if room.is_empty() {
        return Err(ServiceError::InvalidRequest(
            "Room number is required".to_string(),
        ));
    }

    let option = vote_repository::get_option(&app_state.db, payload.option_id)
        .await?
        .filter(|option| option.vote_id == vote.id)
        .ok_or(ServiceError::InvalidOption)?;

    let students =
        availability::load_section_commitments(&app_state.db, vote.section_id, &[option.date])
            .await?;
    availability::validate_option(&students, option.date, option.period_number)
        .map_err(|conflict| ServiceError::Conflict(conflict.to_string()))?;

    let section = section_repository::get_section_with_course(&app_state.db, vote.section_id)
        .await?
        .ok_or(ServiceError::SectionNotFound)?;
    let period = period_repository::get_period(&app_state.db, option.period_number)
        .await?
        .ok_or(ServiceError::InvalidOption)?;

    let mut tx = app_state.db.begin().await?;

    vote_repository::mark_resolved(&mut tx, vote.id, Some(option.id), Some(room), false).await?;

    quiz_repository::create_quiz(&mut tx, vote.section_id, option.date, option.period_number, room)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Conflict(
                    "This section already has a quiz at the selected time".to_string(),
                )
            } else {
                e.into()
            }
        })?;

    let message = vote_completed_message(&section.course_code, option.date, &period, room);
    let enrolled = section_repository::list_students(&app_state.db, vote.section_id).await?;
    for student in &enrolled {
        notification_repository::notify(
            &mut tx,
            student.id,
            vote.professor_id,
            NotificationKind::VoteCompleted,
            "Quiz Time Confirmed",
            &message,
            Some(vote.section_id),
            Some(vote.id),
        )
        .await?;
    }

    tx.commit().await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "message": "Quiz time confirmed successfully"
        })),
    ))
}

/// Delete a vote with its options, ballots, and notifications (proposer only)
pub async fn delete_vote(
    Extension(app_state): Extension<AppState>,
    headers: HeaderMap,
    Path(vote_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let user_id = actor_id(&headers)?;

    let vote = vote_repository::get_vote(&app_state.db, vote_id)
        .await?
        .ok_or(ServiceError::VoteNotFound)?;

    if vote.professor_id != user_id {
        return Err(ServiceError::NotAuthorized);
    }

    let mut tx = app_state.db.begin().await?;
    vote_repository::delete_vote(&mut tx, vote.id).await?;
    tx.commit().await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "message": "Vote deleted successfully"
        })),
    ))
}

/// Per-option tallies and percentages. Voter identities are included only for
/// the proposer; enrolled students see the counts.
pub async fn vote_statistics(
    Extension(app_state): Extension<AppState>,
    headers: HeaderMap,
    Path(vote_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let user_id = actor_id(&headers)?;

    let vote = vote_repository::get_vote(&app_state.db, vote_id)
        .await?
        .ok_or(ServiceError::VoteNotFound)?;

    let is_proposer = vote.professor_id == user_id;
    if !is_proposer
        && !section_repository::is_enrolled(&app_state.db, vote.section_id, user_id).await?
    {
        return Err(ServiceError::NotAuthorized);
    }

    let tallies = vote_repository::tally_options(&app_state.db, vote_id).await?;
    let total_ballots: i64 = tallies.iter().map(|t| t.ballots).sum();

    let mut options_data = Vec::new();
    for tally in &tallies {
        let period = period_repository::get_period(&app_state.db, tally.period_number)
            .await?
            .ok_or(ServiceError::InvalidOption)?;

        let percentage = if total_ballots > 0 {
            (tally.ballots as f64 / total_ballots as f64 * 10000.0).round() / 100.0
        } else {
            0.0
        };

        let voters = if is_proposer {
            let rows = vote_repository::voters_for_option(&app_state.db, tally.id).await?;
            Some(
                rows.into_iter()
                    .map(|u| {
                        json!({
                            "id": u.id,
                            "name": u.full_name,
                            "university_id": u.university_id
                        })
                    })
                    .collect::<Vec<_>>(),
            )
        } else {
            None
        };

        options_data.push(json!({
            "option_id": tally.id,
            "date": tally.date,
            "period": {
                "number": period.number,
                "start_time": period.start_time.format("%H:%M").to_string(),
                "end_time": period.end_time.format("%H:%M").to_string(),
                "is_online": period.is_online
            },
            "ballots": tally.ballots,
            "percentage": percentage,
            "voters": voters
        }));
    }

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "vote_id": vote.id,
            "vote_status": vote.status(),
            "selected_option_id": vote.selected_option_id,
            "room": vote.room,
            "total_ballots": total_ballots,
            "options": options_data
        })),
    ))
}

/// Votes still accepting ballots, scoped to the actor
pub async fn active_votes(
    Extension(app_state): Extension<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    list_votes(app_state, headers, true).await
}

/// Resolved and failed votes, scoped to the actor
pub async fn completed_votes(
    Extension(app_state): Extension<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    list_votes(app_state, headers, false).await
}

async fn list_votes(
    app_state: AppState,
    headers: HeaderMap,
    is_active: bool,
) -> Result<impl IntoResponse, ServiceError> {
    let user_id = actor_id(&headers)?;

    let user = user_repository::get_user(&app_state.db, user_id)
        .await?
        .ok_or(ServiceError::UserNotFound)?;

    let votes = if user.is_faculty() {
        vote_repository::list_for_professor(&app_state.db, user_id, is_active).await?
    } else {
        vote_repository::list_for_student(&app_state.db, user_id, is_active).await?
    };

    let votes: Vec<_> = votes
        .iter()
        .map(|v| {
            json!({
                "id": v.id,
                "section_id": v.section_id,
                "course_code": v.course_code,
                "course_name": v.course_name,
                "section_number": v.section_number,
                "created_at": v.created_at,
                "ends_at": v.ends_at,
                "vote_status": v.status(),
                "selected_option_id": v.selected_option_id,
                "room": v.room,
                "needs_room": v.needs_room
            })
        })
        .collect();

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "votes": votes
        })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};

    #[test]
    fn deadline_is_duration_days_after_creation() {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(
            vote_deadline(now, 1),
            Some(Utc.with_ymd_and_hms(2025, 3, 2, 12, 0, 0).unwrap())
        );
        assert_eq!(
            vote_deadline(now, 7),
            Some(Utc.with_ymd_and_hms(2025, 3, 8, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn an_absurd_duration_is_rejected_instead_of_overflowing() {
        // i32::MAX days is a valid JSON payload; it must come back as None,
        // not panic inside the date arithmetic.
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        assert_eq!(vote_deadline(now, 2_000_000_000), None);
        assert_eq!(vote_deadline(now, i32::MAX), None);
    }

    #[test]
    fn completed_message_marks_online_periods() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        let in_person = Period {
            number: 3,
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(9, 50, 0).unwrap(),
            is_online: false,
        };
        let online = Period {
            number: 10,
            start_time: NaiveTime::from_hms_opt(16, 30, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(17, 20, 0).unwrap(),
            is_online: true,
        };

        let plain = vote_completed_message("CSE101", date, &in_person, "A-204");
        assert!(plain.contains("Room: A-204"));
        assert!(!plain.contains("(Online)"));

        let remote = vote_completed_message("CSE101", date, &online, "Zoom");
        assert!(remote.ends_with("(Online)"));
    }
}
