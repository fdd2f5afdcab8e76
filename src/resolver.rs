//! Automatic vote resolution at expiry: tally ballots, pick the winning
//! option, validate it against every student's commitments, and drive the
//! vote to a terminal state. The decision itself is a pure function over the
//! tallies and the section's commitment snapshot; the database work around it
//! commits atomically per vote.

use crate::availability::{self, StudentCommitments};
use crate::db::connection::DbPool;
use crate::db::models::{NotificationKind, OptionTally, Vote};
use crate::db::repositories::{
    notification_repository, period_repository, quiz_repository, section_repository,
    vote_repository,
};
use crate::error::ServiceError;
use crate::votes::vote_completed_message;
use chrono::Utc;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A winning option validated and the vote already had a room: the quiz
    /// was created.
    Confirmed { option_id: Uuid },
    /// A winning option validated but no room is assigned yet; quiz creation
    /// is deferred and the proposer was asked for a room.
    NeedsRoom { option_id: Uuid },
    /// Every top-voted option conflicted for some student.
    Failed { reason: String },
    /// The vote has no options; nothing to resolve, left untouched.
    Skipped,
    /// The vote was already in a terminal state; resolution is a no-op.
    AlreadyResolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Index into the tally slice of the first top-voted option that
    /// validated cleanly.
    Winner(usize),
    /// No top-voted option survived validation; carries the reason from the
    /// last option attempted.
    NoneValid { last_reason: String },
    NoOptions,
}

/// Picks the option to confirm. The tie set is every option at the maximum
/// ballot count, tried in creation order; the first that validates wins.
/// Deterministic by construction: no randomness, no re-ordering.
pub fn select_option(tallies: &[OptionTally], students: &[StudentCommitments]) -> Selection {
    let Some(max_ballots) = tallies.iter().map(|t| t.ballots).max() else {
        return Selection::NoOptions;
    };

    let mut last_reason = None;
    for (index, tally) in tallies.iter().enumerate() {
        if tally.ballots != max_ballots {
            continue;
        }
        match availability::validate_option(students, tally.date, tally.period_number) {
            Ok(()) => return Selection::Winner(index),
            Err(conflict) => last_reason = Some(conflict.to_string()),
        }
    }

    Selection::NoneValid {
        last_reason: last_reason.unwrap_or_else(|| "No valid option".to_string()),
    }
}

/// Terminal votes short-circuit resolution before any tallying or mutation.
/// Combined with the row lock in `resolve_vote` this is what makes a second
/// trigger firing a no-op.
fn resolution_gate(vote: &Vote) -> Option<Outcome> {
    if vote.is_active {
        None
    } else {
        Some(Outcome::AlreadyResolved)
    }
}

/// Resolves one vote. Idempotent: the vote row is locked and re-checked
/// inside the transaction, so a vote that already reached a terminal state is
/// never re-processed even if the trigger fires again.
pub async fn resolve_vote(pool: &DbPool, vote_id: Uuid) -> Result<Outcome, ServiceError> {
    let mut tx = pool.begin().await?;

    let vote = vote_repository::get_vote_for_update(&mut tx, vote_id)
        .await?
        .ok_or(ServiceError::VoteNotFound)?;

    if let Some(outcome) = resolution_gate(&vote) {
        return Ok(outcome);
    }

    let tallies = vote_repository::tally_options(&mut *tx, vote_id).await?;
    if tallies.is_empty() {
        return Ok(Outcome::Skipped);
    }

    let dates: Vec<_> = tallies.iter().map(|t| t.date).collect();
    let students = availability::load_section_commitments(pool, vote.section_id, &dates).await?;

    let section = section_repository::get_section_with_course(pool, vote.section_id)
        .await?
        .ok_or(ServiceError::SectionNotFound)?;

    let outcome = match select_option(&tallies, &students) {
        Selection::NoOptions => return Ok(Outcome::Skipped),
        Selection::Winner(index) => {
            let winner = &tallies[index];

            if let Some(room) = vote.room.as_deref() {
                vote_repository::mark_resolved(&mut tx, vote.id, Some(winner.id), None, false)
                    .await?;
                quiz_repository::create_quiz(
                    &mut tx,
                    vote.section_id,
                    winner.date,
                    winner.period_number,
                    room,
                )
                .await?;

                let period = period_repository::get_period(pool, winner.period_number)
                    .await?
                    .ok_or_else(|| {
                        ServiceError::DatabaseError(format!(
                            "period {} missing",
                            winner.period_number
                        ))
                    })?;
                let message =
                    vote_completed_message(&section.course_code, winner.date, &period, room);
                let enrolled = section_repository::list_students(pool, vote.section_id).await?;
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

                Outcome::Confirmed { option_id: winner.id }
            } else {
                vote_repository::mark_resolved(&mut tx, vote.id, Some(winner.id), None, true)
                    .await?;
                notification_repository::notify(
                    &mut tx,
                    vote.professor_id,
                    vote.professor_id,
                    NotificationKind::RoomNeeded,
                    "Room Assignment Needed",
                    &format!(
                        "Please assign a room for the quiz in {}",
                        section.course_code
                    ),
                    Some(vote.section_id),
                    Some(vote.id),
                )
                .await?;

                Outcome::NeedsRoom { option_id: winner.id }
            }
        }
        Selection::NoneValid { last_reason } => {
            vote_repository::mark_resolved(&mut tx, vote.id, None, None, true).await?;
            notification_repository::notify(
                &mut tx,
                vote.professor_id,
                vote.professor_id,
                NotificationKind::VoteError,
                "Vote Completion Failed",
                &format!(
                    "Vote for {} could not be automatically completed: {}",
                    section.course_code, last_reason
                ),
                Some(vote.section_id),
                Some(vote.id),
            )
            .await?;

            Outcome::Failed { reason: last_reason }
        }
    };

    tx.commit().await?;

    Ok(outcome)
}

/// Resolves every expired, still-active vote. Each vote is handled
/// independently: an infrastructure failure is logged and leaves that vote
/// active for the next run instead of aborting the batch or marking it
/// failed.
pub async fn resolve_due_votes(pool: &DbPool) {
    let due = match vote_repository::list_expired_active(pool, Utc::now()).await {
        Ok(votes) => votes,
        Err(e) => {
            error!("Failed to list expired votes: {e}");
            return;
        }
    };

    for vote in due {
        match resolve_vote(pool, vote.id).await {
            Ok(outcome) => info!("Resolved vote {}: {:?}", vote.id, outcome),
            Err(e) => {
                error!("Vote {} left active for retry: {e}", vote.id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn vote_with_flags(is_active: bool, selected: bool, needs_room: bool) -> Vote {
        Vote {
            id: Uuid::new_v4(),
            section_id: Uuid::new_v4(),
            professor_id: Uuid::new_v4(),
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
            duration_days: 1,
            ends_at: Utc.with_ymd_and_hms(2025, 3, 2, 12, 0, 0).unwrap(),
            is_active,
            selected_option_id: selected.then(Uuid::new_v4),
            room: None,
            needs_room,
        }
    }

    fn tally(date_: NaiveDate, period: i32, position: i32, ballots: i64) -> OptionTally {
        OptionTally {
            id: Uuid::new_v4(),
            vote_id: Uuid::new_v4(),
            date: date_,
            period_number: period,
            position,
            ballots,
        }
    }

    fn student(university_id: &str) -> StudentCommitments {
        StudentCommitments::new(Uuid::new_v4(), university_id)
    }

    #[test]
    fn resolution_is_a_no_op_for_every_terminal_state() {
        // Confirmed, parked awaiting a room, and failed votes all gate out
        // before any tallying; only an active vote proceeds. A second trigger
        // firing on an already-resolved vote therefore changes nothing and
        // can never create a second quiz.
        let confirmed = vote_with_flags(false, true, false);
        let needs_room = vote_with_flags(false, true, true);
        let failed = vote_with_flags(false, false, true);
        for vote in [confirmed, needs_room, failed] {
            assert_eq!(resolution_gate(&vote), Some(Outcome::AlreadyResolved));
        }

        let active = vote_with_flags(true, false, false);
        assert_eq!(resolution_gate(&active), None);
    }

    #[test]
    fn the_clear_winner_is_selected() {
        // Two ballots for X, one for Y, one option unvoted.
        let tallies = vec![
            tally(date(2025, 3, 4), 3, 0, 2),
            tally(date(2025, 3, 5), 5, 1, 1),
            tally(date(2025, 3, 6), 7, 2, 0),
        ];
        let students = vec![student("2100001"), student("2100002")];

        assert_eq!(select_option(&tallies, &students), Selection::Winner(0));
    }

    #[test]
    fn a_conflicting_winner_falls_through_to_the_next_tied_option() {
        let tallies = vec![
            tally(date(2025, 3, 4), 3, 0, 2),
            tally(date(2025, 3, 5), 5, 1, 2),
        ];
        let mut busy = student("2100001");
        busy.add_quiz_slot(date(2025, 3, 4), 3);
        let students = vec![busy, student("2100002")];

        assert_eq!(select_option(&tallies, &students), Selection::Winner(1));
    }

    #[test]
    fn lower_ranked_options_are_not_considered() {
        // The runner-up would validate, but it is not in the tie set.
        let tallies = vec![
            tally(date(2025, 3, 4), 3, 0, 2),
            tally(date(2025, 3, 5), 5, 1, 1),
        ];
        let mut busy = student("2100001");
        busy.add_quiz_slot(date(2025, 3, 4), 3);

        let selection = select_option(&tallies, &[busy]);
        assert_eq!(
            selection,
            Selection::NoneValid {
                last_reason: "Student 2100001 already has a quiz scheduled at this time"
                    .to_string()
            }
        );
    }

    #[test]
    fn tie_break_follows_creation_order() {
        let a = tally(date(2025, 3, 4), 3, 0, 2);
        let b = tally(date(2025, 3, 5), 5, 1, 2);
        let students = vec![student("2100001")];

        // Both validate: the earlier-created option wins either way around.
        assert_eq!(
            select_option(&[a.clone(), b.clone()], &students),
            Selection::Winner(0)
        );

        let mut b_first = b;
        b_first.position = 0;
        let mut a_second = a;
        a_second.position = 1;
        assert_eq!(
            select_option(&[b_first, a_second], &students),
            Selection::Winner(0)
        );
    }

    #[test]
    fn selection_is_deterministic_across_repeated_runs() {
        let tallies = vec![
            tally(date(2025, 3, 4), 3, 0, 1),
            tally(date(2025, 3, 5), 5, 1, 1),
            tally(date(2025, 3, 6), 7, 2, 1),
        ];
        let students = vec![student("2100001")];

        let first = select_option(&tallies, &students);
        for _ in 0..10 {
            assert_eq!(select_option(&tallies, &students), first);
        }
    }

    #[test]
    fn no_options_yields_no_resolution() {
        assert_eq!(select_option(&[], &[student("2100001")]), Selection::NoOptions);
    }

    #[test]
    fn all_tied_options_failing_reports_the_last_attempted_reason() {
        let tallies = vec![
            tally(date(2025, 3, 4), 3, 0, 1),
            tally(date(2025, 3, 5), 5, 1, 1),
        ];
        let mut busy = student("2100001");
        busy.add_quiz_slot(date(2025, 3, 4), 3);
        let mut capped = student("2100002");
        capped.add_quiz_slot(date(2025, 3, 5), 1);
        capped.add_quiz_slot(date(2025, 3, 5), 2);

        let selection = select_option(&tallies, &[busy, capped]);
        assert_eq!(
            selection,
            Selection::NoneValid {
                last_reason: "Student 2100002 already has two quizzes on this date".to_string()
            }
        );
    }

    #[test]
    fn an_unvoted_poll_still_resolves_by_creation_order() {
        // Nobody voted: every option ties at zero and the first free one wins.
        let tallies = vec![
            tally(date(2025, 3, 4), 3, 0, 0),
            tally(date(2025, 3, 5), 5, 1, 0),
        ];
        let students = vec![student("2100001")];

        assert_eq!(select_option(&tallies, &students), Selection::Winner(0));
    }
}
