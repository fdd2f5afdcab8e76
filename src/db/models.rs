use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub university_id: String,
    pub full_name: String,
    pub user_type: String,
}

impl User {
    pub fn is_faculty(&self) -> bool {
        self.user_type == "faculty"
    }
}

/// Globally shared time-slot reference data, never duplicated per section.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Period {
    pub number: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_online: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Section {
    pub id: Uuid,
    pub course_id: Uuid,
    pub section_number: String,
    pub activity_type: String,
    pub professor_id: Uuid,
}

/// Section joined with its course, for notification texts and API responses.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SectionWithCourse {
    pub id: Uuid,
    pub course_code: String,
    pub course_name: String,
    pub section_number: String,
    pub activity_type: String,
    pub professor_id: Uuid,
}

/// A confirmed, dated scheduling commitment. Created only at vote resolution
/// or early confirmation; never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Quiz {
    pub id: Uuid,
    pub section_id: Uuid,
    pub date: NaiveDate,
    pub period_number: i32,
    pub room: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vote {
    pub id: Uuid,
    pub section_id: Uuid,
    pub professor_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub duration_days: i32,
    pub ends_at: DateTime<Utc>,
    pub is_active: bool,
    pub selected_option_id: Option<Uuid>,
    pub room: Option<String>,
    pub needs_room: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteStatus {
    Active,
    ResolvedConfirmed,
    ResolvedNeedsRoom,
    Failed,
}

impl Vote {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.ends_at
    }

    /// Terminal states are derived from the stored flags; nothing ever moves
    /// a vote back to `Active`.
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

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VoteOption {
    pub id: Uuid,
    pub vote_id: Uuid,
    pub date: NaiveDate,
    pub period_number: i32,
    pub position: i32,
}

/// A vote option together with its ballot count, in creation order.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OptionTally {
    pub id: Uuid,
    pub vote_id: Uuid,
    pub date: NaiveDate,
    pub period_number: i32,
    pub position: i32,
    pub ballots: i64,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StudentBallot {
    pub id: Uuid,
    pub vote_id: Uuid,
    pub student_id: Uuid,
    pub option_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    VoteCreated,
    VoteCompleted,
    VoteError,
    RoomNeeded,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::VoteCreated => "vote_created",
            NotificationKind::VoteCompleted => "vote_completed",
            NotificationKind::VoteError => "vote_error",
            NotificationKind::RoomNeeded => "room_needed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub sender_id: Uuid,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub section_id: Option<Uuid>,
    pub vote_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn vote(is_active: bool, selected: bool, needs_room: bool) -> Vote {
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

    #[test]
    fn status_is_derived_from_flags() {
        assert_eq!(vote(true, false, false).status(), VoteStatus::Active);
        assert_eq!(
            vote(false, true, false).status(),
            VoteStatus::ResolvedConfirmed
        );
        assert_eq!(
            vote(false, true, true).status(),
            VoteStatus::ResolvedNeedsRoom
        );
        assert_eq!(vote(false, false, true).status(), VoteStatus::Failed);
    }

    #[test]
    fn expiry_is_inclusive_of_the_deadline() {
        let v = vote(true, false, false);
        assert!(!v.is_expired(Utc.with_ymd_and_hms(2025, 3, 2, 11, 59, 59).unwrap()));
        assert!(v.is_expired(v.ends_at));
        assert!(v.is_expired(Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap()));
    }
}
