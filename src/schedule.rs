//! Common-slot finding: which of the day's regular periods are simultaneously
//! free for every student in a section.

use crate::actor::actor_id;
use crate::availability::{
    self, MAX_QUIZZES_PER_DAY, ONLINE_PERIOD_THRESHOLD, REGULAR_PERIOD_MAX, StudentCommitments,
};
use crate::db::models::Period;
use crate::db::repositories::{period_repository, quiz_repository, section_repository};
use crate::error::ServiceError;
use crate::startup::AppState;
use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct AvailablePeriod {
    pub period_number: i32,
    pub start_time: String,
    pub end_time: String,
    pub is_online: bool,
}

/// Periods in the regular range that every student can take on `date`.
///
/// If any student is already at the daily quiz cap the answer is empty no
/// matter the period, so that case exits before any per-period evaluation.
/// The `is_online` flag follows the period-number convention, not the stored
/// per-period flag, for output compatibility.
pub fn common_free_periods(
    periods: &[Period],
    students: &[StudentCommitments],
    date: NaiveDate,
) -> Vec<AvailablePeriod> {
    if students
        .iter()
        .any(|s| s.quiz_count_on_date(date) >= MAX_QUIZZES_PER_DAY)
    {
        return Vec::new();
    }

    periods
        .iter()
        .filter(|p| p.number <= REGULAR_PERIOD_MAX)
        .filter(|p| students.iter().all(|s| s.is_slot_free(date, p.number)))
        .map(|p| AvailablePeriod {
            period_number: p.number,
            start_time: p.start_time.format("%H:%M").to_string(),
            end_time: p.end_time.format("%H:%M").to_string(),
            is_online: p.number >= ONLINE_PERIOD_THRESHOLD,
        })
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct CommonPeriodsQuery {
    pub date: NaiveDate,
}

/// Get the common free periods for a section on a date (section owner only)
pub async fn common_periods(
    Extension(app_state): Extension<AppState>,
    headers: HeaderMap,
    Path(section_id): Path<Uuid>,
    Query(query): Query<CommonPeriodsQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let user_id = actor_id(&headers)?;

    let section = section_repository::get_section(&app_state.db, section_id)
        .await?
        .ok_or(ServiceError::SectionNotFound)?;

    if section.professor_id != user_id {
        return Err(ServiceError::NotAuthorized);
    }

    let students =
        availability::load_section_commitments(&app_state.db, section_id, &[query.date]).await?;
    if students.is_empty() {
        return Err(ServiceError::EmptySection);
    }

    let periods = period_repository::list_regular_periods(&app_state.db, REGULAR_PERIOD_MAX).await?;
    let available = common_free_periods(&periods, &students, query.date);

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "data": available
        })),
    ))
}

/// Get the acting student's upcoming confirmed quizzes
pub async fn student_quizzes(
    Extension(app_state): Extension<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ServiceError> {
    let user_id = actor_id(&headers)?;

    let today = Utc::now().date_naive();
    let quizzes = quiz_repository::upcoming_for_student(&app_state.db, user_id, today).await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "success",
            "quizzes": quizzes
        })),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn period(number: i32, start: &str, end: &str, is_online: bool) -> Period {
        Period {
            number,
            start_time: NaiveTime::parse_from_str(start, "%H:%M").unwrap(),
            end_time: NaiveTime::parse_from_str(end, "%H:%M").unwrap(),
            is_online,
        }
    }

    fn periods() -> Vec<Period> {
        let mut out = Vec::new();
        for n in 1..=16 {
            let start = NaiveTime::from_hms_opt(6 + n as u32, 0, 0).unwrap();
            let end = NaiveTime::from_hms_opt(6 + n as u32, 50, 0).unwrap();
            out.push(Period {
                number: n,
                start_time: start,
                end_time: end,
                is_online: n >= 9,
            });
        }
        out
    }

    fn student(university_id: &str) -> StudentCommitments {
        StudentCommitments::new(Uuid::new_v4(), university_id)
    }

    #[test]
    fn the_overflow_period_is_never_offered() {
        let found = common_free_periods(&periods(), &[student("2101234")], date(2025, 3, 2));
        assert_eq!(found.len(), 15);
        assert!(found.iter().all(|p| p.period_number <= 15));
    }

    #[test]
    fn busy_periods_are_excluded_for_any_student() {
        // 2025-03-02 is a Sunday.
        let sunday = date(2025, 3, 2);
        let mut a = student("2100001");
        a.add_weekly_slot(0, 3);
        let mut b = student("2100002");
        b.add_quiz_slot(sunday, 7);

        let found = common_free_periods(&periods(), &[a, b], sunday);
        let numbers: Vec<i32> = found.iter().map(|p| p.period_number).collect();
        assert!(!numbers.contains(&3));
        assert!(!numbers.contains(&7));
        assert_eq!(numbers.len(), 13);
    }

    #[test]
    fn a_student_at_the_daily_cap_empties_the_whole_day() {
        let day = date(2025, 3, 4);
        let mut capped = student("2100001");
        capped.add_quiz_slot(day, 1);
        capped.add_quiz_slot(day, 2);
        let free = student("2100002");

        assert!(common_free_periods(&periods(), &[free, capped], day).is_empty());
    }

    #[test]
    fn the_cap_counts_per_date_not_across_dates() {
        let mut s = student("2100001");
        s.add_quiz_slot(date(2025, 3, 4), 1);
        s.add_quiz_slot(date(2025, 3, 5), 2);

        let found = common_free_periods(&periods(), &[s], date(2025, 3, 6));
        assert_eq!(found.len(), 15);
    }

    #[test]
    fn online_flag_follows_the_period_number_convention() {
        // Stored flags disagree with the convention on purpose.
        let odd = vec![
            period(8, "14:20", "15:10", true),
            period(9, "15:30", "16:20", false),
        ];

        let found = common_free_periods(&odd, &[student("2101234")], date(2025, 3, 2));
        assert_eq!(found.len(), 2);
        assert!(!found[0].is_online);
        assert!(found[1].is_online);
    }

    #[test]
    fn times_are_rendered_as_hours_and_minutes() {
        let one = vec![period(6, "12:20", "13:10", false)];
        let found = common_free_periods(&one, &[student("2101234")], date(2025, 3, 2));
        assert_eq!(found[0].start_time, "12:20");
        assert_eq!(found[0].end_time, "13:10");
    }
}
