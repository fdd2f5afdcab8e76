//! Per-student conflict checking against fixed weekly schedules and confirmed
//! quizzes. All checks run over a snapshot batch-fetched once per section, so
//! evaluation is pure and does not touch the database.

use crate::db::connection::DbPool;
use crate::db::repositories::section_repository;
use chrono::{Datelike, NaiveDate};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

pub const REGULAR_PERIOD_MAX: i32 = 15;
/// Periods 9 and up run online by standing convention, independent of the
/// stored per-period flag.
pub const ONLINE_PERIOD_THRESHOLD: i32 = 9;
pub const MAX_QUIZZES_PER_DAY: usize = 2;

/// 0 = Sunday .. 6 = Saturday, matching the schedules table encoding.
pub fn day_of_week(date: NaiveDate) -> i32 {
    date.weekday().num_days_from_sunday() as i32
}

/// One student's commitments: recurring weekly class slots plus confirmed
/// quiz slots on the dates under consideration.
#[derive(Debug, Clone)]
pub struct StudentCommitments {
    pub student_id: Uuid,
    pub university_id: String,
    weekly: HashSet<(i32, i32)>,
    quiz_slots: HashSet<(NaiveDate, i32)>,
}

impl StudentCommitments {
    pub fn new(student_id: Uuid, university_id: impl Into<String>) -> Self {
        StudentCommitments {
            student_id,
            university_id: university_id.into(),
            weekly: HashSet::new(),
            quiz_slots: HashSet::new(),
        }
    }

    pub fn add_weekly_slot(&mut self, day_of_week: i32, period_number: i32) {
        self.weekly.insert((day_of_week, period_number));
    }

    pub fn add_quiz_slot(&mut self, date: NaiveDate, period_number: i32) {
        self.quiz_slots.insert((date, period_number));
    }

    pub fn has_class(&self, date: NaiveDate, period_number: i32) -> bool {
        self.weekly.contains(&(day_of_week(date), period_number))
    }

    pub fn has_quiz_at(&self, date: NaiveDate, period_number: i32) -> bool {
        self.quiz_slots.contains(&(date, period_number))
    }

    pub fn quiz_count_on_date(&self, date: NaiveDate) -> usize {
        self.quiz_slots.iter().filter(|(d, _)| *d == date).count()
    }

    /// Free means no fixed class on that weekday/period and no confirmed quiz
    /// at that exact slot through any enrolled section.
    pub fn is_slot_free(&self, date: NaiveDate, period_number: i32) -> bool {
        !self.has_class(date, period_number) && !self.has_quiz_at(date, period_number)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictReason {
    SlotTaken,
    DailyLimit,
}

/// A validation failure naming the first student that could not take the slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotConflict {
    pub university_id: String,
    pub reason: ConflictReason,
}

impl fmt::Display for SlotConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason {
            ConflictReason::SlotTaken => write!(
                f,
                "Student {} already has a quiz scheduled at this time",
                self.university_id
            ),
            ConflictReason::DailyLimit => write!(
                f,
                "Student {} already has two quizzes on this date",
                self.university_id
            ),
        }
    }
}

/// Checks a candidate (date, period) against every student's confirmed
/// quizzes: exact-slot clash first, then the two-quizzes-per-day cap. The
/// first failing student short-circuits. The fixed weekly schedule is not
/// re-checked here; candidate options come from the common-slot finder.
pub fn validate_option(
    students: &[StudentCommitments],
    date: NaiveDate,
    period_number: i32,
) -> Result<(), SlotConflict> {
    for student in students {
        if student.has_quiz_at(date, period_number) {
            return Err(SlotConflict {
                university_id: student.university_id.clone(),
                reason: ConflictReason::SlotTaken,
            });
        }

        if student.quiz_count_on_date(date) >= MAX_QUIZZES_PER_DAY {
            return Err(SlotConflict {
                university_id: student.university_id.clone(),
                reason: ConflictReason::DailyLimit,
            });
        }
    }

    Ok(())
}

/// Batch-fetches every enrolled student's weekly slots, plus their quiz slots
/// on the given dates, in one query each.
pub async fn load_section_commitments(
    pool: &DbPool,
    section_id: Uuid,
    dates: &[NaiveDate],
) -> Result<Vec<StudentCommitments>, sqlx::Error> {
    let students = section_repository::list_students(pool, section_id).await?;
    if students.is_empty() {
        return Ok(Vec::new());
    }

    let student_ids: Vec<Uuid> = students.iter().map(|s| s.id).collect();

    let mut commitments: Vec<StudentCommitments> = students
        .iter()
        .map(|s| StudentCommitments::new(s.id, s.university_id.clone()))
        .collect();

    for (student_id, day, period) in
        section_repository::weekly_commitments(pool, &student_ids).await?
    {
        if let Some(c) = commitments.iter_mut().find(|c| c.student_id == student_id) {
            c.add_weekly_slot(day, period);
        }
    }

    for (student_id, date, period) in
        section_repository::quiz_commitments(pool, &student_ids, dates).await?
    {
        if let Some(c) = commitments.iter_mut().find(|c| c.student_id == student_id) {
            c.add_quiz_slot(date, period);
        }
    }

    Ok(commitments)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn student(university_id: &str) -> StudentCommitments {
        StudentCommitments::new(Uuid::new_v4(), university_id)
    }

    // 2025-03-02 is a Sunday.
    const SUNDAY: (i32, u32, u32) = (2025, 3, 2);

    #[test]
    fn fixed_schedule_blocks_the_matching_weekday() {
        let mut s = student("2101234");
        s.add_weekly_slot(0, 3); // Sundays, period 3

        let sunday = date(SUNDAY.0, SUNDAY.1, SUNDAY.2);
        let monday = date(2025, 3, 3);

        assert!(!s.is_slot_free(sunday, 3));
        assert!(s.is_slot_free(sunday, 4));
        assert!(s.is_slot_free(monday, 3));
    }

    #[test]
    fn confirmed_quiz_blocks_its_exact_slot_only() {
        let mut s = student("2101234");
        s.add_quiz_slot(date(2025, 3, 4), 5);

        assert!(!s.is_slot_free(date(2025, 3, 4), 5));
        assert!(s.is_slot_free(date(2025, 3, 4), 6));
        assert!(s.is_slot_free(date(2025, 3, 5), 5));
    }

    #[test]
    fn quiz_count_is_per_date() {
        let mut s = student("2101234");
        s.add_quiz_slot(date(2025, 3, 4), 2);
        s.add_quiz_slot(date(2025, 3, 4), 7);
        s.add_quiz_slot(date(2025, 3, 5), 2);

        assert_eq!(s.quiz_count_on_date(date(2025, 3, 4)), 2);
        assert_eq!(s.quiz_count_on_date(date(2025, 3, 5)), 1);
        assert_eq!(s.quiz_count_on_date(date(2025, 3, 6)), 0);
    }

    #[test]
    fn validate_accepts_a_free_slot() {
        let students = vec![student("2101234"), student("2105678")];
        assert!(validate_option(&students, date(2025, 3, 4), 3).is_ok());
    }

    #[test]
    fn validate_rejects_an_exact_slot_clash_naming_the_student() {
        let mut busy = student("2105678");
        busy.add_quiz_slot(date(2025, 3, 4), 3);
        let students = vec![student("2101234"), busy];

        let conflict = validate_option(&students, date(2025, 3, 4), 3).unwrap_err();
        assert_eq!(conflict.reason, ConflictReason::SlotTaken);
        assert_eq!(conflict.university_id, "2105678");
        assert_eq!(
            conflict.to_string(),
            "Student 2105678 already has a quiz scheduled at this time"
        );
    }

    #[test]
    fn validate_rejects_a_student_at_the_daily_cap() {
        let mut capped = student("2101234");
        capped.add_quiz_slot(date(2025, 3, 4), 1);
        capped.add_quiz_slot(date(2025, 3, 4), 2);

        let conflict = validate_option(&[capped], date(2025, 3, 4), 8).unwrap_err();
        assert_eq!(conflict.reason, ConflictReason::DailyLimit);
        assert_eq!(
            conflict.to_string(),
            "Student 2101234 already has two quizzes on this date"
        );
    }

    #[test]
    fn validate_reports_the_first_failing_student() {
        let mut first = student("2100001");
        first.add_quiz_slot(date(2025, 3, 4), 3);
        let mut second = student("2100002");
        second.add_quiz_slot(date(2025, 3, 4), 3);

        let conflict = validate_option(&[first, second], date(2025, 3, 4), 3).unwrap_err();
        assert_eq!(conflict.university_id, "2100001");
    }

    #[test]
    fn exact_clash_is_reported_before_the_daily_cap() {
        // A student with two quizzes, one of them at the candidate slot:
        // the slot clash is the more specific reason.
        let mut s = student("2101234");
        s.add_quiz_slot(date(2025, 3, 4), 3);
        s.add_quiz_slot(date(2025, 3, 4), 7);

        let conflict = validate_option(&[s], date(2025, 3, 4), 3).unwrap_err();
        assert_eq!(conflict.reason, ConflictReason::SlotTaken);
    }
}
