//! # Session Scheduler
//!
//! Turns a weekly course definition into concrete calendar facts.
//!
//! ## Holidays Extend, They Never Shorten
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Course: Mondays from 2025-01-06, 10 paid sessions                      │
//! │                                                                         │
//! │  Jan 06  13  20  27  Feb 03  10  17  24  Mar 03  10  17                 │
//! │   ●     ●   ●   ●     ●     ●   ○   ●     ●     ●   ●                   │
//! │   1     2   3   4     5     6   H   7     8     9   10                  │
//! │                                                                         │
//! │  ● session   ○ holiday (2025-02-17)                                     │
//! │                                                                         │
//! │  Without holiday: end 2025-03-10   With holiday: end 2025-03-17         │
//! │  The child still gets all 10 sessions it paid for.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure Semantics
//! A course that cannot be scheduled yields [`NotComputable`] from
//! [`SessionScheduler::schedule`] and `0` from the counting functions. Callers
//! treat both as "withhold pricing".

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::error::NotComputable;
use crate::types::{CourseDefinition, ScheduleResult};
use crate::SCAN_SAFETY_FACTOR;

// =============================================================================
// Scheduler Trait
// =============================================================================

/// Computes end dates and session counts for weekly courses.
///
/// The counting methods have default implementations on top of
/// [`schedule`](SessionScheduler::schedule); implementors normally only
/// provide that one.
pub trait SessionScheduler: Send + Sync {
    /// Computes the calendar span of a course.
    fn schedule(&self, course: &CourseDefinition) -> Result<ScheduleResult, NotComputable>;

    /// Computes only the end date.
    fn end_date(&self, course: &CourseDefinition) -> Result<NaiveDate, NotComputable> {
        self.schedule(course).map(|result| result.end_date)
    }

    /// Re-derives the number of sessions between start and end date.
    ///
    /// Equals `total_paid_sessions` for every schedulable course. A different
    /// value means the course data is corrupt. Returns 0 when not schedulable.
    fn total_sessions(&self, course: &CourseDefinition) -> u32 {
        match (self.schedule(course), course.start_date, course.weekday) {
            (Ok(result), Some(start), Some(weekday)) => {
                count_sessions(course, weekday, start, result.end_date)
            }
            _ => 0,
        }
    }

    /// Counts sessions from `max(today, start_date)` through the end date.
    ///
    /// Always recomputed; never cached across days.
    fn remaining_sessions(&self, course: &CourseDefinition, today: NaiveDate) -> u32 {
        match (self.schedule(course), course.start_date, course.weekday) {
            (Ok(result), Some(start), Some(weekday)) => {
                let from = today.max(start);
                count_sessions(course, weekday, from, result.end_date)
            }
            _ => 0,
        }
    }
}

// =============================================================================
// Weekly Scheduler
// =============================================================================

/// The production scheduler.
///
/// `safety_factor` bounds the scan: at most
/// `(paid sessions + holidays on the weekday) * safety_factor` days are
/// examined before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklyScheduler {
    safety_factor: u32,
}

impl WeeklyScheduler {
    pub const fn new(safety_factor: u32) -> Self {
        WeeklyScheduler { safety_factor }
    }

    pub const fn safety_factor(&self) -> u32 {
        self.safety_factor
    }
}

impl Default for WeeklyScheduler {
    fn default() -> Self {
        WeeklyScheduler::new(SCAN_SAFETY_FACTOR)
    }
}

impl SessionScheduler for WeeklyScheduler {
    fn schedule(&self, course: &CourseDefinition) -> Result<ScheduleResult, NotComputable> {
        let start = course.start_date.ok_or(NotComputable::MissingStartDate)?;
        let weekday = course.weekday.ok_or(NotComputable::MissingWeekday)?;
        let paid = course.total_paid_sessions;
        if paid <= 0 {
            return Err(NotComputable::NoPaidSessions(paid));
        }

        // Holidays before the start can never be met by the scan.
        let holidays_on_weekday = course
            .holiday_dates
            .iter()
            .filter(|d| **d >= start && d.weekday() == weekday)
            .count() as i64;
        let limit_days = (paid + holidays_on_weekday).saturating_mul(self.safety_factor as i64);

        let mut date = first_on_or_after(start, weekday).ok_or(NotComputable::CalendarOverflow)?;
        let mut occurrences: u32 = 0;
        let mut sessions: u32 = 0;

        loop {
            if (date - start).num_days() >= limit_days {
                return Err(NotComputable::ScanLimitExceeded { limit_days });
            }

            occurrences += 1;
            if !course.is_holiday(date) {
                sessions += 1;
                if sessions as i64 == paid {
                    return Ok(ScheduleResult {
                        end_date: date,
                        total_occurrences_needed: occurrences,
                        sessions_counted: sessions,
                    });
                }
            }

            date = date
                .checked_add_signed(Duration::days(7))
                .ok_or(NotComputable::CalendarOverflow)?;
        }
    }
}

// =============================================================================
// Free Functions
// =============================================================================

/// Schedules a course with the default safety factor.
pub fn schedule_course(course: &CourseDefinition) -> Result<ScheduleResult, NotComputable> {
    WeeklyScheduler::default().schedule(course)
}

/// End date of a course, or why it has none.
pub fn calculate_end_date(course: &CourseDefinition) -> Result<NaiveDate, NotComputable> {
    WeeklyScheduler::default().end_date(course)
}

/// Sessions between start and end date (0 when not schedulable).
pub fn calculate_total_sessions(course: &CourseDefinition) -> u32 {
    WeeklyScheduler::default().total_sessions(course)
}

/// Sessions still ahead as of `today` (0 when not schedulable or over).
pub fn calculate_remaining_sessions(course: &CourseDefinition, today: NaiveDate) -> u32 {
    WeeklyScheduler::default().remaining_sessions(course, today)
}

/// Counts non-holiday occurrences of `weekday` in `from..=to`.
pub fn count_sessions(
    course: &CourseDefinition,
    weekday: Weekday,
    from: NaiveDate,
    to: NaiveDate,
) -> u32 {
    let Some(mut date) = first_on_or_after(from, weekday) else {
        return 0;
    };

    let mut count = 0;
    while date <= to {
        if !course.is_holiday(date) {
            count += 1;
        }
        match date.checked_add_signed(Duration::days(7)) {
            Some(next) => date = next,
            None => break,
        }
    }
    count
}

/// First date on or after `date` falling on `weekday`.
fn first_on_or_after(date: NaiveDate, weekday: Weekday) -> Option<NaiveDate> {
    let ahead = (7 + weekday.num_days_from_monday() as i64
        - date.weekday().num_days_from_monday() as i64)
        % 7;
    date.checked_add_signed(Duration::days(ahead))
}

// =============================================================================
// Unit Tests
// =============================================================================
