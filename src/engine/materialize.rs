use std::collections::HashSet;

use chrono::{Datelike, Duration, NaiveDate};
use ulid::Ulid;

use crate::limits::MAX_SEMESTER_DAYS;
use crate::model::*;

use super::EngineError;

pub(crate) fn validate_semester_range(start: NaiveDate, end: NaiveDate) -> Result<(), EngineError> {
    if end < start {
        return Err(EngineError::validation(
            "end_date",
            format!("end {end} is before start {start}"),
        ));
    }
    if (end - start).num_days() > MAX_SEMESTER_DAYS {
        return Err(EngineError::LimitExceeded("semester too long"));
    }
    Ok(())
}

/// Every date in `[start, end]` that falls on `day_of_week`, ascending.
pub fn occurrence_dates(
    day_of_week: DayOfWeek,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<NaiveDate>, EngineError> {
    validate_semester_range(start, end)?;
    let weekday = weekday_of(day_of_week).ok_or_else(|| {
        EngineError::validation("day_of_week", format!("{day_of_week} is outside 0..=6"))
    })?;

    let offset = (7 + weekday.num_days_from_monday() as i64
        - start.weekday().num_days_from_monday() as i64)
        % 7;
    let mut dates = Vec::new();
    let mut date = start + Duration::days(offset);
    while date <= end {
        dates.push(date);
        date += Duration::days(7);
    }
    Ok(dates)
}

/// What to change so a schedule's sessions match `dates`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RegenerationPlan {
    /// Scheduled sessions whose date is no longer an occurrence.
    pub removed: Vec<Ulid>,
    /// Occurrence dates with no session of any status yet.
    pub added: Vec<NaiveDate>,
}

impl RegenerationPlan {
    pub fn is_noop(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// Held and cancelled sessions are history: never removed, and their dates
/// are not filled again. Scheduled sessions already on a valid date are kept,
/// so running this twice on unchanged input yields an empty plan.
pub fn plan_regeneration<'a>(
    existing: impl IntoIterator<Item = &'a CourseSession>,
    dates: &[NaiveDate],
) -> RegenerationPlan {
    let wanted: HashSet<NaiveDate> = dates.iter().copied().collect();
    let mut covered = HashSet::new();
    let mut removed = Vec::new();

    for session in existing {
        match session.status {
            SessionStatus::Scheduled if !wanted.contains(&session.date) => {
                removed.push(session.id);
            }
            SessionStatus::Scheduled if !covered.insert(session.date) => {
                // duplicate scheduled row on one date
                removed.push(session.id);
            }
            SessionStatus::Scheduled => {}
            SessionStatus::Held | SessionStatus::Cancelled => {
                covered.insert(session.date);
            }
        }
    }

    let added = dates
        .iter()
        .copied()
        .filter(|d| !covered.contains(d))
        .collect();
    RegenerationPlan { removed, added }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn session(date: NaiveDate, status: SessionStatus) -> CourseSession {
        CourseSession {
            id: Ulid::new(),
            schedule_id: Ulid::new(),
            date,
            status,
        }
    }

    #[test]
    fn mondays_of_fall_semester() {
        let dates = occurrence_dates(0, d(2025, 9, 1), d(2026, 1, 31)).unwrap();
        // 2025-09-01 is a Monday; the last Monday on or before 2026-01-31 is 2026-01-26
        assert_eq!(dates.first(), Some(&d(2025, 9, 1)));
        assert_eq!(dates.last(), Some(&d(2026, 1, 26)));
        assert_eq!(dates.len(), 22);
        assert!(dates.iter().all(|x| x.weekday() == chrono::Weekday::Mon));
    }

    #[test]
    fn first_occurrence_after_start() {
        // 2025-09-01 is a Monday, so the first Friday is 2025-09-05
        let dates = occurrence_dates(4, d(2025, 9, 1), d(2025, 9, 30)).unwrap();
        assert_eq!(dates, vec![d(2025, 9, 5), d(2025, 9, 12), d(2025, 9, 19), d(2025, 9, 26)]);
    }

    #[test]
    fn start_after_weekday_wraps_to_next_week() {
        // 2025-09-03 is a Wednesday; next Monday is 2025-09-08
        let dates = occurrence_dates(0, d(2025, 9, 3), d(2025, 9, 15)).unwrap();
        assert_eq!(dates, vec![d(2025, 9, 8), d(2025, 9, 15)]);
    }

    #[test]
    fn end_date_is_inclusive() {
        let dates = occurrence_dates(0, d(2025, 9, 1), d(2025, 9, 8)).unwrap();
        assert_eq!(dates, vec![d(2025, 9, 1), d(2025, 9, 8)]);
    }

    #[test]
    fn single_day_semester() {
        assert_eq!(occurrence_dates(0, d(2025, 9, 1), d(2025, 9, 1)).unwrap(), vec![d(2025, 9, 1)]);
        assert!(occurrence_dates(1, d(2025, 9, 1), d(2025, 9, 1)).unwrap().is_empty());
    }

    #[test]
    fn inverted_range_is_rejected() {
        let result = occurrence_dates(0, d(2026, 1, 31), d(2025, 9, 1));
        assert!(matches!(result, Err(EngineError::Validation { field: "end_date", .. })));
    }

    #[test]
    fn overlong_range_is_rejected() {
        let result = occurrence_dates(0, d(2020, 1, 1), d(2025, 1, 1));
        assert!(matches!(result, Err(EngineError::LimitExceeded(_))));
    }

    #[test]
    fn plan_from_empty() {
        let dates = vec![d(2025, 9, 1), d(2025, 9, 8)];
        let none: Vec<CourseSession> = Vec::new();
        let plan = plan_regeneration(&none, &dates);
        assert!(plan.removed.is_empty());
        assert_eq!(plan.added, dates);
    }

    #[test]
    fn plan_is_idempotent() {
        let dates = vec![d(2025, 9, 1), d(2025, 9, 8)];
        let existing: Vec<_> = dates
            .iter()
            .map(|&x| session(x, SessionStatus::Scheduled))
            .collect();
        let plan = plan_regeneration(&existing, &dates);
        assert!(plan.is_noop());
    }

    #[test]
    fn plan_preserves_history() {
        let held = session(d(2025, 9, 1), SessionStatus::Held);
        let cancelled = session(d(2025, 9, 8), SessionStatus::Cancelled);
        let stale = session(d(2025, 9, 15), SessionStatus::Scheduled);
        // the slot moved from Monday to Tuesday
        let new_dates = vec![d(2025, 9, 2), d(2025, 9, 9), d(2025, 9, 16)];
        let plan = plan_regeneration(&[held.clone(), cancelled.clone(), stale.clone()], &new_dates);
        assert_eq!(plan.removed, vec![stale.id]);
        assert_eq!(plan.added, new_dates);
    }

    #[test]
    fn plan_does_not_refill_held_dates() {
        let dates = vec![d(2025, 9, 1), d(2025, 9, 8)];
        let held = session(d(2025, 9, 1), SessionStatus::Held);
        let plan = plan_regeneration(&[held], &dates);
        assert!(plan.removed.is_empty());
        assert_eq!(plan.added, vec![d(2025, 9, 8)]);
    }

    #[test]
    fn plan_drops_duplicate_scheduled_rows() {
        let dates = vec![d(2025, 9, 1)];
        let a = session(d(2025, 9, 1), SessionStatus::Scheduled);
        let b = session(d(2025, 9, 1), SessionStatus::Scheduled);
        let plan = plan_regeneration(&[a, b.clone()], &dates);
        assert_eq!(plan.removed, vec![b.id]);
        assert!(plan.added.is_empty());
    }
}
