use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Day of week, `0 = Monday` through `6 = Sunday`.
pub type DayOfWeek = u8;

pub fn weekday_of(day: DayOfWeek) -> Option<Weekday> {
    match day {
        0 => Some(Weekday::Mon),
        1 => Some(Weekday::Tue),
        2 => Some(Weekday::Wed),
        3 => Some(Weekday::Thu),
        4 => Some(Weekday::Fri),
        5 => Some(Weekday::Sat),
        6 => Some(Weekday::Sun),
        _ => None,
    }
}

/// Half-open wall-clock interval `[start, end)` within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Span {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// The shared part of two spans, if any.
    pub fn intersection(&self, other: &Span) -> Option<Span> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(Span { start, end })
    }
}

/// A canonical weekly interval. Immutable while any schedule references it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: Ulid,
    pub day_of_week: DayOfWeek,
    pub span: Span,
}

impl TimeSlot {
    pub fn same_value(&self, day_of_week: DayOfWeek, span: &Span) -> bool {
        self.day_of_week == day_of_week && self.span == *span
    }
}

/// One weekly recurring commitment of course + teacher + classroom for a semester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Ulid,
    pub course_id: Ulid,
    pub teacher_id: Ulid,
    pub classroom_id: Ulid,
    pub time_slot_id: Ulid,
    pub semester_id: Ulid,
    pub is_active: bool,
}

/// Partial update of a schedule. The semester is fixed for a schedule's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleChanges {
    pub course_id: Option<Ulid>,
    pub teacher_id: Option<Ulid>,
    pub classroom_id: Option<Ulid>,
    pub time_slot_id: Option<Ulid>,
    pub is_active: Option<bool>,
}

impl ScheduleChanges {
    pub fn apply_to(&self, schedule: &Schedule) -> Schedule {
        Schedule {
            id: schedule.id,
            course_id: self.course_id.unwrap_or(schedule.course_id),
            teacher_id: self.teacher_id.unwrap_or(schedule.teacher_id),
            classroom_id: self.classroom_id.unwrap_or(schedule.classroom_id),
            time_slot_id: self.time_slot_id.unwrap_or(schedule.time_slot_id),
            semester_id: schedule.semester_id,
            is_active: self.is_active.unwrap_or(schedule.is_active),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionStatus {
    Scheduled,
    Cancelled,
    Held,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "scheduled",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::Held => "held",
        }
    }

    /// Only a scheduled session may move, and only to held or cancelled.
    pub fn can_become(&self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Scheduled, SessionStatus::Held)
                | (SessionStatus::Scheduled, SessionStatus::Cancelled)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scheduled" => Ok(SessionStatus::Scheduled),
            "cancelled" | "canceled" => Ok(SessionStatus::Cancelled),
            "held" => Ok(SessionStatus::Held),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

/// A single dated occurrence materialized from a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSession {
    pub id: Ulid,
    pub schedule_id: Ulid,
    pub date: NaiveDate,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictKind {
    Teacher,
    Classroom,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::Teacher => "teacher",
            ConflictKind::Classroom => "classroom",
        }
    }
}

/// Two active schedules sharing a teacher or classroom in overlapping windows.
/// Computed on every detection call, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    #[serde(rename = "type")]
    pub kind: ConflictKind,
    #[serde(rename = "schedule_a_id")]
    pub schedule_a: Ulid,
    #[serde(rename = "schedule_b_id")]
    pub schedule_b: Ulid,
    pub day_of_week: DayOfWeek,
    pub overlap_start: NaiveTime,
    pub overlap_end: NaiveTime,
}

impl Conflict {
    pub fn overlap(&self) -> Span {
        Span::new(self.overlap_start, self.overlap_end)
    }

    pub fn involves(&self, schedule_id: Ulid) -> bool {
        self.schedule_a == schedule_id || self.schedule_b == schedule_id
    }
}

/// The stable client-facing payload: `{conflicts_found, conflicts: [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictReport {
    pub conflicts_found: bool,
    pub conflicts: Vec<Conflict>,
}

impl ConflictReport {
    pub fn new(conflicts: Vec<Conflict>) -> Self {
        Self {
            conflicts_found: !conflicts.is_empty(),
            conflicts,
        }
    }

    pub fn count(&self, kind: ConflictKind) -> usize {
        self.conflicts.iter().filter(|c| c.kind == kind).count()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".into())
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_json())
    }
}

/// Externally owned identities the engine only checks for existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Course,
    Teacher,
    Classroom,
    Semester,
    TimeSlot,
    Schedule,
    Session,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Course => "course",
            EntityKind::Teacher => "teacher",
            EntityKind::Classroom => "classroom",
            EntityKind::Semester => "semester",
            EntityKind::TimeSlot => "time slot",
            EntityKind::Schedule => "schedule",
            EntityKind::Session => "session",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub id: Ulid,
    pub kind: EntityKind,
    pub name: Option<String>,
}

/// Everything the engine holds for one semester, guarded by one lock.
#[derive(Debug, Clone)]
pub struct SemesterState {
    pub id: Ulid,
    pub name: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub holidays: BTreeSet<NaiveDate>,
    pub schedules: Vec<Schedule>,
    /// Sorted by `date`.
    pub sessions: Vec<CourseSession>,
}

impl SemesterState {
    pub fn new(id: Ulid, name: Option<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            id,
            name,
            start_date,
            end_date,
            holidays: BTreeSet::new(),
            schedules: Vec::new(),
            sessions: Vec::new(),
        }
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn schedule(&self, id: &Ulid) -> Option<&Schedule> {
        self.schedules.iter().find(|s| s.id == *id)
    }

    pub fn active_schedules(&self) -> impl Iterator<Item = &Schedule> {
        self.schedules.iter().filter(|s| s.is_active)
    }

    /// Insert or replace by id. Returns the previous version.
    pub fn upsert_schedule(&mut self, schedule: Schedule) -> Option<Schedule> {
        match self.schedules.iter_mut().find(|s| s.id == schedule.id) {
            Some(existing) => Some(std::mem::replace(existing, schedule)),
            None => {
                self.schedules.push(schedule);
                None
            }
        }
    }

    pub fn remove_schedule(&mut self, id: &Ulid) -> Option<Schedule> {
        let pos = self.schedules.iter().position(|s| s.id == *id)?;
        Some(self.schedules.remove(pos))
    }

    /// Insert a session keeping the date order.
    pub fn insert_session(&mut self, session: CourseSession) {
        let pos = self.sessions.partition_point(|s| s.date <= session.date);
        self.sessions.insert(pos, session);
    }

    pub fn remove_session(&mut self, id: &Ulid) -> Option<CourseSession> {
        let pos = self.sessions.iter().position(|s| s.id == *id)?;
        Some(self.sessions.remove(pos))
    }

    pub fn session_mut(&mut self, id: &Ulid) -> Option<&mut CourseSession> {
        self.sessions.iter_mut().find(|s| s.id == *id)
    }

    pub fn sessions_for(&self, schedule_id: &Ulid) -> impl Iterator<Item = &CourseSession> {
        let schedule_id = *schedule_id;
        self.sessions.iter().filter(move |s| s.schedule_id == schedule_id)
    }

    pub fn has_sessions(&self, schedule_id: &Ulid) -> bool {
        self.sessions.iter().any(|s| s.schedule_id == *schedule_id)
    }

    /// Drop every session of a schedule. Returns the removed ids.
    pub fn remove_sessions_for(&mut self, schedule_id: &Ulid) -> Vec<Ulid> {
        let mut removed = Vec::new();
        self.sessions.retain(|s| {
            if s.schedule_id == *schedule_id {
                removed.push(s.id);
                false
            } else {
                true
            }
        });
        removed
    }

    /// Move every scheduled session on `date` to cancelled. Returns how many moved.
    pub fn cancel_scheduled_on(&mut self, date: NaiveDate) -> usize {
        let mut moved = 0;
        for session in self.sessions.iter_mut().filter(|s| s.date == date) {
            if session.status == SessionStatus::Scheduled {
                session.status = SessionStatus::Cancelled;
                moved += 1;
            }
        }
        moved
    }
}

/// The event types, flat with no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    EntityRegistered {
        id: Ulid,
        kind: EntityKind,
        name: Option<String>,
    },
    SemesterCreated {
        id: Ulid,
        name: Option<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
    SemesterUpdated {
        id: Ulid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
    HolidayAdded {
        semester_id: Ulid,
        date: NaiveDate,
    },
    TimeSlotCreated {
        id: Ulid,
        day_of_week: DayOfWeek,
        span: Span,
    },
    TimeSlotUpdated {
        id: Ulid,
        day_of_week: DayOfWeek,
        span: Span,
    },
    TimeSlotDeleted {
        id: Ulid,
    },
    ScheduleCreated {
        id: Ulid,
        semester_id: Ulid,
        course_id: Ulid,
        teacher_id: Ulid,
        classroom_id: Ulid,
        time_slot_id: Ulid,
        is_active: bool,
    },
    ScheduleUpdated {
        id: Ulid,
        semester_id: Ulid,
        course_id: Ulid,
        teacher_id: Ulid,
        classroom_id: Ulid,
        time_slot_id: Ulid,
        is_active: bool,
    },
    ScheduleDeleted {
        id: Ulid,
        semester_id: Ulid,
    },
    SessionsRegenerated {
        semester_id: Ulid,
        schedule_id: Ulid,
        removed: Vec<Ulid>,
        added: Vec<(Ulid, NaiveDate)>,
    },
    SessionStatusChanged {
        id: Ulid,
        semester_id: Ulid,
        status: SessionStatus,
    },
}

impl Event {
    pub fn schedule_created(s: &Schedule) -> Self {
        Event::ScheduleCreated {
            id: s.id,
            semester_id: s.semester_id,
            course_id: s.course_id,
            teacher_id: s.teacher_id,
            classroom_id: s.classroom_id,
            time_slot_id: s.time_slot_id,
            is_active: s.is_active,
        }
    }

    pub fn schedule_updated(s: &Schedule) -> Self {
        Event::ScheduleUpdated {
            id: s.id,
            semester_id: s.semester_id,
            course_id: s.course_id,
            teacher_id: s.teacher_id,
            classroom_id: s.classroom_id,
            time_slot_id: s.time_slot_id,
            is_active: s.is_active,
        }
    }

    /// The semester whose lock guards this event, if any.
    pub fn semester_id(&self) -> Option<Ulid> {
        match self {
            Event::SemesterUpdated { id, .. } => Some(*id),
            Event::HolidayAdded { semester_id, .. }
            | Event::ScheduleCreated { semester_id, .. }
            | Event::ScheduleUpdated { semester_id, .. }
            | Event::ScheduleDeleted { semester_id, .. }
            | Event::SessionsRegenerated { semester_id, .. }
            | Event::SessionStatusChanged { semester_id, .. } => Some(*semester_id),
            Event::EntityRegistered { .. }
            | Event::SemesterCreated { .. }
            | Event::TimeSlotCreated { .. }
            | Event::TimeSlotUpdated { .. }
            | Event::TimeSlotDeleted { .. } => None,
        }
    }
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemesterInfo {
    pub id: Ulid,
    pub name: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub schedule_count: usize,
}

/// Result of a schedule commit. Under the warn policy `conflicts` may be non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleOutcome {
    pub schedule: Schedule,
    pub conflicts: Vec<Conflict>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeSummary {
    pub added: usize,
    pub removed: usize,
    pub total: usize,
}

impl MaterializeSummary {
    pub fn merge(&mut self, other: MaterializeSummary) {
        self.added += other.added;
        self.removed += other.removed;
        self.total += other.total;
    }
}
