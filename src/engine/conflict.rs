use std::collections::HashMap;

use ulid::Ulid;

use crate::model::*;

use super::EngineError;

/// What the detector needs to know about one active schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotEntry {
    pub schedule_id: Ulid,
    pub teacher_id: Ulid,
    pub classroom_id: Ulid,
    pub day_of_week: DayOfWeek,
    pub span: Span,
}

impl SlotEntry {
    pub fn new(schedule: &Schedule, slot: &TimeSlot) -> Self {
        Self {
            schedule_id: schedule.id,
            teacher_id: schedule.teacher_id,
            classroom_id: schedule.classroom_id,
            day_of_week: slot.day_of_week,
            span: slot.span,
        }
    }

    fn resource(&self, kind: ConflictKind) -> Ulid {
        match kind {
            ConflictKind::Teacher => self.teacher_id,
            ConflictKind::Classroom => self.classroom_id,
        }
    }
}

pub(crate) fn validate_slot(
    day_of_week: DayOfWeek,
    start: chrono::NaiveTime,
    end: chrono::NaiveTime,
) -> Result<Span, EngineError> {
    if weekday_of(day_of_week).is_none() {
        return Err(EngineError::validation(
            "day_of_week",
            format!("{day_of_week} is outside 0..=6"),
        ));
    }
    if start >= end {
        return Err(EngineError::validation(
            "end_time",
            format!("end {end} must be after start {start}"),
        ));
    }
    Ok(Span::new(start, end))
}

/// Build a conflict with the earlier-starting entry as `schedule_a`.
fn pair(kind: ConflictKind, x: &SlotEntry, y: &SlotEntry) -> Option<Conflict> {
    let overlap = x.span.intersection(&y.span)?;
    let (a, b) = if (x.span.start, x.schedule_id) <= (y.span.start, y.schedule_id) {
        (x, y)
    } else {
        (y, x)
    };
    Some(Conflict {
        kind,
        schedule_a: a.schedule_id,
        schedule_b: b.schedule_id,
        day_of_week: a.day_of_week,
        overlap_start: overlap.start,
        overlap_end: overlap.end,
    })
}

fn sort_conflicts(conflicts: &mut [Conflict]) {
    conflicts.sort_by(|x, y| {
        (x.kind, x.day_of_week, x.overlap_start, x.schedule_a, x.schedule_b).cmp(&(
            y.kind,
            y.day_of_week,
            y.overlap_start,
            y.schedule_a,
            y.schedule_b,
        ))
    });
}

/// Sweep one (resource, day) bucket already sorted by start.
///
/// Keeps every entry still open at the current start, so an entry that
/// overlaps two others which do not overlap each other yields both pairs.
fn sweep_bucket(kind: ConflictKind, bucket: &[&SlotEntry], out: &mut Vec<Conflict>) {
    let mut open: Vec<&SlotEntry> = Vec::new();
    for entry in bucket {
        open.retain(|o| o.span.end > entry.span.start);
        for o in &open {
            if o.schedule_id == entry.schedule_id {
                continue;
            }
            if let Some(c) = pair(kind, o, entry) {
                out.push(c);
            }
        }
        open.push(entry);
    }
}

/// Every pairwise teacher and classroom conflict among `entries`.
///
/// Entries are assumed active and from one semester. Each unordered pair is
/// reported at most once per kind.
pub fn detect_conflicts(entries: &[SlotEntry]) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    for kind in [ConflictKind::Teacher, ConflictKind::Classroom] {
        let mut buckets: HashMap<(Ulid, DayOfWeek), Vec<&SlotEntry>> = HashMap::new();
        for e in entries {
            buckets.entry((e.resource(kind), e.day_of_week)).or_default().push(e);
        }
        for bucket in buckets.values_mut() {
            if bucket.len() < 2 {
                continue;
            }
            bucket.sort_by_key(|e| (e.span.start, e.schedule_id));
            sweep_bucket(kind, bucket, &mut conflicts);
        }
    }
    sort_conflicts(&mut conflicts);
    conflicts
}

/// Conflicts between `candidate` and `existing` only; existing entries are
/// not compared against each other. An existing entry with the candidate's
/// id is the candidate's own previous version and is skipped.
pub fn detect_candidate(candidate: &SlotEntry, existing: &[SlotEntry]) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    for other in existing {
        if other.schedule_id == candidate.schedule_id
            || other.day_of_week != candidate.day_of_week
        {
            continue;
        }
        for kind in [ConflictKind::Teacher, ConflictKind::Classroom] {
            if other.resource(kind) == candidate.resource(kind)
                && let Some(c) = pair(kind, candidate, other)
            {
                conflicts.push(c);
            }
        }
    }
    sort_conflicts(&mut conflicts);
    conflicts
}
