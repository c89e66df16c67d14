use ulid::Ulid;

use crate::model::*;
use crate::observability;

use super::conflict::{detect_candidate, detect_conflicts, SlotEntry};
use super::{Engine, EngineError};

impl Engine {
    /// Every teacher and classroom conflict among the active schedules of a semester.
    ///
    /// Read-only and computed fresh on each call. Holds the semester's read
    /// lock, so the result reflects one consistent snapshot.
    pub async fn check_conflicts(&self, semester_id: Ulid) -> Result<ConflictReport, EngineError> {
        let ss = self.semester(&semester_id)?;
        let guard = ss.read().await;
        let entries = self.active_entries(&guard)?;
        let conflicts = detect_conflicts(&entries);
        observability::record_conflicts(&conflicts);
        Ok(ConflictReport::new(conflicts))
    }

    /// Conflicts a proposed schedule would introduce, without committing it.
    ///
    /// The candidate is compared only against the semester's active schedules;
    /// conflicts among those are not reported. An inactive candidate never
    /// conflicts.
    pub async fn check_candidate(
        &self,
        candidate: &Schedule,
    ) -> Result<ConflictReport, EngineError> {
        let slot = self.time_slot(&candidate.time_slot_id)?;
        let ss = self.semester(&candidate.semester_id)?;
        let guard = ss.read().await;
        if !candidate.is_active {
            return Ok(ConflictReport::default());
        }
        let existing = self.active_entries(&guard)?;
        let conflicts = detect_candidate(&SlotEntry::new(candidate, &slot), &existing);
        Ok(ConflictReport::new(conflicts))
    }

    pub async fn list_schedules(&self, semester_id: Ulid) -> Result<Vec<Schedule>, EngineError> {
        let ss = self.semester(&semester_id)?;
        let guard = ss.read().await;
        Ok(guard.schedules.clone())
    }

    pub async fn get_schedule(&self, id: Ulid) -> Result<Schedule, EngineError> {
        let semester_id = self
            .semester_for_entity(&id)
            .ok_or(EngineError::not_found(EntityKind::Schedule, id))?;
        let ss = self.semester(&semester_id)?;
        let guard = ss.read().await;
        guard
            .schedule(&id)
            .cloned()
            .ok_or(EngineError::not_found(EntityKind::Schedule, id))
    }

    /// All time slots, ordered by day then start time.
    pub fn list_time_slots(&self) -> Vec<TimeSlot> {
        let mut slots: Vec<TimeSlot> = self.time_slots.iter().map(|e| e.value().clone()).collect();
        slots.sort_by_key(|s| (s.day_of_week, s.span.start, s.span.end, s.id));
        slots
    }

    /// Sessions of one schedule in date order.
    pub async fn list_sessions_for_schedule(
        &self,
        schedule_id: Ulid,
    ) -> Result<Vec<CourseSession>, EngineError> {
        let semester_id = self
            .semester_for_entity(&schedule_id)
            .ok_or(EngineError::not_found(EntityKind::Schedule, schedule_id))?;
        let ss = self.semester(&semester_id)?;
        let guard = ss.read().await;
        Ok(guard.sessions_for(&schedule_id).cloned().collect())
    }

    /// Every session of a semester in date order.
    pub async fn list_sessions_for_semester(
        &self,
        semester_id: Ulid,
    ) -> Result<Vec<CourseSession>, EngineError> {
        let ss = self.semester(&semester_id)?;
        let guard = ss.read().await;
        Ok(guard.sessions.clone())
    }

    pub async fn list_semesters(&self) -> Vec<SemesterInfo> {
        let states: Vec<_> = self.semesters.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::with_capacity(states.len());
        for ss in states {
            let guard = ss.read().await;
            out.push(SemesterInfo {
                id: guard.id,
                name: guard.name.clone(),
                start_date: guard.start_date,
                end_date: guard.end_date,
                schedule_count: guard.schedules.len(),
            });
        }
        out.sort_by_key(|s| (s.start_date, s.id));
        out
    }

    pub async fn list_holidays(
        &self,
        semester_id: Ulid,
    ) -> Result<Vec<chrono::NaiveDate>, EngineError> {
        let ss = self.semester(&semester_id)?;
        let guard = ss.read().await;
        Ok(guard.holidays.iter().copied().collect())
    }

    /// Directory entries of one kind, ordered by id.
    pub fn list_directory(&self, kind: EntityKind) -> Vec<DirectoryEntry> {
        let mut entries: Vec<DirectoryEntry> = self
            .directory
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by_key(|e| e.id);
        entries
    }
}
