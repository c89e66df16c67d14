use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, NaiveTime};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::notify::Notice;
use crate::observability;

use super::conflict::{detect_candidate, validate_slot, SlotEntry};
use super::materialize::{occurrence_dates, plan_regeneration, validate_semester_range};
use super::{Engine, EngineError, OnConflict, WalCommand};

fn check_name(name: &Option<String>) -> Result<(), EngineError> {
    if let Some(n) = name
        && n.len() > MAX_NAME_LEN
    {
        return Err(EngineError::LimitExceeded("name too long"));
    }
    Ok(())
}

impl Engine {
    // ── Reference directory ──────────────────────────────────

    /// Register a course, teacher or classroom identity.
    pub async fn register_entity(
        &self,
        kind: EntityKind,
        id: Ulid,
        name: Option<String>,
    ) -> Result<(), EngineError> {
        if !matches!(kind, EntityKind::Course | EntityKind::Teacher | EntityKind::Classroom) {
            return Err(EngineError::validation("kind", format!("{kind} is not a directory entity")));
        }
        check_name(&name)?;
        let _gate = self.commit_gate.read().await;
        if self.directory.len() >= MAX_DIRECTORY_ENTRIES {
            return Err(EngineError::LimitExceeded("too many directory entries"));
        }
        if self.directory.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        self.persist_global(&Event::EntityRegistered { id, kind, name }).await
    }

    // ── Semesters ────────────────────────────────────────────

    pub async fn create_semester(
        &self,
        id: Ulid,
        name: Option<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<(), EngineError> {
        check_name(&name)?;
        validate_semester_range(start_date, end_date)?;
        let _gate = self.commit_gate.read().await;
        if self.semesters.len() >= MAX_SEMESTERS {
            return Err(EngineError::LimitExceeded("too many semesters"));
        }
        if self.semesters.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        let event = Event::SemesterCreated {
            id,
            name,
            start_date,
            end_date,
        };
        self.persist_global(&event).await?;
        info!(semester = %id, %start_date, %end_date, "semester created");
        Ok(())
    }

    /// Change a semester's dates; a missing bound keeps its current value.
    /// Every schedule that already has sessions is regenerated against the new range.
    pub async fn update_semester_dates(
        &self,
        id: Ulid,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> Result<MaterializeSummary, EngineError> {
        let _gate = self.commit_gate.read().await;
        let ss = self.semester(&id)?;
        let mut guard = ss.write().await;
        let start_date = start_date.unwrap_or(guard.start_date);
        let end_date = end_date.unwrap_or(guard.end_date);
        validate_semester_range(start_date, end_date)?;
        if (start_date, end_date) == (guard.start_date, guard.end_date) {
            return Ok(MaterializeSummary {
                total: guard.sessions.len(),
                ..Default::default()
            });
        }

        let event = Event::SemesterUpdated {
            id,
            start_date,
            end_date,
        };
        self.persist_and_apply(&mut guard, &event).await?;

        let materialized: Vec<Schedule> = guard
            .schedules
            .iter()
            .filter(|s| guard.has_sessions(&s.id))
            .cloned()
            .collect();
        let mut summary = MaterializeSummary::default();
        for schedule in &materialized {
            summary.merge(self.regenerate_sessions(&mut guard, schedule).await?);
        }
        info!(semester = %id, %start_date, %end_date, regenerated = materialized.len(), "semester dates changed");
        Ok(summary)
    }

    /// Mark a date as a holiday. Scheduled sessions on it become cancelled.
    /// Returns how many sessions were cancelled.
    pub async fn add_holiday(
        &self,
        semester_id: Ulid,
        date: NaiveDate,
    ) -> Result<usize, EngineError> {
        let _gate = self.commit_gate.read().await;
        let ss = self.semester(&semester_id)?;
        let mut guard = ss.write().await;
        if !guard.contains_date(date) {
            return Err(EngineError::validation(
                "date",
                format!("{date} is outside {}..={}", guard.start_date, guard.end_date),
            ));
        }
        if guard.holidays.contains(&date) {
            return Ok(0);
        }
        if guard.holidays.len() >= MAX_HOLIDAYS_PER_SEMESTER {
            return Err(EngineError::LimitExceeded("too many holidays"));
        }
        let affected = guard
            .sessions
            .iter()
            .filter(|s| s.date == date && s.status == SessionStatus::Scheduled)
            .count();
        self.persist_and_apply(&mut guard, &Event::HolidayAdded { semester_id, date })
            .await?;
        info!(semester = %semester_id, %date, cancelled = affected, "holiday added");
        Ok(affected)
    }

    // ── Time slots ───────────────────────────────────────────

    /// Return the slot with exactly this value, or create it under `id`.
    /// The bool is true when a new slot was created.
    pub async fn get_or_create_time_slot(
        &self,
        id: Ulid,
        day_of_week: DayOfWeek,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Result<(TimeSlot, bool), EngineError> {
        let span = validate_slot(day_of_week, start_time, end_time)?;
        let _gate = self.commit_gate.read().await;
        let _slots = self.slot_guard.write().await;

        if let Some(existing) = self
            .time_slots
            .iter()
            .find(|e| e.value().same_value(day_of_week, &span))
        {
            return Ok((existing.value().clone(), false));
        }
        if self.time_slots.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        if self.time_slots.len() >= MAX_TIME_SLOTS {
            return Err(EngineError::LimitExceeded("too many time slots"));
        }

        self.persist_global(&Event::TimeSlotCreated {
            id,
            day_of_week,
            span,
        })
        .await?;
        Ok((
            TimeSlot {
                id,
                day_of_week,
                span,
            },
            true,
        ))
    }

    /// Only slots no schedule references may change. Missing fields keep their value.
    pub async fn update_time_slot(
        &self,
        id: Ulid,
        day_of_week: Option<DayOfWeek>,
        start_time: Option<NaiveTime>,
        end_time: Option<NaiveTime>,
    ) -> Result<TimeSlot, EngineError> {
        let _gate = self.commit_gate.read().await;
        let _slots = self.slot_guard.write().await;
        let current = self.time_slot(&id)?;
        if self.index.slot_in_use(&id) {
            return Err(EngineError::TimeSlotInUse(id));
        }
        let day_of_week = day_of_week.unwrap_or(current.day_of_week);
        let span = validate_slot(
            day_of_week,
            start_time.unwrap_or(current.span.start),
            end_time.unwrap_or(current.span.end),
        )?;
        // values stay unique across the registry
        if let Some(other) = self
            .time_slots
            .iter()
            .find(|e| e.id != id && e.same_value(day_of_week, &span))
        {
            return Err(EngineError::AlreadyExists(other.id));
        }
        self.persist_global(&Event::TimeSlotUpdated {
            id,
            day_of_week,
            span,
        })
        .await?;
        Ok(TimeSlot {
            id,
            day_of_week,
            span,
        })
    }

    pub async fn delete_time_slot(&self, id: Ulid) -> Result<(), EngineError> {
        let _gate = self.commit_gate.read().await;
        let _slots = self.slot_guard.write().await;
        self.time_slot(&id)?;
        if self.index.slot_in_use(&id) {
            return Err(EngineError::TimeSlotInUse(id));
        }
        self.persist_global(&Event::TimeSlotDeleted { id }).await
    }

    // ── Schedules ────────────────────────────────────────────

    fn check_references(&self, schedule: &Schedule) -> Result<(), EngineError> {
        self.require_entity(EntityKind::Course, &schedule.course_id)?;
        self.require_entity(EntityKind::Teacher, &schedule.teacher_id)?;
        self.require_entity(EntityKind::Classroom, &schedule.classroom_id)?;
        self.time_slot(&schedule.time_slot_id)?;
        Ok(())
    }

    /// Candidate check then policy. `pending` holds active rows admitted
    /// earlier in the same batch but not yet committed. Returns the conflicts
    /// a warn-policy commit carries.
    fn admit(
        &self,
        ss: &SemesterState,
        candidate: &Schedule,
        pending: &[SlotEntry],
    ) -> Result<Vec<Conflict>, EngineError> {
        if !candidate.is_active {
            return Ok(Vec::new());
        }
        let mut existing = self.active_entries(ss)?;
        existing.extend_from_slice(pending);
        let conflicts = detect_candidate(&self.slot_entry(candidate)?, &existing);
        if conflicts.is_empty() {
            return Ok(conflicts);
        }
        observability::record_conflicts(&conflicts);
        match self.on_conflict {
            OnConflict::Block => {
                metrics::counter!(observability::SCHEDULE_COMMITS_REJECTED_TOTAL).increment(1);
                debug!(schedule = %candidate.id, conflicts = conflicts.len(), "schedule rejected");
                Err(EngineError::Conflict(ConflictReport::new(conflicts)))
            }
            OnConflict::Warn => {
                warn!(
                    schedule = %candidate.id,
                    semester = %candidate.semester_id,
                    conflicts = conflicts.len(),
                    "committing schedule with conflicts"
                );
                Ok(conflicts)
            }
        }
    }

    fn announce_accepted(&self, schedule: &Schedule, conflicts: &[Conflict]) {
        if conflicts.is_empty() {
            return;
        }
        self.notify.send(
            schedule.semester_id,
            Notice::ConflictsAccepted {
                schedule_id: schedule.id,
                report: ConflictReport::new(conflicts.to_vec()),
            },
        );
    }

    /// Create a schedule. Active candidates are checked against the other
    /// active schedules of the semester under the semester's write lock, so the
    /// check and the commit are one step.
    pub async fn create_schedule(
        &self,
        schedule: Schedule,
    ) -> Result<ScheduleOutcome, EngineError> {
        let _gate = self.commit_gate.read().await;
        let _slots = self.slot_guard.read().await;
        self.check_references(&schedule)?;
        let ss = self.semester(&schedule.semester_id)?;
        let mut guard = ss.write().await;

        if self.semester_for_entity(&schedule.id).is_some() {
            return Err(EngineError::AlreadyExists(schedule.id));
        }
        if guard.schedules.len() >= MAX_SCHEDULES_PER_SEMESTER {
            return Err(EngineError::LimitExceeded("too many schedules in semester"));
        }

        let conflicts = self.admit(&guard, &schedule, &[])?;
        self.persist_and_apply(&mut guard, &Event::schedule_created(&schedule))
            .await?;
        self.announce_accepted(&schedule, &conflicts);
        info!(schedule = %schedule.id, semester = %schedule.semester_id, "schedule created");
        Ok(ScheduleOutcome { schedule, conflicts })
    }

    /// Create several schedules as one unit. Each row is checked against the
    /// committed schedules and the rows before it; nothing is written unless
    /// every row is admitted.
    pub async fn create_schedules(
        &self,
        schedules: Vec<Schedule>,
    ) -> Result<Vec<ScheduleOutcome>, EngineError> {
        if schedules.is_empty() {
            return Ok(Vec::new());
        }
        if schedules.len() > MAX_BATCH_SIZE {
            return Err(EngineError::LimitExceeded("batch too large"));
        }
        let _gate = self.commit_gate.read().await;
        let _slots = self.slot_guard.read().await;

        let mut ids = HashSet::with_capacity(schedules.len());
        for schedule in &schedules {
            self.check_references(schedule)?;
            if !ids.insert(schedule.id) || self.semester_for_entity(&schedule.id).is_some() {
                return Err(EngineError::AlreadyExists(schedule.id));
            }
        }

        // Acquire write locks in sorted order to prevent deadlocks.
        let mut semester_ids: Vec<Ulid> = schedules.iter().map(|s| s.semester_id).collect();
        semester_ids.sort();
        semester_ids.dedup();

        let mut guards = Vec::with_capacity(semester_ids.len());
        let mut by_semester = HashMap::new();
        for sid in &semester_ids {
            let guard = self.semester(sid)?.write_owned().await;
            let incoming = schedules.iter().filter(|s| s.semester_id == *sid).count();
            if guard.schedules.len() + incoming > MAX_SCHEDULES_PER_SEMESTER {
                return Err(EngineError::LimitExceeded("too many schedules in semester"));
            }
            by_semester.insert(*sid, guards.len());
            guards.push(guard);
        }

        // Phase 1: admit every row against committed state + earlier rows.
        let mut pending: HashMap<Ulid, Vec<SlotEntry>> = HashMap::new();
        let mut admitted = Vec::with_capacity(schedules.len());
        for schedule in &schedules {
            let guard = &guards[by_semester[&schedule.semester_id]];
            let earlier = pending.entry(schedule.semester_id).or_default();
            let conflicts = self.admit(guard, schedule, &earlier[..])?;
            if schedule.is_active {
                earlier.push(self.slot_entry(schedule)?);
            }
            admitted.push(conflicts);
        }

        // Phase 2: all admitted, commit all.
        let mut outcomes = Vec::with_capacity(schedules.len());
        for (schedule, conflicts) in schedules.into_iter().zip(admitted) {
            let guard = &mut guards[by_semester[&schedule.semester_id]];
            self.persist_and_apply(guard, &Event::schedule_created(&schedule))
                .await?;
            self.announce_accepted(&schedule, &conflicts);
            outcomes.push(ScheduleOutcome { schedule, conflicts });
        }
        info!(count = outcomes.len(), semesters = semester_ids.len(), "schedules created");
        Ok(outcomes)
    }

    /// Apply a partial update. If the time slot changed and the schedule
    /// already has sessions, they are regenerated.
    pub async fn update_schedule(
        &self,
        id: Ulid,
        changes: ScheduleChanges,
    ) -> Result<ScheduleOutcome, EngineError> {
        let _gate = self.commit_gate.read().await;
        let _slots = self.slot_guard.read().await;
        let mut guard = self.resolve_entity_write(EntityKind::Schedule, &id).await?;
        let current = guard
            .schedule(&id)
            .cloned()
            .ok_or(EngineError::not_found(EntityKind::Schedule, id))?;
        let updated = changes.apply_to(&current);
        if updated == current {
            return Ok(ScheduleOutcome {
                schedule: current,
                conflicts: Vec::new(),
            });
        }
        self.check_references(&updated)?;

        let conflicts = self.admit(&guard, &updated, &[])?;
        self.persist_and_apply(&mut guard, &Event::schedule_updated(&updated))
            .await?;
        if updated.time_slot_id != current.time_slot_id && guard.has_sessions(&id) {
            self.regenerate_sessions(&mut guard, &updated).await?;
        }
        self.announce_accepted(&updated, &conflicts);
        info!(schedule = %id, active = updated.is_active, "schedule updated");
        Ok(ScheduleOutcome {
            schedule: updated,
            conflicts,
        })
    }

    /// Re-activation runs the same candidate check as creation.
    pub async fn activate_schedule(&self, id: Ulid) -> Result<ScheduleOutcome, EngineError> {
        let changes = ScheduleChanges {
            is_active: Some(true),
            ..Default::default()
        };
        self.update_schedule(id, changes).await
    }

    /// Inactive schedules are excluded from every conflict scan.
    pub async fn deactivate_schedule(&self, id: Ulid) -> Result<Schedule, EngineError> {
        let changes = ScheduleChanges {
            is_active: Some(false),
            ..Default::default()
        };
        Ok(self.update_schedule(id, changes).await?.schedule)
    }

    /// Delete a schedule together with all of its sessions.
    pub async fn delete_schedule(&self, id: Ulid) -> Result<Ulid, EngineError> {
        let _gate = self.commit_gate.read().await;
        let mut guard = self.resolve_entity_write(EntityKind::Schedule, &id).await?;
        if guard.schedule(&id).is_none() {
            return Err(EngineError::not_found(EntityKind::Schedule, id));
        }
        let semester_id = guard.id;
        self.persist_and_apply(&mut guard, &Event::ScheduleDeleted { id, semester_id })
            .await?;
        info!(schedule = %id, semester = %semester_id, "schedule deleted");
        Ok(semester_id)
    }

    // ── Sessions ─────────────────────────────────────────────

    /// Bring a schedule's sessions in line with its slot and the semester range.
    pub(super) async fn regenerate_sessions(
        &self,
        ss: &mut SemesterState,
        schedule: &Schedule,
    ) -> Result<MaterializeSummary, EngineError> {
        let slot = self.time_slot(&schedule.time_slot_id)?;
        let dates = occurrence_dates(slot.day_of_week, ss.start_date, ss.end_date)?;
        let plan = plan_regeneration(ss.sessions_for(&schedule.id), &dates);
        let kept = ss.sessions_for(&schedule.id).count() - plan.removed.len();
        let summary = MaterializeSummary {
            added: plan.added.len(),
            removed: plan.removed.len(),
            total: kept + plan.added.len(),
        };
        if plan.is_noop() {
            return Ok(summary);
        }

        let event = Event::SessionsRegenerated {
            semester_id: ss.id,
            schedule_id: schedule.id,
            removed: plan.removed,
            added: plan.added.into_iter().map(|d| (Ulid::new(), d)).collect(),
        };
        self.persist_and_apply(ss, &event).await?;
        metrics::counter!(observability::SESSIONS_MATERIALIZED_TOTAL)
            .increment(summary.added as u64);
        debug!(
            schedule = %schedule.id,
            added = summary.added,
            removed = summary.removed,
            "sessions regenerated"
        );
        Ok(summary)
    }

    /// Expand one schedule into dated sessions for its semester.
    pub async fn materialize_schedule(
        &self,
        schedule_id: Ulid,
    ) -> Result<MaterializeSummary, EngineError> {
        let _gate = self.commit_gate.read().await;
        let mut guard = self
            .resolve_entity_write(EntityKind::Schedule, &schedule_id)
            .await?;
        let schedule = guard
            .schedule(&schedule_id)
            .cloned()
            .ok_or(EngineError::not_found(EntityKind::Schedule, schedule_id))?;
        self.regenerate_sessions(&mut guard, &schedule).await
    }

    /// Expand every active schedule of a semester. Batch job at semester activation.
    pub async fn materialize_semester(
        &self,
        semester_id: Ulid,
    ) -> Result<MaterializeSummary, EngineError> {
        let _gate = self.commit_gate.read().await;
        let ss = self.semester(&semester_id)?;
        let mut guard = ss.write().await;
        validate_semester_range(guard.start_date, guard.end_date)?;

        let active: Vec<Schedule> = guard.active_schedules().cloned().collect();
        let mut summary = MaterializeSummary::default();
        for schedule in &active {
            summary.merge(self.regenerate_sessions(&mut guard, schedule).await?);
        }
        info!(
            semester = %semester_id,
            schedules = active.len(),
            sessions = summary.total,
            "semester materialized"
        );
        Ok(summary)
    }

    /// Only `scheduled → held` and `scheduled → cancelled` are allowed; dates never change.
    pub async fn set_session_status(
        &self,
        id: Ulid,
        status: SessionStatus,
    ) -> Result<CourseSession, EngineError> {
        let _gate = self.commit_gate.read().await;
        let mut guard = self.resolve_entity_write(EntityKind::Session, &id).await?;
        let current = guard
            .sessions
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or(EngineError::not_found(EntityKind::Session, id))?;
        if !current.status.can_become(status) {
            return Err(EngineError::InvalidTransition {
                from: current.status,
                to: status,
            });
        }
        let semester_id = guard.id;
        self.persist_and_apply(
            &mut guard,
            &Event::SessionStatusChanged {
                id,
                semester_id,
                status,
            },
        )
        .await?;
        Ok(CourseSession { status, ..current })
    }

    // ── WAL maintenance ──────────────────────────────────────

    /// Compact the WAL by rewriting it with only the events needed to recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _gate = self.commit_gate.write().await;
        let mut events: Vec<Event> = self
            .directory
            .iter()
            .map(|e| Event::EntityRegistered {
                id: e.id,
                kind: e.kind,
                name: e.name.clone(),
            })
            .collect();
        events.extend(self.time_slots.iter().map(|e| Event::TimeSlotCreated {
            id: e.id,
            day_of_week: e.day_of_week,
            span: e.span,
        }));

        let semesters: Vec<_> = self.semesters.iter().map(|e| e.value().clone()).collect();
        for ss in semesters {
            let guard = ss.read().await;
            events.push(Event::SemesterCreated {
                id: guard.id,
                name: guard.name.clone(),
                start_date: guard.start_date,
                end_date: guard.end_date,
            });
            for schedule in &guard.schedules {
                events.push(Event::schedule_created(schedule));
                let added: Vec<_> = guard
                    .sessions_for(&schedule.id)
                    .map(|s| (s.id, s.date))
                    .collect();
                if !added.is_empty() {
                    events.push(Event::SessionsRegenerated {
                        semester_id: guard.id,
                        schedule_id: schedule.id,
                        removed: Vec::new(),
                        added,
                    });
                }
            }
            events.extend(
                guard
                    .sessions
                    .iter()
                    .filter(|s| s.status != SessionStatus::Scheduled)
                    .map(|s| Event::SessionStatusChanged {
                        id: s.id,
                        semester_id: guard.id,
                        status: s.status,
                    }),
            );
            // Holidays last: replaying them must not cancel anything that is still scheduled now.
            events.extend(guard.holidays.iter().map(|&date| Event::HolidayAdded {
                semester_id: guard.id,
                date,
            }));
        }

        let count = events.len();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))?;
        info!(events = count, "WAL compacted");
        Ok(())
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
