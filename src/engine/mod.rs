mod conflict;
mod error;
mod materialize;
mod mutations;
mod queries;

pub use conflict::{detect_candidate, detect_conflicts, SlotEntry};
pub use error::EngineError;
pub use materialize::{occurrence_dates, plan_regeneration, RegenerationPlan};

use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

pub type SharedSemesterState = Arc<RwLock<SemesterState>>;

/// What a schedule commit does when the candidate conflicts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OnConflict {
    /// Reject the commit with the full conflict list.
    #[default]
    Block,
    /// Commit anyway and surface the conflicts to the caller and subscribers.
    Warn,
}

impl FromStr for OnConflict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "block" => Ok(OnConflict::Block),
            "warn" => Ok(OnConflict::Warn),
            other => Err(format!("unknown on_conflict policy: {other} (expected block or warn)")),
        }
    }
}

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            WalCommand::Append { event, response } => (event, response),
            other => {
                handle_non_append(&mut wal, other);
                continue;
            }
        };
        let mut batch = vec![(event, response)];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }

        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        respond_batch(batch, &result);

        if let Some(cmd) = deferred {
            handle_non_append(&mut wal, cmd);
        }
    }
}

fn flush_batch(
    wal: &mut Wal,
    batch: &[(Event, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let appended = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event));
    // Flush even after a failed append so partial bytes don't leak into the next batch.
    let flushed = wal.flush_sync();
    appended.and(flushed)
}

fn respond_batch(batch: Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { event, response } => {
            let result = wal.append_buffered(&event).and_then(|()| wal.flush_sync());
            let _ = response.send(result);
        }
    }
}

/// Cross-semester lookups kept beside the per-semester state.
#[derive(Default)]
pub(super) struct Index {
    /// Schedule or session id → owning semester id.
    pub(super) entity_to_semester: DashMap<Ulid, Ulid>,
    /// Time slot id → number of schedules referencing it.
    pub(super) slot_refs: DashMap<Ulid, usize>,
}

impl Index {
    fn retain_slot(&self, slot_id: Ulid) {
        *self.slot_refs.entry(slot_id).or_insert(0) += 1;
    }

    fn release_slot(&self, slot_id: Ulid) {
        let emptied = match self.slot_refs.get_mut(&slot_id) {
            Some(mut n) => {
                *n = n.saturating_sub(1);
                *n == 0
            }
            None => false,
        };
        if emptied {
            self.slot_refs.remove_if(&slot_id, |_, n| *n == 0);
        }
    }

    pub(super) fn slot_in_use(&self, slot_id: &Ulid) -> bool {
        self.slot_refs.get(slot_id).is_some_and(|n| *n > 0)
    }
}

pub struct Engine {
    pub(super) semesters: DashMap<Ulid, SharedSemesterState>,
    pub(super) time_slots: DashMap<Ulid, TimeSlot>,
    pub(super) directory: DashMap<Ulid, DirectoryEntry>,
    pub(super) index: Index,
    /// Every mutation holds it shared; compaction holds it exclusively so no
    /// append can land between the snapshot and the file swap.
    pub(super) commit_gate: RwLock<()>,
    /// Schedule commits hold it shared; time slot mutations hold it exclusively.
    pub(super) slot_guard: RwLock<()>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    pub(super) on_conflict: OnConflict,
}

/// Apply an event to one semester (no locking; caller holds the lock).
fn apply_to_semester(ss: &mut SemesterState, event: &Event, index: &Index) {
    match event {
        Event::SemesterUpdated {
            start_date,
            end_date,
            ..
        } => {
            ss.start_date = *start_date;
            ss.end_date = *end_date;
        }
        Event::HolidayAdded { date, .. } => {
            ss.holidays.insert(*date);
            ss.cancel_scheduled_on(*date);
        }
        Event::ScheduleCreated { .. } | Event::ScheduleUpdated { .. } => {
            let Some(schedule) = schedule_from_event(event) else {
                return;
            };
            let (id, slot) = (schedule.id, schedule.time_slot_id);
            match ss.upsert_schedule(schedule) {
                Some(prev) if prev.time_slot_id != slot => {
                    index.release_slot(prev.time_slot_id);
                    index.retain_slot(slot);
                }
                Some(_) => {}
                None => index.retain_slot(slot),
            }
            index.entity_to_semester.insert(id, ss.id);
        }
        Event::ScheduleDeleted { id, .. } => {
            if let Some(prev) = ss.remove_schedule(id) {
                index.release_slot(prev.time_slot_id);
            }
            for session_id in ss.remove_sessions_for(id) {
                index.entity_to_semester.remove(&session_id);
            }
            index.entity_to_semester.remove(id);
        }
        Event::SessionsRegenerated {
            schedule_id,
            removed,
            added,
            ..
        } => {
            for id in removed {
                ss.remove_session(id);
                index.entity_to_semester.remove(id);
            }
            for (id, date) in added {
                let status = if ss.holidays.contains(date) {
                    SessionStatus::Cancelled
                } else {
                    SessionStatus::Scheduled
                };
                ss.insert_session(CourseSession {
                    id: *id,
                    schedule_id: *schedule_id,
                    date: *date,
                    status,
                });
                index.entity_to_semester.insert(*id, ss.id);
            }
        }
        Event::SessionStatusChanged { id, status, .. } => {
            if let Some(session) = ss.session_mut(id) {
                session.status = *status;
            }
        }
        // Global events are applied at the engine level, not here
        Event::EntityRegistered { .. }
        | Event::SemesterCreated { .. }
        | Event::TimeSlotCreated { .. }
        | Event::TimeSlotUpdated { .. }
        | Event::TimeSlotDeleted { .. } => {}
    }
}

fn schedule_from_event(event: &Event) -> Option<Schedule> {
    match event {
        Event::ScheduleCreated {
            id,
            semester_id,
            course_id,
            teacher_id,
            classroom_id,
            time_slot_id,
            is_active,
        }
        | Event::ScheduleUpdated {
            id,
            semester_id,
            course_id,
            teacher_id,
            classroom_id,
            time_slot_id,
            is_active,
        } => Some(Schedule {
            id: *id,
            course_id: *course_id,
            teacher_id: *teacher_id,
            classroom_id: *classroom_id,
            time_slot_id: *time_slot_id,
            semester_id: *semester_id,
            is_active: *is_active,
        }),
        _ => None,
    }
}

impl Engine {
    pub fn new(
        wal_path: PathBuf,
        notify: Arc<NotifyHub>,
        on_conflict: OnConflict,
    ) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            semesters: DashMap::new(),
            time_slots: DashMap::new(),
            directory: DashMap::new(),
            index: Index::default(),
            commit_gate: RwLock::new(()),
            slot_guard: RwLock::new(()),
            wal_tx,
            notify,
            on_conflict,
        };

        // We're the sole owner of these Arcs, so try_write always succeeds.
        // Never use blocking_write here: this may run inside an async context
        // (lazy tenant creation).
        for event in &events {
            match event.semester_id() {
                None => engine.apply_global(event),
                Some(semester_id) => {
                    if let Some(entry) = engine.semesters.get(&semester_id) {
                        let ss = entry.clone();
                        let mut guard = ss.try_write().map_err(|_| {
                            io::Error::other("replay: semester state unexpectedly locked")
                        })?;
                        apply_to_semester(&mut guard, event, &engine.index);
                    }
                }
            }
        }
        tracing::debug!(events = events.len(), "replayed WAL");

        Ok(engine)
    }

    pub fn on_conflict(&self) -> OnConflict {
        self.on_conflict
    }

    fn apply_global(&self, event: &Event) {
        match event {
            Event::EntityRegistered { id, kind, name } => {
                self.directory.insert(
                    *id,
                    DirectoryEntry {
                        id: *id,
                        kind: *kind,
                        name: name.clone(),
                    },
                );
            }
            Event::SemesterCreated {
                id,
                name,
                start_date,
                end_date,
            } => {
                let ss = SemesterState::new(*id, name.clone(), *start_date, *end_date);
                self.semesters.insert(*id, Arc::new(RwLock::new(ss)));
            }
            Event::TimeSlotCreated {
                id,
                day_of_week,
                span,
            }
            | Event::TimeSlotUpdated {
                id,
                day_of_week,
                span,
            } => {
                self.time_slots.insert(
                    *id,
                    TimeSlot {
                        id: *id,
                        day_of_week: *day_of_week,
                        span: *span,
                    },
                );
            }
            Event::TimeSlotDeleted { id } => {
                self.time_slots.remove(id);
            }
            _ => {}
        }
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub(super) async fn persist_global(&self, event: &Event) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        self.apply_global(event);
        Ok(())
    }

    /// WAL-append + apply + notify for an event scoped to a locked semester.
    pub(super) async fn persist_and_apply(
        &self,
        ss: &mut SemesterState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        apply_to_semester(ss, event, &self.index);
        self.notify.committed(ss.id, event);
        Ok(())
    }

    pub fn get_semester(&self, id: &Ulid) -> Option<SharedSemesterState> {
        self.semesters.get(id).map(|e| e.value().clone())
    }

    pub(super) fn semester(&self, id: &Ulid) -> Result<SharedSemesterState, EngineError> {
        self.get_semester(id)
            .ok_or(EngineError::not_found(EntityKind::Semester, *id))
    }

    pub fn get_time_slot(&self, id: &Ulid) -> Option<TimeSlot> {
        self.time_slots.get(id).map(|e| e.value().clone())
    }

    pub(super) fn time_slot(&self, id: &Ulid) -> Result<TimeSlot, EngineError> {
        self.get_time_slot(id)
            .ok_or(EngineError::not_found(EntityKind::TimeSlot, *id))
    }

    pub fn semester_for_entity(&self, entity_id: &Ulid) -> Option<Ulid> {
        self.index.entity_to_semester.get(entity_id).map(|e| *e.value())
    }

    /// Lookup schedule/session → semester, acquire the semester's write lock.
    pub(super) async fn resolve_entity_write(
        &self,
        kind: EntityKind,
        entity_id: &Ulid,
    ) -> Result<tokio::sync::OwnedRwLockWriteGuard<SemesterState>, EngineError> {
        let semester_id = self
            .semester_for_entity(entity_id)
            .ok_or(EngineError::not_found(kind, *entity_id))?;
        let ss = self.semester(&semester_id)?;
        Ok(ss.write_owned().await)
    }

    /// The directory entry must exist and be of the expected kind.
    pub(super) fn require_entity(&self, kind: EntityKind, id: &Ulid) -> Result<(), EngineError> {
        match self.directory.get(id) {
            Some(entry) if entry.kind == kind => Ok(()),
            _ => Err(EngineError::not_found(kind, *id)),
        }
    }

    /// Detector input for one schedule, resolving its time slot.
    pub(super) fn slot_entry(&self, schedule: &Schedule) -> Result<SlotEntry, EngineError> {
        let slot = self.time_slot(&schedule.time_slot_id)?;
        Ok(SlotEntry::new(schedule, &slot))
    }

    pub(super) fn active_entries(&self, ss: &SemesterState) -> Result<Vec<SlotEntry>, EngineError> {
        ss.active_schedules().map(|s| self.slot_entry(s)).collect()
    }
}
