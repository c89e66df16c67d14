use std::net::SocketAddr;

use crate::model::Conflict;
use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "timetable_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "timetable_query_duration_seconds";

// ── Domain metrics ──────────────────────────────────────────────

/// Counter: conflicts found by scans and candidate checks. Labels: type.
pub const CONFLICTS_DETECTED_TOTAL: &str = "timetable_conflicts_detected_total";

/// Counter: schedule commits rejected under the block policy.
pub const SCHEDULE_COMMITS_REJECTED_TOTAL: &str = "timetable_schedule_commits_rejected_total";

/// Counter: sessions created by materialization.
pub const SESSIONS_MATERIALIZED_TOTAL: &str = "timetable_sessions_materialized_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "timetable_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "timetable_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "timetable_connections_rejected_total";

/// Gauge: number of loaded tenants.
pub const TENANTS_ACTIVE: &str = "timetable_tenants_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "timetable_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "timetable_wal_flush_batch_size";

/// Install the Prometheus exporter. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

pub fn record_conflicts(conflicts: &[Conflict]) {
    for c in conflicts {
        metrics::counter!(CONFLICTS_DETECTED_TOTAL, "type" => c.kind.as_str()).increment(1);
    }
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertEntity { .. } => "insert_entity",
        Command::InsertSemester { .. } => "insert_semester",
        Command::UpdateSemester { .. } => "update_semester",
        Command::InsertHoliday { .. } => "insert_holiday",
        Command::InsertTimeSlot { .. } => "insert_time_slot",
        Command::UpdateTimeSlot { .. } => "update_time_slot",
        Command::DeleteTimeSlot { .. } => "delete_time_slot",
        Command::InsertSchedule(_) => "insert_schedule",
        Command::UpdateSchedule { .. } => "update_schedule",
        Command::DeleteSchedule { .. } => "delete_schedule",
        Command::MaterializeSchedule { .. } => "materialize_schedule",
        Command::MaterializeSemester { .. } => "materialize_semester",
        Command::UpdateSessionStatus { .. } => "update_session_status",
        Command::Batch(_) => "batch",
        Command::SelectConflicts { .. } => "select_conflicts",
        Command::SelectCandidateConflicts(_) => "select_candidate_conflicts",
        Command::SelectSchedules { .. } => "select_schedules",
        Command::SelectSchedule { .. } => "select_schedule",
        Command::SelectTimeSlots(_) => "select_time_slots",
        Command::SelectSessions(_) => "select_sessions",
        Command::SelectSemesters => "select_semesters",
        Command::SelectHolidays { .. } => "select_holidays",
        Command::SelectDirectory { .. } => "select_directory",
    }
}
