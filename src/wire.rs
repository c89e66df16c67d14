use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::{stream, Sink, SinkExt};
use pgwire::api::auth::cleartext::CleartextPasswordAuthStartupHandler;
use pgwire::api::auth::{DefaultServerParameterProvider, StartupHandler};
use pgwire::api::copy::CopyHandler;
use pgwire::api::portal::{Format, Portal};
use pgwire::api::query::{ExtendedQueryHandler, SimpleQueryHandler};
use pgwire::api::results::{
    DataRowEncoder, DescribePortalResponse, DescribeStatementResponse, FieldFormat, FieldInfo,
    QueryResponse, Response, Tag,
};
use pgwire::api::stmt::{QueryParser, StoredStatement};
use pgwire::api::store::PortalStore;
use pgwire::api::{ClientInfo, ClientPortalStore, NoopHandler, PgWireServerHandlers, Type};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};
use pgwire::messages::PgWireBackendMessage;
use pgwire::tokio::TlsAcceptor;
use tokio::net::TcpStream;
use tracing::debug;

use crate::auth::TimetableAuthSource;
use crate::engine::{Engine, EngineError};
use crate::model::*;
use crate::observability;
use crate::sql::{self, Command, SessionScope, SqlError};
use crate::tenant::TenantManager;

pub struct TimetableHandler {
    tenant_manager: Arc<TenantManager>,
    query_parser: Arc<TimetableQueryParser>,
}

impl TimetableHandler {
    pub fn new(tenant_manager: Arc<TenantManager>) -> Self {
        Self {
            tenant_manager,
            query_parser: Arc::new(TimetableQueryParser),
        }
    }

    fn resolve_engine<C: ClientInfo>(&self, client: &C) -> PgWireResult<Arc<Engine>> {
        let db = client
            .metadata()
            .get("database")
            .cloned()
            .unwrap_or_else(|| "default".to_string());
        self.tenant_manager.get_or_create(&db).map_err(|e| {
            PgWireError::UserError(Box::new(ErrorInfo::new(
                "ERROR".into(),
                "08006".into(),
                format!("tenant error: {e}"),
            )))
        })
    }

    /// Parse, run and time one statement. Conflicts accepted under the warn
    /// policy are pushed to the client as notices ahead of the result.
    async fn run<C>(&self, client: &mut C, sql_text: &str) -> PgWireResult<Response>
    where
        C: ClientInfo + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let engine = self.resolve_engine(client)?;
        let cmd = sql::parse_sql(sql_text).map_err(sql_err)?;
        let label = observability::command_label(&cmd);
        let started = Instant::now();

        let mut notices = Vec::new();
        let result = self.execute_command(&engine, cmd, &mut notices).await;

        metrics::histogram!(observability::QUERY_DURATION_SECONDS, "command" => label)
            .record(started.elapsed().as_secs_f64());
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(observability::QUERIES_TOTAL, "command" => label, "status" => status)
            .increment(1);

        for notice in notices {
            client
                .send(PgWireBackendMessage::NoticeResponse(notice.into()))
                .await?;
        }
        result
    }

    async fn execute_command(
        &self,
        engine: &Engine,
        cmd: Command,
        notices: &mut Vec<ErrorInfo>,
    ) -> PgWireResult<Response> {
        if cmd.is_query() {
            return self.execute_query(engine, cmd).await;
        }
        let (tag, rows) = match cmd {
            Command::Batch(rows) => self.execute_batch(engine, rows, notices).await?,
            other => self.execute_write(engine, other, notices).await?,
        };
        Ok(Response::Execution(Tag::new(tag).with_rows(rows)))
    }

    /// Multi-row INSERT. Schedule rows are admitted and committed as one
    /// unit; rows of other tables run in order and stop at the first error.
    async fn execute_batch(
        &self,
        engine: &Engine,
        rows: Vec<Command>,
        notices: &mut Vec<ErrorInfo>,
    ) -> PgWireResult<(&'static str, usize)> {
        if rows.iter().all(|r| matches!(r, Command::InsertSchedule(_))) {
            let schedules = rows
                .into_iter()
                .filter_map(|r| match r {
                    Command::InsertSchedule(s) => Some(s),
                    _ => None,
                })
                .collect();
            let outcomes = engine.create_schedules(schedules).await.map_err(engine_err)?;
            notices.extend(outcomes.iter().filter_map(conflict_notice));
            return Ok(("INSERT", outcomes.len()));
        }
        let mut total = 0;
        for row in rows {
            let (_, n) = self.execute_write(engine, row, notices).await?;
            total += n;
        }
        Ok(("INSERT", total))
    }

    /// Run one mutation. Returns the command tag and affected row count.
    async fn execute_write(
        &self,
        engine: &Engine,
        cmd: Command,
        notices: &mut Vec<ErrorInfo>,
    ) -> PgWireResult<(&'static str, usize)> {
        match cmd {
            Command::InsertEntity { kind, id, name } => {
                engine.register_entity(kind, id, name).await.map_err(engine_err)?;
                Ok(("INSERT", 1))
            }
            Command::InsertSemester {
                id,
                name,
                start_date,
                end_date,
            } => {
                engine
                    .create_semester(id, name, start_date, end_date)
                    .await
                    .map_err(engine_err)?;
                Ok(("INSERT", 1))
            }
            Command::UpdateSemester {
                id,
                start_date,
                end_date,
            } => {
                engine
                    .update_semester_dates(id, start_date, end_date)
                    .await
                    .map_err(engine_err)?;
                Ok(("UPDATE", 1))
            }
            Command::InsertHoliday { semester_id, date } => {
                engine.add_holiday(semester_id, date).await.map_err(engine_err)?;
                Ok(("INSERT", 1))
            }
            Command::InsertTimeSlot {
                id,
                day_of_week,
                start_time,
                end_time,
            } => {
                let (slot, created) = engine
                    .get_or_create_time_slot(id, day_of_week, start_time, end_time)
                    .await
                    .map_err(engine_err)?;
                if slot.id != id {
                    notices.push(existing_slot_notice(&slot));
                }
                Ok(("INSERT", usize::from(created)))
            }
            Command::UpdateTimeSlot {
                id,
                day_of_week,
                start_time,
                end_time,
            } => {
                engine
                    .update_time_slot(id, day_of_week, start_time, end_time)
                    .await
                    .map_err(engine_err)?;
                Ok(("UPDATE", 1))
            }
            Command::DeleteTimeSlot { id } => {
                engine.delete_time_slot(id).await.map_err(engine_err)?;
                Ok(("DELETE", 1))
            }
            Command::InsertSchedule(schedule) => {
                let outcome = engine.create_schedule(schedule).await.map_err(engine_err)?;
                notices.extend(conflict_notice(&outcome));
                Ok(("INSERT", 1))
            }
            Command::UpdateSchedule { id, changes } => {
                let outcome = engine.update_schedule(id, changes).await.map_err(engine_err)?;
                notices.extend(conflict_notice(&outcome));
                Ok(("UPDATE", 1))
            }
            Command::DeleteSchedule { id } => {
                engine.delete_schedule(id).await.map_err(engine_err)?;
                Ok(("DELETE", 1))
            }
            Command::MaterializeSchedule { schedule_id } => {
                let summary = engine
                    .materialize_schedule(schedule_id)
                    .await
                    .map_err(engine_err)?;
                Ok(("INSERT", summary.added))
            }
            Command::MaterializeSemester { semester_id } => {
                let summary = engine
                    .materialize_semester(semester_id)
                    .await
                    .map_err(engine_err)?;
                Ok(("INSERT", summary.added))
            }
            Command::UpdateSessionStatus { id, status } => {
                engine.set_session_status(id, status).await.map_err(engine_err)?;
                Ok(("UPDATE", 1))
            }
            other => Err(user_error(
                "0A000",
                format!("{} cannot run inside a batch", observability::command_label(&other)),
            )),
        }
    }

    async fn execute_query(&self, engine: &Engine, cmd: Command) -> PgWireResult<Response> {
        match cmd {
            Command::SelectConflicts { semester_id } => {
                let report = engine.check_conflicts(semester_id).await.map_err(engine_err)?;
                rows_response(conflicts_schema(), &report.conflicts, encode_conflict)
            }
            Command::SelectCandidateConflicts(candidate) => {
                let report = engine.check_candidate(&candidate).await.map_err(engine_err)?;
                rows_response(conflicts_schema(), &report.conflicts, encode_conflict)
            }
            Command::SelectSchedules {
                semester_id,
                teacher_id,
                classroom_id,
            } => {
                let mut schedules = engine.list_schedules(semester_id).await.map_err(engine_err)?;
                schedules.retain(|s| {
                    teacher_id.is_none_or(|t| t == s.teacher_id)
                        && classroom_id.is_none_or(|c| c == s.classroom_id)
                });
                rows_response(schedules_schema(), &schedules, encode_schedule)
            }
            Command::SelectSchedule { id } => {
                let schedule = engine.get_schedule(id).await.map_err(engine_err)?;
                rows_response(schedules_schema(), &[schedule], encode_schedule)
            }
            Command::SelectTimeSlots(filter) => {
                let mut slots = engine.list_time_slots();
                slots.retain(|slot| filter.matches(slot));
                rows_response(time_slots_schema(), &slots, |enc, slot| {
                    enc.encode_field(&slot.id.to_string())?;
                    enc.encode_field(&i16::from(slot.day_of_week))?;
                    enc.encode_field(&fmt_time(slot.span.start))?;
                    enc.encode_field(&fmt_time(slot.span.end))
                })
            }
            Command::SelectSessions(scope) => {
                let sessions = match scope {
                    SessionScope::Schedule(id) => engine.list_sessions_for_schedule(id).await,
                    SessionScope::Semester(id) => engine.list_sessions_for_semester(id).await,
                }
                .map_err(engine_err)?;
                rows_response(sessions_schema(), &sessions, |enc, s| {
                    enc.encode_field(&s.id.to_string())?;
                    enc.encode_field(&s.schedule_id.to_string())?;
                    enc.encode_field(&s.date.to_string())?;
                    enc.encode_field(&s.status.to_string())
                })
            }
            Command::SelectSemesters => {
                rows_response(semesters_schema(), &engine.list_semesters().await, |enc, s| {
                    enc.encode_field(&s.id.to_string())?;
                    enc.encode_field(&s.name)?;
                    enc.encode_field(&s.start_date.to_string())?;
                    enc.encode_field(&s.end_date.to_string())?;
                    enc.encode_field(&(s.schedule_count as i64))
                })
            }
            Command::SelectHolidays { semester_id } => {
                let dates = engine.list_holidays(semester_id).await.map_err(engine_err)?;
                let sid = semester_id.to_string();
                rows_response(holidays_schema(), &dates, |enc, date| {
                    enc.encode_field(&sid)?;
                    enc.encode_field(&date.to_string())
                })
            }
            Command::SelectDirectory { kind } => {
                rows_response(directory_schema(), &engine.list_directory(kind), |enc, e| {
                    enc.encode_field(&e.id.to_string())?;
                    enc.encode_field(&e.name)
                })
            }
            other => Err(user_error(
                "0A000",
                format!("{} is not a query", observability::command_label(&other)),
            )),
        }
    }
}

fn fmt_time(t: chrono::NaiveTime) -> String {
    t.format("%H:%M:%S").to_string()
}

fn rows_response<T>(
    schema: Vec<FieldInfo>,
    items: &[T],
    encode: impl Fn(&mut DataRowEncoder, &T) -> PgWireResult<()>,
) -> PgWireResult<Response> {
    let schema = Arc::new(schema);
    let rows: Vec<PgWireResult<_>> = items
        .iter()
        .map(|item| {
            let mut encoder = DataRowEncoder::new(schema.clone());
            encode(&mut encoder, item)?;
            Ok(encoder.take_row())
        })
        .collect();
    Ok(Response::Query(QueryResponse::new(schema, stream::iter(rows))))
}

fn encode_conflict(enc: &mut DataRowEncoder, c: &Conflict) -> PgWireResult<()> {
    enc.encode_field(&c.kind.as_str().to_string())?;
    enc.encode_field(&c.schedule_a.to_string())?;
    enc.encode_field(&c.schedule_b.to_string())?;
    enc.encode_field(&i16::from(c.day_of_week))?;
    enc.encode_field(&fmt_time(c.overlap_start))?;
    enc.encode_field(&fmt_time(c.overlap_end))
}

fn encode_schedule(enc: &mut DataRowEncoder, s: &Schedule) -> PgWireResult<()> {
    enc.encode_field(&s.id.to_string())?;
    enc.encode_field(&s.course_id.to_string())?;
    enc.encode_field(&s.teacher_id.to_string())?;
    enc.encode_field(&s.classroom_id.to_string())?;
    enc.encode_field(&s.time_slot_id.to_string())?;
    enc.encode_field(&s.semester_id.to_string())?;
    enc.encode_field(&s.is_active)
}

/// Warning notice carrying the conflicts a warn-policy commit accepted.
fn conflict_notice(outcome: &ScheduleOutcome) -> Option<ErrorInfo> {
    if outcome.conflicts.is_empty() {
        return None;
    }
    let report = ConflictReport::new(outcome.conflicts.clone());
    Some(ErrorInfo::new("WARNING".into(), "01000".into(), report.to_json()))
}

/// The registry already held this value under another id. Clients must
/// reference the returned id, carried in the notice detail.
fn existing_slot_notice(slot: &TimeSlot) -> ErrorInfo {
    let mut info = ErrorInfo::new(
        "NOTICE".into(),
        "42710".into(),
        format!("time slot already registered as {}", slot.id),
    );
    info.detail = Some(slot.id.to_string());
    info
}

// ── Result schemas ───────────────────────────────────────────────

fn text_field(name: &str) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, Type::VARCHAR, FieldFormat::Text)
}

fn typed_field(name: &str, ty: Type) -> FieldInfo {
    FieldInfo::new(name.into(), None, None, ty, FieldFormat::Text)
}

fn conflicts_schema() -> Vec<FieldInfo> {
    vec![
        text_field("type"),
        text_field("schedule_a_id"),
        text_field("schedule_b_id"),
        typed_field("day_of_week", Type::INT2),
        text_field("overlap_start"),
        text_field("overlap_end"),
    ]
}

fn schedules_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        text_field("course_id"),
        text_field("teacher_id"),
        text_field("classroom_id"),
        text_field("time_slot_id"),
        text_field("semester_id"),
        typed_field("is_active", Type::BOOL),
    ]
}

fn time_slots_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        typed_field("day_of_week", Type::INT2),
        text_field("start_time"),
        text_field("end_time"),
    ]
}

fn sessions_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        text_field("schedule_id"),
        text_field("date"),
        text_field("status"),
    ]
}

fn semesters_schema() -> Vec<FieldInfo> {
    vec![
        text_field("id"),
        text_field("name"),
        text_field("start_date"),
        text_field("end_date"),
        typed_field("schedule_count", Type::INT8),
    ]
}

fn holidays_schema() -> Vec<FieldInfo> {
    vec![text_field("semester_id"), text_field("date")]
}

fn directory_schema() -> Vec<FieldInfo> {
    vec![text_field("id"), text_field("name")]
}

/// The table a SELECT reads from, found without a full parse so that
/// statements with `$N` placeholders can be described.
fn select_table(sql: &str) -> Option<String> {
    let lower = sql.to_lowercase();
    let mut words = lower.split_whitespace();
    if words.next()? != "select" {
        return None;
    }
    words.find(|w| *w == "from")?;
    words
        .next()
        .map(|w| w.trim_matches(|c: char| c == ';' || c == '"').to_string())
}

fn result_schema(sql: &str) -> Vec<FieldInfo> {
    match select_table(sql).as_deref() {
        Some("conflicts" | "candidate_conflicts") => conflicts_schema(),
        Some("schedules") => schedules_schema(),
        Some("time_slots") => time_slots_schema(),
        Some("sessions") => sessions_schema(),
        Some("semesters") => semesters_schema(),
        Some("holidays") => holidays_schema(),
        Some("courses" | "teachers" | "classrooms") => directory_schema(),
        _ => vec![],
    }
}

#[async_trait]
impl SimpleQueryHandler for TimetableHandler {
    async fn do_query<C>(
        &self,
        client: &mut C,
        query: &str,
    ) -> PgWireResult<Vec<Response>>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(vec![self.run(client, query).await?])
    }
}

// ── Extended Query Protocol ──────────────────────────────────────

#[derive(Debug)]
pub struct TimetableQueryParser;

#[async_trait]
impl QueryParser for TimetableQueryParser {
    type Statement = String;

    async fn parse_sql<C>(
        &self,
        _client: &C,
        sql: &str,
        _types: &[Option<Type>],
    ) -> PgWireResult<String>
    where
        C: ClientInfo + Unpin + Send + Sync,
    {
        Ok(sql.to_string())
    }

    fn get_parameter_types(&self, stmt: &String) -> PgWireResult<Vec<Type>> {
        Ok(vec![Type::VARCHAR; count_params(stmt)])
    }

    fn get_result_schema(
        &self,
        stmt: &String,
        _column_format: Option<&Format>,
    ) -> PgWireResult<Vec<FieldInfo>> {
        Ok(result_schema(stmt))
    }
}

#[async_trait]
impl ExtendedQueryHandler for TimetableHandler {
    type Statement = String;
    type QueryParser = TimetableQueryParser;

    fn query_parser(&self) -> Arc<Self::QueryParser> {
        self.query_parser.clone()
    }

    async fn do_query<C>(
        &self,
        client: &mut C,
        portal: &Portal<Self::Statement>,
        _max_rows: usize,
    ) -> PgWireResult<Response>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let sql_text = substitute_params(portal);
        self.run(client, &sql_text).await
    }

    async fn do_describe_statement<C>(
        &self,
        _client: &mut C,
        target: &StoredStatement<Self::Statement>,
    ) -> PgWireResult<DescribeStatementResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        let param_types = vec![Type::VARCHAR; count_params(&target.statement)];
        Ok(DescribeStatementResponse::new(
            param_types,
            result_schema(&target.statement),
        ))
    }

    async fn do_describe_portal<C>(
        &self,
        _client: &mut C,
        target: &Portal<Self::Statement>,
    ) -> PgWireResult<DescribePortalResponse>
    where
        C: ClientInfo + ClientPortalStore + Sink<PgWireBackendMessage> + Unpin + Send + Sync,
        C::PortalStore: PortalStore<Statement = Self::Statement>,
        C::Error: Debug,
        PgWireError: From<C::Error>,
    {
        Ok(DescribePortalResponse::new(result_schema(
            &target.statement.statement,
        )))
    }
}

/// Highest `$N` placeholder in the SQL string.
fn count_params(sql: &str) -> usize {
    let bytes = sql.as_bytes();
    let mut max = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'$' {
            i += 1;
            continue;
        }
        i += 1;
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if let Ok(n) = sql[start..i].parse::<usize>() {
            max = max.max(n);
        }
    }
    max
}

/// Replace `$1, $2, ...` with bound parameter values as quoted text literals.
/// Highest index first so `$1` never clobbers the prefix of `$10`.
fn substitute_params(portal: &Portal<String>) -> String {
    let mut sql = portal.statement.statement.clone();
    for (i, param) in portal.parameters.iter().enumerate().rev() {
        let value = match param {
            Some(bytes) => format!("'{}'", String::from_utf8_lossy(bytes).replace('\'', "''")),
            None => "NULL".to_string(),
        };
        sql = sql.replace(&format!("${}", i + 1), &value);
    }
    sql
}

// ── Factory ──────────────────────────────────────────────────────

pub struct TimetableFactory {
    handler: Arc<TimetableHandler>,
    auth_handler: Arc<
        CleartextPasswordAuthStartupHandler<TimetableAuthSource, DefaultServerParameterProvider>,
    >,
    noop: Arc<NoopHandler>,
}

impl TimetableFactory {
    pub fn new(tenant_manager: Arc<TenantManager>, password: String) -> Self {
        Self {
            handler: Arc::new(TimetableHandler::new(tenant_manager)),
            auth_handler: Arc::new(CleartextPasswordAuthStartupHandler::new(
                TimetableAuthSource::new(password),
                DefaultServerParameterProvider::default(),
            )),
            noop: Arc::new(NoopHandler),
        }
    }
}

impl PgWireServerHandlers for TimetableFactory {
    fn simple_query_handler(&self) -> Arc<impl SimpleQueryHandler> {
        self.handler.clone()
    }

    fn extended_query_handler(&self) -> Arc<impl ExtendedQueryHandler> {
        self.handler.clone()
    }

    fn startup_handler(&self) -> Arc<impl StartupHandler> {
        self.auth_handler.clone()
    }

    fn copy_handler(&self) -> Arc<impl CopyHandler> {
        self.noop.clone()
    }
}

/// Serve one client connection until it closes.
pub async fn process_connection(
    socket: TcpStream,
    tenant_manager: Arc<TenantManager>,
    password: String,
    tls: Option<TlsAcceptor>,
) -> std::io::Result<()> {
    let factory = TimetableFactory::new(tenant_manager, password);
    pgwire::tokio::process_socket(socket, tls, factory).await
}

// ── Errors ───────────────────────────────────────────────────────

fn user_error(code: &str, message: String) -> PgWireError {
    PgWireError::UserError(Box::new(ErrorInfo::new(
        "ERROR".into(),
        code.into(),
        message,
    )))
}

/// SQLSTATE for each engine failure. A blocked schedule carries the conflict
/// report as JSON in the message.
fn engine_err(e: EngineError) -> PgWireError {
    debug!("command rejected: {e}");
    match e {
        EngineError::Validation { .. } => user_error("22023", e.to_string()),
        EngineError::Conflict(report) => user_error("23P01", report.to_json()),
        EngineError::NotFound { .. } => user_error("P0002", e.to_string()),
        other => user_error("P0001", other.to_string()),
    }
}

fn sql_err(e: SqlError) -> PgWireError {
    debug!("statement rejected: {e}");
    let code = if e.is_bad_value() { "22023" } else { "42601" };
    user_error(code, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_highest_placeholder() {
        assert_eq!(count_params("SELECT * FROM conflicts WHERE semester_id = $1"), 1);
        assert_eq!(count_params("INSERT INTO holidays VALUES ($2, $1)"), 2);
        assert_eq!(count_params("SELECT * FROM time_slots"), 0);
        assert_eq!(count_params("SELECT '$' FROM time_slots"), 0);
    }

    #[test]
    fn select_table_for_describe() {
        assert_eq!(
            select_table("SELECT * FROM conflicts WHERE semester_id = $1").as_deref(),
            Some("conflicts")
        );
        assert_eq!(select_table("select id from \"sessions\";").as_deref(), Some("sessions"));
        assert_eq!(select_table("INSERT INTO schedules VALUES ($1)"), None);
    }

    #[test]
    fn describe_schemas_match_tables() {
        assert_eq!(result_schema("SELECT * FROM candidate_conflicts WHERE id = $1").len(), 6);
        assert_eq!(result_schema("SELECT * FROM schedules WHERE semester_id = $1").len(), 7);
        assert_eq!(result_schema("SELECT * FROM teachers").len(), 2);
        assert!(result_schema("UPDATE sessions SET status = $1 WHERE id = $2").is_empty());
    }

    #[test]
    fn warn_notice_only_with_conflicts() {
        let schedule = Schedule {
            id: ulid::Ulid::new(),
            course_id: ulid::Ulid::new(),
            teacher_id: ulid::Ulid::new(),
            classroom_id: ulid::Ulid::new(),
            time_slot_id: ulid::Ulid::new(),
            semester_id: ulid::Ulid::new(),
            is_active: true,
        };
        let clean = ScheduleOutcome {
            schedule,
            conflicts: vec![],
        };
        assert!(conflict_notice(&clean).is_none());
    }
}
