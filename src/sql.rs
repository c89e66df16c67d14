use chrono::{NaiveDate, NaiveTime};
use sqlparser::ast::{
    self, AssignmentTarget, Expr, FromTable, ObjectNamePart, SetExpr, Statement, TableFactor,
    TableObject, Value, ValueWithSpan,
};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use thiserror::Error;
use ulid::Ulid;

use crate::model::*;

/// Which sessions a `SELECT ... FROM sessions` asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionScope {
    Schedule(Ulid),
    Semester(Ulid),
}

/// Equality filters of a `SELECT ... FROM time_slots`. Unset fields match any slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotFilter {
    pub id: Option<Ulid>,
    pub day_of_week: Option<DayOfWeek>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
}

impl SlotFilter {
    pub fn matches(&self, slot: &TimeSlot) -> bool {
        self.id.is_none_or(|id| id == slot.id)
            && self.day_of_week.is_none_or(|d| d == slot.day_of_week)
            && self.start_time.is_none_or(|t| t == slot.span.start)
            && self.end_time.is_none_or(|t| t == slot.span.end)
    }
}

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertEntity {
        kind: EntityKind,
        id: Ulid,
        name: Option<String>,
    },
    InsertSemester {
        id: Ulid,
        name: Option<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
    UpdateSemester {
        id: Ulid,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    },
    InsertHoliday {
        semester_id: Ulid,
        date: NaiveDate,
    },
    InsertTimeSlot {
        id: Ulid,
        day_of_week: DayOfWeek,
        start_time: NaiveTime,
        end_time: NaiveTime,
    },
    UpdateTimeSlot {
        id: Ulid,
        day_of_week: Option<DayOfWeek>,
        start_time: Option<NaiveTime>,
        end_time: Option<NaiveTime>,
    },
    DeleteTimeSlot {
        id: Ulid,
    },
    InsertSchedule(Schedule),
    UpdateSchedule {
        id: Ulid,
        changes: ScheduleChanges,
    },
    DeleteSchedule {
        id: Ulid,
    },
    MaterializeSchedule {
        schedule_id: Ulid,
    },
    MaterializeSemester {
        semester_id: Ulid,
    },
    UpdateSessionStatus {
        id: Ulid,
        status: SessionStatus,
    },
    /// Multi-row INSERT. Schedule rows commit as one unit.
    Batch(Vec<Command>),
    SelectConflicts {
        semester_id: Ulid,
    },
    SelectCandidateConflicts(Schedule),
    SelectSchedules {
        semester_id: Ulid,
        teacher_id: Option<Ulid>,
        classroom_id: Option<Ulid>,
    },
    SelectSchedule {
        id: Ulid,
    },
    SelectTimeSlots(SlotFilter),
    SelectSessions(SessionScope),
    SelectSemesters,
    SelectHolidays {
        semester_id: Ulid,
    },
    SelectDirectory {
        kind: EntityKind,
    },
}

impl Command {
    /// True for commands answered with rows rather than a command tag.
    pub fn is_query(&self) -> bool {
        matches!(
            self,
            Command::SelectConflicts { .. }
                | Command::SelectCandidateConflicts(_)
                | Command::SelectSchedules { .. }
                | Command::SelectSchedule { .. }
                | Command::SelectTimeSlots(_)
                | Command::SelectSessions(_)
                | Command::SelectSemesters
                | Command::SelectHolidays { .. }
                | Command::SelectDirectory { .. }
        )
    }
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let trimmed = sql.trim();
    if trimmed.is_empty() {
        return Err(SqlError::Empty);
    }
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    let Some(stmt) = stmts.first() else {
        return Err(SqlError::Empty);
    };

    match stmt {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Delete(delete) => parse_delete(delete),
        Statement::Query(query) => parse_select(query),
        Statement::Update {
            table,
            assignments,
            from: None,
            selection,
            returning: None,
            ..
        } => parse_update(table, assignments, selection.as_ref()),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

// ── Literals and column sets ─────────────────────────────────

/// A SQL constant taken from the AST.
#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Text(String),
    Number(String),
    Bool(bool),
    Null,
}

fn bad(column: &str, reason: impl Into<String>) -> SqlError {
    SqlError::BadValue {
        column: column.to_string(),
        reason: reason.into(),
    }
}

impl Literal {
    fn text(&self, column: &str) -> Result<&str, SqlError> {
        match self {
            Literal::Text(s) | Literal::Number(s) => Ok(s),
            other => Err(bad(column, format!("expected a string, got {other:?}"))),
        }
    }

    fn optional_text(&self, column: &str) -> Result<Option<String>, SqlError> {
        match self {
            Literal::Null => Ok(None),
            other => Ok(Some(other.text(column)?.to_string())),
        }
    }

    fn ulid(&self, column: &str) -> Result<Ulid, SqlError> {
        let s = self.text(column)?;
        Ulid::from_string(s).map_err(|e| bad(column, format!("bad ULID {s:?}: {e}")))
    }

    fn date(&self, column: &str) -> Result<NaiveDate, SqlError> {
        let s = self.text(column)?;
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_err(|e| bad(column, format!("bad date {s:?}: {e}")))
    }

    /// `HH:MM` or `HH:MM:SS`.
    fn time(&self, column: &str) -> Result<NaiveTime, SqlError> {
        let s = self.text(column)?.trim();
        NaiveTime::parse_from_str(s, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
            .map_err(|e| bad(column, format!("bad time {s:?}: {e}")))
    }

    fn day(&self, column: &str) -> Result<DayOfWeek, SqlError> {
        let s = self.text(column)?;
        s.trim()
            .parse::<DayOfWeek>()
            .map_err(|_| bad(column, format!("bad day of week {s:?}")))
    }

    fn boolean(&self, column: &str) -> Result<bool, SqlError> {
        match self {
            Literal::Bool(b) => Ok(*b),
            Literal::Text(s) | Literal::Number(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "t" | "1" => Ok(true),
                "false" | "f" | "0" => Ok(false),
                _ => Err(bad(column, format!("bad bool {s:?}"))),
            },
            Literal::Null => Err(bad(column, "NULL is not a bool")),
        }
    }

    fn status(&self, column: &str) -> Result<SessionStatus, SqlError> {
        self.text(column)?.parse().map_err(|e: String| bad(column, e))
    }
}

/// Column → literal pairs of one INSERT row, WHERE clause or SET list.
#[derive(Debug, Default)]
struct Fields(Vec<(String, Literal)>);

impl Fields {
    fn get(&self, column: &str) -> Option<&Literal> {
        self.0.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    fn require(&self, column: &'static str) -> Result<&Literal, SqlError> {
        self.get(column).ok_or(SqlError::MissingColumn(column))
    }

    fn filter(&self, column: &'static str) -> Result<&Literal, SqlError> {
        self.get(column).ok_or(SqlError::MissingFilter(column))
    }

    fn only(&self, known: &[&str]) -> Result<(), SqlError> {
        match self.0.iter().find(|(c, _)| !known.contains(&c.as_str())) {
            Some((c, _)) => Err(SqlError::UnknownColumn(c.clone())),
            None => Ok(()),
        }
    }
}

fn directory_kind(table: &str) -> Option<EntityKind> {
    match table {
        "courses" => Some(EntityKind::Course),
        "teachers" => Some(EntityKind::Teacher),
        "classrooms" => Some(EntityKind::Classroom),
        _ => None,
    }
}

/// Column order assumed by an INSERT without a column list.
fn default_columns(table: &str) -> Option<&'static [&'static str]> {
    match table {
        "courses" | "teachers" | "classrooms" => Some(&["id", "name"]),
        "semesters" => Some(&["id", "start_date", "end_date", "name"]),
        "holidays" => Some(&["semester_id", "date"]),
        "time_slots" => Some(&["id", "day_of_week", "start_time", "end_time"]),
        "schedules" => Some(&[
            "id",
            "course_id",
            "teacher_id",
            "classroom_id",
            "time_slot_id",
            "semester_id",
            "is_active",
        ]),
        "sessions" => Some(&["schedule_id"]),
        _ => None,
    }
}

// ── INSERT ───────────────────────────────────────────────────

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let defaults = default_columns(&table).ok_or_else(|| SqlError::UnknownTable(table.clone()))?;
    let columns: Vec<String> = if insert.columns.is_empty() {
        defaults.iter().map(|c| c.to_string()).collect()
    } else {
        insert.columns.iter().map(|i| i.value.to_lowercase()).collect()
    };

    let rows = extract_insert_rows(insert)?;
    let mut commands = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        if row.len() > columns.len() {
            return Err(SqlError::WrongArity {
                table: table.clone(),
                expected: columns.len(),
                got: row.len(),
            });
        }
        let mut fields = Fields::default();
        for (column, expr) in columns.iter().zip(row) {
            fields.0.push((column.clone(), literal(expr)?));
        }
        let cmd = insert_row(&table, &fields).map_err(|e| match rows.len() {
            1 => e,
            _ => SqlError::Row(i, Box::new(e)),
        })?;
        commands.push(cmd);
    }

    match commands.len() {
        1 => Ok(commands.remove(0)),
        _ => Ok(Command::Batch(commands)),
    }
}

fn insert_row(table: &str, row: &Fields) -> Result<Command, SqlError> {
    if let Some(kind) = directory_kind(table) {
        row.only(&["id", "name"])?;
        return Ok(Command::InsertEntity {
            kind,
            id: row.require("id")?.ulid("id")?,
            name: row.get("name").map(|v| v.optional_text("name")).transpose()?.flatten(),
        });
    }
    match table {
        "semesters" => {
            row.only(&["id", "start_date", "end_date", "name"])?;
            Ok(Command::InsertSemester {
                id: row.require("id")?.ulid("id")?,
                name: row.get("name").map(|v| v.optional_text("name")).transpose()?.flatten(),
                start_date: row.require("start_date")?.date("start_date")?,
                end_date: row.require("end_date")?.date("end_date")?,
            })
        }
        "holidays" => {
            row.only(&["semester_id", "date"])?;
            Ok(Command::InsertHoliday {
                semester_id: row.require("semester_id")?.ulid("semester_id")?,
                date: row.require("date")?.date("date")?,
            })
        }
        "time_slots" => {
            row.only(&["id", "day_of_week", "start_time", "end_time"])?;
            Ok(Command::InsertTimeSlot {
                id: row.require("id")?.ulid("id")?,
                day_of_week: row.require("day_of_week")?.day("day_of_week")?,
                start_time: row.require("start_time")?.time("start_time")?,
                end_time: row.require("end_time")?.time("end_time")?,
            })
        }
        "schedules" => {
            row.only(&[
                "id",
                "course_id",
                "teacher_id",
                "classroom_id",
                "time_slot_id",
                "semester_id",
                "is_active",
            ])?;
            Ok(Command::InsertSchedule(Schedule {
                id: row.require("id")?.ulid("id")?,
                course_id: row.require("course_id")?.ulid("course_id")?,
                teacher_id: row.require("teacher_id")?.ulid("teacher_id")?,
                classroom_id: row.require("classroom_id")?.ulid("classroom_id")?,
                time_slot_id: row.require("time_slot_id")?.ulid("time_slot_id")?,
                semester_id: row.require("semester_id")?.ulid("semester_id")?,
                is_active: match row.get("is_active") {
                    Some(v) => v.boolean("is_active")?,
                    None => true,
                },
            }))
        }
        "sessions" => {
            row.only(&["schedule_id", "semester_id"])?;
            if let Some(v) = row.get("schedule_id") {
                Ok(Command::MaterializeSchedule {
                    schedule_id: v.ulid("schedule_id")?,
                })
            } else {
                Ok(Command::MaterializeSemester {
                    semester_id: row.require("semester_id")?.ulid("semester_id")?,
                })
            }
        }
        _ => Err(SqlError::UnknownTable(table.to_string())),
    }
}

// ── DELETE ───────────────────────────────────────────────────

fn parse_delete(delete: &ast::Delete) -> Result<Command, SqlError> {
    let table = delete_table_name(delete)?;
    let filters = where_filters(delete.selection.as_ref())?;
    let id = filters.filter("id")?.ulid("id")?;

    match table.as_str() {
        "time_slots" => Ok(Command::DeleteTimeSlot { id }),
        "schedules" => Ok(Command::DeleteSchedule { id }),
        _ => Err(SqlError::Unsupported(format!("DELETE FROM {table}"))),
    }
}

// ── SELECT ───────────────────────────────────────────────────

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };
    let Some(from) = select.from.first() else {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    };
    let table = table_factor_name(&from.relation)?;
    let filters = where_filters(select.selection.as_ref())?;
    let ulid_of = |c: &str| filters.get(c).map(|v| v.ulid(c)).transpose();

    if let Some(kind) = directory_kind(&table) {
        filters.only(&[])?;
        return Ok(Command::SelectDirectory { kind });
    }
    match table.as_str() {
        "conflicts" => {
            filters.only(&["semester_id"])?;
            Ok(Command::SelectConflicts {
                semester_id: filters.filter("semester_id")?.ulid("semester_id")?,
            })
        }
        "candidate_conflicts" => {
            filters.only(&[
                "id",
                "course_id",
                "teacher_id",
                "classroom_id",
                "time_slot_id",
                "semester_id",
            ])?;
            Ok(Command::SelectCandidateConflicts(Schedule {
                // Re-checking an existing schedule passes its id so it is not compared with itself.
                id: ulid_of("id")?.unwrap_or_else(Ulid::new),
                course_id: filters.filter("course_id")?.ulid("course_id")?,
                teacher_id: filters.filter("teacher_id")?.ulid("teacher_id")?,
                classroom_id: filters.filter("classroom_id")?.ulid("classroom_id")?,
                time_slot_id: filters.filter("time_slot_id")?.ulid("time_slot_id")?,
                semester_id: filters.filter("semester_id")?.ulid("semester_id")?,
                is_active: true,
            }))
        }
        "schedules" => match filters.get("id") {
            Some(v) => {
                filters.only(&["id"])?;
                Ok(Command::SelectSchedule { id: v.ulid("id")? })
            }
            None => {
                filters.only(&["semester_id", "teacher_id", "classroom_id"])?;
                Ok(Command::SelectSchedules {
                    semester_id: filters.filter("semester_id")?.ulid("semester_id")?,
                    teacher_id: ulid_of("teacher_id")?,
                    classroom_id: ulid_of("classroom_id")?,
                })
            }
        },
        "time_slots" => {
            filters.only(&["id", "day_of_week", "start_time", "end_time"])?;
            Ok(Command::SelectTimeSlots(SlotFilter {
                id: ulid_of("id")?,
                day_of_week: filters.get("day_of_week").map(|v| v.day("day_of_week")).transpose()?,
                start_time: filters.get("start_time").map(|v| v.time("start_time")).transpose()?,
                end_time: filters.get("end_time").map(|v| v.time("end_time")).transpose()?,
            }))
        }
        "sessions" => match filters.get("schedule_id") {
            Some(v) => {
                filters.only(&["schedule_id"])?;
                Ok(Command::SelectSessions(SessionScope::Schedule(
                    v.ulid("schedule_id")?,
                )))
            }
            None => {
                filters.only(&["semester_id"])?;
                Ok(Command::SelectSessions(SessionScope::Semester(
                    filters.filter("semester_id")?.ulid("semester_id")?,
                )))
            }
        },
        "semesters" => {
            filters.only(&[])?;
            Ok(Command::SelectSemesters)
        }
        "holidays" => {
            filters.only(&["semester_id"])?;
            Ok(Command::SelectHolidays {
                semester_id: filters.filter("semester_id")?.ulid("semester_id")?,
            })
        }
        _ => Err(SqlError::UnknownTable(table)),
    }
}

/// Flatten `a = 1 AND b = 2 AND ...` into fields. Anything else is unsupported.
fn where_filters(selection: Option<&Expr>) -> Result<Fields, SqlError> {
    let mut fields = Fields::default();
    if let Some(expr) = selection {
        collect_eq_filters(expr, &mut fields)?;
    }
    Ok(fields)
}

fn collect_eq_filters(expr: &Expr, out: &mut Fields) -> Result<(), SqlError> {
    match expr {
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::And,
            right,
        } => {
            collect_eq_filters(left, out)?;
            collect_eq_filters(right, out)
        }
        Expr::BinaryOp {
            left,
            op: ast::BinaryOperator::Eq,
            right,
        } => {
            let column = expr_column_name(left)
                .ok_or_else(|| SqlError::Unsupported(format!("filter on {left}")))?;
            out.0.push((column, literal(right)?));
            Ok(())
        }
        Expr::Nested(inner) => collect_eq_filters(inner, out),
        other => Err(SqlError::Unsupported(format!("WHERE {other}"))),
    }
}

// ── UPDATE ───────────────────────────────────────────────────

fn parse_update(
    table: &ast::TableWithJoins,
    assignments: &[ast::Assignment],
    selection: Option<&Expr>,
) -> Result<Command, SqlError> {
    if !table.joins.is_empty() {
        return Err(SqlError::Unsupported("UPDATE with joins".into()));
    }
    let table = table_factor_name(&table.relation)?;
    let mut set = Fields::default();
    for assignment in assignments {
        let column = match &assignment.target {
            AssignmentTarget::ColumnName(name) => {
                object_name_last(name).ok_or_else(|| SqlError::Parse("empty column name".into()))?
            }
            AssignmentTarget::Tuple(_) => {
                return Err(SqlError::Unsupported(format!("SET {assignment}")));
            }
        };
        set.0.push((column, literal(&assignment.value)?));
    }
    let filters = where_filters(selection)?;
    filters.only(&["id"])?;
    let id = filters.filter("id")?.ulid("id")?;

    match table.as_str() {
        "semesters" => {
            set.only(&["start_date", "end_date"])?;
            Ok(Command::UpdateSemester {
                id,
                start_date: set.get("start_date").map(|v| v.date("start_date")).transpose()?,
                end_date: set.get("end_date").map(|v| v.date("end_date")).transpose()?,
            })
        }
        "time_slots" => {
            set.only(&["day_of_week", "start_time", "end_time"])?;
            Ok(Command::UpdateTimeSlot {
                id,
                day_of_week: set.get("day_of_week").map(|v| v.day("day_of_week")).transpose()?,
                start_time: set.get("start_time").map(|v| v.time("start_time")).transpose()?,
                end_time: set.get("end_time").map(|v| v.time("end_time")).transpose()?,
            })
        }
        "schedules" => {
            if set.get("semester_id").is_some() {
                return Err(bad("semester_id", "a schedule cannot move to another semester"));
            }
            set.only(&["course_id", "teacher_id", "classroom_id", "time_slot_id", "is_active"])?;
            let ulid_of = |c: &str| set.get(c).map(|v| v.ulid(c)).transpose();
            Ok(Command::UpdateSchedule {
                id,
                changes: ScheduleChanges {
                    course_id: ulid_of("course_id")?,
                    teacher_id: ulid_of("teacher_id")?,
                    classroom_id: ulid_of("classroom_id")?,
                    time_slot_id: ulid_of("time_slot_id")?,
                    is_active: set.get("is_active").map(|v| v.boolean("is_active")).transpose()?,
                },
            })
        }
        "sessions" => {
            set.only(&["status"])?;
            Ok(Command::UpdateSessionStatus {
                id,
                status: set.require("status")?.status("status")?,
            })
        }
        _ => Err(SqlError::Unsupported(format!("UPDATE {table}"))),
    }
}

// ── AST helpers ──────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn delete_table_name(delete: &ast::Delete) -> Result<String, SqlError> {
    let tables_with_joins = match &delete.from {
        FromTable::WithFromKeyword(t) | FromTable::WithoutKeyword(t) => t,
    };
    match tables_with_joins.first() {
        Some(first) => table_factor_name(&first.relation),
        None => Err(SqlError::Parse("DELETE without table".into())),
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_rows(insert: &ast::Insert) -> Result<&[Vec<Expr>], SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    match body.body.as_ref() {
        SetExpr::Values(values) if values.rows.is_empty() => {
            Err(SqlError::Parse("empty VALUES".into()))
        }
        SetExpr::Values(values) => Ok(&values.rows),
        _ => Err(SqlError::Parse("expected VALUES".into())),
    }
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn literal(expr: &Expr) -> Result<Literal, SqlError> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => match value {
            Value::SingleQuotedString(s) => Ok(Literal::Text(s.clone())),
            Value::Number(n, _) => Ok(Literal::Number(n.clone())),
            Value::Boolean(b) => Ok(Literal::Bool(*b)),
            Value::Null => Ok(Literal::Null),
            other => Err(SqlError::Parse(format!("unsupported literal {other}"))),
        },
        Expr::UnaryOp {
            op: ast::UnaryOperator::Minus,
            expr,
        } => match literal(expr)? {
            Literal::Number(n) => Ok(Literal::Number(format!("-{n}"))),
            other => Err(SqlError::Parse(format!("cannot negate {other:?}"))),
        },
        // '2025-09-01'::date and friends: the text is what matters
        Expr::Cast { expr, .. } | Expr::Nested(expr) => literal(expr),
        other => Err(SqlError::Parse(format!("expected a literal, got {other}"))),
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SqlError {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("empty query")]
    Empty,
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    #[error("{table}: expected at most {expected} values, got {got}")]
    WrongArity {
        table: String,
        expected: usize,
        got: usize,
    },
    #[error("missing column: {0}")]
    MissingColumn(&'static str),
    #[error("missing filter: {0}")]
    MissingFilter(&'static str),
    #[error("invalid {column}: {reason}")]
    BadValue { column: String, reason: String },
    #[error("row {0}: {1}")]
    Row(usize, Box<SqlError>),
}

impl SqlError {
    /// A well-formed statement carrying a value the column cannot hold.
    pub fn is_bad_value(&self) -> bool {
        match self {
            SqlError::BadValue { .. } => true,
            SqlError::Row(_, inner) => inner.is_bad_value(),
            _ => false,
        }
    }
}
