use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{stream, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_postgres::error::DbError;
use tokio_postgres::{AsyncMessage, Config, NoTls, SimpleQueryMessage, SimpleQueryRow};
use ulid::Ulid;

use timetable::engine::OnConflict;
use timetable::tenant::TenantManager;
use timetable::wire;

// ── Test infrastructure ──────────────────────────────────────

async fn start_test_server(policy: OnConflict) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let dir = std::env::temp_dir().join(format!("timetable_int_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    let tm = Arc::new(TenantManager::new(dir, 1000, policy));

    tokio::spawn(async move {
        loop {
            let (socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let tm = tm.clone();
            tokio::spawn(async move {
                let _ = wire::process_connection(socket, tm, "timetable".to_string(), None).await;
            });
        }
    });

    addr
}

/// Connect to `dbname`; server notices are forwarded to the returned receiver.
async fn connect(
    addr: SocketAddr,
    dbname: &str,
) -> (tokio_postgres::Client, mpsc::UnboundedReceiver<DbError>) {
    let mut config = Config::new();
    config
        .host(addr.ip().to_string())
        .port(addr.port())
        .dbname(dbname)
        .user("registrar")
        .password("timetable");

    let (client, mut connection) = config.connect(NoTls).await.unwrap();

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let stream = stream::poll_fn(move |cx| connection.poll_message(cx));
        futures::pin_mut!(stream);
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(AsyncMessage::Notice(notice)) => {
                    let _ = tx.send(notice);
                }
                Ok(_) => {}
                Err(_) => break,
            }
        }
    });

    (client, rx)
}

fn data_rows(messages: Vec<SimpleQueryMessage>) -> Vec<SimpleQueryRow> {
    messages
        .into_iter()
        .filter_map(|m| match m {
            SimpleQueryMessage::Row(row) => Some(row),
            _ => None,
        })
        .collect()
}

async fn select(client: &tokio_postgres::Client, sql: &str) -> Vec<SimpleQueryRow> {
    data_rows(client.simple_query(sql).await.unwrap())
}

/// One semester with a course, two teachers and two classrooms.
struct Fixture {
    semester: Ulid,
    course: Ulid,
    teachers: [Ulid; 2],
    rooms: [Ulid; 2],
}

impl Fixture {
    async fn seed(client: &tokio_postgres::Client) -> Self {
        let f = Self {
            semester: Ulid::new(),
            course: Ulid::new(),
            teachers: [Ulid::new(), Ulid::new()],
            rooms: [Ulid::new(), Ulid::new()],
        };
        let statements = [
            format!(
                "INSERT INTO semesters (id, name, start_date, end_date) VALUES ('{}', 'Fall 2025', '2025-09-01', '2026-01-31')",
                f.semester
            ),
            format!("INSERT INTO courses (id, name) VALUES ('{}', 'Compilers')", f.course),
            format!(
                "INSERT INTO teachers (id, name) VALUES ('{}', 'Hopper'), ('{}', 'Liskov')",
                f.teachers[0], f.teachers[1]
            ),
            format!(
                "INSERT INTO classrooms (id, name) VALUES ('{}', 'A-101'), ('{}', 'B-202')",
                f.rooms[0], f.rooms[1]
            ),
        ];
        for sql in &statements {
            client.batch_execute(sql).await.unwrap();
        }
        f
    }

    async fn slot(&self, client: &tokio_postgres::Client, day: u8, start: &str, end: &str) -> Ulid {
        let id = Ulid::new();
        client
            .batch_execute(&format!(
                "INSERT INTO time_slots (id, day_of_week, start_time, end_time) VALUES ('{id}', {day}, '{start}', '{end}')"
            ))
            .await
            .unwrap();
        id
    }

    fn insert_schedule(&self, id: Ulid, teacher: Ulid, room: Ulid, slot: Ulid) -> String {
        format!(
            "INSERT INTO schedules (id, course_id, teacher_id, classroom_id, time_slot_id, semester_id) \
             VALUES ('{id}', '{}', '{teacher}', '{room}', '{slot}', '{}')",
            self.course, self.semester
        )
    }
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn registry_round_trip() {
    let addr = start_test_server(OnConflict::Block).await;
    let (client, _notices) = connect(addr, "registry").await;
    let f = Fixture::seed(&client).await;

    let semesters = select(&client, "SELECT * FROM semesters").await;
    assert_eq!(semesters.len(), 1);
    assert_eq!(semesters[0].get("id"), Some(f.semester.to_string().as_str()));
    assert_eq!(semesters[0].get("name"), Some("Fall 2025"));
    assert_eq!(semesters[0].get("start_date"), Some("2025-09-01"));

    let teachers = select(&client, "SELECT * FROM teachers").await;
    assert_eq!(teachers.len(), 2);

    let slot = f.slot(&client, 0, "08:00", "10:00").await;
    // same value under a new id resolves to the stored slot
    client
        .batch_execute(&format!(
            "INSERT INTO time_slots (id, day_of_week, start_time, end_time) VALUES ('{}', 0, '08:00:00', '10:00:00')",
            Ulid::new()
        ))
        .await
        .unwrap();
    let slots = select(&client, "SELECT * FROM time_slots").await;
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].get("id"), Some(slot.to_string().as_str()));
    assert_eq!(slots[0].get("day_of_week"), Some("0"));
    assert_eq!(slots[0].get("start_time"), Some("08:00:00"));
}

#[tokio::test]
async fn invalid_slot_is_a_data_error() {
    let addr = start_test_server(OnConflict::Block).await;
    let (client, _notices) = connect(addr, "bad_slot").await;

    let err = client
        .batch_execute(&format!(
            "INSERT INTO time_slots (id, day_of_week, start_time, end_time) VALUES ('{}', 0, '10:00', '09:00')",
            Ulid::new()
        ))
        .await
        .unwrap_err();
    assert_eq!(err.as_db_error().unwrap().code().code(), "22023");
}

#[tokio::test]
async fn blocked_schedule_returns_conflict_report() {
    let addr = start_test_server(OnConflict::Block).await;
    let (client, _notices) = connect(addr, "blocking").await;
    let f = Fixture::seed(&client).await;
    let s1 = f.slot(&client, 0, "08:00", "10:00").await;
    let s2 = f.slot(&client, 0, "09:00", "11:00").await;

    let a = Ulid::new();
    client
        .batch_execute(&f.insert_schedule(a, f.teachers[0], f.rooms[0], s1))
        .await
        .unwrap();

    let b = Ulid::new();
    let err = client
        .batch_execute(&f.insert_schedule(b, f.teachers[0], f.rooms[1], s2))
        .await
        .unwrap_err();
    let db = err.as_db_error().unwrap();
    assert_eq!(db.code().code(), "23P01");

    let report: serde_json::Value = serde_json::from_str(db.message()).unwrap();
    assert_eq!(report["conflicts_found"], true);
    let conflicts = report["conflicts"].as_array().unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0]["type"], "teacher");
    assert_eq!(conflicts[0]["schedule_a_id"], a.to_string());
    assert_eq!(conflicts[0]["schedule_b_id"], b.to_string());
    assert_eq!(conflicts[0]["overlap_start"], "09:00:00");
    assert_eq!(conflicts[0]["overlap_end"], "10:00:00");

    let schedules = select(
        &client,
        &format!("SELECT * FROM schedules WHERE semester_id = '{}'", f.semester),
    )
    .await;
    assert_eq!(schedules.len(), 1);
}

#[tokio::test]
async fn warn_policy_sends_notice_and_commits() {
    let addr = start_test_server(OnConflict::Warn).await;
    let (client, mut notices) = connect(addr, "warning").await;
    let f = Fixture::seed(&client).await;
    let slot = f.slot(&client, 2, "13:00", "15:00").await;

    client
        .batch_execute(&f.insert_schedule(Ulid::new(), f.teachers[0], f.rooms[0], slot))
        .await
        .unwrap();
    client
        .batch_execute(&f.insert_schedule(Ulid::new(), f.teachers[1], f.rooms[0], slot))
        .await
        .unwrap();

    let notice = tokio::time::timeout(Duration::from_secs(2), notices.recv())
        .await
        .ok()
        .flatten()
        .expect("conflict notice");
    assert_eq!(notice.code().code(), "01000");
    let report: serde_json::Value = serde_json::from_str(notice.message()).unwrap();
    assert_eq!(report["conflicts"][0]["type"], "classroom");

    let conflicts = select(
        &client,
        &format!("SELECT * FROM conflicts WHERE semester_id = '{}'", f.semester),
    )
    .await;
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].get("type"), Some("classroom"));
    assert_eq!(conflicts[0].get("day_of_week"), Some("2"));
}

#[tokio::test]
async fn multi_row_schedule_insert_is_all_or_nothing() {
    let addr = start_test_server(OnConflict::Block).await;
    let (client, _notices) = connect(addr, "multi_row").await;
    let f = Fixture::seed(&client).await;
    let s1 = f.slot(&client, 0, "08:00", "10:00").await;
    let s2 = f.slot(&client, 0, "09:00", "11:00").await;
    let columns = "id, course_id, teacher_id, classroom_id, time_slot_id, semester_id";
    let row = |id: Ulid, teacher: Ulid, room: Ulid, slot: Ulid| {
        format!("('{id}', '{}', '{teacher}', '{room}', '{slot}', '{}')", f.course, f.semester)
    };

    // the second row clashes with the first on the teacher
    let (a, b) = (Ulid::new(), Ulid::new());
    let sql = format!(
        "INSERT INTO schedules ({columns}) VALUES {}, {}",
        row(a, f.teachers[0], f.rooms[0], s1),
        row(b, f.teachers[0], f.rooms[1], s2)
    );
    let err = client.batch_execute(&sql).await.unwrap_err();
    let db = err.as_db_error().unwrap();
    assert_eq!(db.code().code(), "23P01");
    let report: serde_json::Value = serde_json::from_str(db.message()).unwrap();
    assert_eq!(report["conflicts"][0]["schedule_a_id"], a.to_string());
    assert_eq!(report["conflicts"][0]["schedule_b_id"], b.to_string());

    let listed = format!("SELECT * FROM schedules WHERE semester_id = '{}'", f.semester);
    assert!(select(&client, &listed).await.is_empty());

    let sql = format!(
        "INSERT INTO schedules ({columns}) VALUES {}, {}",
        row(Ulid::new(), f.teachers[0], f.rooms[0], s1),
        row(Ulid::new(), f.teachers[1], f.rooms[1], s2)
    );
    assert_eq!(client.execute(&sql, &[]).await.unwrap(), 2);
    assert_eq!(select(&client, &listed).await.len(), 2);
}

#[tokio::test]
async fn duplicate_slot_insert_reports_registered_id() {
    let addr = start_test_server(OnConflict::Block).await;
    let (client, mut notices) = connect(addr, "slot_dedup").await;
    let f = Fixture::seed(&client).await;
    let registered = f.slot(&client, 0, "08:00", "10:00").await;

    let mine = Ulid::new();
    let inserted = client
        .execute(
            &format!(
                "INSERT INTO time_slots (id, day_of_week, start_time, end_time) VALUES ('{mine}', 0, '08:00', '10:00')"
            ),
            &[],
        )
        .await
        .unwrap();
    assert_eq!(inserted, 0);

    let notice = tokio::time::timeout(Duration::from_secs(2), notices.recv())
        .await
        .ok()
        .flatten()
        .expect("registered slot notice");
    assert_eq!(notice.code().code(), "42710");
    let resolved = notice.detail().unwrap().to_string();
    assert_eq!(resolved, registered.to_string());

    // the client's own id was never stored
    let err = client
        .batch_execute(&f.insert_schedule(Ulid::new(), f.teachers[0], f.rooms[0], mine))
        .await
        .unwrap_err();
    assert_eq!(err.as_db_error().unwrap().code().code(), "P0002");

    let by_value = select(
        &client,
        "SELECT * FROM time_slots WHERE day_of_week = 0 AND start_time = '08:00' AND end_time = '10:00'",
    )
    .await;
    assert_eq!(by_value.len(), 1);
    assert_eq!(by_value[0].get("id"), Some(resolved.as_str()));
    let other_value = select(
        &client,
        "SELECT * FROM time_slots WHERE day_of_week = 0 AND start_time = '08:00' AND end_time = '11:00'",
    )
    .await;
    assert!(other_value.is_empty());

    let slot = Ulid::from_string(&resolved).unwrap();
    client
        .batch_execute(&f.insert_schedule(Ulid::new(), f.teachers[0], f.rooms[0], slot))
        .await
        .unwrap();

    let by_teacher = |teacher: Ulid| {
        format!(
            "SELECT * FROM schedules WHERE semester_id = '{}' AND teacher_id = '{teacher}'",
            f.semester
        )
    };
    assert_eq!(select(&client, &by_teacher(f.teachers[0])).await.len(), 1);
    assert!(select(&client, &by_teacher(f.teachers[1])).await.is_empty());
}

#[tokio::test]
async fn unknown_select_filter_is_rejected() {
    let addr = start_test_server(OnConflict::Block).await;
    let (client, _notices) = connect(addr, "select_filters").await;
    let f = Fixture::seed(&client).await;

    let err = client
        .simple_query(&format!(
            "SELECT * FROM schedules WHERE semester_id = '{}' AND is_active = true",
            f.semester
        ))
        .await
        .unwrap_err();
    assert_eq!(err.as_db_error().unwrap().code().code(), "42601");
}

#[tokio::test]
async fn candidate_conflicts_preview() {
    let addr = start_test_server(OnConflict::Block).await;
    let (client, _notices) = connect(addr, "candidate").await;
    let f = Fixture::seed(&client).await;
    let slot = f.slot(&client, 1, "10:00", "12:00").await;
    client
        .batch_execute(&f.insert_schedule(Ulid::new(), f.teachers[0], f.rooms[0], slot))
        .await
        .unwrap();

    let rows = select(
        &client,
        &format!(
            "SELECT * FROM candidate_conflicts WHERE course_id = '{}' AND teacher_id = '{}' \
             AND classroom_id = '{}' AND time_slot_id = '{slot}' AND semester_id = '{}'",
            f.course, f.teachers[0], f.rooms[0], f.semester
        ),
    )
    .await;
    let kinds: Vec<_> = rows.iter().map(|r| r.get("type").unwrap().to_string()).collect();
    assert_eq!(kinds, vec!["teacher", "classroom"]);

    let schedules = select(
        &client,
        &format!("SELECT * FROM schedules WHERE semester_id = '{}'", f.semester),
    )
    .await;
    assert_eq!(schedules.len(), 1);
}

#[tokio::test]
async fn materialize_and_track_sessions() {
    let addr = start_test_server(OnConflict::Block).await;
    let (client, _notices) = connect(addr, "sessions").await;
    let f = Fixture::seed(&client).await;
    let slot = f.slot(&client, 0, "08:00", "10:00").await;
    let sid = Ulid::new();
    client
        .batch_execute(&f.insert_schedule(sid, f.teachers[0], f.rooms[0], slot))
        .await
        .unwrap();
    client
        .batch_execute(&format!(
            "INSERT INTO holidays (semester_id, date) VALUES ('{}', '2025-10-13')",
            f.semester
        ))
        .await
        .unwrap();

    let added = client
        .execute(
            &format!("INSERT INTO sessions (schedule_id) VALUES ('{sid}')"),
            &[],
        )
        .await
        .unwrap();
    assert_eq!(added, 22);

    let sessions = select(&client, &format!("SELECT * FROM sessions WHERE schedule_id = '{sid}'")).await;
    assert_eq!(sessions.len(), 22);
    assert_eq!(sessions[0].get("date"), Some("2025-09-01"));
    let holiday = sessions.iter().find(|r| r.get("date") == Some("2025-10-13")).unwrap();
    assert_eq!(holiday.get("status"), Some("cancelled"));

    // a second run adds nothing
    let again = client
        .execute(
            &format!("INSERT INTO sessions (semester_id) VALUES ('{}')", f.semester),
            &[],
        )
        .await
        .unwrap();
    assert_eq!(again, 0);

    let first = sessions[0].get("id").unwrap().to_string();
    client
        .batch_execute(&format!("UPDATE sessions SET status = 'held' WHERE id = '{first}'"))
        .await
        .unwrap();
    let err = client
        .batch_execute(&format!("UPDATE sessions SET status = 'cancelled' WHERE id = '{first}'"))
        .await
        .unwrap_err();
    assert_eq!(err.as_db_error().unwrap().code().code(), "P0001");
}

#[tokio::test]
async fn referenced_slot_is_locked() {
    let addr = start_test_server(OnConflict::Block).await;
    let (client, _notices) = connect(addr, "slot_lock").await;
    let f = Fixture::seed(&client).await;
    let slot = f.slot(&client, 3, "08:00", "10:00").await;
    let sid = Ulid::new();
    client
        .batch_execute(&f.insert_schedule(sid, f.teachers[0], f.rooms[0], slot))
        .await
        .unwrap();

    let err = client
        .batch_execute(&format!("UPDATE time_slots SET end_time = '11:00' WHERE id = '{slot}'"))
        .await
        .unwrap_err();
    assert!(err.as_db_error().unwrap().message().contains("referenced"));

    client
        .batch_execute(&format!("DELETE FROM schedules WHERE id = '{sid}'"))
        .await
        .unwrap();
    client
        .batch_execute(&format!("DELETE FROM time_slots WHERE id = '{slot}'"))
        .await
        .unwrap();
    assert!(select(&client, "SELECT * FROM time_slots").await.is_empty());
}

#[tokio::test]
async fn missing_reference_is_not_found() {
    let addr = start_test_server(OnConflict::Block).await;
    let (client, _notices) = connect(addr, "missing").await;
    let f = Fixture::seed(&client).await;
    let slot = f.slot(&client, 0, "08:00", "10:00").await;

    let err = client
        .batch_execute(&f.insert_schedule(Ulid::new(), Ulid::new(), f.rooms[0], slot))
        .await
        .unwrap_err();
    assert_eq!(err.as_db_error().unwrap().code().code(), "P0002");
}

#[tokio::test]
async fn unknown_table_is_a_syntax_error() {
    let addr = start_test_server(OnConflict::Block).await;
    let (client, _notices) = connect(addr, "syntax").await;
    let err = client.simple_query("SELECT * FROM bookings").await.unwrap_err();
    assert_eq!(err.as_db_error().unwrap().code().code(), "42601");
}

#[tokio::test]
async fn extended_query_with_parameters() {
    let addr = start_test_server(OnConflict::Block).await;
    let (client, _notices) = connect(addr, "extended").await;
    let f = Fixture::seed(&client).await;
    let semester = f.semester.to_string();

    client
        .execute(
            "INSERT INTO holidays (semester_id, date) VALUES ($1, $2)",
            &[&semester, &"2025-11-27"],
        )
        .await
        .unwrap();

    let rows = client
        .query("SELECT * FROM holidays WHERE semester_id = $1", &[&semester])
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    let date: String = rows[0].get("date");
    assert_eq!(date, "2025-11-27");
}

#[tokio::test]
async fn tenants_are_isolated() {
    let addr = start_test_server(OnConflict::Block).await;
    let (first, _n1) = connect(addr, "faculty_a").await;
    let (second, _n2) = connect(addr, "faculty_b").await;
    Fixture::seed(&first).await;

    assert_eq!(select(&first, "SELECT * FROM semesters").await.len(), 1);
    assert!(select(&second, "SELECT * FROM semesters").await.is_empty());
}
