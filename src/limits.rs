/// Max tenants (engines) one server will load.
pub const MAX_TENANTS: usize = 64;
pub const MAX_TENANT_NAME_LEN: usize = 256;

/// Courses, teachers and classrooms combined, per tenant.
pub const MAX_DIRECTORY_ENTRIES: usize = 100_000;
pub const MAX_NAME_LEN: usize = 256;

pub const MAX_SEMESTERS: usize = 1_000;
pub const MAX_TIME_SLOTS: usize = 10_000;
pub const MAX_SCHEDULES_PER_SEMESTER: usize = 20_000;
pub const MAX_HOLIDAYS_PER_SEMESTER: usize = 366;

/// Rows in one multi-row schedule INSERT.
pub const MAX_BATCH_SIZE: usize = 1_000;

/// Longest semester the materializer will expand (about two years).
pub const MAX_SEMESTER_DAYS: i64 = 731;
