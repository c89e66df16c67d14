use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;

use crate::compactor;
use crate::engine::{Engine, OnConflict};
use crate::limits::*;
use crate::notify::NotifyHub;

/// Per-database engines. Each tenant owns its registry, semesters and WAL,
/// plus a compactor task. The tenant is the database name from the pgwire
/// startup packet.
pub struct TenantManager {
    engines: DashMap<String, Arc<Engine>>,
    data_dir: PathBuf,
    compact_threshold: u64,
    on_conflict: OnConflict,
}

impl TenantManager {
    pub fn new(data_dir: PathBuf, compact_threshold: u64, on_conflict: OnConflict) -> Self {
        Self {
            engines: DashMap::new(),
            data_dir,
            compact_threshold,
            on_conflict,
        }
    }

    /// Get or lazily create (and replay) the engine for a tenant.
    pub fn get_or_create(&self, tenant: &str) -> std::io::Result<Arc<Engine>> {
        if let Some(engine) = self.engines.get(tenant) {
            return Ok(engine.value().clone());
        }
        if tenant.len() > MAX_TENANT_NAME_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "tenant name too long",
            ));
        }
        if self.engines.len() >= MAX_TENANTS {
            return Err(std::io::Error::other("too many tenants"));
        }

        // path traversal
        let safe_name: String = tenant
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
            .collect();
        if safe_name.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty tenant name",
            ));
        }

        let wal_path = self.data_dir.join(format!("{safe_name}.wal"));
        let notify = Arc::new(NotifyHub::new());
        let engine = Arc::new(Engine::new(wal_path, notify, self.on_conflict)?);

        tokio::spawn(compactor::run_compactor(engine.clone(), self.compact_threshold));

        self.engines.insert(tenant.to_string(), engine.clone());
        metrics::gauge!(crate::observability::TENANTS_ACTIVE).set(self.engines.len() as f64);
        tracing::info!(tenant, policy = ?self.on_conflict, "tenant loaded");
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use chrono::{NaiveDate, NaiveTime};
    use std::fs;
    use ulid::Ulid;

    fn test_data_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("timetable_test_tenant").join(name);
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn tenant_isolation() {
        let dir = test_data_dir("isolation");
        let tm = TenantManager::new(dir, 1000, OnConflict::Block);

        let eng_a = tm.get_or_create("tenant_a").unwrap();
        let eng_b = tm.get_or_create("tenant_b").unwrap();

        let semester = Ulid::new();
        let (course, teacher, room) = (Ulid::new(), Ulid::new(), Ulid::new());
        for eng in [&eng_a, &eng_b] {
            eng.create_semester(semester, None, date(2025, 9, 1), date(2025, 12, 19))
                .await
                .unwrap();
        }
        eng_a.register_entity(EntityKind::Course, course, None).await.unwrap();
        eng_a.register_entity(EntityKind::Teacher, teacher, None).await.unwrap();
        eng_a.register_entity(EntityKind::Classroom, room, None).await.unwrap();
        let (slot, _) = eng_a
            .get_or_create_time_slot(Ulid::new(), 0, time(8), time(10))
            .await
            .unwrap();
        eng_a
            .create_schedule(Schedule {
                id: Ulid::new(),
                course_id: course,
                teacher_id: teacher,
                classroom_id: room,
                time_slot_id: slot.id,
                semester_id: semester,
                is_active: true,
            })
            .await
            .unwrap();

        assert_eq!(eng_a.list_schedules(semester).await.unwrap().len(), 1);
        assert!(eng_b.list_schedules(semester).await.unwrap().is_empty());
        assert!(eng_b.list_time_slots().is_empty());
        assert!(eng_b.list_directory(EntityKind::Teacher).is_empty());
    }

    #[tokio::test]
    async fn tenant_inherits_policy() {
        let dir = test_data_dir("policy");
        let tm = TenantManager::new(dir, 1000, OnConflict::Warn);
        let eng = tm.get_or_create("warned").unwrap();
        assert_eq!(eng.on_conflict(), OnConflict::Warn);
    }

    #[tokio::test]
    async fn tenant_lazy_creation() {
        let dir = test_data_dir("lazy");
        let tm = TenantManager::new(dir.clone(), 1000, OnConflict::Block);

        let entries: Vec<_> = fs::read_dir(&dir).unwrap().collect();
        assert!(entries.is_empty());

        let _eng = tm.get_or_create("registrar").unwrap();
        assert!(dir.join("registrar.wal").exists());
    }

    #[tokio::test]
    async fn tenant_same_engine_returned() {
        let dir = test_data_dir("same_eng");
        let tm = TenantManager::new(dir, 1000, OnConflict::Block);

        let eng1 = tm.get_or_create("foo").unwrap();
        let eng2 = tm.get_or_create("foo").unwrap();
        assert!(Arc::ptr_eq(&eng1, &eng2));
    }

    #[tokio::test]
    async fn tenant_name_sanitized() {
        let dir = test_data_dir("sanitize");
        let tm = TenantManager::new(dir.clone(), 1000, OnConflict::Block);

        let _eng = tm.get_or_create("../evil").unwrap();
        assert!(dir.join("evil.wal").exists());

        assert!(tm.get_or_create("../..").is_err());
    }

    #[tokio::test]
    async fn tenant_name_too_long() {
        let dir = test_data_dir("name_too_long");
        let tm = TenantManager::new(dir, 1000, OnConflict::Block);

        let long_name = "x".repeat(MAX_TENANT_NAME_LEN + 1);
        let err = tm.get_or_create(&long_name).err().unwrap();
        assert!(err.to_string().contains("tenant name too long"));
    }

    #[tokio::test]
    async fn tenant_count_limit() {
        let dir = test_data_dir("count_limit");
        let tm = TenantManager::new(dir, 1000, OnConflict::Block);

        for i in 0..MAX_TENANTS {
            tm.get_or_create(&format!("t{i}")).unwrap();
        }
        let err = tm.get_or_create("one_more").err().unwrap();
        assert!(err.to_string().contains("too many tenants"));
    }
}
